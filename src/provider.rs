//! Decision-backend seam
//!
//! Graphs and agents never talk to a model SDK directly; they call a
//! [`ModelSvc`], a boxed Tower service taking a [`ModelRequest`] and
//! returning a [`ModelResponse`]. `OpenAIProvider` adapts async-openai behind
//! that seam; `ScriptedProvider` replays a canned response queue so the whole
//! hierarchy can be exercised without a network.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionNamedToolChoice, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionToolChoiceOption, ChatCompletionToolType,
        CreateChatCompletionRequestArgs, FunctionName,
    },
    Client,
};
use serde_json::Value;
use tower::{util::BoxCloneSyncService, BoxError, Service};

use crate::items::{Message, Role, ToolCall};

/// One call to the decision backend.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub messages: Vec<Message>,
    /// Function specs advertised to the model.
    pub tools: Vec<ChatCompletionTool>,
    /// When set, the model is constrained to call the named function.
    /// Supervisors use this to force a schema-conforming routing decision.
    pub tool_choice: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ModelRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            tool_choice: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ChatCompletionTool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_forced_tool(mut self, name: impl Into<String>) -> Self {
        self.tool_choice = Some(name.into());
        self
    }
}

/// Token accounting reported per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// The backend's answer: free text, tool calls, or both.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
}

impl ModelResponse {
    pub fn message(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
            usage: Usage::default(),
        }
    }

    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            content: None,
            tool_calls: vec![ToolCall {
                id: uuid::Uuid::new_v4().to_string(),
                name: name.into(),
                arguments,
            }],
            usage: Usage::default(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Boxed decision-backend service. The `Sync` bound lets providers be
/// captured inside tool handlers.
pub type ModelSvc = BoxCloneSyncService<ModelRequest, ModelResponse, BoxError>;

// =============================
// OpenAI adapter
// =============================

/// Decision backend over the OpenAI chat completions API.
#[derive(Clone)]
pub struct OpenAIProvider {
    client: Arc<Client<OpenAIConfig>>,
}

impl OpenAIProvider {
    pub fn new(client: Arc<Client<OpenAIConfig>>) -> Self {
        Self { client }
    }

    pub fn from_api_key(api_key: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Arc::new(Client::with_config(config)),
        }
    }

    pub fn boxed(self) -> ModelSvc {
        BoxCloneSyncService::new(self)
    }

    fn convert_message(msg: &Message) -> Result<ChatCompletionRequestMessage, BoxError> {
        let converted = match msg.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(msg.content.clone())
                .build()?
                .into(),
            Role::User => {
                let mut builder = ChatCompletionRequestUserMessageArgs::default();
                builder.content(msg.content.clone());
                if let Some(name) = &msg.name {
                    builder.name(name.clone());
                }
                builder.build()?.into()
            }
            Role::Assistant => {
                let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                builder.content(msg.content.clone());
                if let Some(tool_calls) = &msg.tool_calls {
                    let calls: Vec<_> = tool_calls
                        .iter()
                        .map(|tc| async_openai::types::ChatCompletionMessageToolCall {
                            id: tc.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: async_openai::types::FunctionCall {
                                name: tc.name.clone(),
                                arguments: tc.arguments.to_string(),
                            },
                        })
                        .collect();
                    builder.tool_calls(calls);
                }
                builder.build()?.into()
            }
            Role::Tool => ChatCompletionRequestToolMessageArgs::default()
                .content(msg.content.clone())
                .tool_call_id(msg.tool_call_id.clone().unwrap_or_default())
                .build()?
                .into(),
        };
        Ok(converted)
    }
}

impl Service<ModelRequest> for OpenAIProvider {
    type Response = ModelResponse;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ModelRequest) -> Self::Future {
        let client = self.client.clone();
        Box::pin(async move {
            let messages = req
                .messages
                .iter()
                .map(Self::convert_message)
                .collect::<Result<Vec<_>, _>>()?;

            let mut builder = CreateChatCompletionRequestArgs::default();
            builder.model(&req.model).messages(messages);
            if !req.tools.is_empty() {
                builder.tools(req.tools.clone());
            }
            if let Some(name) = &req.tool_choice {
                builder.tool_choice(ChatCompletionToolChoiceOption::Named(
                    ChatCompletionNamedToolChoice {
                        r#type: ChatCompletionToolType::Function,
                        function: FunctionName { name: name.clone() },
                    },
                ));
            }
            if let Some(t) = req.temperature {
                builder.temperature(t);
            }
            if let Some(mt) = req.max_tokens {
                builder.max_tokens(mt);
            }

            let response = client.chat().create(builder.build()?).await?;
            let choice = response
                .choices
                .into_iter()
                .next()
                .ok_or("no choices in model response")?;

            let tool_calls = choice
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|tc| ToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    arguments: serde_json::from_str(&tc.function.arguments)
                        .unwrap_or(Value::Null),
                })
                .collect();

            let usage = response
                .usage
                .map(|u| Usage {
                    prompt_tokens: u.prompt_tokens as usize,
                    completion_tokens: u.completion_tokens as usize,
                })
                .unwrap_or_default();

            Ok(ModelResponse {
                content: choice.message.content,
                tool_calls,
                usage,
            })
        })
    }
}

// =============================
// Scripted provider for tests and offline runs
// =============================

/// Replays a fixed queue of responses, one per call. When the queue runs dry
/// it answers with a plain "Done." message so loops terminate.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    responses: Arc<Mutex<VecDeque<ModelResponse>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(self, content: impl Into<String>) -> Self {
        self.push(ModelResponse::message(content));
        self
    }

    pub fn with_tool_call(self, name: impl Into<String>, arguments: Value) -> Self {
        self.push(ModelResponse::tool_call(name, arguments));
        self
    }

    /// Script a supervisor routing decision.
    pub fn with_route(self, label: impl Into<String>) -> Self {
        let label = label.into();
        self.push(ModelResponse::tool_call(
            crate::supervisor::ROUTE_FUNCTION,
            serde_json::json!({ "next": label }),
        ));
        self
    }

    fn push(&self, response: ModelResponse) {
        self.responses
            .lock()
            .expect("scripted provider poisoned")
            .push_back(response);
    }

    pub fn boxed(self) -> ModelSvc {
        BoxCloneSyncService::new(self)
    }
}

impl Service<ModelRequest> for ScriptedProvider {
    type Response = ModelResponse;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: ModelRequest) -> Self::Future {
        let responses = self.responses.clone();
        Box::pin(async move {
            let next = responses
                .lock()
                .map_err(|_| "scripted provider poisoned")?
                .pop_front();
            Ok(next.unwrap_or_else(|| ModelResponse::message("Done.")))
        })
    }
}
