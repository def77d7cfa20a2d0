//! Supervisor routing node
//!
//! A supervisor is the hub of a team graph. Each turn it reads the shared
//! transcript and picks the next member to act, or `FINISH`. The decision is
//! extracted through a forced function call against an enum schema so the
//! backend cannot answer in free text, and the returned label is validated
//! against the declared option set before it touches state. An out-of-set
//! label is a hard [`OrchestratorError::InvalidRoute`], never a silent
//! fallback.

use std::future::Future;
use std::pin::Pin;

use async_openai::types::{
    ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType, FunctionObjectArgs,
};
use serde_json::json;
use tower::{util::BoxCloneSyncService, BoxError, Service, ServiceExt};
use tracing::{debug, info};

use crate::error::OrchestratorError;
use crate::items::Message;
use crate::provider::{ModelRequest, ModelSvc};
use crate::state::{StateDelta, TeamState};

/// Name of the forced routing function.
pub const ROUTE_FUNCTION: &str = "route";

/// Terminal routing label. Choosing it ends the team's turn.
pub const FINISH: &str = "FINISH";

/// Trailing instruction appended after the transcript on every routing call.
const ROUTE_SUFFIX: &str = "Given the conversation above, who should act next? \
Or should we FINISH? Select one of: {options}";

/// Boxed routing service: state in, routing delta out. `Sync` so graphs
/// holding one can be borrowed across await points inside boxed node futures.
pub type RouterSvc = BoxCloneSyncService<TeamState, StateDelta, BoxError>;

/// LLM-backed supervisor over a fixed option set.
#[derive(Clone)]
pub struct Router {
    provider: ModelSvc,
    model: String,
    prompt: String,
    options: Vec<String>,
}

impl Router {
    /// `members` are the routable worker names; `FINISH` is prepended to the
    /// option set automatically.
    pub fn new(
        provider: ModelSvc,
        model: impl Into<String>,
        prompt: impl Into<String>,
        members: Vec<String>,
    ) -> Self {
        let mut options = vec![FINISH.to_string()];
        options.extend(members);
        Self {
            provider,
            model: model.into(),
            prompt: prompt.into(),
            options,
        }
    }

    pub fn boxed(self) -> RouterSvc {
        BoxCloneSyncService::new(self)
    }

    /// The function spec the decision is forced through. The single `next`
    /// property is an enum over the option set, so any schema-conforming
    /// answer is already a known label.
    fn route_spec(&self) -> ChatCompletionTool {
        let schema = json!({
            "title": "routeSchema",
            "type": "object",
            "properties": {
                "next": {
                    "title": "Next",
                    "type": "string",
                    "enum": self.options,
                }
            },
            "required": ["next"],
        });
        let func = FunctionObjectArgs::default()
            .name(ROUTE_FUNCTION)
            .description("Select the next role.")
            .parameters(schema)
            .build()
            .expect("valid function object");
        ChatCompletionToolArgs::default()
            .r#type(ChatCompletionToolType::Function)
            .function(func)
            .build()
            .expect("valid chat tool")
    }

    fn render(&self, template: &str, members: &[String]) -> String {
        let team_members = members.join(", ");
        let options = self.options.join(", ");
        template
            .replace("{team_members}", &team_members)
            .replace("{options}", &options)
    }
}

impl Service<TeamState> for Router {
    type Response = StateDelta;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, state: TeamState) -> Self::Future {
        let mut provider = self.provider.clone();
        let model = self.model.clone();
        let options = self.options.clone();
        // Prompt templating prefers the member list carried in state (set by
        // the entry adapter); validation always uses the static option set.
        let members: Vec<String> = if state.members.is_empty() {
            options.iter().skip(1).cloned().collect()
        } else {
            state.members.clone()
        };
        let system = self.render(&self.prompt, &members);
        let suffix = self.render(ROUTE_SUFFIX, &members);
        let spec = self.route_spec();

        Box::pin(async move {
            let mut messages = vec![Message::system(system)];
            messages.extend(state.messages.iter().cloned());
            messages.push(Message::system(suffix));

            let req = ModelRequest::new(&model, messages)
                .with_tools(vec![spec])
                .with_forced_tool(ROUTE_FUNCTION);
            let response = ServiceExt::ready(&mut provider).await?.call(req).await?;

            let call = response
                .tool_calls
                .into_iter()
                .find(|tc| tc.name == ROUTE_FUNCTION)
                .ok_or_else(|| OrchestratorError::InvalidRoute {
                    label: response.content.unwrap_or_default(),
                    options: options.clone(),
                })?;

            let label = call
                .arguments
                .get("next")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            debug!(label = %label, "routing decision");

            if !options.iter().any(|o| o == &label) {
                return Err(OrchestratorError::InvalidRoute {
                    label,
                    options: options.clone(),
                }
                .into());
            }

            if label == FINISH {
                info!("supervisor chose FINISH");
            }
            Ok(StateDelta::route(label))
        })
    }
}
