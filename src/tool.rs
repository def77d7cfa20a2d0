//! Tool capability layer
//!
//! Every tool is a name, a natural-language description for the decision
//! backend, a schemars-generated parameter schema, and a boxed Tower service
//! that performs the invocation. [`ToolRouter`] dispatches invocations by
//! name, with an index-0 fallback for unknown tools so a bad name comes back
//! as a recoverable error rather than a panic.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_openai::types::{
    ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType, FunctionObjectArgs,
};
use futures::future::BoxFuture;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tower::{util::BoxCloneService, BoxError, Service};

/// Uniform tool invocation passed to routed tool services.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Uniform tool output produced by tool services.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub id: String,
    pub result: Value,
}

/// Boxed tool service type alias.
pub type ToolSvc = BoxCloneService<ToolInvocation, ToolOutput, BoxError>;

/// Definition of a tool: function spec for the model plus the implementation.
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub parameters_schema: Value,
    pub service: ToolSvc,
}

impl ToolDef {
    /// Create a tool definition from a handler taking JSON args.
    pub fn from_handler(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters_schema: Value,
        handler: Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, BoxError>> + Send + Sync>,
    ) -> Self {
        let name = name.into();
        let expected = name.clone();
        let svc = tower::service_fn(move |inv: ToolInvocation| {
            let handler = handler.clone();
            let expected = expected.clone();
            async move {
                if inv.name != expected {
                    return Err::<ToolOutput, BoxError>(
                        format!("routed to wrong tool: expected={}, got={}", expected, inv.name)
                            .into(),
                    );
                }
                let out = (handler)(inv.arguments).await?;
                Ok(ToolOutput {
                    id: inv.id,
                    result: out,
                })
            }
        });
        Self {
            name,
            description: description.into(),
            parameters_schema,
            service: BoxCloneService::new(svc),
        }
    }

    /// Convert this tool's signature into an OpenAI function spec.
    pub fn to_openai_tool(&self) -> ChatCompletionTool {
        let func = FunctionObjectArgs::default()
            .name(&self.name)
            .description(&self.description)
            .parameters(self.parameters_schema.clone())
            .build()
            .expect("valid function object");
        ChatCompletionToolArgs::default()
            .r#type(ChatCompletionToolType::Function)
            .function(func)
            .build()
            .expect("valid chat tool")
    }
}

/// Create a tool from a typed handler.
/// - `A` is the input args struct (Deserialize + JsonSchema)
/// - `R` is the output type (Serialize)
pub fn tool_typed<A, H, Fut, R>(
    name: impl Into<String>,
    description: impl Into<String>,
    handler: H,
) -> ToolDef
where
    A: DeserializeOwned + JsonSchema + Send + 'static,
    R: serde::Serialize + Send + 'static,
    H: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, BoxError>> + Send + 'static,
{
    let schema = schemars::schema_for!(A);
    let params_value = serde_json::to_value(schema.schema).expect("schema to value");
    let handler = Arc::new(handler);
    let erased: Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, BoxError>> + Send + Sync> =
        Arc::new(move |raw: Value| {
            let h = handler.clone();
            Box::pin(async move {
                let args: A = serde_json::from_value(raw)?;
                let out: R = (h.as_ref())(args).await?;
                Ok(serde_json::to_value(out)?)
            })
        });
    ToolDef::from_handler(name, description, params_value, erased)
}

/// Router over tools using a name → index table.
#[derive(Clone)]
pub struct ToolRouter {
    name_to_index: HashMap<String, usize>,
    services: Vec<ToolSvc>, // index 0 is the unknown-tool fallback
}

impl ToolRouter {
    pub fn new(tools: Vec<ToolDef>) -> (Self, Vec<ChatCompletionTool>) {
        let unknown = BoxCloneService::new(tower::service_fn(|inv: ToolInvocation| async move {
            Err::<ToolOutput, BoxError>(format!("unknown tool: {}", inv.name).into())
        }));

        let mut services: Vec<ToolSvc> = vec![unknown];
        let mut specs: Vec<ChatCompletionTool> = Vec::with_capacity(tools.len());
        let mut name_to_index: HashMap<String, usize> = HashMap::new();

        for (i, td) in tools.into_iter().enumerate() {
            specs.push(td.to_openai_tool());
            name_to_index.insert(td.name, i + 1);
            services.push(td.service);
        }

        (
            Self {
                name_to_index,
                services,
            },
            specs,
        )
    }
}

impl Service<ToolInvocation> for ToolRouter {
    type Response = ToolOutput;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        // Readiness is checked per selected service inside `call`.
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ToolInvocation) -> Self::Future {
        let idx = self
            .name_to_index
            .get(req.name.as_str())
            .copied()
            .unwrap_or(0);

        // Safe: index 0 is always present (unknown fallback)
        let svc: &mut ToolSvc = &mut self.services[idx];
        let fut = svc.call(req);
        Box::pin(fut)
    }
}
