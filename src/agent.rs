//! Autonomous tool-using agent
//!
//! An agent is a decision backend, a fixed tool set, and a role prompt,
//! composed Tower-style: [`Step`] performs one model call plus the tool
//! invocations it requested, and [`AgentLoop`] repeats steps until the model
//! answers without tool calls (or a stop policy fires first).
//!
//! Tool failures are recoverable by design: a failing invocation is surfaced
//! back to the model as an `Error: …` observation message, never as a step
//! error, so the agent can retry with a different action. The enclosing
//! graph's step budget is the hard safety net.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_openai::types::ChatCompletionTool;
use serde_json::Value;
use tower::{util::BoxCloneService, BoxError, Layer, Service, ServiceExt};
use tracing::{debug, warn};

use crate::graph::NodeSvc;
use crate::items::Message;
use crate::provider::{ModelRequest, ModelSvc};
use crate::state::{StateDelta, TeamState};
use crate::tool::{ToolDef, ToolInvocation, ToolOutput, ToolRouter, ToolSvc};
use crate::workspace::Workspace;

/// Appended to every role prompt, from the reference system's agent charter.
const AUTONOMY_SUFFIX: &str = "\nWork autonomously according to your specialty, \
using the tools available to you. Do not ask for clarification. Your other team \
members (and other teams) will collaborate with you with their own specialties. \
You are chosen for a reason!";

/// Auxiliary accounting captured per step.
#[derive(Debug, Clone, Default)]
pub struct StepAux {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub tool_invocations: usize,
}

/// Outcome of a single agent step.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    Next {
        messages: Vec<Message>,
        aux: StepAux,
    },
    Done {
        messages: Vec<Message>,
        aux: StepAux,
    },
}

/// One-step agent service parameterized by a routed tool service `S`.
pub struct Step<S> {
    provider: ModelSvc,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    tools: S,
    tool_specs: Arc<Vec<ChatCompletionTool>>,
}

impl<S: Clone> Clone for Step<S> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: self.tools.clone(),
            tool_specs: self.tool_specs.clone(),
        }
    }
}

impl<S> Step<S> {
    pub fn new(
        provider: ModelSvc,
        model: impl Into<String>,
        tools: S,
        tool_specs: Vec<ChatCompletionTool>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: None,
            max_tokens: None,
            tools,
            tool_specs: Arc::new(tool_specs),
        }
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    pub fn max_tokens(mut self, mt: u32) -> Self {
        self.max_tokens = Some(mt);
        self
    }
}

impl<S> Service<Vec<Message>> for Step<S>
where
    S: Service<ToolInvocation, Response = ToolOutput, Error = BoxError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = StepOutcome;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Vec<Message>) -> Self::Future {
        let mut provider = self.provider.clone();
        let model = self.model.clone();
        let temperature = self.temperature;
        let max_tokens = self.max_tokens;
        let tools = self.tools.clone();
        let tool_specs = self.tool_specs.clone();

        Box::pin(async move {
            let mut messages = req;

            let mut model_req = ModelRequest::new(&model, messages.clone())
                .with_tools((*tool_specs).clone());
            model_req.temperature = temperature;
            model_req.max_tokens = max_tokens;

            let response = ServiceExt::ready(&mut provider)
                .await?
                .call(model_req)
                .await?;

            let mut aux = StepAux {
                prompt_tokens: response.usage.prompt_tokens,
                completion_tokens: response.usage.completion_tokens,
                tool_invocations: 0,
            };

            let content = response.content.clone().unwrap_or_default();
            if response.tool_calls.is_empty() {
                messages.push(Message::assistant(content));
                return Ok(StepOutcome::Done { messages, aux });
            }
            messages.push(Message::assistant_with_tool_calls(
                content,
                response.tool_calls.clone(),
            ));

            // Strictly sequential tool execution: workers share unsynchronized
            // workspace state, so invocation order must match call order.
            for tc in response.tool_calls {
                let inv = ToolInvocation {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments: tc.arguments,
                };
                let mut svc = tools.clone();
                aux.tool_invocations += 1;
                match ServiceExt::ready(&mut svc).await?.call(inv).await {
                    Ok(ToolOutput { id, result }) => {
                        let text = match result {
                            Value::String(s) => s,
                            other => other.to_string(),
                        };
                        messages.push(Message::tool(text, id));
                    }
                    Err(e) => {
                        // Recoverable: hand the failure back to the model as
                        // an observation and let it decide what to do next.
                        warn!(tool = %tc.name, error = %e, "tool invocation failed");
                        messages.push(Message::tool(format!("Error: {}", e), tc.id));
                    }
                }
            }

            Ok(StepOutcome::Next { messages, aux })
        })
    }
}

// =============================
// Loop policies
// =============================

/// Stop reasons reported by the agent loop.
#[derive(Debug, Clone)]
pub enum AgentStopReason {
    DoneNoToolCalls,
    MaxSteps,
}

/// Loop state visible to policies.
#[derive(Debug, Clone, Default)]
pub struct LoopState {
    pub steps: usize,
}

/// Policy interface controlling early loop termination.
pub trait AgentPolicy: Send + Sync {
    fn decide(&self, state: &LoopState, last: &StepOutcome) -> Option<AgentStopReason>;
}

/// Function-backed policy for ergonomic composition.
#[derive(Clone)]
#[allow(clippy::type_complexity)]
pub struct PolicyFn(
    pub Arc<dyn Fn(&LoopState, &StepOutcome) -> Option<AgentStopReason> + Send + Sync + 'static>,
);

impl AgentPolicy for PolicyFn {
    fn decide(&self, state: &LoopState, last: &StepOutcome) -> Option<AgentStopReason> {
        (self.0)(state, last)
    }
}

/// Composite policy: stop when any sub-policy returns a stop reason.
#[derive(Clone, Default)]
pub struct CompositePolicy {
    policies: Vec<PolicyFn>,
}

impl CompositePolicy {
    pub fn new(policies: Vec<PolicyFn>) -> Self {
        Self { policies }
    }
}

impl AgentPolicy for CompositePolicy {
    fn decide(&self, state: &LoopState, last: &StepOutcome) -> Option<AgentStopReason> {
        self.policies.iter().find_map(|p| p.decide(state, last))
    }
}

/// Built-in policies
pub mod policies {
    use super::*;

    /// Stop as soon as a step ends without tool calls. This is also the
    /// loop's built-in terminal condition; the named policy exists for
    /// explicit composition.
    pub fn until_no_tool_calls() -> PolicyFn {
        PolicyFn(Arc::new(|_, last| match last {
            StepOutcome::Done { .. } => Some(AgentStopReason::DoneNoToolCalls),
            StepOutcome::Next { .. } => None,
        }))
    }

    pub fn max_steps(max: usize) -> PolicyFn {
        PolicyFn(Arc::new(move |s, _| {
            if s.steps >= max {
                Some(AgentStopReason::MaxSteps)
            } else {
                None
            }
        }))
    }
}

/// Final run summary from the agent loop.
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub messages: Vec<Message>,
    pub steps: usize,
    pub stop: AgentStopReason,
}

impl AgentRun {
    /// The agent's final textual answer: the last assistant message that
    /// carries content.
    pub fn final_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::items::Role::Assistant && !m.content.is_empty())
            .map(|m| m.content.as_str())
    }
}

/// Layer wrapping a step service with a policy-controlled loop.
pub struct AgentLoopLayer<P> {
    policy: P,
}

impl<P> AgentLoopLayer<P> {
    pub fn new(policy: P) -> Self {
        Self { policy }
    }
}

pub struct AgentLoop<S, P> {
    inner: Arc<tokio::sync::Mutex<S>>,
    policy: P,
}

impl<S, P: Clone> Clone for AgentLoop<S, P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<S, P> Layer<S> for AgentLoopLayer<P>
where
    P: Clone,
{
    type Service = AgentLoop<S, P>;
    fn layer(&self, inner: S) -> Self::Service {
        AgentLoop {
            inner: Arc::new(tokio::sync::Mutex::new(inner)),
            policy: self.policy.clone(),
        }
    }
}

impl<S, P> Service<Vec<Message>> for AgentLoop<S, P>
where
    S: Service<Vec<Message>, Response = StepOutcome, Error = BoxError> + Send + 'static,
    S::Future: Send + 'static,
    P: AgentPolicy + Send + Sync + Clone + 'static,
{
    type Response = AgentRun;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Vec<Message>) -> Self::Future {
        let inner = self.inner.clone();
        let policy = self.policy.clone();
        Box::pin(async move {
            let mut state = LoopState::default();
            let mut current = req;
            loop {
                let mut guard = inner.lock().await;
                let outcome = guard.ready().await?.call(current.clone()).await?;
                drop(guard);

                state.steps += 1;
                debug!(step = state.steps, "agent step complete");

                if let Some(stop) = policy.decide(&state, &outcome) {
                    let messages = match outcome {
                        StepOutcome::Next { messages, .. } => messages,
                        StepOutcome::Done { messages, .. } => messages,
                    };
                    return Ok(AgentRun {
                        messages,
                        steps: state.steps,
                        stop,
                    });
                }

                match outcome {
                    StepOutcome::Next { messages, .. } => current = messages,
                    StepOutcome::Done { messages, .. } => {
                        return Ok(AgentRun {
                            messages,
                            steps: state.steps,
                            stop: AgentStopReason::DoneNoToolCalls,
                        });
                    }
                }
            }
        })
    }
}

// =============================
// Builder and node adapter
// =============================

/// Boxed agent service type.
pub type AgentSvc = BoxCloneService<Vec<Message>, AgentRun, BoxError>;

/// Thin facade to build an agent stack from a provider, tools, and a policy.
pub struct Agent;

impl Agent {
    pub fn builder(provider: ModelSvc) -> AgentBuilder {
        AgentBuilder {
            provider,
            model: "gpt-4o-mini".to_string(),
            temperature: None,
            max_tokens: None,
            tools: Vec::new(),
            policy: CompositePolicy::default(),
        }
    }
}

pub struct AgentBuilder {
    provider: ModelSvc,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    tools: Vec<ToolDef>,
    policy: CompositePolicy,
}

impl AgentBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    pub fn max_tokens(mut self, mt: u32) -> Self {
        self.max_tokens = Some(mt);
        self
    }

    pub fn tool(mut self, tool: ToolDef) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: Vec<ToolDef>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn policy(mut self, policy: CompositePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> AgentSvc {
        let (router, specs) = ToolRouter::new(self.tools);
        let routed: ToolSvc = BoxCloneService::new(router);
        let mut step = Step::new(self.provider, self.model, routed, specs);
        if let Some(t) = self.temperature {
            step = step.temperature(t);
        }
        if let Some(mt) = self.max_tokens {
            step = step.max_tokens(mt);
        }
        let agent = AgentLoopLayer::new(self.policy).layer(step);
        BoxCloneService::new(agent)
    }
}

/// Expose an agent to a team graph as a node: extract the transcript, build
/// the role prompt (with a fresh workspace listing for authoring agents),
/// invoke the agent, and return a delta of exactly one message attributed to
/// the agent's role name.
pub fn agent_node(
    name: impl Into<String>,
    instructions: impl Into<String>,
    agent: AgentSvc,
    workspace: Option<Workspace>,
) -> NodeSvc {
    let name = name.into();
    let instructions = instructions.into();
    let svc = tower::service_fn(move |state: TeamState| {
        let mut agent = agent.clone();
        let name = name.clone();
        let instructions = instructions.clone();
        let workspace = workspace.clone();
        async move {
            let mut system = instructions;
            let mut files_snapshot = None;
            if let Some(ws) = &workspace {
                // Recomputed, never accumulated: the listing reflects the
                // workspace as it is right now.
                let listing = ws.listing();
                system = if system.contains("{current_files}") {
                    system.replace("{current_files}", &listing)
                } else {
                    format!("{system}\n{listing}")
                };
                files_snapshot = Some(listing);
            }
            system.push_str(AUTONOMY_SUFFIX);

            let mut messages = vec![Message::system(system)];
            messages.extend(state.messages.iter().cloned());

            let run = agent.ready().await?.call(messages).await?;
            let text = run.final_text().unwrap_or_default().to_string();
            debug!(agent = %name, steps = run.steps, "agent node complete");

            let mut delta = StateDelta::message(Message::named(name, text));
            delta.current_files = files_snapshot;
            Ok::<_, BoxError>(delta)
        }
    });
    tower::util::BoxService::new(svc)
}
