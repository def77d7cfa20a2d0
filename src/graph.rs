//! Team graph executor
//!
//! A [`TeamGraph`] is a star: one supervisor at the hub, workers on the
//! spokes. Execution alternates supervisor and worker turns: the supervisor
//! emits a routing label, the named worker runs and its delta is folded back
//! into state, and control returns to the supervisor unconditionally. The
//! loop ends when the supervisor picks `FINISH`, or errs with
//! [`OrchestratorError::RecursionLimitExceeded`] when the step budget runs
//! out. Non-convergence is loud, never an empty success.

use std::collections::HashMap;
use std::sync::Arc;

use tower::{util::BoxService, BoxError, Service, ServiceExt};
use tracing::{debug, info};

use crate::error::OrchestratorError;
use crate::state::{StateDelta, TeamState};
use crate::supervisor::{RouterSvc, FINISH};

/// Default step budget per run. Counts every node execution, supervisor and
/// worker alike.
pub const DEFAULT_RECURSION_LIMIT: usize = 30;

/// Boxed graph node: shared state in, partial delta out.
pub type NodeSvc = BoxService<TeamState, StateDelta, BoxError>;

/// Star-topology graph of one supervisor and named workers.
#[derive(Clone)]
pub struct TeamGraph {
    supervisor: RouterSvc,
    workers: Arc<tokio::sync::Mutex<HashMap<String, NodeSvc>>>,
    members: Vec<String>,
    recursion_limit: usize,
}

impl TeamGraph {
    pub fn builder(supervisor: RouterSvc) -> TeamGraphBuilder {
        TeamGraphBuilder {
            supervisor,
            workers: HashMap::new(),
            members: Vec::new(),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }

    /// Worker names in registration order.
    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub async fn run(&self, state: TeamState) -> crate::error::Result<TeamState> {
        self.run_with_limit(state, self.recursion_limit).await
    }

    pub async fn run_with_limit(
        &self,
        mut state: TeamState,
        limit: usize,
    ) -> crate::error::Result<TeamState> {
        let mut steps = 0usize;
        loop {
            if steps >= limit {
                return Err(OrchestratorError::RecursionLimitExceeded { limit });
            }
            steps += 1;

            let mut supervisor = self.supervisor.clone();
            let delta = supervisor
                .ready()
                .await
                .map_err(OrchestratorError::from_box)?
                .call(state.clone())
                .await
                .map_err(OrchestratorError::from_box)?;
            state.apply(delta);

            let label = state.next.clone().unwrap_or_default();
            if label == FINISH {
                info!(steps, "team run converged");
                return Ok(state);
            }

            // The router validates against its own option set; this guards
            // against a supervisor wired with members the graph never got.
            if !self.members.iter().any(|m| m == &label) {
                return Err(OrchestratorError::InvalidRoute {
                    label,
                    options: self.members.clone(),
                });
            }

            if steps >= limit {
                return Err(OrchestratorError::RecursionLimitExceeded { limit });
            }
            steps += 1;

            debug!(worker = %label, step = steps, "dispatching worker");
            let mut workers = self.workers.lock().await;
            let worker = workers
                .get_mut(&label)
                .ok_or_else(|| OrchestratorError::InvalidRoute {
                    label: label.clone(),
                    options: self.members.clone(),
                })?;
            let delta = worker
                .ready()
                .await
                .map_err(OrchestratorError::from_box)?
                .call(state.clone())
                .await
                .map_err(OrchestratorError::from_box)?;
            drop(workers);
            state.apply(delta);
        }
    }
}

pub struct TeamGraphBuilder {
    supervisor: RouterSvc,
    workers: HashMap<String, NodeSvc>,
    members: Vec<String>,
    recursion_limit: usize,
}

impl TeamGraphBuilder {
    pub fn worker(mut self, name: impl Into<String>, node: NodeSvc) -> Self {
        let name = name.into();
        self.members.push(name.clone());
        self.workers.insert(name, node);
        self
    }

    pub fn recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn build(self) -> TeamGraph {
        TeamGraph {
            supervisor: self.supervisor,
            workers: Arc::new(tokio::sync::Mutex::new(self.workers)),
            members: self.members,
            recursion_limit: self.recursion_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::Message;
    use crate::provider::ScriptedProvider;
    use crate::supervisor::Router;

    fn echo_worker(name: &'static str) -> NodeSvc {
        BoxService::new(tower::service_fn(move |_state: TeamState| async move {
            Ok::<_, BoxError>(StateDelta::message(Message::named(name, "done")))
        }))
    }

    fn scripted_router(provider: ScriptedProvider, members: Vec<&str>) -> RouterSvc {
        Router::new(
            provider.boxed(),
            "test-model",
            "You are a supervisor managing: {team_members}.",
            members.into_iter().map(String::from).collect(),
        )
        .boxed()
    }

    #[tokio::test]
    async fn test_run_alternates_supervisor_and_worker_until_finish() {
        let provider = ScriptedProvider::new()
            .with_route("Search")
            .with_route("Search")
            .with_route(FINISH);
        let graph = TeamGraph::builder(scripted_router(provider, vec!["Search"]))
            .worker("Search", echo_worker("Search"))
            .build();

        let out = graph
            .run(TeamState::seeded(Message::user("go")))
            .await
            .unwrap();

        // seed + two worker contributions, no supervisor messages
        assert_eq!(out.messages.len(), 3);
        assert_eq!(out.next.as_deref(), Some(FINISH));
    }

    #[tokio::test]
    async fn test_budget_exhaustion_is_loud() {
        // Supervisor never finishes.
        let provider = ScriptedProvider::new()
            .with_route("Search")
            .with_route("Search")
            .with_route("Search")
            .with_route("Search");
        let graph = TeamGraph::builder(scripted_router(provider, vec!["Search"]))
            .worker("Search", echo_worker("Search"))
            .recursion_limit(4)
            .build();

        let err = graph
            .run(TeamState::seeded(Message::user("go")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::RecursionLimitExceeded { limit: 4 }
        ));
    }

    #[tokio::test]
    async fn test_route_to_unregistered_worker_fails() {
        // Router allows "Retriever" but the graph never registered it.
        let provider = ScriptedProvider::new().with_route("Retriever");
        let graph = TeamGraph::builder(scripted_router(provider, vec!["Search", "Retriever"]))
            .worker("Search", echo_worker("Search"))
            .build();

        let err = graph
            .run(TeamState::seeded(Message::user("go")))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidRoute { .. }));
    }

    #[tokio::test]
    async fn test_immediate_finish_returns_seed_untouched() {
        let provider = ScriptedProvider::new().with_route(FINISH);
        let graph = TeamGraph::builder(scripted_router(provider, vec!["Search"]))
            .worker("Search", echo_worker("Search"))
            .build();

        let out = graph
            .run(TeamState::seeded(Message::user("nothing to do")))
            .await
            .unwrap();
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.messages[0].content, "nothing to do");
    }
}
