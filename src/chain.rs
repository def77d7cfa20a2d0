//! Entry and exit adapters around a team graph
//!
//! A graph consumes and produces full [`TeamState`]; its callers speak plain
//! text. [`TeamChain`] adapts between the two: entry seeds a fresh state from
//! a request string plus the graph's member list, exit collapses the final
//! state to its last message. The pairing is what lets whole teams be mounted
//! as single workers in an outer graph via [`chain_node`].

use tower::{util::BoxService, BoxError};
use tracing::debug;

use crate::error::{OrchestratorError, Result};
use crate::graph::{NodeSvc, TeamGraph};
use crate::items::Message;
use crate::state::{StateDelta, TeamState};

/// Collapse a finished state to the message the caller cares about.
pub fn exit_chain(state: &TeamState) -> Option<Message> {
    state.last_message().cloned()
}

/// A team graph with text-in, message-out framing.
#[derive(Clone)]
pub struct TeamChain {
    graph: TeamGraph,
    recursion_limit: Option<usize>,
}

impl TeamChain {
    pub fn new(graph: TeamGraph) -> Self {
        Self {
            graph,
            recursion_limit: None,
        }
    }

    /// Override the graph's own budget for runs through this chain.
    pub fn recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = Some(limit);
        self
    }

    pub async fn run(&self, request: &str) -> Result<Message> {
        let state = TeamState::seeded(Message::user(request))
            .with_members(self.graph.members().to_vec());
        let finished = match self.recursion_limit {
            Some(limit) => self.graph.run_with_limit(state, limit).await?,
            None => self.graph.run(state).await?,
        };
        exit_chain(&finished).ok_or_else(|| {
            OrchestratorError::Other("team produced no messages".to_string())
        })
    }
}

/// Mount a chain as a worker node of an enclosing graph. The sub-team sees
/// only the enclosing transcript's last message and contributes exactly one
/// message back.
pub fn chain_node(chain: TeamChain) -> NodeSvc {
    let svc = tower::service_fn(move |state: TeamState| {
        let chain = chain.clone();
        async move {
            let request = state
                .last_message()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            debug!(request_len = request.len(), "entering sub-team");
            let message = chain.run(&request).await?;
            Ok::<_, BoxError>(StateDelta::message(message))
        }
    });
    BoxService::new(svc)
}
