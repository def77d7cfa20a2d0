//! Shared team state and the reducer that merges node output into it
//!
//! Nodes never mutate state directly. Each node returns a [`StateDelta`]
//! holding only what it produced, and the graph executor folds the delta into the
//! accumulated [`TeamState`] through a fixed per-field rule:
//!
//! - `messages`: concatenated, append-only. Existing entries are never
//!   replaced or reordered.
//! - `next`: replaced outright when the delta carries a routing decision.
//! - `current_files`: replaced outright; it is a snapshot of the workspace,
//!   not an accumulation.
//!
//! Keeping the merge in one place (rather than in each node) is what makes
//! the append-only message guarantee enforceable.

use serde::{Deserialize, Serialize};

use crate::items::Message;

/// Accumulated conversation state threaded through a team graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamState {
    /// Ordered transcript. Grows monotonically across steps.
    pub messages: Vec<Message>,
    /// Declared member names, used for prompt templating.
    pub members: Vec<String>,
    /// The routing decision of the most recent supervisor step.
    pub next: Option<String>,
    /// Human-readable listing of the authoring workspace, recomputed before
    /// each authoring agent invocation.
    pub current_files: Option<String>,
}

impl TeamState {
    /// Initial state for a run seeded with one message.
    pub fn seeded(message: Message) -> Self {
        Self {
            messages: vec![message],
            ..Default::default()
        }
    }

    pub fn with_members(mut self, members: Vec<String>) -> Self {
        self.members = members;
        self
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Fold a node's delta into this state. This is the only place fields
    /// are written during graph execution.
    pub fn apply(&mut self, delta: StateDelta) {
        self.messages.extend(delta.messages);
        if delta.next.is_some() {
            self.next = delta.next;
        }
        if delta.current_files.is_some() {
            self.current_files = delta.current_files;
        }
    }
}

/// The partial state a node returns: exactly what it produced this step.
#[derive(Debug, Clone, Default)]
pub struct StateDelta {
    pub messages: Vec<Message>,
    pub next: Option<String>,
    pub current_files: Option<String>,
}

impl StateDelta {
    pub fn message(message: Message) -> Self {
        Self {
            messages: vec![message],
            ..Default::default()
        }
    }

    pub fn route(label: impl Into<String>) -> Self {
        Self {
            next: Some(label.into()),
            ..Default::default()
        }
    }

    pub fn with_current_files(mut self, listing: impl Into<String>) -> Self {
        self.current_files = Some(listing.into());
        self
    }
}
