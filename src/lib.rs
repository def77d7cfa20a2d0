//! # tower-teams
//!
//! Hierarchical multi-agent orchestration built on Tower services.
//!
//! The core abstraction is the supervisor-led star graph: an LLM supervisor
//! reads an accumulating transcript and routes to one worker at a time until
//! it chooses `FINISH`. Workers are tool-using agents, and whole teams fold
//! into single workers of an enclosing graph through entry/exit chain
//! adapters, which is how the two-level research/authoring hierarchy is
//! assembled.
//!
//! ```no_run
//! use tower_teams::provider::OpenAIProvider;
//! use tower_teams::rag::RagPipeline;
//! use tower_teams::retrieval::{HashingEmbedder, InMemoryIndex};
//! use tower_teams::teams::{authoring_team, research_team, Orchestrator};
//! use tower_teams::tools::search::TavilySearch;
//! use tower_teams::workspace::Workspace;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = OpenAIProvider::from_api_key("sk-...").boxed();
//! let search = TavilySearch::new("tvly-...").boxed();
//! let index = InMemoryIndex::new(HashingEmbedder::default().boxed());
//! let rag = RagPipeline::new(index.into_retriever(), provider.clone(), "gpt-4o-mini");
//!
//! let research = research_team(provider.clone(), "gpt-4o-mini", search, rag);
//! let workspace = Workspace::create("./workdir")?;
//! let authoring = authoring_team(provider.clone(), "gpt-4o-mini", workspace, None);
//!
//! let orchestrator = Orchestrator::new(provider, "gpt-4o-mini", research, authoring);
//! let answer = orchestrator.run("Research X and write a brief about it").await?;
//! println!("{}", answer.content);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod chain;
pub mod config;
pub mod corpus;
pub mod error;
pub mod graph;
pub mod items;
pub mod provider;
pub mod rag;
pub mod retrieval;
pub mod state;
pub mod supervisor;
pub mod teams;
pub mod tool;
pub mod tools;
pub mod workspace;

pub use agent::{Agent, AgentRun, AgentSvc};
pub use chain::{chain_node, TeamChain};
pub use error::{OrchestratorError, Result};
pub use graph::{NodeSvc, TeamGraph, DEFAULT_RECURSION_LIMIT};
pub use items::{Message, Role, ToolCall};
pub use provider::{ModelRequest, ModelResponse, ModelSvc, OpenAIProvider, ScriptedProvider};
pub use state::{StateDelta, TeamState};
pub use supervisor::{Router, RouterSvc, FINISH};
pub use teams::Orchestrator;
pub use workspace::Workspace;
