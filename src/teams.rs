//! Prebuilt team graphs and the two-level orchestrator
//!
//! Two teams, each its own supervisor-led star graph:
//!
//! - the research team answers questions with a web-search worker and a
//!   corpus-retrieval worker
//! - the response team drafts, outlines, and edits documents in a shared
//!   workspace
//!
//! The [`Orchestrator`] mounts both teams as single workers of a top-level
//! graph under its own supervisor, so the whole hierarchy is one more
//! instance of the same star shape.

use crate::agent::{agent_node, Agent};
use crate::chain::{chain_node, TeamChain};
use crate::error::Result;
use crate::graph::TeamGraph;
use crate::items::Message;
use crate::provider::ModelSvc;
use crate::rag::{retrieve_information, RagPipeline};
use crate::retrieval::RetrieverSvc;
use crate::supervisor::Router;
use crate::tools::document::{
    create_outline, edit_document, read_document, reference_previous_responses, write_document,
};
use crate::tools::search::{search_web, SearchSvc};
use crate::workspace::Workspace;

const SUPERVISOR_PROMPT: &str = "You are a supervisor tasked with managing a \
conversation between the following workers: {team_members}. Given the following \
user request, respond with the worker to act next. Each worker will perform a \
task and respond with their results and status. When finished, respond with \
FINISH.";

const TOP_SUPERVISOR_PROMPT: &str = "You are a supervisor tasked with managing \
a conversation between the following teams: {team_members}. Given the following \
user request, respond with the team to act next. Each team will perform a task \
and respond with their results and status. When finished, respond with FINISH.";

const SEARCH_INSTRUCTIONS: &str = "You are a research assistant who can search \
for up-to-date information using a web search engine.";

const RETRIEVER_INSTRUCTIONS: &str = "You are a research assistant who can \
provide specific information from an indexed corpus of consumer complaints and \
company responses.";

const DOC_WRITER_INSTRUCTIONS: &str = "You are an expert writing and editing \
documents.\nBelow are files currently in your directory:\n{current_files}";

const NOTE_TAKER_INSTRUCTIONS: &str = "You are an expert senior researcher \
tasked with writing an outline and taking notes to craft a final document.\n\
Below are files currently in your directory:\n{current_files}";

const COPY_EDITOR_INSTRUCTIONS: &str = "You are an expert copy editor who \
focuses on fixing grammar, spelling, and clarity issues.\nBelow are files \
currently in your directory:\n{current_files}";

const TONE_EDITOR_INSTRUCTIONS: &str = "You are an expert in communication \
tone. You review the document and edit it so the tone is consistent, \
empathetic, and appropriate for the audience.\nBelow are files currently in \
your directory:\n{current_files}";

/// Research team: `Search` over a web backend, `Retriever` over an indexed
/// corpus.
pub fn research_team(
    provider: ModelSvc,
    model: &str,
    search: SearchSvc,
    rag: RagPipeline,
) -> TeamGraph {
    let search_agent = Agent::builder(provider.clone())
        .model(model)
        .tool(search_web(search))
        .build();
    let retriever_agent = Agent::builder(provider.clone())
        .model(model)
        .tool(retrieve_information(
            rag,
            "Answers questions from the indexed corpus of consumer complaints \
             and company responses.",
        ))
        .build();

    let members = vec!["Search".to_string(), "Retriever".to_string()];
    let supervisor = Router::new(provider, model, SUPERVISOR_PROMPT, members);

    TeamGraph::builder(supervisor.boxed())
        .worker(
            "Search",
            agent_node("Search", SEARCH_INSTRUCTIONS, search_agent, None),
        )
        .worker(
            "Retriever",
            agent_node("Retriever", RETRIEVER_INSTRUCTIONS, retriever_agent, None),
        )
        .build()
}

/// Response team: document workers sharing one workspace. `prior_responses`
/// optionally backs the precedent-lookup tool.
pub fn authoring_team(
    provider: ModelSvc,
    model: &str,
    workspace: Workspace,
    prior_responses: Option<RetrieverSvc>,
) -> TeamGraph {
    let doc_writer = Agent::builder(provider.clone())
        .model(model)
        .tool(write_document(workspace.clone()))
        .tool(edit_document(workspace.clone()))
        .tool(read_document(workspace.clone()))
        .tool(reference_previous_responses(prior_responses))
        .build();
    let note_taker = Agent::builder(provider.clone())
        .model(model)
        .tool(create_outline(workspace.clone()))
        .tool(read_document(workspace.clone()))
        .build();
    let copy_editor = Agent::builder(provider.clone())
        .model(model)
        .tool(write_document(workspace.clone()))
        .tool(edit_document(workspace.clone()))
        .tool(read_document(workspace.clone()))
        .build();
    let tone_editor = Agent::builder(provider.clone())
        .model(model)
        .tool(write_document(workspace.clone()))
        .tool(edit_document(workspace.clone()))
        .tool(read_document(workspace.clone()))
        .build();

    let members = vec![
        "DocWriter".to_string(),
        "NoteTaker".to_string(),
        "CopyEditor".to_string(),
        "ToneEditor".to_string(),
    ];
    let supervisor = Router::new(provider, model, SUPERVISOR_PROMPT, members);

    TeamGraph::builder(supervisor.boxed())
        .worker(
            "DocWriter",
            agent_node(
                "DocWriter",
                DOC_WRITER_INSTRUCTIONS,
                doc_writer,
                Some(workspace.clone()),
            ),
        )
        .worker(
            "NoteTaker",
            agent_node(
                "NoteTaker",
                NOTE_TAKER_INSTRUCTIONS,
                note_taker,
                Some(workspace.clone()),
            ),
        )
        .worker(
            "CopyEditor",
            agent_node(
                "CopyEditor",
                COPY_EDITOR_INSTRUCTIONS,
                copy_editor,
                Some(workspace.clone()),
            ),
        )
        .worker(
            "ToneEditor",
            agent_node(
                "ToneEditor",
                TONE_EDITOR_INSTRUCTIONS,
                tone_editor,
                Some(workspace),
            ),
        )
        .build()
}

/// Name of the research team as the top supervisor sees it.
pub const RESEARCH_TEAM: &str = "Research team";
/// Name of the authoring team as the top supervisor sees it.
pub const RESPONSE_TEAM: &str = "Response team";

/// Top-level graph delegating to whole teams.
#[derive(Clone)]
pub struct Orchestrator {
    chain: TeamChain,
}

impl Orchestrator {
    pub fn new(
        provider: ModelSvc,
        model: &str,
        research: TeamGraph,
        authoring: TeamGraph,
    ) -> Self {
        let members = vec![RESEARCH_TEAM.to_string(), RESPONSE_TEAM.to_string()];
        let supervisor = Router::new(provider, model, TOP_SUPERVISOR_PROMPT, members);

        let graph = TeamGraph::builder(supervisor.boxed())
            .worker(RESEARCH_TEAM, chain_node(TeamChain::new(research)))
            .worker(RESPONSE_TEAM, chain_node(TeamChain::new(authoring)))
            .build();
        Self {
            chain: TeamChain::new(graph),
        }
    }

    pub fn recursion_limit(mut self, limit: usize) -> Self {
        self.chain = self.chain.recursion_limit(limit);
        self
    }

    /// Run one request through the hierarchy and return the final message.
    pub async fn run(&self, request: &str) -> Result<Message> {
        self.chain.run(request).await
    }
}
