//! Environment-driven configuration

use std::path::PathBuf;

use tracing::warn;

use crate::error::{OrchestratorError, Result};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_WORKSPACE_BASE: &str = "./workdir";

/// Runtime configuration for the demo binary.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    /// Absent key disables web search; the research team still runs with
    /// retrieval only.
    pub tavily_api_key: Option<String>,
    pub model: String,
    pub rag_model: String,
    pub workspace_base: PathBuf,
    pub corpus_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| OrchestratorError::MissingCredential("OPENAI_API_KEY"))?;
        let tavily_api_key = std::env::var("TAVILY_API_KEY").ok();
        if tavily_api_key.is_none() {
            warn!("TAVILY_API_KEY not set; web search disabled");
        }

        let model = std::env::var("ORCHESTRATOR_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
        let rag_model = std::env::var("RAG_MODEL").unwrap_or_else(|_| model.clone());
        let workspace_base = std::env::var("WORKSPACE_BASE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_WORKSPACE_BASE));
        let corpus_path = std::env::var("CORPUS_CSV").ok().map(PathBuf::from);

        Ok(Self {
            openai_api_key,
            tavily_api_key,
            model,
            rag_model,
            workspace_base,
            corpus_path,
        })
    }
}
