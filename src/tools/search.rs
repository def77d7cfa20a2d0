//! Web search tool for the research team
//!
//! The search backend is a Tower seam like everything else, so tests can
//! substitute a scripted service. [`TavilySearch`] is the production
//! implementation.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tower::{util::BoxCloneSyncService, BoxError, Service, ServiceExt};
use tracing::debug;

use crate::tool::{tool_typed, ToolDef};

const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";
const MAX_RESULTS: usize = 5;

#[derive(Debug, Clone, Serialize, schemars::JsonSchema, Deserialize)]
pub struct SearchQuery {
    /// Search query text.
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
}

/// Boxed search backend service.
pub type SearchSvc = BoxCloneSyncService<SearchQuery, Vec<SearchResult>, BoxError>;

/// Search backend over the Tavily HTTP API.
#[derive(Clone)]
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: String,
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: api_key.into(),
        }
    }

    pub fn boxed(self) -> SearchSvc {
        BoxCloneSyncService::new(self)
    }
}

impl Service<SearchQuery> for TavilySearch {
    type Response = Vec<SearchResult>;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: SearchQuery) -> Self::Future {
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        Box::pin(async move {
            debug!(query = %req.query, "tavily search");
            let body = TavilyRequest {
                api_key: &api_key,
                query: &req.query,
                max_results: MAX_RESULTS,
            };
            let response = client
                .post(TAVILY_ENDPOINT)
                .json(&body)
                .send()
                .await?
                .error_for_status()?
                .json::<TavilyResponse>()
                .await?;
            Ok(response
                .results
                .into_iter()
                .map(|r| SearchResult {
                    title: r.title,
                    url: r.url,
                    content: r.content,
                })
                .collect())
        })
    }
}

/// Expose a search backend as an agent tool. Results are rendered as titled
/// snippets so the model can cite sources.
pub fn search_web(backend: SearchSvc) -> ToolDef {
    tool_typed(
        "search_web",
        "Search the web for up-to-date information.",
        move |args: SearchQuery| {
            let mut backend = backend.clone();
            async move {
                let results = backend.ready().await?.call(args).await?;
                if results.is_empty() {
                    return Ok::<_, BoxError>("No results found.".to_string());
                }
                let rendered = results
                    .iter()
                    .map(|r| format!("{}\n{}\n{}", r.title, r.url, r.content))
                    .collect::<Vec<_>>()
                    .join("\n\n");
                Ok(rendered)
            }
        },
    )
}
