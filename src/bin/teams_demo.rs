//! End-to-end demo: research a consumer-finance question, then have the
//! response team draft a written reply in a fresh workspace.

use tower::util::BoxCloneSyncService;
use tower::BoxError;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tower_teams::config::Config;
use tower_teams::corpus::{load_csv, TextSplitter};
use tower_teams::provider::OpenAIProvider;
use tower_teams::rag::RagPipeline;
use tower_teams::retrieval::{HashingEmbedder, InMemoryIndex, Passage};
use tower_teams::teams::{authoring_team, research_team, Orchestrator};
use tower_teams::tools::search::{SearchQuery, SearchResult, SearchSvc, TavilySearch};
use tower_teams::workspace::Workspace;

const CSV_CONTENT_COLUMNS: &[&str] = &[
    "Consumer complaint narrative",
    "Company public response",
    "Company response to consumer",
];

const SEED_PASSAGES: &[&str] = &[
    "Consumer complaint narrative: I was charged a late fee even though my \
     payment posted on the due date.\nCompany response to consumer: We \
     reviewed the account, confirmed the posting date, and refunded the fee.",
    "Consumer complaint narrative: My loan servicer transferred my account \
     without notice and my autopay stopped.\nCompany response to consumer: \
     We re-enrolled the customer in autopay and waived the missed-payment \
     charges.",
];

fn noop_search() -> SearchSvc {
    BoxCloneSyncService::new(tower::service_fn(|_q: SearchQuery| async move {
        Ok::<Vec<SearchResult>, BoxError>(Vec::new())
    }))
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let provider = OpenAIProvider::from_api_key(&config.openai_api_key).boxed();

    // Build the retrieval index from the configured CSV, or seed passages
    // when none is given.
    let splitter = TextSplitter::default();
    let mut index = InMemoryIndex::new(HashingEmbedder::default().boxed());
    match &config.corpus_path {
        Some(path) => {
            let documents = load_csv(path, CSV_CONTENT_COLUMNS)?;
            for (i, doc) in documents.iter().enumerate() {
                let source = format!("{}#{}", path.display(), i);
                index.add_all(splitter.passages(doc, &source)).await?;
            }
        }
        None => {
            info!("CORPUS_CSV not set; indexing built-in seed passages");
            for (i, text) in SEED_PASSAGES.iter().enumerate() {
                index
                    .add(Passage {
                        content: (*text).to_string(),
                        source: format!("seed#{i}"),
                    })
                    .await?;
            }
        }
    }
    info!(passages = index.len(), "retrieval index ready");

    let rag = RagPipeline::new(
        index.into_retriever(),
        provider.clone(),
        config.rag_model.as_str(),
    );

    let search = match &config.tavily_api_key {
        Some(key) => TavilySearch::new(key).boxed(),
        None => noop_search(),
    };

    let research = research_team(provider.clone(), &config.model, search, rag);
    let workspace = Workspace::create(&config.workspace_base)?;
    info!(workspace = %workspace.root().display(), "authoring workspace");
    let authoring = authoring_team(provider.clone(), &config.model, workspace.clone(), None);

    let orchestrator = Orchestrator::new(provider, &config.model, research, authoring);

    let request = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let request = if request.is_empty() {
        "Look up how loan servicers typically resolve wrongly charged late \
         fees, then write a short customer-facing response document about our \
         policy."
            .to_string()
    } else {
        request
    };

    let answer = orchestrator.run(&request).await?;
    println!("{}", answer.content);
    println!("\nworkspace: {}", workspace.root().display());
    Ok(())
}
