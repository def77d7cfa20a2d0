//! Retrieval-augmented question answering
//!
//! [`RagPipeline`] retrieves passages for a question, renders them into a
//! context-grounded prompt, and asks the decision backend to answer strictly
//! from that context. The prompt instructs the model to say "I don't know"
//! rather than invent an answer.

use tower::{BoxError, Service, ServiceExt};
use tracing::debug;

use crate::items::Message;
use crate::provider::{ModelRequest, ModelSvc};
use crate::retrieval::RetrieverSvc;
use crate::tool::{tool_typed, ToolDef};

const RAG_TEMPLATE: &str = "#CONTEXT:\n{context}\n\nQUERY:\n{query}\n\n\
Use the provide context to answer the provided user query. \
Only use the provided context to answer the query. \
If you do not know the answer, or it's not contained in the provided context \
respond with \"I don't know\"";

/// Question answering over an indexed corpus.
#[derive(Clone)]
pub struct RagPipeline {
    retriever: RetrieverSvc,
    provider: ModelSvc,
    model: String,
}

impl RagPipeline {
    pub fn new(retriever: RetrieverSvc, provider: ModelSvc, model: impl Into<String>) -> Self {
        Self {
            retriever,
            provider,
            model: model.into(),
        }
    }

    pub async fn answer(&self, question: &str) -> Result<String, BoxError> {
        let mut retriever = self.retriever.clone();
        let passages = retriever
            .ready()
            .await?
            .call(question.to_string())
            .await?;
        debug!(passages = passages.len(), "retrieved context");

        let context = passages
            .iter()
            .map(|p| p.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = RAG_TEMPLATE
            .replace("{context}", &context)
            .replace("{query}", question);

        let mut provider = self.provider.clone();
        let response = provider
            .ready()
            .await?
            .call(ModelRequest::new(&self.model, vec![Message::user(prompt)]))
            .await?;
        Ok(response.content.unwrap_or_default())
    }
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct RetrieveArgs {
    /// Question to answer from the indexed corpus.
    pub query: String,
}

/// Expose a RAG pipeline as an agent tool. The `description` tells the
/// supervisor's agent what the corpus covers.
pub fn retrieve_information(pipeline: RagPipeline, description: impl Into<String>) -> ToolDef {
    tool_typed(
        "retrieve_information",
        description,
        move |args: RetrieveArgs| {
            let pipeline = pipeline.clone();
            async move { pipeline.answer(&args.query).await }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ModelRequest, ScriptedProvider};
    use crate::retrieval::{HashingEmbedder, InMemoryIndex, Passage};
    use std::sync::{Arc, Mutex};
    use tower::util::BoxCloneSyncService;

    fn capture_provider(answer: &str) -> (ModelSvc, Arc<Mutex<Vec<ModelRequest>>>) {
        let captured: Arc<Mutex<Vec<ModelRequest>>> = Arc::new(Mutex::new(Vec::new()));
        let answer = answer.to_string();
        let seen = captured.clone();
        let svc = BoxCloneSyncService::new(tower::service_fn(move |req: ModelRequest| {
            let answer = answer.clone();
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().push(req);
                Ok::<_, BoxError>(crate::provider::ModelResponse::message(answer))
            }
        }));
        (svc, captured)
    }

    #[tokio::test]
    async fn test_answer_is_grounded_in_retrieved_context() {
        let mut index = InMemoryIndex::new(HashingEmbedder::default().boxed()).top_k(1);
        index
            .add(Passage {
                content: "The late fee policy changed in March.".to_string(),
                source: "policies.csv".to_string(),
            })
            .await
            .unwrap();

        let (provider, captured) = capture_provider("The policy changed in March.");
        let pipeline = RagPipeline::new(index.into_retriever(), provider, "test-model");

        let answer = pipeline.answer("when did the late fee policy change").await.unwrap();
        assert_eq!(answer, "The policy changed in March.");

        let requests = captured.lock().unwrap();
        let prompt = &requests[0].messages[0].content;
        assert!(prompt.contains("#CONTEXT:"));
        assert!(prompt.contains("late fee policy changed in March"));
        assert!(prompt.contains("I don't know"));
    }

    #[tokio::test]
    async fn test_retrieve_information_tool() {
        let mut index = InMemoryIndex::new(HashingEmbedder::default().boxed());
        index
            .add(Passage {
                content: "Refunds are processed within ten days.".to_string(),
                source: "faq.csv".to_string(),
            })
            .await
            .unwrap();
        let pipeline = RagPipeline::new(
            index.into_retriever(),
            ScriptedProvider::new()
                .with_message("Within ten days.")
                .boxed(),
            "test-model",
        );

        let tool = retrieve_information(pipeline, "Answers questions about refund policy.");
        assert_eq!(tool.name, "retrieve_information");
        let mut svc = tool.service;
        let out = svc
            .ready()
            .await
            .unwrap()
            .call(crate::tool::ToolInvocation {
                id: "call_r".to_string(),
                name: "retrieve_information".to_string(),
                arguments: serde_json::json!({"query": "how long do refunds take"}),
            })
            .await
            .unwrap();
        assert_eq!(out.result.as_str().unwrap(), "Within ten days.");
    }
}
