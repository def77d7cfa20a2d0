//! Error types for the orchestration crate

use thiserror::Error;

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Structural and configuration errors surfaced by graphs and chains.
///
/// Tool-invocation failures deliberately do not appear here: inside an agent
/// step they are stringified into tool observations so the agent can decide
/// whether to retry (see `agent::Step`).
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The router produced a label outside the declared member set.
    /// This is a configuration-class error and must never be silently
    /// coerced to a fallback route.
    #[error("invalid routing decision {label:?}; legal options: {options:?}")]
    InvalidRoute { label: String, options: Vec<String> },

    /// The supervisor loop exhausted its step budget without emitting the
    /// terminal label.
    #[error("recursion limit of {limit} steps exceeded without convergence")]
    RecursionLimitExceeded { limit: usize },

    /// A required credential was absent from the environment.
    #[error("missing required credential: {0}")]
    MissingCredential(&'static str),

    /// Error from the OpenAI API
    #[error("OpenAI API error: {0}")]
    OpenAI(#[from] async_openai::error::OpenAIError),

    /// Decision-backend failure that is not an API error proper
    #[error("model provider error: {0}")]
    Provider(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Corpus CSV parsing error
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrchestratorError {
    /// Recover a typed error from a boxed service error, preserving the
    /// original variant where one crossed a Tower seam.
    pub fn from_box(err: tower::BoxError) -> Self {
        match err.downcast::<OrchestratorError>() {
            Ok(e) => *e,
            Err(e) => OrchestratorError::Other(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OrchestratorError::RecursionLimitExceeded { limit: 30 };
        assert_eq!(
            err.to_string(),
            "recursion limit of 30 steps exceeded without convergence"
        );

        let err = OrchestratorError::MissingCredential("OPENAI_API_KEY");
        assert_eq!(
            err.to_string(),
            "missing required credential: OPENAI_API_KEY"
        );
    }

    #[test]
    fn test_from_box_preserves_variant() {
        let boxed: tower::BoxError = Box::new(OrchestratorError::InvalidRoute {
            label: "Nowhere".to_string(),
            options: vec!["Search".to_string(), "FINISH".to_string()],
        });
        let recovered = OrchestratorError::from_box(boxed);
        assert!(matches!(recovered, OrchestratorError::InvalidRoute { .. }));
    }

    #[test]
    fn test_from_box_wraps_foreign_errors() {
        let boxed: tower::BoxError = "socket closed".into();
        let recovered = OrchestratorError::from_box(boxed);
        assert!(matches!(recovered, OrchestratorError::Other(_)));
    }
}
