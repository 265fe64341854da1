use thiserror::Error;

/// Canonical result for the whole workspace.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// An operand could not be hashed or serialized deterministically.
    /// Raised at construction time; a node without a valid token cannot
    /// be interned or deduplicated.
    #[error("Tokenization error: {0}")]
    Tokenization(String),

    /// A rewrite pass exceeded its iteration cap before reaching a fixpoint.
    #[error("Pass '{pass}' did not converge after {iterations} iterations")]
    Convergence { pass: String, iterations: usize },

    /// A logical operator has no applicable physical strategy.
    #[error("Lowering error: {0}")]
    Lowering(String),

    /// Metadata resolution failed; propagated as-is, retry policy belongs
    /// to the metadata source.
    #[error("Metadata resolution failed: {0}")]
    Metadata(String),

    /// A plan reached materialization in a non-materializable state.
    #[error("Materialization error: {0}")]
    Materialize(String),

    /// A node could not be written to or restored from its persisted form.
    #[error("Persisted-form error: {0}")]
    Persist(String),

    #[error("Internal invariant failed: {0}")]
    Invariant(String),

    /// Error with context chain for better debugging
    #[error("Error in {context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    /// Add context to an error, creating an error chain.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self) as Box<dyn std::error::Error + Send + Sync>,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Tokenization(e.to_string())
    }
}
