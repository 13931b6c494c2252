//! Retrieval capability types.

use serde::{Deserialize, Serialize};

/// A raw hit returned by a retriever, before ranking by the retrieval step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedSnippet {
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl RetrievedSnippet {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: serde_json::Map::new(),
        }
    }
}

/// Errors from retrieval backends.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// No index has been built yet. Treated as an empty result.
    #[error("retrieval index not found: {0}")]
    IndexNotFound(String),

    #[error("retrieval backend error: {0}")]
    Backend(String),
}
