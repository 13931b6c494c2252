use studyflow_types::retrieval::{RetrievalError, RetrievedSnippet};

/// Similarity search over a document index.
///
/// Uses native async fn in traits (RPITIT). Implementations return at most
/// `k` snippets, best first. A missing index is reported as
/// [`RetrievalError::IndexNotFound`].
pub trait Retriever: Send + Sync {
    fn retrieve(
        &self,
        query: &str,
        k: usize,
    ) -> impl std::future::Future<Output = Result<Vec<RetrievedSnippet>, RetrievalError>> + Send;
}
