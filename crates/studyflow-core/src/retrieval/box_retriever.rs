//! BoxRetriever -- object-safe dynamic dispatch wrapper for Retriever.

use std::future::Future;
use std::pin::Pin;

use studyflow_types::retrieval::{RetrievalError, RetrievedSnippet};

use super::retriever::Retriever;

/// Object-safe version of [`Retriever`] with boxed futures.
pub trait RetrieverDyn: Send + Sync {
    fn retrieve_boxed<'a>(
        &'a self,
        query: &'a str,
        k: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RetrievedSnippet>, RetrievalError>> + Send + 'a>>;
}

impl<T: Retriever> RetrieverDyn for T {
    fn retrieve_boxed<'a>(
        &'a self,
        query: &'a str,
        k: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RetrievedSnippet>, RetrievalError>> + Send + 'a>>
    {
        Box::pin(self.retrieve(query, k))
    }
}

/// Type-erased retriever.
pub struct BoxRetriever {
    inner: Box<dyn RetrieverDyn + Send + Sync>,
}

impl BoxRetriever {
    pub fn new<T: Retriever + 'static>(retriever: T) -> Self {
        Self {
            inner: Box::new(retriever),
        }
    }

    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedSnippet>, RetrievalError> {
        self.inner.retrieve_boxed(query, k).await
    }
}

/// A retriever with no index; every query reports `IndexNotFound`.
pub struct NoIndexRetriever;

impl Retriever for NoIndexRetriever {
    async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<RetrievedSnippet>, RetrievalError> {
        Err(RetrievalError::IndexNotFound("no retrieval index configured".to_string()))
    }
}
