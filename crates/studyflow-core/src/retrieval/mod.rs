//! Retrieval capability used by the retrieval step.
//!
//! - `Retriever`: RPITIT trait implemented by concrete backends
//! - `BoxRetriever`: object-safe wrapper held by the engine

pub mod box_retriever;
pub mod retriever;
