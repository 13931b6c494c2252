//! Retrieval backends.
//!
//! [`corpus::CorpusRetriever`] indexes a local directory of notes and
//! implements the core [`Retriever`](studyflow_core::retrieval::retriever::Retriever)
//! trait with lexical term-overlap ranking.

pub mod corpus;

pub use corpus::CorpusRetriever;
