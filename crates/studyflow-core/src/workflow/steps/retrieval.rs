//! Retrieve step: gather reference documents for the plan's topic.
//!
//! Retrieval is best-effort. A missing index or a backend failure yields an
//! empty (or partial) list and the session continues.

use studyflow_types::retrieval::{RetrievalError, RetrievedSnippet};
use studyflow_types::session::{RetrievedDocument, SessionState};

use super::{StepContext, StepError};
use crate::workflow::update::{StateChange, StepUpdate};

/// Below this many primary hits, supplementary key-point queries run.
pub const MIN_PRIMARY_HITS: usize = 3;
/// Key points used as supplementary queries.
pub const SUPPLEMENTARY_QUERIES: usize = 2;
/// Hits requested per supplementary query.
pub const SUPPLEMENTARY_K: usize = 2;
pub const SUPPLEMENTARY_SCORE: f64 = 0.7;

pub async fn run(state: &SessionState, ctx: &StepContext<'_>) -> Result<StepUpdate, StepError> {
    let plan = state
        .learning_plan
        .as_ref()
        .ok_or_else(|| StepError::Precondition("learning plan is missing".to_string()))?;

    let primary = search(ctx, &state.session_id, &plan.topic, ctx.retrieval_k).await;
    let mut documents: Vec<RetrievedDocument> = primary
        .into_iter()
        .enumerate()
        .map(|(rank, hit)| to_document(hit, rank_score(rank)))
        .collect();

    if documents.len() < MIN_PRIMARY_HITS {
        for point in plan.key_points.iter().take(SUPPLEMENTARY_QUERIES) {
            for hit in search(ctx, &state.session_id, point, SUPPLEMENTARY_K).await {
                if documents.iter().all(|d| d.content != hit.content) {
                    documents.push(to_document(hit, SUPPLEMENTARY_SCORE));
                }
            }
        }
    }

    tracing::info!(
        session_id = %state.session_id,
        documents = documents.len(),
        "reference documents retrieved"
    );

    let note = format!("Retrieved {} reference documents", documents.len());
    Ok(StepUpdate::new(StateChange::Retrieved(documents)).with_note(note))
}

/// `1.0 - 0.1 * rank`, floored at zero.
pub fn rank_score(rank: usize) -> f64 {
    (1.0 - 0.1 * rank as f64).max(0.0)
}

async fn search(
    ctx: &StepContext<'_>,
    session_id: &str,
    query: &str,
    k: usize,
) -> Vec<RetrievedSnippet> {
    match ctx.retriever.retrieve(query, k).await {
        Ok(hits) => hits.into_iter().take(k).collect(),
        Err(RetrievalError::IndexNotFound(reason)) => {
            tracing::info!(session_id, reason = %reason, "no retrieval index, continuing without documents");
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(session_id, query, error = %e, "retrieval failed, continuing without documents");
            Vec::new()
        }
    }
}

fn to_document(hit: RetrievedSnippet, relevance_score: f64) -> RetrievedDocument {
    RetrievedDocument {
        content: hit.content,
        metadata: hit.metadata,
        relevance_score,
    }
}
