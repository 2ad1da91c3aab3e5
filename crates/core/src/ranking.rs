//! Ranking pipeline: engine candidates → probability-annotated result list.
//!
//! Probabilities are a softmax over the full candidate set. The final order is
//! descending score, then ascending pid. Each row keeps the `rank` the engine
//! assigned, so `rank` and list position can diverge when scores tie.

use crate::collection::DocId;
use crate::engine::{Candidate, EngineHandle};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One row of a [`RankedResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedDocument {
    pub text: String,
    pub pid: DocId,
    /// Rank as produced by the engine, before re-sorting.
    pub rank: usize,
    pub score: f64,
    pub prob: f64,
}

/// The externally visible answer to one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    /// The query string exactly as received.
    pub query: String,
    pub topk: Vec<RankedDocument>,
}

/// `exp(s_i) / Σ exp(s_j)`, computed with the maximum subtracted first.
///
/// Returns an empty vector for empty input.
pub fn softmax(scores: &[f64]) -> Vec<f64> {
    let Some(max) = scores.iter().copied().reduce(f64::max) else {
        return Vec::new();
    };
    let exps: Vec<f64> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Turns candidates into the final ordered result, resolving text with `lookup`.
pub fn rank_candidates<'a, F>(query: &str, candidates: &[Candidate], lookup: F) -> Result<RankedResult>
where
    F: Fn(DocId) -> Result<&'a str>,
{
    let scores: Vec<f64> = candidates.iter().map(|c| c.score).collect();
    let probs = softmax(&scores);

    let mut topk = candidates
        .iter()
        .zip(probs)
        .map(|(c, prob)| {
            Ok(RankedDocument {
                text: lookup(c.pid)?.to_string(),
                pid: c.pid,
                rank: c.rank,
                score: c.score,
                prob,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    // Equal scores, including 0.0 and -0.0, fall through to the pid tie-break.
    topk.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.pid.cmp(&b.pid))
    });

    Ok(RankedResult {
        query: query.to_string(),
        topk,
    })
}

/// Searches `handle` and ranks the candidates.
///
/// A pid the collection does not hold fails the whole query with
/// [`Error::LookupFailure`].
pub fn run_query(handle: &EngineHandle, query: &str, k: usize) -> Result<RankedResult> {
    let candidates = handle.search(query, k)?;
    rank_candidates(query, &candidates, |pid| {
        handle.lookup(pid).map_err(|_| {
            tracing::error!(
                index = %handle.name(),
                pid,
                generation = handle.generation(),
                "Index returned a document missing from its collection"
            );
            Error::LookupFailure {
                index: handle.name().to_string(),
                pid,
            }
        })
    })
}
