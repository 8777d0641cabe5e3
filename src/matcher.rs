//! Alignment-consistent scoring of hash collisions against the
//! reference corpus.
//!
//! A true match shows a near-constant offset `db_time - query_time`
//! across its colliding fingerprints, while accidental hash collisions
//! scatter over unrelated offsets. Scoring each candidate by the count
//! of its most frequent offset (the modal delta) is therefore far more
//! selective than counting raw collisions.

use crate::fingerprint::{Fingerprint, StrategyId};
use crate::store::{FingerprintStore, StoreError};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Scoring knobs, independent of the extraction strategy.
#[derive(Debug, Clone)]
pub struct MatchParams {
    /// Candidates whose modal-delta count falls below this floor are
    /// rejected — an all-noise query would otherwise always "match"
    /// whatever scores highest.
    pub min_score: u32,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self { min_score: 5 }
    }
}

/// The winning candidate of a match run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchInfo {
    pub audio_id: i64,
    /// Count of the modal delta — how many collisions agree on one
    /// alignment.
    pub score: u32,
    /// The modal delta itself: `db_time - query_time` in frames.
    pub offset: i64,
}

/// Outcome of a match run. `NoMatch` is a normal result, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    Match(MatchInfo),
    NoMatch,
}

/// Find the best-aligned reference recording for a query fingerprint
/// set. Duplicate query hashes collapse to a single store lookup; ties
/// on score break to the lowest `audio_id`. Only a store failure is an
/// error.
pub fn find_match(
    query: &[Fingerprint],
    strategy: StrategyId,
    store: &dyn FingerprintStore,
    params: &MatchParams,
) -> Result<MatchResult, StoreError> {
    if query.is_empty() {
        return Ok(MatchResult::NoMatch);
    }

    // One lookup per distinct hash, in a deterministic order.
    let distinct: Vec<String> = query
        .iter()
        .map(|fp| fp.hash.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let hits = store.lookup_by_hash(strategy, &distinct)?;
    log::debug!(
        "{} distinct hashes -> {} store hits ({})",
        distinct.len(),
        hits.len(),
        strategy.label()
    );

    // Group store hits by hash, then correlate with every query
    // occurrence of that hash to build the candidate table.
    let mut by_hash: HashMap<&str, Vec<(i64, u32)>> = HashMap::new();
    for hit in &hits {
        by_hash
            .entry(hit.hash.as_str())
            .or_default()
            .push((hit.audio_id, hit.time_index));
    }

    // BTreeMap so candidates are visited in audio_id order, which makes
    // the lowest-id tie-break fall out of a strict comparison below.
    let mut candidates: BTreeMap<i64, Vec<(u32, u32)>> = BTreeMap::new();
    for fp in query {
        let Some(matches) = by_hash.get(fp.hash.as_str()) else {
            continue;
        };
        for &(audio_id, db_time) in matches {
            candidates
                .entry(audio_id)
                .or_default()
                .push((db_time, fp.time_index));
        }
    }

    if candidates.is_empty() {
        return Ok(MatchResult::NoMatch);
    }

    let mut best: Option<MatchInfo> = None;
    for (audio_id, time_pairs) in &candidates {
        let Some((offset, score)) = modal_delta(time_pairs) else {
            continue;
        };
        if best.as_ref().is_none_or(|b| score > b.score) {
            best = Some(MatchInfo {
                audio_id: *audio_id,
                score,
                offset,
            });
        }
    }

    match best {
        Some(info) if info.score >= params.min_score => Ok(MatchResult::Match(info)),
        Some(info) => {
            log::debug!(
                "best candidate {} scored {} (< floor {}), rejecting",
                info.audio_id,
                info.score,
                params.min_score
            );
            Ok(MatchResult::NoMatch)
        }
        None => Ok(MatchResult::NoMatch),
    }
}

/// Histogram the deltas of one candidate's `(db_time, query_time)` pairs
/// and return the most frequent delta with its count. Ties between
/// deltas resolve to the smallest delta.
fn modal_delta(time_pairs: &[(u32, u32)]) -> Option<(i64, u32)> {
    let mut counts: BTreeMap<i64, u32> = BTreeMap::new();
    for &(db_time, query_time) in time_pairs {
        let delta = i64::from(db_time) - i64::from(query_time);
        *counts.entry(delta).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
}
