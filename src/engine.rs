//! Engine entry points: register a reference recording's samples,
//! identify an unknown clip (optionally a time-bounded segment of one).
//!
//! The engine is synchronous and stateless — every call is a pure
//! function of its inputs plus store reads/writes. The store handle is
//! passed in explicitly; there is no process-wide connection.

use crate::fingerprint::{ExtractError, Strategy};
use crate::matcher::{self, MatchParams, MatchResult};
use crate::store::{FingerprintStore, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid time window: {0}")]
    InvalidWindow(String),
}

/// A `[start, end]` range in seconds, applied by slicing the input
/// sample array before extraction. Segment matching is nothing but this
/// slice — there is no special-cased algorithm path.
#[derive(Debug, Clone, Copy)]
pub struct TimeWindow {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl TimeWindow {
    fn slice<'a>(&self, samples: &'a [f32], sample_rate: u32) -> Result<&'a [f32], EngineError> {
        if !(self.start_secs >= 0.0) || !(self.end_secs > self.start_secs) {
            return Err(EngineError::InvalidWindow(format!(
                "start {:.2}s, end {:.2}s",
                self.start_secs, self.end_secs
            )));
        }

        let start = (self.start_secs * f64::from(sample_rate)).round() as usize;
        let end = ((self.end_secs * f64::from(sample_rate)).round() as usize).min(samples.len());
        if start >= end {
            return Err(EngineError::InvalidWindow(format!(
                "window starts at sample {start} but the signal has {} samples",
                samples.len()
            )));
        }

        Ok(&samples[start..end])
    }
}

/// Fingerprint `samples` and store them as a new reference recording.
/// Returns the new `audio_id`. A signal with no qualifying features is
/// still registered (with zero fingerprints) — callers that prefer to
/// skip such files should check the fingerprint count themselves.
pub fn register(
    samples: &[f32],
    sample_rate: u32,
    strategy: &Strategy,
    store: &dyn FingerprintStore,
    file_path: &str,
    display_name: &str,
) -> Result<i64, EngineError> {
    let fingerprints = strategy.extract(samples, sample_rate)?;
    if fingerprints.is_empty() {
        log::warn!(
            "no {} fingerprints for {file_path}; registering an empty set",
            strategy.id().label()
        );
    }

    let audio_id = store.insert_recording(file_path, display_name)?;
    store.insert_fingerprints(audio_id, strategy.id(), &fingerprints)?;

    log::info!(
        "registered {file_path} (id {audio_id}, {} fingerprints)",
        fingerprints.len()
    );
    Ok(audio_id)
}

/// Fingerprint `samples` (or the windowed slice of them) and find the
/// best-aligned reference recording. The query must use the same
/// strategy and parameters the corpus was registered with.
pub fn identify(
    samples: &[f32],
    sample_rate: u32,
    strategy: &Strategy,
    store: &dyn FingerprintStore,
    params: &MatchParams,
    window: Option<TimeWindow>,
) -> Result<MatchResult, EngineError> {
    let samples = match &window {
        Some(w) => w.slice(samples, sample_rate)?,
        None => samples,
    };

    let fingerprints = strategy.extract(samples, sample_rate)?;
    log::debug!(
        "query produced {} {} fingerprints",
        fingerprints.len(),
        strategy.id().label()
    );

    Ok(matcher::find_match(
        &fingerprints,
        strategy.id(),
        store,
        params,
    )?)
}
