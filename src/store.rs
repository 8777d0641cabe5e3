use crate::fingerprint::{Fingerprint, StrategyId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("file already registered: {0}")]
    DuplicatePath(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// One stored fingerprint matching a queried hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashHit {
    pub audio_id: i64,
    pub hash: String,
    pub time_index: u32,
}

/// Persistence contract the engine depends on. The engine only ever
/// looks fingerprints up by hash and appends them in bulk — anything
/// else a backend offers is its own business. Implementations must keep
/// each strategy's fingerprints separate; the engine never asks for a
/// hash across strategies.
pub trait FingerprintStore {
    /// Register a recording. Fails with [`StoreError::DuplicatePath`] if
    /// `file_path` is already present.
    fn insert_recording(&self, file_path: &str, display_name: &str) -> Result<i64, StoreError>;

    /// Bulk-append fingerprints for a recording under one strategy.
    fn insert_fingerprints(
        &self,
        audio_id: i64,
        strategy: StrategyId,
        fingerprints: &[Fingerprint],
    ) -> Result<(), StoreError>;

    /// Every stored `(audio_id, hash, time_index)` whose hash appears in
    /// `hashes`, for the given strategy.
    fn lookup_by_hash(
        &self,
        strategy: StrategyId,
        hashes: &[String],
    ) -> Result<Vec<HashHit>, StoreError>;

    /// Whether `file_path` is registered with at least one fingerprint
    /// under `strategy` — used by registration drivers to skip files.
    fn has_recording(&self, file_path: &str, strategy: StrategyId) -> Result<bool, StoreError>;

    /// Destructive: remove all recordings and fingerprints for every
    /// strategy.
    fn clear_all(&self) -> Result<(), StoreError>;
}
