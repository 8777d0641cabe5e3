//! Batch registration: walk directories, fingerprint every supported
//! audio file, and store the results.
//!
//! Extraction is embarrassingly parallel, so chunks of files are
//! fingerprinted on a rayon pool while store writes stay serialized on
//! the caller's thread. Progress is reported through a caller-supplied
//! observer so this module never depends on a presentation layer.

use crate::db::Database;
use crate::fingerprint::{Fingerprint, Strategy};
use crate::{SUPPORTED_EXTENSIONS, decode};
use lofty::file::TaggedFileExt;
use lofty::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum RegisterError {
    #[error("Database error: {0}")]
    Db(#[from] crate::db::DbError),
}

/// Why a file was passed over without being registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyRegistered,
    NoFingerprints,
}

/// Progress events emitted during a batch run, in file order within
/// each chunk.
pub enum BatchEvent<'a> {
    /// Directory walk finished; `total` files will be processed.
    Scanned { total: usize },
    Started { path: &'a Path },
    Registered {
        path: &'a Path,
        audio_id: i64,
        fingerprints: usize,
    },
    Skipped { path: &'a Path, reason: SkipReason },
    Failed { path: &'a Path, message: String },
}

pub struct RegisterResult {
    pub scanned: u64,
    pub registered: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Register every supported audio file under `paths` that is not in the
/// store yet. Fingerprinting runs on `jobs` worker threads in bounded
/// chunks; each chunk's results are written before the next chunk
/// starts, so an interrupted run resumes where it left off.
pub fn register_directories(
    db: &Database,
    paths: &[String],
    strategy: &Strategy,
    jobs: usize,
    observer: &mut dyn FnMut(BatchEvent),
) -> Result<RegisterResult, RegisterError> {
    let mut audio_files: Vec<PathBuf> = Vec::new();
    for path in paths {
        for entry in WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let ext = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_lowercase();
            if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
                audio_files.push(entry.into_path());
            }
        }
    }
    audio_files.sort();

    let mut result = RegisterResult {
        scanned: audio_files.len() as u64,
        registered: 0,
        skipped: 0,
        failed: 0,
    };
    observer(BatchEvent::Scanned {
        total: audio_files.len(),
    });

    // Drop files the store already has before spending any decode time.
    let mut pending: Vec<PathBuf> = Vec::new();
    for path in audio_files {
        if db.has_recording(&path.to_string_lossy(), strategy.id())? {
            result.skipped += 1;
            observer(BatchEvent::Skipped {
                path: &path,
                reason: SkipReason::AlreadyRegistered,
            });
        } else {
            pending.push(path);
        }
    }

    if pending.is_empty() {
        return Ok(result);
    }

    log::info!(
        "registering {} files with {} workers ({})",
        pending.len(),
        jobs,
        strategy.id().label()
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .unwrap();

    // Chunk size = jobs * 2 keeps the pool busy while bounding how many
    // decoded files sit in memory at once.
    let chunk_size = (jobs * 2).max(1);

    for chunk in pending.chunks(chunk_size) {
        for path in chunk {
            observer(BatchEvent::Started { path });
        }

        let outcomes: Vec<(&PathBuf, Result<Vec<Fingerprint>, String>)> = pool.install(|| {
            use rayon::prelude::*;
            chunk
                .par_iter()
                .map(|path| (path, fingerprint_file(path, strategy)))
                .collect()
        });

        for (path, outcome) in outcomes {
            match outcome {
                Ok(fingerprints) if fingerprints.is_empty() => {
                    log::warn!("no fingerprints for {}, skipping", path.display());
                    result.skipped += 1;
                    observer(BatchEvent::Skipped {
                        path,
                        reason: SkipReason::NoFingerprints,
                    });
                }
                Ok(fingerprints) => {
                    let file_path = path.to_string_lossy();
                    match store_file(db, &file_path, path, strategy, &fingerprints) {
                        Ok(audio_id) => {
                            result.registered += 1;
                            observer(BatchEvent::Registered {
                                path,
                                audio_id,
                                fingerprints: fingerprints.len(),
                            });
                        }
                        Err(e) => {
                            log::error!("DB error storing {}: {}", path.display(), e);
                            result.failed += 1;
                            observer(BatchEvent::Failed {
                                path,
                                message: e.to_string(),
                            });
                        }
                    }
                }
                Err(message) => {
                    log::warn!("{}: {}", path.display(), message);
                    result.failed += 1;
                    observer(BatchEvent::Failed { path, message });
                }
            }
        }
    }

    Ok(result)
}

/// Decode, resample, and fingerprint one file. Errors become strings so
/// results can cross the rayon pool without dragging error types along.
fn fingerprint_file(path: &Path, strategy: &Strategy) -> Result<Vec<Fingerprint>, String> {
    let samples =
        decode::decode_to_rate(path, strategy.sample_rate()).map_err(|e| e.to_string())?;
    strategy
        .extract(&samples, strategy.sample_rate())
        .map_err(|e| e.to_string())
}

fn store_file(
    db: &Database,
    file_path: &str,
    path: &Path,
    strategy: &Strategy,
    fingerprints: &[Fingerprint],
) -> crate::db::Result<i64> {
    let audio_id = db.insert_recording(file_path, &display_name(path))?;
    db.insert_fingerprints(audio_id, strategy.id(), fingerprints)?;
    Ok(audio_id)
}

/// Display name for a recording: the title tag when one exists, the
/// file stem otherwise.
fn display_name(path: &Path) -> String {
    if let Ok(tagged_file) = lofty::read_from_path(path) {
        let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());
        if let Some(title) = tag.and_then(|t| t.title()) {
            return title.to_string();
        }
    }

    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}
