//! Chroma-Dominant extraction: one fingerprint per frame whose dominant
//! pitch class is loud enough, keyed on (dominant class, frame index).

use super::{ChromaDominantParams, Fingerprint};
use crate::spectral::CHROMA_BINS;

/// Extract Chroma-Dominant fingerprints from a normalized chromagram.
/// Frames whose strongest pitch class falls below the threshold are
/// skipped entirely — silence and noise frames contribute nothing.
pub(crate) fn extract(
    chroma: &[[f32; CHROMA_BINS]],
    params: &ChromaDominantParams,
) -> Vec<Fingerprint> {
    let mut fingerprints = Vec::new();

    for (frame_index, frame) in chroma.iter().enumerate() {
        let (dominant_bin, max) = frame
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |(bi, bv), (i, &v)| {
                // strict > keeps the lowest bin on ties
                if v > bv { (i, v) } else { (bi, bv) }
            });

        if max < params.threshold {
            continue;
        }

        let input = format!("{dominant_bin}:{frame_index}");
        fingerprints.push(Fingerprint {
            hash: params.hash.digest(input.as_bytes()),
            time_index: frame_index as u32,
        });
    }

    fingerprints
}
