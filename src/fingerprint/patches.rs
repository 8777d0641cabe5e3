//! Patch-Energy extraction: hash the raw contents of energetic
//! fixed-size spectrogram patches.
//!
//! The hash covers the patch's raw cell values rather than a robust
//! summary, so any energy-preserving change to the signal (resampling
//! jitter, lossy encoding) produces entirely different keys. Expect poor
//! recall on short or re-encoded recordings; prefer Peak-Pair unless the
//! query is a bit-exact slice of the registered audio.

use super::{Fingerprint, PatchEnergyParams};

/// Extract Patch-Energy fingerprints from a magnitude spectrogram
/// (frame-major). The matrix is cut into a non-overlapping grid of
/// `patch_size` × `patch_size` patches; trailing partial patches are
/// discarded, not padded.
pub(crate) fn extract(frames: &[Vec<f32>], params: &PatchEnergyParams) -> Vec<Fingerprint> {
    let size = params.patch_size;
    let num_frames = frames.len();
    if size == 0 || num_frames < size {
        return Vec::new();
    }
    let num_bins = frames[0].len();
    if num_bins < size {
        return Vec::new();
    }

    let cells = (size * size) as f32;
    let mut fingerprints = Vec::new();

    let mut t0 = 0;
    while t0 + size <= num_frames {
        let mut f0 = 0;
        while f0 + size <= num_bins {
            let mut sum = 0.0_f32;
            for row in &frames[t0..t0 + size] {
                for &v in &row[f0..f0 + size] {
                    sum += v;
                }
            }

            if sum / cells >= params.min_patch_energy {
                let mut bytes = Vec::with_capacity(size * size * 4);
                for row in &frames[t0..t0 + size] {
                    for &v in &row[f0..f0 + size] {
                        bytes.extend_from_slice(&v.to_le_bytes());
                    }
                }
                fingerprints.push(Fingerprint {
                    hash: params.hash.digest(&bytes),
                    time_index: t0 as u32,
                });
            }

            f0 += size;
        }
        t0 += size;
    }

    fingerprints
}
