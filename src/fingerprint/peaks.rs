//! Peak-Pair extraction: constellation peaks in the dB spectrogram,
//! paired anchor-to-target within a forward target zone. Pairing nearby
//! high-energy points keeps fingerprints locally unique yet reproducible
//! under moderate noise — noise rarely changes which cell is the local
//! maximum.

use super::{Fingerprint, PeakPairParams};

/// Extract Peak-Pair fingerprints from a dB spectrogram (frame-major).
pub(crate) fn extract(db_frames: &[Vec<f32>], params: &PeakPairParams) -> Vec<Fingerprint> {
    let peaks = find_peaks(db_frames, params.neighborhood_size, params.min_amplitude);
    pair_peaks(&peaks, params)
}

/// Locate spectrogram cells that are the maximum of their square
/// neighborhood and at least `min_amplitude` dB. Returned as
/// `(time, freq)` pairs sorted ascending by time, then frequency — the
/// pairing step relies on this ordering to only look forward in time.
pub(crate) fn find_peaks(
    frames: &[Vec<f32>],
    neighborhood_size: usize,
    min_amplitude: f32,
) -> Vec<(u32, u32)> {
    let num_frames = frames.len();
    if num_frames == 0 {
        return Vec::new();
    }
    let num_bins = frames[0].len();
    let half = neighborhood_size / 2;

    let mut peaks = Vec::new();
    for t in 0..num_frames {
        for f in 0..num_bins {
            let value = frames[t][f];
            if value < min_amplitude {
                continue;
            }

            let t_lo = t.saturating_sub(half);
            let t_hi = (t + half).min(num_frames - 1);
            let f_lo = f.saturating_sub(half);
            let f_hi = (f + half).min(num_bins - 1);

            let mut is_peak = true;
            'window: for wt in t_lo..=t_hi {
                for wf in f_lo..=f_hi {
                    if frames[wt][wf] > value {
                        is_peak = false;
                        break 'window;
                    }
                }
            }

            if is_peak {
                peaks.push((t as u32, f as u32));
            }
        }
    }

    peaks
}

/// Pair every peak (anchor) with each later peak (target) whose time
/// offset lies in `[target_t_min, target_t_max]` frames and whose
/// frequency distance is at most `target_f_max_delta` bins. The hash
/// covers (anchor bin, target bin, time delta); the fingerprint keeps
/// the anchor's time index.
fn pair_peaks(peaks: &[(u32, u32)], params: &PeakPairParams) -> Vec<Fingerprint> {
    let mut fingerprints = Vec::new();

    for (i, &(anchor_time, anchor_freq)) in peaks.iter().enumerate() {
        for &(target_time, target_freq) in &peaks[i + 1..] {
            if target_time > anchor_time + params.target_t_max {
                break; // peaks are time-sorted, move to the next anchor
            }

            let time_delta = target_time - anchor_time;
            if time_delta < params.target_t_min {
                continue;
            }
            if anchor_freq.abs_diff(target_freq) > params.target_f_max_delta {
                continue;
            }

            let input = format!("{anchor_freq}:{target_freq}:{time_delta}");
            fingerprints.push(Fingerprint {
                hash: params.hash.digest(input.as_bytes()),
                time_index: anchor_time,
            });
        }
    }

    fingerprints
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral::DB_FLOOR;

    /// A quiet floor with a few loud isolated cells.
    fn matrix_with_peaks(frames: usize, bins: usize, cells: &[(usize, usize)]) -> Vec<Vec<f32>> {
        let mut m = vec![vec![DB_FLOOR; bins]; frames];
        for &(t, f) in cells {
            m[t][f] = -3.0;
        }
        m
    }

    fn params() -> PeakPairParams {
        PeakPairParams {
            neighborhood_size: 4,
            min_amplitude: -40.0,
            target_t_min: 1,
            target_t_max: 20,
            target_f_max_delta: 10,
            ..PeakPairParams::default()
        }
    }

    #[test]
    fn test_finds_isolated_peaks_in_order() {
        let m = matrix_with_peaks(30, 16, &[(20, 3), (5, 8), (5, 2)]);
        let peaks = find_peaks(&m, 4, -40.0);
        assert_eq!(peaks, vec![(5, 2), (5, 8), (20, 3)]);
    }

    #[test]
    fn test_threshold_excludes_quiet_cells() {
        let mut m = matrix_with_peaks(10, 8, &[(2, 2)]);
        m[7][5] = -60.0; // locally maximal but below the floor
        let peaks = find_peaks(&m, 4, -40.0);
        assert_eq!(peaks, vec![(2, 2)]);
    }

    #[test]
    fn test_neighborhood_suppresses_lesser_cells() {
        let mut m = matrix_with_peaks(10, 8, &[(4, 4)]);
        m[4][5] = -5.0; // adjacent and quieter than the -3.0 peak
        let peaks = find_peaks(&m, 4, -40.0);
        assert_eq!(peaks, vec![(4, 4)]);
    }

    #[test]
    fn test_equal_maxima_both_qualify() {
        let m = matrix_with_peaks(10, 8, &[(4, 3), (4, 5)]);
        let peaks = find_peaks(&m, 4, -40.0);
        assert_eq!(peaks, vec![(4, 3), (4, 5)]);
    }

    #[test]
    fn test_pairs_within_target_zone() {
        // Anchors at t=2 and t=8, close in frequency; plus one far target
        // outside the time window.
        let m = matrix_with_peaks(60, 16, &[(2, 4), (8, 6), (40, 5)]);
        let fps = extract(&m, &params());

        // (2,4)->(8,6) is the only pair: delta 6 in [1,20], freq diff 2.
        assert_eq!(fps.len(), 1);
        assert_eq!(fps[0].time_index, 2);
    }

    #[test]
    fn test_frequency_gate_rejects_distant_pairs() {
        let m = matrix_with_peaks(30, 40, &[(2, 4), (8, 30)]);
        let fps = extract(&m, &params());
        assert!(fps.is_empty());
    }

    #[test]
    fn test_hash_covers_bins_and_delta_only() {
        // Same geometry at two different absolute times must hash alike:
        // the pair (anchor 4 -> target 6, delta 6) repeated later.
        let m = matrix_with_peaks(80, 16, &[(2, 4), (8, 6), (42, 4), (48, 6)]);
        let fps = extract(&m, &params());

        let first: Vec<_> = fps.iter().filter(|fp| fp.time_index == 2).collect();
        let second: Vec<_> = fps.iter().filter(|fp| fp.time_index == 42).collect();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].hash, second[0].hash);
    }

    #[test]
    fn test_empty_matrix_yields_empty_set() {
        assert!(extract(&[], &params()).is_empty());
        let silence = vec![vec![DB_FLOOR; 16]; 30];
        assert!(extract(&silence, &params()).is_empty());
    }
}
