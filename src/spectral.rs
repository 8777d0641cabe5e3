use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::f32::consts::PI;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpectralError {
    #[error("empty sample buffer")]
    EmptySamples,
    #[error("sample rate must be positive (got {0})")]
    InvalidSampleRate(u32),
}

/// Number of pitch classes in a chromagram row.
pub const CHROMA_BINS: usize = 12;

/// Silence floor for the dB scale, relative to the loudest cell.
pub const DB_FLOOR: f32 = -80.0;

// Frequency range folded into the chromagram. Below ~28 Hz the STFT bins
// are too coarse to separate semitones; above 3520 Hz overtones dominate.
const CHROMA_MIN_FREQ: f32 = 28.0;
const CHROMA_MAX_FREQ: f32 = 3520.0;

/// Compute a magnitude spectrogram: one row per STFT frame, `n_fft / 2`
/// frequency bins per row. Hann-windowed, hop-based framing, no padding —
/// an input shorter than one window yields zero frames, not an error.
pub fn spectrogram(
    samples: &[f32],
    sample_rate: u32,
    n_fft: usize,
    hop_length: usize,
) -> Result<Vec<Vec<f32>>, SpectralError> {
    validate(samples, sample_rate)?;

    let bins = n_fft / 2;
    let mut frames: Vec<Vec<f32>> = Vec::new();
    if samples.len() < n_fft {
        return Ok(frames);
    }

    let window: Vec<f32> = (0..n_fft)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / (n_fft - 1) as f32).cos())
        .collect();

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);

    let mut start = 0;
    while start + n_fft <= samples.len() {
        let mut buffer: Vec<Complex<f32>> = samples[start..start + n_fft]
            .iter()
            .zip(&window)
            .map(|(&s, &w)| Complex { re: s * w, im: 0.0 })
            .collect();

        fft.process(&mut buffer);

        let magnitudes: Vec<f32> = buffer[..bins].iter().map(|c| c.norm()).collect();
        frames.push(magnitudes);

        start += hop_length;
    }

    Ok(frames)
}

/// Convert a magnitude spectrogram to decibels relative to its loudest
/// cell, floored at [`DB_FLOOR`]. An all-zero matrix maps entirely to the
/// floor so that amplitude thresholds reject every cell.
pub fn to_db(frames: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let reference = frames
        .iter()
        .flat_map(|row| row.iter().copied())
        .fold(0.0_f32, f32::max);

    frames
        .iter()
        .map(|row| {
            row.iter()
                .map(|&v| {
                    if reference <= 0.0 || v <= 0.0 {
                        DB_FLOOR
                    } else {
                        (20.0 * (v / reference).log10()).max(DB_FLOOR)
                    }
                })
                .collect()
        })
        .collect()
}

/// Compute a chromagram: one `[f32; 12]` row of pitch-class energies per
/// STFT frame, each row normalized by its own maximum so values lie in
/// `[0, 1]`. Pitch class 0 is A (440 Hz reference).
pub fn chromagram(
    samples: &[f32],
    sample_rate: u32,
    n_fft: usize,
    hop_length: usize,
) -> Result<Vec<[f32; CHROMA_BINS]>, SpectralError> {
    let frames = spectrogram(samples, sample_rate, n_fft, hop_length)?;

    let base = 440.0_f32 / 16.0;
    let bin_hz = sample_rate as f32 / n_fft as f32;

    let chroma = frames
        .iter()
        .map(|row| {
            let mut features = [0.0_f32; CHROMA_BINS];
            for (i, &mag) in row.iter().enumerate().skip(1) {
                let freq = i as f32 * bin_hz;
                if !(CHROMA_MIN_FREQ..=CHROMA_MAX_FREQ).contains(&freq) {
                    continue;
                }
                let octave = (freq / base).log2();
                let note = (CHROMA_BINS as f32 * (octave - octave.floor())) as usize;
                features[note.min(CHROMA_BINS - 1)] += mag * mag;
            }

            let max = features.iter().copied().fold(0.0_f32, f32::max);
            if max > 0.0 {
                for f in &mut features {
                    *f /= max;
                }
            }
            features
        })
        .collect();

    Ok(chroma)
}

fn validate(samples: &[f32], sample_rate: u32) -> Result<(), SpectralError> {
    if samples.is_empty() {
        return Err(SpectralError::EmptySamples);
    }
    if sample_rate == 0 {
        return Err(SpectralError::InvalidSampleRate(sample_rate));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A pure sine aligned to an exact FFT bin.
    fn tone(bin: usize, n_fft: usize, sample_rate: u32, len: usize) -> Vec<f32> {
        let freq = bin as f32 * sample_rate as f32 / n_fft as f32;
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_rejects_empty_and_bad_rate() {
        assert!(matches!(
            spectrogram(&[], 22050, 1024, 512),
            Err(SpectralError::EmptySamples)
        ));
        assert!(matches!(
            spectrogram(&[0.0; 2048], 0, 1024, 512),
            Err(SpectralError::InvalidSampleRate(0))
        ));
    }

    #[test]
    fn test_frame_count_and_shape() {
        let samples = vec![0.0_f32; 1024 + 512 * 3];
        let frames = spectrogram(&samples, 22050, 1024, 512).unwrap();
        assert_eq!(frames.len(), 4);
        assert!(frames.iter().all(|f| f.len() == 512));
    }

    #[test]
    fn test_short_input_yields_no_frames() {
        let frames = spectrogram(&[0.1_f32; 100], 22050, 1024, 512).unwrap();
        assert!(frames.is_empty());
    }

    #[test]
    fn test_tone_peaks_at_expected_bin() {
        let samples = tone(40, 1024, 22050, 4096);
        let frames = spectrogram(&samples, 22050, 1024, 512).unwrap();

        for frame in &frames {
            let max_bin = frame
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
                .unwrap();
            assert_eq!(max_bin, 40);
        }
    }

    #[test]
    fn test_determinism() {
        let samples = tone(25, 1024, 22050, 8192);
        let a = spectrogram(&samples, 22050, 1024, 512).unwrap();
        let b = spectrogram(&samples, 22050, 1024, 512).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_db_scale_floors_silence() {
        let frames = spectrogram(&vec![0.0_f32; 4096], 22050, 1024, 512).unwrap();
        let db = to_db(&frames);
        assert!(db.iter().flatten().all(|&v| v == DB_FLOOR));
    }

    #[test]
    fn test_db_scale_reference_is_zero() {
        let samples = tone(40, 1024, 22050, 4096);
        let frames = spectrogram(&samples, 22050, 1024, 512).unwrap();
        let db = to_db(&frames);

        let max = db.iter().flatten().copied().fold(f32::MIN, f32::max);
        assert!(max.abs() < 1e-4);
        assert!(db.iter().flatten().all(|&v| v >= DB_FLOOR && v <= 0.0));
    }

    #[test]
    fn test_chroma_440_is_pitch_class_a() {
        // 440 Hz lands on bin 40 exactly with n_fft 2048 at 22050 Hz? No —
        // use a bin-aligned tone near 440 and check it folds to class 0.
        let n_fft = 2048;
        let sr = 22050;
        let bin = (440.0 * n_fft as f32 / sr as f32).round() as usize;
        let samples = tone(bin, n_fft, sr, n_fft * 4);

        let chroma = chromagram(&samples, sr, n_fft, 512).unwrap();
        assert!(!chroma.is_empty());
        for frame in &chroma {
            let dominant = frame
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
                .unwrap();
            assert_eq!(dominant, 0);
            assert!((frame[dominant] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_chroma_silence_stays_zero() {
        let chroma = chromagram(&vec![0.0_f32; 8192], 22050, 2048, 512).unwrap();
        assert!(chroma.iter().flatten().all(|&v| v == 0.0));
    }
}
