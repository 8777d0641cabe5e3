pub mod chroma;
pub mod hashing;
pub mod patches;
pub mod peaks;

use crate::spectral::{self, SpectralError};
use clap::ValueEnum;
pub use hashing::HashAlgorithm;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error(transparent)]
    Spectral(#[from] SpectralError),
    #[error("sample rate {got} Hz does not match the strategy's {expected} Hz")]
    SampleRateMismatch { expected: u32, got: u32 },
}

/// One content-derived event: a hex lookup key plus the frame offset it
/// was observed at. The frame unit is strategy-specific (STFT frame for
/// Peak-Pair and Patch-Energy, chroma frame for Chroma-Dominant);
/// fingerprints are only comparable within one strategy and parameter set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub hash: String,
    pub time_index: u32,
}

/// Identifies which extraction strategy produced a fingerprint. Each
/// strategy gets its own table in the store so fingerprints from
/// different strategies can never be merged for one recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyId {
    PeakPair,
    PatchEnergy,
    ChromaDominant,
}

impl StrategyId {
    pub const ALL: [StrategyId; 3] = [
        StrategyId::PeakPair,
        StrategyId::PatchEnergy,
        StrategyId::ChromaDominant,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::PeakPair => "peak-pair",
            Self::PatchEnergy => "patch-energy",
            Self::ChromaDominant => "chroma-dominant",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Self::PeakPair => "peak_pair_fingerprints",
            Self::PatchEnergy => "patch_energy_fingerprints",
            Self::ChromaDominant => "chroma_dominant_fingerprints",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PeakPairParams {
    /// Sample rate the strategy fingerprints at; input must already be
    /// resampled to this.
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop_length: usize,
    /// Side of the square neighborhood a cell must dominate to count as
    /// a peak.
    pub neighborhood_size: usize,
    /// Minimum peak level in dB relative to the loudest cell.
    pub min_amplitude: f32,
    /// Anchor-to-target time delta range, in STFT frames.
    pub target_t_min: u32,
    pub target_t_max: u32,
    /// Maximum anchor-to-target distance in frequency bins.
    pub target_f_max_delta: u32,
    pub hash: HashAlgorithm,
}

impl Default for PeakPairParams {
    fn default() -> Self {
        Self {
            sample_rate: 22_050,
            n_fft: 2048,
            hop_length: 512,
            neighborhood_size: 20,
            min_amplitude: -40.0,
            target_t_min: 5,
            target_t_max: 100,
            target_f_max_delta: 100,
            hash: HashAlgorithm::Sha1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PatchEnergyParams {
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop_length: usize,
    /// Patch side in cells, along both the time and frequency axes.
    pub patch_size: usize,
    /// Minimum mean magnitude for a patch to be fingerprinted.
    pub min_patch_energy: f32,
    pub hash: HashAlgorithm,
}

impl Default for PatchEnergyParams {
    fn default() -> Self {
        Self {
            sample_rate: 22_050,
            n_fft: 2048,
            hop_length: 512,
            patch_size: 16,
            min_patch_energy: 0.1,
            hash: HashAlgorithm::Sha1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChromaDominantParams {
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop_length: usize,
    /// Minimum normalized chroma intensity for a frame to contribute.
    pub threshold: f32,
    pub hash: HashAlgorithm,
}

impl Default for ChromaDominantParams {
    fn default() -> Self {
        Self {
            sample_rate: 22_050,
            n_fft: 2048,
            hop_length: 512,
            threshold: 0.5,
            hash: HashAlgorithm::Sha1,
        }
    }
}

/// A feature-extraction strategy with its parameters. Closed set: the
/// matcher is strategy-agnostic, but fingerprints produced by different
/// variants (or the same variant with different parameters) never
/// collide by construction.
#[derive(Debug, Clone)]
pub enum Strategy {
    PeakPair(PeakPairParams),
    PatchEnergy(PatchEnergyParams),
    ChromaDominant(ChromaDominantParams),
}

impl Strategy {
    pub fn id(&self) -> StrategyId {
        match self {
            Self::PeakPair(_) => StrategyId::PeakPair,
            Self::PatchEnergy(_) => StrategyId::PatchEnergy,
            Self::ChromaDominant(_) => StrategyId::ChromaDominant,
        }
    }

    /// Sample rate the strategy's parameters are calibrated for.
    pub fn sample_rate(&self) -> u32 {
        match self {
            Self::PeakPair(p) => p.sample_rate,
            Self::PatchEnergy(p) => p.sample_rate,
            Self::ChromaDominant(p) => p.sample_rate,
        }
    }

    /// Turn a sample buffer into an ordered fingerprint set. An input
    /// with no qualifying features yields an empty set, not an error.
    pub fn extract(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<Vec<Fingerprint>, ExtractError> {
        if sample_rate != self.sample_rate() {
            return Err(ExtractError::SampleRateMismatch {
                expected: self.sample_rate(),
                got: sample_rate,
            });
        }

        match self {
            Self::PeakPair(p) => {
                let frames = spectral::spectrogram(samples, sample_rate, p.n_fft, p.hop_length)?;
                let db = spectral::to_db(&frames);
                Ok(peaks::extract(&db, p))
            }
            Self::PatchEnergy(p) => {
                let frames = spectral::spectrogram(samples, sample_rate, p.n_fft, p.hop_length)?;
                Ok(patches::extract(&frames, p))
            }
            Self::ChromaDominant(p) => {
                let rows = spectral::chromagram(samples, sample_rate, p.n_fft, p.hop_length)?;
                Ok(chroma::extract(&rows, p))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategies() -> Vec<Strategy> {
        vec![
            Strategy::PeakPair(PeakPairParams::default()),
            Strategy::PatchEnergy(PatchEnergyParams::default()),
            Strategy::ChromaDominant(ChromaDominantParams::default()),
        ]
    }

    #[test]
    fn test_silence_yields_empty_set_for_all_strategies() {
        let silence = vec![0.0_f32; 22_050];
        for strategy in strategies() {
            let fps = strategy.extract(&silence, 22_050).unwrap();
            assert!(
                fps.is_empty(),
                "{} fingerprinted silence",
                strategy.id().label()
            );
        }
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let samples: Vec<f32> = (0..44_100)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 22_050.0).sin())
            .collect();

        for strategy in strategies() {
            let a = strategy.extract(&samples, 22_050).unwrap();
            let b = strategy.extract(&samples, 22_050).unwrap();
            assert_eq!(a, b, "{} not deterministic", strategy.id().label());
        }
    }

    #[test]
    fn test_sample_rate_mismatch_fails_fast() {
        let samples = vec![0.1_f32; 4096];
        let strategy = Strategy::PeakPair(PeakPairParams::default());
        assert!(matches!(
            strategy.extract(&samples, 44_100),
            Err(ExtractError::SampleRateMismatch {
                expected: 22_050,
                got: 44_100
            })
        ));
    }

    #[test]
    fn test_time_indices_are_monotonic() {
        let samples: Vec<f32> = (0..66_150)
            .map(|i| {
                let t = i as f32 / 22_050.0;
                (2.0 * std::f32::consts::PI * 440.0 * t).sin()
                    + 0.5 * (2.0 * std::f32::consts::PI * 880.0 * t).sin()
            })
            .collect();

        for strategy in strategies() {
            let fps = strategy.extract(&samples, 22_050).unwrap();
            assert!(
                fps.windows(2).all(|w| w[0].time_index <= w[1].time_index),
                "{} emitted out-of-order time indices",
                strategy.id().label()
            );
        }
    }
}
