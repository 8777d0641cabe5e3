use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

use crate::fingerprint::{
    ChromaDominantParams, HashAlgorithm, PatchEnergyParams, PeakPairParams, Strategy, StrategyId,
};
use crate::matcher::MatchParams;

/// Application configuration loaded from TOML config file.
/// All fields have sensible defaults — the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Directories to register (used when `register` has no CLI args).
    pub music_dirs: Vec<PathBuf>,
    /// Custom database path (overrides XDG default).
    pub db_path: Option<PathBuf>,
    /// Number of parallel workers. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
    /// Fingerprinting parameters.
    pub fingerprint: FingerprintConfig,
}

/// Fingerprinting parameters. One flat section: the strategy field picks
/// the algorithm, the rest are its knobs (unused ones are ignored).
/// Changing any of these invalidates an existing corpus — fingerprints
/// only match within one strategy and parameter set.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    pub strategy: StrategyId,
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop_length: usize,
    pub hash: HashAlgorithm,
    /// Minimum alignment score for a match to be reported.
    pub min_score: u32,

    // Peak-Pair
    pub neighborhood_size: usize,
    pub min_amplitude: f32,
    pub target_t_min: u32,
    pub target_t_max: u32,
    pub target_f_max_delta: u32,

    // Patch-Energy
    pub patch_size: usize,
    pub min_patch_energy: f32,

    // Chroma-Dominant
    pub chroma_threshold: f32,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        let peaks = PeakPairParams::default();
        let patches = PatchEnergyParams::default();
        let chroma = ChromaDominantParams::default();
        Self {
            strategy: StrategyId::PeakPair,
            sample_rate: peaks.sample_rate,
            n_fft: peaks.n_fft,
            hop_length: peaks.hop_length,
            hash: peaks.hash,
            min_score: MatchParams::default().min_score,
            neighborhood_size: peaks.neighborhood_size,
            min_amplitude: peaks.min_amplitude,
            target_t_min: peaks.target_t_min,
            target_t_max: peaks.target_t_max,
            target_f_max_delta: peaks.target_f_max_delta,
            patch_size: patches.patch_size,
            min_patch_energy: patches.min_patch_energy,
            chroma_threshold: chroma.threshold,
        }
    }
}

impl FingerprintConfig {
    /// Build the configured strategy; `kind` (from the CLI) overrides
    /// the config file's choice.
    pub fn strategy(&self, kind: Option<StrategyId>) -> Strategy {
        match kind.unwrap_or(self.strategy) {
            StrategyId::PeakPair => Strategy::PeakPair(PeakPairParams {
                sample_rate: self.sample_rate,
                n_fft: self.n_fft,
                hop_length: self.hop_length,
                neighborhood_size: self.neighborhood_size,
                min_amplitude: self.min_amplitude,
                target_t_min: self.target_t_min,
                target_t_max: self.target_t_max,
                target_f_max_delta: self.target_f_max_delta,
                hash: self.hash,
            }),
            StrategyId::PatchEnergy => Strategy::PatchEnergy(PatchEnergyParams {
                sample_rate: self.sample_rate,
                n_fft: self.n_fft,
                hop_length: self.hop_length,
                patch_size: self.patch_size,
                min_patch_energy: self.min_patch_energy,
                hash: self.hash,
            }),
            StrategyId::ChromaDominant => Strategy::ChromaDominant(ChromaDominantParams {
                sample_rate: self.sample_rate,
                n_fft: self.n_fft,
                hop_length: self.hop_length,
                threshold: self.chroma_threshold,
                hash: self.hash,
            }),
        }
    }

    pub fn match_params(&self, min_score: Option<u32>) -> MatchParams {
        MatchParams {
            min_score: min_score.unwrap_or(self.min_score),
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/earmark/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        match config_path {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Resolve the default database path using XDG data directory.
pub fn default_db_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).ok();
        data_dir.join("earmark.db")
    } else {
        // Fallback: current directory
        PathBuf::from("earmark.db")
    }
}
