/// A registered reference recording.
#[derive(Debug, Clone)]
pub struct Recording {
    pub audio_id: i64,
    pub file_path: String,
    pub display_name: String,
}

/// Corpus statistics for the `stats` command.
pub struct LibraryStats {
    pub recordings: i64,
    /// `(strategy label, fingerprint count)` per strategy table.
    pub fingerprints: Vec<(&'static str, i64)>,
}
