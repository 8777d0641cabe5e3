use super::models::{LibraryStats, Recording};
use super::{Database, DbError, Result};
use crate::fingerprint::{Fingerprint, StrategyId};
use crate::store::{FingerprintStore, HashHit, StoreError};
use rusqlite::params;

/// SQLite's default variable limit is 999; stay comfortably under it
/// when building `IN (...)` lists.
const LOOKUP_CHUNK: usize = 500;

impl Database {
    /// Register a recording. The UNIQUE constraint on file_path makes a
    /// duplicate registration fail rather than merge.
    pub fn insert_recording(&self, file_path: &str, display_name: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO recordings (file_path, display_name) VALUES (?1, ?2)",
            params![file_path, display_name],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Bulk-append fingerprints for one recording into the strategy's
    /// table, in a single transaction.
    pub fn insert_fingerprints(
        &self,
        audio_id: i64,
        strategy: StrategyId,
        fingerprints: &[Fingerprint],
    ) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT INTO {} (hash_hex, time_index, audio_id) VALUES (?1, ?2, ?3)",
                strategy.table()
            ))?;
            for fp in fingerprints {
                stmt.execute(params![fp.hash, fp.time_index, audio_id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// All stored fingerprints whose hash is in `hashes`, for one
    /// strategy. Queried in chunks to respect SQLite's variable limit.
    pub fn lookup_by_hash(&self, strategy: StrategyId, hashes: &[String]) -> Result<Vec<HashHit>> {
        let mut hits = Vec::new();

        for chunk in hashes.chunks(LOOKUP_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!(
                "SELECT hash_hex, audio_id, time_index FROM {} WHERE hash_hex IN ({placeholders})",
                strategy.table()
            );

            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(chunk.iter()), |row| {
                Ok(HashHit {
                    hash: row.get(0)?,
                    audio_id: row.get(1)?,
                    time_index: row.get(2)?,
                })
            })?;

            for row in rows {
                hits.push(row?);
            }
        }

        Ok(hits)
    }

    /// Whether `file_path` is registered with at least one fingerprint
    /// under `strategy`.
    pub fn has_recording(&self, file_path: &str, strategy: StrategyId) -> Result<bool> {
        let sql = format!(
            "SELECT 1 FROM recordings r
             JOIN {} f ON f.audio_id = r.audio_id
             WHERE r.file_path = ?1 LIMIT 1",
            strategy.table()
        );
        match self
            .conn
            .query_row(&sql, params![file_path], |row| row.get::<_, i64>(0))
        {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every recording and all fingerprints for every strategy.
    pub fn clear_all(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for strategy in StrategyId::ALL {
            tx.execute(&format!("DELETE FROM {}", strategy.table()), [])?;
        }
        tx.execute("DELETE FROM recordings", [])?;
        tx.commit()?;
        Ok(())
    }

    /// Fetch a recording by id (for presenting match results).
    pub fn get_recording(&self, audio_id: i64) -> Result<Option<Recording>> {
        match self.conn.query_row(
            "SELECT audio_id, file_path, display_name FROM recordings WHERE audio_id = ?1",
            params![audio_id],
            |row| {
                Ok(Recording {
                    audio_id: row.get(0)?,
                    file_path: row.get(1)?,
                    display_name: row.get(2)?,
                })
            },
        ) {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Corpus statistics.
    pub fn stats(&self) -> Result<LibraryStats> {
        let recordings: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM recordings", [], |row| row.get(0))?;

        let mut fingerprints = Vec::new();
        for strategy in StrategyId::ALL {
            let count: i64 = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", strategy.table()),
                [],
                |row| row.get(0),
            )?;
            fingerprints.push((strategy.label(), count));
        }

        Ok(LibraryStats {
            recordings,
            fingerprints,
        })
    }
}

impl FingerprintStore for Database {
    fn insert_recording(
        &self,
        file_path: &str,
        display_name: &str,
    ) -> std::result::Result<i64, StoreError> {
        Database::insert_recording(self, file_path, display_name).map_err(|e| match e {
            DbError::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ffi::ErrorCode::ConstraintViolation =>
            {
                StoreError::DuplicatePath(file_path.to_string())
            }
            other => StoreError::Backend(other.to_string()),
        })
    }

    fn insert_fingerprints(
        &self,
        audio_id: i64,
        strategy: StrategyId,
        fingerprints: &[Fingerprint],
    ) -> std::result::Result<(), StoreError> {
        Database::insert_fingerprints(self, audio_id, strategy, fingerprints)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn lookup_by_hash(
        &self,
        strategy: StrategyId,
        hashes: &[String],
    ) -> std::result::Result<Vec<HashHit>, StoreError> {
        Database::lookup_by_hash(self, strategy, hashes)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn has_recording(
        &self,
        file_path: &str,
        strategy: StrategyId,
    ) -> std::result::Result<bool, StoreError> {
        Database::has_recording(self, file_path, strategy)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn clear_all(&self) -> std::result::Result<(), StoreError> {
        Database::clear_all(self).map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(hash: &str, time_index: u32) -> Fingerprint {
        Fingerprint {
            hash: hash.to_string(),
            time_index,
        }
    }

    #[test]
    fn test_insert_and_lookup_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_recording("/music/a.wav", "a").unwrap();
        db.insert_fingerprints(id, StrategyId::PeakPair, &[fp("aa", 1), fp("bb", 2)])
            .unwrap();

        let hits = db
            .lookup_by_hash(StrategyId::PeakPair, &["aa".into(), "zz".into()])
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].audio_id, id);
        assert_eq!(hits[0].time_index, 1);
    }

    #[test]
    fn test_strategies_are_isolated() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_recording("/music/a.wav", "a").unwrap();
        db.insert_fingerprints(id, StrategyId::PeakPair, &[fp("aa", 1)])
            .unwrap();

        let hits = db
            .lookup_by_hash(StrategyId::ChromaDominant, &["aa".into()])
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_duplicate_path_maps_to_store_error() {
        let db = Database::open_in_memory().unwrap();
        db.insert_recording("/music/a.wav", "a").unwrap();

        let dup = FingerprintStore::insert_recording(&db, "/music/a.wav", "again");
        assert!(matches!(dup, Err(StoreError::DuplicatePath(p)) if p == "/music/a.wav"));
    }

    #[test]
    fn test_has_recording_requires_fingerprints() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_recording("/music/a.wav", "a").unwrap();

        // Registered but without fingerprints for any strategy yet.
        assert!(!db.has_recording("/music/a.wav", StrategyId::PeakPair).unwrap());

        db.insert_fingerprints(id, StrategyId::PeakPair, &[fp("aa", 0)])
            .unwrap();
        assert!(db.has_recording("/music/a.wav", StrategyId::PeakPair).unwrap());
        assert!(!db
            .has_recording("/music/a.wav", StrategyId::PatchEnergy)
            .unwrap());
        assert!(!db.has_recording("/other.wav", StrategyId::PeakPair).unwrap());
    }

    #[test]
    fn test_lookup_chunks_large_hash_sets() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_recording("/music/a.wav", "a").unwrap();

        let fingerprints: Vec<Fingerprint> =
            (0..1200).map(|i| fp(&format!("h{i:04}"), i)).collect();
        db.insert_fingerprints(id, StrategyId::PeakPair, &fingerprints)
            .unwrap();

        let hashes: Vec<String> = (0..1200).map(|i| format!("h{i:04}")).collect();
        let hits = db.lookup_by_hash(StrategyId::PeakPair, &hashes).unwrap();
        assert_eq!(hits.len(), 1200);
    }

    #[test]
    fn test_clear_all_empties_every_table() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_recording("/music/a.wav", "a").unwrap();
        db.insert_fingerprints(id, StrategyId::PeakPair, &[fp("aa", 1)])
            .unwrap();
        db.insert_fingerprints(id, StrategyId::ChromaDominant, &[fp("bb", 1)])
            .unwrap();

        db.clear_all().unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.recordings, 0);
        assert!(stats.fingerprints.iter().all(|(_, count)| *count == 0));
    }

    #[test]
    fn test_get_recording() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_recording("/music/a.wav", "Track A").unwrap();

        let rec = db.get_recording(id).unwrap().unwrap();
        assert_eq!(rec.file_path, "/music/a.wav");
        assert_eq!(rec.display_name, "Track A");

        assert!(db.get_recording(id + 999).unwrap().is_none());
    }
}
