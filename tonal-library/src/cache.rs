//! SQLite cache for per-track feature rows
//!
//! Stores descriptors and tonal estimates to avoid re-analyzing unchanged dumps.

use crate::record::{Descriptors, FeatureRow, TonalFeatures, MFCC_COUNT};
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cached analysis for one input file
#[derive(Debug, Clone, PartialEq)]
pub struct CachedTrack {
    /// Path to the chroma dump
    pub path: PathBuf,
    /// File size in bytes (for cache invalidation)
    pub file_size: u64,
    /// File modification time as Unix timestamp (for cache invalidation)
    pub modified_time: u64,
    /// Fingerprint of the scale catalog the row was matched against
    pub catalog: String,
    /// Merged feature row
    pub row: FeatureRow,
}

/// Feature cache backed by SQLite
pub struct FeatureCache {
    conn: Connection,
}

impl FeatureCache {
    /// SQL schema for the tracks table
    const SCHEMA: &'static str = r#"
        CREATE TABLE IF NOT EXISTS tracks (
            id INTEGER PRIMARY KEY,
            path TEXT UNIQUE NOT NULL,
            file_size INTEGER NOT NULL,
            modified_time INTEGER NOT NULL,
            catalog TEXT NOT NULL,
            track_id TEXT NOT NULL,
            rms REAL,
            spectral_centroid REAL,
            spectral_rolloff REAL,
            chroma_mean REAL,
            tempo REAL,
            mfcc TEXT,
            key TEXT,
            mode TEXT,
            scale_name TEXT,
            key_full TEXT,
            key_correlation REAL,
            scale_correlation REAL,
            scale_pitches TEXT,
            analyzed_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_path ON tracks(path);
        CREATE INDEX IF NOT EXISTS idx_track_id ON tracks(track_id);
    "#;

    const COLUMNS: &'static str = "path, file_size, modified_time, catalog, track_id,
        rms, spectral_centroid, spectral_rolloff, chroma_mean, tempo, mfcc,
        key, mode, scale_name, key_full, key_correlation, scale_correlation, scale_pitches";

    /// Open or create a cache database at the given path
    pub fn open(db_path: &Path) -> Result<Self, CacheError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Self::with_connection(Connection::open(db_path)?)
    }

    /// Open an in-memory database
    pub fn in_memory() -> Result<Self, CacheError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    /// Create the schema; a table from an older layout is dropped and rebuilt
    fn with_connection(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(Self::SCHEMA)?;
        if conn.prepare("SELECT catalog FROM tracks LIMIT 0").is_err() {
            tracing::info!("cache schema outdated, rebuilding");
            conn.execute_batch("DROP TABLE tracks;")?;
            conn.execute_batch(Self::SCHEMA)?;
        }
        Ok(Self { conn })
    }

    /// Get the cached row if the file hasn't changed
    ///
    /// Returns None if the file is not cached, its size or modification
    /// time differ from the stored values, or it was matched against a
    /// different scale catalog.
    pub fn get(
        &self,
        path: &Path,
        file_size: u64,
        modified_time: u64,
        catalog: &str,
    ) -> Option<CachedTrack> {
        let sql = format!(
            "SELECT {} FROM tracks
             WHERE path = ?1 AND file_size = ?2 AND modified_time = ?3 AND catalog = ?4",
            Self::COLUMNS
        );
        self.conn
            .query_row(
                &sql,
                params![
                    path.to_string_lossy().to_string(),
                    file_size,
                    modified_time,
                    catalog
                ],
                Self::read_row,
            )
            .ok()
    }

    /// Store a row; an existing entry for the same path is replaced
    pub fn store(&self, track: &CachedTrack) -> Result<(), CacheError> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let d = track.row.descriptors.as_ref();
        let t = track.row.tonal.as_ref();

        self.conn.execute(
            r#"INSERT OR REPLACE INTO tracks
               (path, file_size, modified_time, catalog, track_id,
                rms, spectral_centroid, spectral_rolloff, chroma_mean, tempo, mfcc,
                key, mode, scale_name, key_full, key_correlation, scale_correlation,
                scale_pitches, analyzed_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                       ?15, ?16, ?17, ?18, ?19)"#,
            params![
                track.path.to_string_lossy().to_string(),
                track.file_size,
                track.modified_time,
                track.catalog,
                track.row.track_id,
                d.map(|d| d.rms),
                d.map(|d| d.spectral_centroid),
                d.map(|d| d.spectral_rolloff),
                d.map(|d| d.chroma_mean),
                d.map(|d| d.tempo),
                d.map(|d| join_mfcc(&d.mfcc)),
                t.map(|t| t.key.clone()),
                t.map(|t| t.mode.clone()),
                t.map(|t| t.scale_name.clone()),
                t.map(|t| t.key_full.clone()),
                t.map(|t| t.key_correlation),
                t.map(|t| t.scale_correlation),
                t.map(|t| t.scale_pitches.clone()),
                now,
            ],
        )?;

        Ok(())
    }

    /// All cached rows sorted by track id
    pub fn get_all_sorted(&self) -> Result<Vec<CachedTrack>, CacheError> {
        let sql = format!("SELECT {} FROM tracks ORDER BY track_id, path", Self::COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let tracks = stmt
            .query_map([], Self::read_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tracks)
    }

    /// Remove entries whose file no longer exists; returns how many were removed
    pub fn remove_missing(&self) -> Result<usize, CacheError> {
        let paths: Vec<String> = {
            let mut stmt = self.conn.prepare("SELECT path FROM tracks")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let mut removed = 0;
        for path in paths {
            if !Path::new(&path).exists() {
                removed += self
                    .conn
                    .execute("DELETE FROM tracks WHERE path = ?1", params![path])?;
            }
        }
        Ok(removed)
    }

    /// Number of cached rows
    pub fn count(&self) -> Result<usize, CacheError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn read_row(row: &Row<'_>) -> rusqlite::Result<CachedTrack> {
        let track_id: String = row.get(4)?;

        let descriptors = match row.get::<_, Option<f64>>(5)? {
            Some(rms) => Some(Descriptors {
                rms,
                spectral_centroid: row.get::<_, Option<f64>>(6)?.unwrap_or_default(),
                spectral_rolloff: row.get::<_, Option<f64>>(7)?.unwrap_or_default(),
                chroma_mean: row.get::<_, Option<f64>>(8)?.unwrap_or_default(),
                tempo: row.get::<_, Option<f64>>(9)?.unwrap_or_default(),
                mfcc: split_mfcc(&row.get::<_, Option<String>>(10)?.unwrap_or_default()),
            }),
            None => None,
        };

        let tonal = match row.get::<_, Option<String>>(11)? {
            Some(key) => Some(TonalFeatures {
                key,
                mode: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
                scale_name: row.get::<_, Option<String>>(13)?.unwrap_or_default(),
                key_full: row.get::<_, Option<String>>(14)?.unwrap_or_default(),
                key_correlation: row.get::<_, Option<f64>>(15)?.unwrap_or_default(),
                scale_correlation: row.get::<_, Option<f64>>(16)?.unwrap_or_default(),
                scale_pitches: row.get::<_, Option<String>>(17)?.unwrap_or_default(),
            }),
            None => None,
        };

        Ok(CachedTrack {
            path: PathBuf::from(row.get::<_, String>(0)?),
            file_size: row.get(1)?,
            modified_time: row.get(2)?,
            catalog: row.get(3)?,
            row: FeatureRow {
                track_id,
                descriptors,
                tonal,
            },
        })
    }
}

fn join_mfcc(mfcc: &[f64; MFCC_COUNT]) -> String {
    mfcc.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn split_mfcc(text: &str) -> [f64; MFCC_COUNT] {
    let mut mfcc = [0.0f64; MFCC_COUNT];
    for (slot, value) in mfcc.iter_mut().zip(text.split(',')) {
        *slot = value.trim().parse().unwrap_or(0.0);
    }
    mfcc
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = "Major:0.2.4.5.7.9.11;Natural Minor:0.2.3.5.7.8.10";

    fn sample_track(path: &str, with_tonal: bool) -> CachedTrack {
        let mut mfcc = [0.0; MFCC_COUNT];
        mfcc[0] = -180.5;
        mfcc[12] = 2.25;
        CachedTrack {
            path: PathBuf::from(path),
            file_size: 1024,
            modified_time: 1_700_000_000,
            catalog: CATALOG.into(),
            row: FeatureRow {
                track_id: PathBuf::from(path)
                    .file_stem()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned(),
                descriptors: Some(Descriptors {
                    rms: 0.2,
                    spectral_centroid: 1500.0,
                    spectral_rolloff: 3000.0,
                    chroma_mean: 0.4,
                    tempo: 128.0,
                    mfcc,
                }),
                tonal: with_tonal.then(|| TonalFeatures {
                    key: "A".into(),
                    mode: "minor".into(),
                    scale_name: "Natural Minor".into(),
                    key_full: "A Natural Minor".into(),
                    key_correlation: 2.5,
                    scale_correlation: 0.12,
                    scale_pitches: "A, B, C, D, E, F, G".into(),
                }),
            },
        }
    }

    #[test]
    fn test_store_and_get() {
        let cache = FeatureCache::in_memory().unwrap();
        let track = sample_track("/music/5.chroma", true);
        cache.store(&track).unwrap();

        let loaded = cache
            .get(Path::new("/music/5.chroma"), 1024, 1_700_000_000, CATALOG)
            .unwrap();
        assert_eq!(loaded, track);
    }

    #[test]
    fn test_silent_track_keeps_no_tonal() {
        let cache = FeatureCache::in_memory().unwrap();
        let track = sample_track("/music/9.chroma", false);
        cache.store(&track).unwrap();

        let loaded = cache
            .get(Path::new("/music/9.chroma"), 1024, 1_700_000_000, CATALOG)
            .unwrap();
        assert!(loaded.row.tonal.is_none());
        assert!(loaded.row.descriptors.is_some());
    }

    #[test]
    fn test_cache_invalidation() {
        let cache = FeatureCache::in_memory().unwrap();
        cache.store(&sample_track("/music/5.chroma", true)).unwrap();

        assert!(cache
            .get(Path::new("/music/5.chroma"), 2048, 1_700_000_000, CATALOG)
            .is_none());
        assert!(cache
            .get(Path::new("/music/5.chroma"), 1024, 1_700_000_001, CATALOG)
            .is_none());
    }

    #[test]
    fn test_other_catalog_misses() {
        let cache = FeatureCache::in_memory().unwrap();
        cache.store(&sample_track("/music/5.chroma", true)).unwrap();

        assert!(cache
            .get(Path::new("/music/5.chroma"), 1024, 1_700_000_000, "Major:0.2.4.5.7.9.11")
            .is_none());
        assert!(cache
            .get(Path::new("/music/5.chroma"), 1024, 1_700_000_000, CATALOG)
            .is_some());
    }

    #[test]
    fn test_outdated_schema_is_rebuilt() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE tracks (
                id INTEGER PRIMARY KEY,
                path TEXT UNIQUE NOT NULL,
                file_size INTEGER NOT NULL,
                modified_time INTEGER NOT NULL,
                track_id TEXT NOT NULL,
                analyzed_at INTEGER NOT NULL
            );
            INSERT INTO tracks (path, file_size, modified_time, track_id, analyzed_at)
            VALUES ('/music/1.chroma', 1, 1, '1', 0);",
        )
        .unwrap();

        let cache = FeatureCache::with_connection(conn).unwrap();
        assert_eq!(cache.count().unwrap(), 0);

        let track = sample_track("/music/5.chroma", true);
        cache.store(&track).unwrap();
        assert_eq!(cache.get_all_sorted().unwrap(), vec![track]);
    }

    #[test]
    fn test_get_all_sorted() {
        let cache = FeatureCache::in_memory().unwrap();
        cache.store(&sample_track("/music/b.chroma", true)).unwrap();
        cache.store(&sample_track("/music/a.chroma", true)).unwrap();

        let all = cache.get_all_sorted().unwrap();
        let ids: Vec<&str> = all.iter().map(|t| t.row.track_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(cache.count().unwrap(), 2);
    }

    #[test]
    fn test_replace_existing() {
        let cache = FeatureCache::in_memory().unwrap();
        cache.store(&sample_track("/music/5.chroma", false)).unwrap();
        cache.store(&sample_track("/music/5.chroma", true)).unwrap();
        assert_eq!(cache.count().unwrap(), 1);
    }

    #[test]
    fn test_remove_missing() {
        let cache = FeatureCache::in_memory().unwrap();
        cache
            .store(&sample_track("/nonexistent/dir/1.chroma", true))
            .unwrap();
        assert_eq!(cache.remove_missing().unwrap(), 1);
        assert_eq!(cache.count().unwrap(), 0);
    }
}
