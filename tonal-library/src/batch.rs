//! Batch analysis of chroma dumps
//!
//! Collects dump files from a directory, skips files whose cached analysis
//! is still valid, and runs tonal analysis on the rest across a pool of
//! worker threads.

use crate::cache::{CacheError, CachedTrack, FeatureCache};
use crate::loader::{ChromaLoader, LoadError};
use crate::record::{merge_rows, Descriptors, FeatureRow, TonalFeatures};
use crossbeam_channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::SystemTime;
use thiserror::Error;
use tonal_analysis::KeyMatcher;

/// Progress updates during a batch run
#[derive(Debug, Clone, PartialEq)]
pub enum BatchProgress {
    /// Run started
    Started {
        /// Total number of files to process
        total: usize,
    },
    /// Currently analyzing a file
    Analyzing {
        /// Current file number (1-indexed)
        current: usize,
        /// Total number of files
        total: usize,
        /// Path being analyzed
        path: PathBuf,
    },
    /// File was already cached (no re-analysis needed)
    Cached {
        current: usize,
        total: usize,
        path: PathBuf,
    },
    /// File carried no harmonic energy; no tonal estimate was produced
    Silent { path: PathBuf },
    /// Error loading or analyzing a file
    Error {
        /// Path that failed
        path: PathBuf,
        /// Error message
        message: String,
    },
    /// Run completed
    Complete {
        analyzed: usize,
        cached: usize,
        silent: usize,
        failed: usize,
    },
}

/// Configuration for a batch run
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Directory to scan
    pub directory: PathBuf,
    /// File extensions to include
    pub extensions: Vec<String>,
    /// Maximum number of parallel analysis threads
    pub max_threads: usize,
    /// Whether to scan subdirectories recursively
    pub recursive: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::new(),
            extensions: vec!["chroma".into()],
            max_threads: 4,
            recursive: true,
        }
    }
}

/// Error type for batch operations
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Load error: {0}")]
    Load(#[from] LoadError),
}

/// Result of a batch run
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// All rows (newly analyzed + cached), sorted by track id
    pub rows: Vec<FeatureRow>,
    /// Number of files that were analyzed
    pub analyzed_count: usize,
    /// Number of files from cache
    pub cached_count: usize,
    /// Number of files with no usable signal
    pub silent_count: usize,
    /// Number of files that failed to load
    pub failed_count: usize,
}

/// Outcome of analyzing one file
enum TrackOutcome {
    Analyzed(CachedTrack),
    /// Degenerate chroma; the row keeps its descriptors and has no tonal part
    Silent(CachedTrack),
}

/// Batch analyzer with parallel workers and an optional result cache
pub struct BatchAnalyzer {
    cache: Option<Arc<Mutex<FeatureCache>>>,
    matcher: KeyMatcher,
    /// Fingerprint of the matcher's catalog, stored with every cached row
    catalog: String,
}

impl BatchAnalyzer {
    /// Create an analyzer that reuses and updates the given cache
    ///
    /// Cached rows are only reused when they were matched against the same
    /// scale catalog as `matcher` uses.
    pub fn new(cache: FeatureCache, matcher: KeyMatcher) -> Self {
        let catalog = matcher.catalog().fingerprint();
        Self {
            cache: Some(Arc::new(Mutex::new(cache))),
            matcher,
            catalog,
        }
    }

    /// Create an analyzer that always re-analyzes and stores nothing
    pub fn without_cache(matcher: KeyMatcher) -> Self {
        let catalog = matcher.catalog().fingerprint();
        Self {
            cache: None,
            matcher,
            catalog,
        }
    }

    /// Run a batch synchronously (blocking)
    ///
    /// Sends progress updates through the channel when one is given.
    pub fn scan(
        &self,
        config: &BatchConfig,
        progress_tx: Option<Sender<BatchProgress>>,
    ) -> Result<BatchResult, BatchError> {
        let send = |event: BatchProgress| {
            if let Some(ref tx) = progress_tx {
                let _ = tx.send(event);
            }
        };

        self.prune_cache();

        let files = collect_files(&config.directory, &config.extensions, config.recursive)?;
        let total = files.len();
        send(BatchProgress::Started { total });

        if total == 0 {
            send(BatchProgress::Complete {
                analyzed: 0,
                cached: 0,
                silent: 0,
                failed: 0,
            });
            return Ok(BatchResult::default());
        }

        let (cached_files, uncached_files) = self.partition_by_cache(&files);
        for (i, cached) in cached_files.iter().enumerate() {
            send(BatchProgress::Cached {
                current: i + 1,
                total,
                path: cached.path.clone(),
            });
        }
        let cached_count = cached_files.len();

        let outcome = self.analyze_parallel(
            uncached_files,
            config.max_threads,
            cached_count,
            total,
            progress_tx.as_ref(),
        );

        let cached_rows: Vec<FeatureRow> = cached_files.into_iter().map(|c| c.row).collect();
        let rows = merge_rows(cached_rows, outcome.rows);

        tracing::info!(
            analyzed = outcome.analyzed_count,
            cached = cached_count,
            silent = outcome.silent_count,
            failed = outcome.failed_count,
            "batch complete"
        );

        send(BatchProgress::Complete {
            analyzed: outcome.analyzed_count,
            cached: cached_count,
            silent: outcome.silent_count,
            failed: outcome.failed_count,
        });

        Ok(BatchResult {
            rows,
            analyzed_count: outcome.analyzed_count,
            cached_count,
            silent_count: outcome.silent_count,
            failed_count: outcome.failed_count,
        })
    }

    /// Start a batch on a background thread
    ///
    /// Returns a receiver for progress updates and a handle to the worker.
    pub fn scan_async(
        self,
        config: BatchConfig,
    ) -> (Receiver<BatchProgress>, JoinHandle<Result<BatchResult, BatchError>>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = thread::spawn(move || self.scan(&config, Some(tx)));
        (rx, handle)
    }

    /// Drop cache entries whose dump file is gone
    fn prune_cache(&self) {
        let Some(ref cache) = self.cache else {
            return;
        };
        let cache = cache.lock();
        match cache.remove_missing() {
            Ok(0) => {}
            Ok(removed) => tracing::info!(removed, "pruned missing files from cache"),
            Err(e) => tracing::warn!(error = %e, "failed to prune cache"),
        }
        if let Ok(count) = cache.count() {
            tracing::debug!(count, "cached tracks");
        }
    }

    /// Split files into still-valid cache entries and files to analyze
    fn partition_by_cache(&self, files: &[PathBuf]) -> (Vec<CachedTrack>, Vec<PathBuf>) {
        let cache = match self.cache {
            Some(ref cache) => cache.lock(),
            None => return (Vec::new(), files.to_vec()),
        };

        let mut cached = Vec::new();
        let mut uncached = Vec::new();
        for path in files {
            if let Ok((file_size, modified_time)) = file_stamp(path) {
                if let Some(track) = cache.get(path, file_size, modified_time, &self.catalog) {
                    cached.push(track);
                    continue;
                }
            }
            uncached.push(path.clone());
        }
        (cached, uncached)
    }

    /// Analyze files on up to `max_threads` workers fed from a shared queue
    fn analyze_parallel(
        &self,
        files: Vec<PathBuf>,
        max_threads: usize,
        base_index: usize,
        total: usize,
        progress_tx: Option<&Sender<BatchProgress>>,
    ) -> BatchResult {
        if files.is_empty() {
            return BatchResult::default();
        }

        let thread_count = max_threads.min(files.len()).max(1);
        let (work_tx, work_rx) = crossbeam_channel::unbounded::<(usize, PathBuf)>();
        for item in files.into_iter().enumerate() {
            let _ = work_tx.send(item);
        }
        drop(work_tx);

        let result = Mutex::new(BatchResult::default());
        let rows: Mutex<Vec<(usize, FeatureRow)>> = Mutex::new(Vec::new());

        thread::scope(|scope| {
            for _ in 0..thread_count {
                let work_rx = work_rx.clone();
                let result = &result;
                let rows = &rows;
                let matcher = &self.matcher;
                let catalog = self.catalog.as_str();
                let cache = self.cache.as_ref();

                scope.spawn(move || {
                    let loader = ChromaLoader::new();
                    let send = |event: BatchProgress| {
                        if let Some(tx) = progress_tx {
                            let _ = tx.send(event);
                        }
                    };

                    for (idx, path) in work_rx.iter() {
                        send(BatchProgress::Analyzing {
                            current: base_index + idx + 1,
                            total,
                            path: path.clone(),
                        });

                        match analyze_track(&loader, matcher, catalog, &path) {
                            Ok(TrackOutcome::Analyzed(track)) => {
                                store(cache, &track);
                                result.lock().analyzed_count += 1;
                                rows.lock().push((idx, track.row));
                            }
                            Ok(TrackOutcome::Silent(track)) => {
                                tracing::warn!(path = %path.display(), "no harmonic signal");
                                send(BatchProgress::Silent { path: path.clone() });
                                store(cache, &track);
                                result.lock().silent_count += 1;
                                rows.lock().push((idx, track.row));
                            }
                            Err(e) => {
                                tracing::warn!(path = %path.display(), error = %e, "analysis failed");
                                send(BatchProgress::Error {
                                    path: path.clone(),
                                    message: e.to_string(),
                                });
                                result.lock().failed_count += 1;
                            }
                        }
                    }
                });
            }
        });

        // Work order, so results do not depend on thread scheduling
        let mut rows = rows.into_inner();
        rows.sort_by_key(|(idx, _)| *idx);

        let mut result = result.into_inner();
        result.rows = rows.into_iter().map(|(_, row)| row).collect();
        result
    }
}

fn store(cache: Option<&Arc<Mutex<FeatureCache>>>, track: &CachedTrack) {
    if let Some(cache) = cache {
        if let Err(e) = cache.lock().store(track) {
            tracing::warn!(path = %track.path.display(), error = %e, "failed to cache result");
        }
    }
}

/// Collect all matching files from a directory, sorted by path
///
/// A missing directory yields no files.
pub fn collect_files(
    dir: &Path,
    extensions: &[String],
    recursive: bool,
) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut files = Vec::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
        Err(e) => return Err(e),
    };

    for entry in entries.flatten() {
        let path = entry.path();

        if path.is_file() {
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                if extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
                    files.push(path);
                }
            }
        } else if path.is_dir() && recursive {
            files.extend(collect_files(&path, extensions, recursive)?);
        }
    }

    files.sort();
    Ok(files)
}

/// File size and modification time (Unix seconds) for cache invalidation
fn file_stamp(path: &Path) -> Result<(u64, u64), std::io::Error> {
    let meta = std::fs::metadata(path)?;
    let modified_time = meta
        .modified()?
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    Ok((meta.len(), modified_time))
}

/// Load and analyze a single dump
fn analyze_track(
    loader: &ChromaLoader,
    matcher: &KeyMatcher,
    catalog: &str,
    path: &Path,
) -> Result<TrackOutcome, BatchError> {
    let (file_size, modified_time) = file_stamp(path)?;
    let make_track = |track_id: String, descriptors: Descriptors| CachedTrack {
        path: path.to_path_buf(),
        file_size,
        modified_time,
        catalog: catalog.to_string(),
        row: FeatureRow {
            track_id,
            descriptors: Some(descriptors),
            tonal: None,
        },
    };

    let input = match loader.load(path) {
        Ok(input) => input,
        Err(LoadError::NoSignal {
            track_id,
            descriptors,
            ..
        }) => return Ok(TrackOutcome::Silent(make_track(track_id, *descriptors))),
        Err(e) => return Err(e.into()),
    };

    let mut track = make_track(input.track_id, input.descriptors);
    match matcher.analyze_matrix(&input.chroma) {
        Ok(result) => {
            tracing::debug!(track = %track.row.track_id, %result, "analyzed");
            track.row.tonal = Some(TonalFeatures::from(&result));
            Ok(TrackOutcome::Analyzed(track))
        }
        Err(e) if e.is_degenerate() => Ok(TrackOutcome::Silent(track)),
        Err(e) => Err(LoadError::from(e).into()),
    }
}
