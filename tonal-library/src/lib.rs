//! Batch feature extraction for tonal-features - loading, records, cache, export

mod batch;
mod cache;
mod config;
mod export;
mod loader;
mod record;

pub use batch::{collect_files, BatchAnalyzer, BatchConfig, BatchError, BatchProgress, BatchResult};
pub use cache::{CacheError, CachedTrack, FeatureCache};
pub use config::{CatalogChoice, Config};
pub use export::{header, write_csv, write_csv_file};
pub use loader::{ChromaLoader, LoadError, TrackInput};
pub use record::{
    merge_rows, Descriptors, FeatureRow, TonalFeatures, FEATURE_VECTOR_LEN, MFCC_COUNT,
};
