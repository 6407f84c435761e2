//! tonal - batch key, scale and feature extraction
//!
//! Reads chroma dumps produced by the audio analysis front end, estimates
//! key and scale per track, and writes one merged feature row per track.

use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tonal_analysis::KeyMatcher;
use tonal_library::{
    write_csv_file, BatchAnalyzer, BatchConfig, BatchProgress, CatalogChoice, Config,
    FeatureCache, FeatureRow,
};

/// Command-line options; anything left unset falls back to the config file
#[derive(Parser, Debug, Default, PartialEq)]
#[command(name = "tonal")]
#[command(about = "Estimate key, mode and scale from chroma dumps and export feature rows")]
struct Options {
    /// Directory of .chroma dumps to scan
    directory: Option<PathBuf>,

    /// CSV file to write
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Worker thread count
    #[arg(short = 'j', long, value_parser = clap::value_parser!(u32).range(1..))]
    threads: Option<u32>,

    /// Cache database path
    #[arg(long = "db")]
    database: Option<PathBuf>,

    /// Match against Major and Natural Minor only
    #[arg(long)]
    simple: bool,

    /// Re-analyze everything and store nothing
    #[arg(long, conflicts_with = "from_cache")]
    no_cache: bool,

    /// Export the cached rows without scanning
    #[arg(long)]
    from_cache: bool,

    /// Write the effective settings to the config file
    #[arg(long)]
    save_config: bool,
}

/// Fold command-line overrides into the loaded config
fn apply(mut config: Config, options: &Options) -> Config {
    if let Some(ref dir) = options.directory {
        config.input_dir = Some(dir.clone());
    }
    if let Some(ref output) = options.output {
        config.output = output.clone();
    }
    if let Some(threads) = options.threads {
        config.max_threads = threads as usize;
    }
    if let Some(ref db) = options.database {
        config.database = db.clone();
    }
    if options.simple {
        config.catalog = CatalogChoice::MajorMinor;
    }
    config
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = Options::parse();
    let config = apply(Config::load(), &options);

    if options.save_config {
        config
            .save()
            .with_context(|| format!("saving {}", Config::config_path().display()))?;
    }

    if options.from_cache {
        return export_cached(&config);
    }

    let directory = config
        .input_dir
        .clone()
        .ok_or_else(|| anyhow!("no input directory given (pass DIR or set input_dir)"))?;

    let matcher = KeyMatcher::new(config.catalog.catalog()?);
    let analyzer = if options.no_cache {
        BatchAnalyzer::without_cache(matcher)
    } else {
        let cache = FeatureCache::open(&config.database)
            .with_context(|| format!("opening cache {}", config.database.display()))?;
        BatchAnalyzer::new(cache, matcher)
    };

    tracing::info!(
        directory = %directory.display(),
        threads = config.max_threads,
        catalog = config.catalog.as_str(),
        "starting batch"
    );

    let batch_config = BatchConfig {
        directory,
        max_threads: config.max_threads,
        ..Default::default()
    };
    let (progress_rx, handle) = analyzer.scan_async(batch_config);

    for progress in progress_rx.iter() {
        report(&progress);
    }

    let result = handle
        .join()
        .map_err(|_| anyhow!("batch worker panicked"))??;

    print_table(&result.rows);

    write_csv_file(&config.output, &result.rows)
        .with_context(|| format!("writing {}", config.output.display()))?;
    println!(
        "{} rows written to {} ({} analyzed, {} cached, {} silent, {} failed)",
        result.rows.len(),
        config.output.display(),
        result.analyzed_count,
        result.cached_count,
        result.silent_count,
        result.failed_count
    );

    Ok(())
}

/// Write every cached row without touching the dumps
fn export_cached(config: &Config) -> anyhow::Result<()> {
    let cache = FeatureCache::open(&config.database)
        .with_context(|| format!("opening cache {}", config.database.display()))?;
    let rows: Vec<FeatureRow> = cache
        .get_all_sorted()?
        .into_iter()
        .map(|track| track.row)
        .collect();

    print_table(&rows);
    write_csv_file(&config.output, &rows)
        .with_context(|| format!("writing {}", config.output.display()))?;
    println!("{} cached rows written to {}", rows.len(), config.output.display());
    Ok(())
}

fn report(progress: &BatchProgress) {
    match progress {
        BatchProgress::Started { total } => println!("Scanning {} files...", total),
        BatchProgress::Analyzing {
            current,
            total,
            path,
        } => println!("[{}/{}] {}", current, total, path.display()),
        BatchProgress::Cached { .. } => {}
        BatchProgress::Silent { path } => println!("  no signal: {}", path.display()),
        BatchProgress::Error { path, message } => {
            eprintln!("  failed: {}: {}", path.display(), message)
        }
        BatchProgress::Complete { .. } => {}
    }
}

fn print_table(rows: &[FeatureRow]) {
    println!();
    println!(
        "{:<12} {:<4} {:<26} {:>8} {:>8}  {}",
        "track", "key", "scale", "key_r", "scale_r", "pitches"
    );
    for row in rows {
        match row.tonal {
            Some(ref t) => println!(
                "{:<12} {:<4} {:<26} {:>8.3} {:>8.3}  {}",
                row.track_id, t.key, t.scale_name, t.key_correlation, t.scale_correlation,
                t.scale_pitches
            ),
            None => println!("{:<12} (insufficient signal)", row.track_id),
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Options, clap::Error> {
        Options::try_parse_from(std::iter::once("tonal").chain(args.iter().copied()))
    }

    #[test]
    fn test_parse_args_full() {
        let options = parse(&[
            "/data/chroma",
            "--output",
            "out.csv",
            "-j",
            "6",
            "--simple",
            "--no-cache",
        ])
        .unwrap();
        assert_eq!(options.directory, Some(PathBuf::from("/data/chroma")));
        assert_eq!(options.output, Some(PathBuf::from("out.csv")));
        assert_eq!(options.threads, Some(6));
        assert!(options.simple);
        assert!(options.no_cache);
        assert!(!options.from_cache);
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse(&["--threads"]).is_err());
        assert!(parse(&["--threads", "0"]).is_err());
        assert!(parse(&["--threads", "many"]).is_err());
        assert!(parse(&["--bogus"]).is_err());
        assert!(parse(&["a", "b"]).is_err());
        assert!(parse(&["--no-cache", "--from-cache"]).is_err());
    }

    #[test]
    fn test_no_arguments() {
        assert_eq!(parse(&[]).unwrap(), Options::default());
    }

    #[test]
    fn test_options_are_consistent() {
        use clap::CommandFactory;
        Options::command().debug_assert();
    }

    #[test]
    fn test_apply_overrides() {
        let options = parse(&["in", "--threads", "2", "--simple", "--db", "/tmp/f.db"]).unwrap();
        let config = apply(Config::default(), &options);
        assert_eq!(config.input_dir, Some(PathBuf::from("in")));
        assert_eq!(config.max_threads, 2);
        assert_eq!(config.catalog, CatalogChoice::MajorMinor);
        assert_eq!(config.database, PathBuf::from("/tmp/f.db"));
        assert_eq!(config.output, Config::default().output);
    }
}
