//! Simple configuration persistence for tonal-features
//!
//! Stores batch defaults: input folder, cache database, output file,
//! thread count and which scale catalog to match against.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tonal_analysis::{AnalysisError, ScaleCatalog};

/// Which scale catalog the matcher uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatalogChoice {
    /// Full catalog (diatonic, modal, pentatonic, exotic)
    #[default]
    Standard,
    /// Major and Natural Minor only
    MajorMinor,
}

impl CatalogChoice {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "standard" => Some(CatalogChoice::Standard),
            "major-minor" => Some(CatalogChoice::MajorMinor),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogChoice::Standard => "standard",
            CatalogChoice::MajorMinor => "major-minor",
        }
    }

    /// Build the selected catalog
    pub fn catalog(&self) -> Result<Arc<ScaleCatalog>, AnalysisError> {
        match self {
            CatalogChoice::Standard => Ok(ScaleCatalog::standard()),
            CatalogChoice::MajorMinor => ScaleCatalog::major_minor().map(Arc::new),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Folder scanned for chroma dumps
    pub input_dir: Option<PathBuf>,
    /// Cache database path
    pub database: PathBuf,
    /// CSV output path
    pub output: PathBuf,
    /// Worker thread count
    pub max_threads: usize,
    /// Scale catalog to match against
    pub catalog: CatalogChoice,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: None,
            database: Self::data_dir().join("features.db"),
            output: PathBuf::from("tonal_features.csv"),
            max_threads: 4,
            catalog: CatalogChoice::Standard,
        }
    }
}

impl Config {
    /// Load config from the default location
    ///
    /// Returns default config if file doesn't exist or can't be read.
    pub fn load() -> Self {
        let path = Self::config_path();
        Self::load_from(&path).unwrap_or_default()
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Save config to the default location
    pub fn save(&self) -> io::Result<()> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, self.serialize())
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tonal")
            .join("config.txt")
    }

    fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tonal")
    }

    /// Parse config from simple key=value format
    fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }

            match key.trim() {
                "input_dir" => config.input_dir = Some(PathBuf::from(value)),
                "database" => config.database = PathBuf::from(value),
                "output" => config.output = PathBuf::from(value),
                "max_threads" => match value.parse::<usize>() {
                    Ok(n) if n > 0 => config.max_threads = n,
                    _ => tracing::warn!(value, "ignoring invalid max_threads"),
                },
                "catalog" => match CatalogChoice::parse(value) {
                    Some(choice) => config.catalog = choice,
                    None => tracing::warn!(value, "ignoring unknown catalog"),
                },
                _ => {} // Ignore unknown keys
            }
        }

        config
    }

    /// Serialize config to simple key=value format
    fn serialize(&self) -> String {
        let mut lines = vec!["# tonal configuration".to_string()];

        if let Some(ref dir) = self.input_dir {
            lines.push(format!("input_dir={}", dir.display()));
        }
        lines.push(format!("database={}", self.database.display()));
        lines.push(format!("output={}", self.output.display()));
        lines.push(format!("max_threads={}", self.max_threads));
        lines.push(format!("catalog={}", self.catalog.as_str()));

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        let config = Config::parse("");
        assert_eq!(config, Config::default());
        assert!(config.input_dir.is_none());
    }

    #[test]
    fn test_parse_values() {
        let config = Config::parse(
            "input_dir=/data/chroma\nmax_threads=8\ncatalog=major-minor\noutput=out.csv",
        );
        assert_eq!(config.input_dir, Some(PathBuf::from("/data/chroma")));
        assert_eq!(config.max_threads, 8);
        assert_eq!(config.catalog, CatalogChoice::MajorMinor);
        assert_eq!(config.output, PathBuf::from("out.csv"));
    }

    #[test]
    fn test_parse_with_comments_and_junk() {
        let content = "# Comment\nmax_threads=0\ncatalog=lydian\nnonsense\nfoo=bar";
        let config = Config::parse(content);
        assert_eq!(config.max_threads, 4);
        assert_eq!(config.catalog, CatalogChoice::Standard);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = Config {
            input_dir: Some(PathBuf::from("/test/path")),
            database: PathBuf::from("/tmp/t.db"),
            output: PathBuf::from("x.csv"),
            max_threads: 2,
            catalog: CatalogChoice::MajorMinor,
        };

        let parsed = Config::parse(&config.serialize());
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_catalog_choice() {
        assert_eq!(CatalogChoice::Standard.catalog().unwrap().len(), 20);
        assert_eq!(CatalogChoice::MajorMinor.catalog().unwrap().len(), 2);
    }
}
