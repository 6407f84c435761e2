//! Chroma dump loading
//!
//! Reads the per-track text files written by the audio analysis front end:
//!
//! ```text
//! # comments and blank lines are ignored
//! rms=0.12
//! spectral_centroid=2113.4
//! spectral_rolloff=4380.0
//! tempo=123.0
//! mfcc=-210.3,112.0,...        (13 values)
//! chroma=0.1,0.4,0.3,...       (one line per pitch class, C first)
//! ```

use crate::record::{Descriptors, MFCC_COUNT};
use std::path::Path;
use thiserror::Error;
use tonal_analysis::{AnalysisError, ChromaMatrix, PITCH_CLASSES};

/// Errors that can occur while loading a chroma dump
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Missing field: {0}")]
    Missing(&'static str),
    #[error(transparent)]
    Chroma(#[from] AnalysisError),
    /// Chroma has no frames; the descriptors were still read
    #[error("No harmonic signal in {track_id}: {source}")]
    NoSignal {
        track_id: String,
        descriptors: Box<Descriptors>,
        source: AnalysisError,
    },
}

impl LoadError {
    /// True when the chroma itself carries no signal
    pub fn is_degenerate(&self) -> bool {
        match self {
            LoadError::Chroma(e) => e.is_degenerate(),
            LoadError::NoSignal { .. } => true,
            _ => false,
        }
    }
}

/// A loaded track ready for tonal analysis
#[derive(Debug, Clone)]
pub struct TrackInput {
    /// Track identifier (file stem)
    pub track_id: String,
    pub chroma: ChromaMatrix,
    pub descriptors: Descriptors,
}

/// Loader for `.chroma` dump files
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromaLoader;

impl ChromaLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load and parse a dump file; the track id is the file stem
    pub fn load(&self, path: &Path) -> Result<TrackInput, LoadError> {
        let content = std::fs::read_to_string(path)?;
        let track_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.parse(&track_id, &content)
    }

    /// Parse dump content
    pub fn parse(&self, track_id: &str, content: &str) -> Result<TrackInput, LoadError> {
        let mut descriptors = Descriptors::default();
        let mut mfcc_seen = false;
        let mut tempo_seen = false;
        let mut rows: Vec<Vec<f64>> = Vec::with_capacity(PITCH_CLASSES);

        for (idx, line) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| LoadError::Parse {
                line: line_no,
                message: "expected key=value".into(),
            })?;
            let key = key.trim();
            let value = value.trim();

            match key {
                "rms" => descriptors.rms = parse_number(value, line_no)?,
                "spectral_centroid" => descriptors.spectral_centroid = parse_number(value, line_no)?,
                "spectral_rolloff" => descriptors.spectral_rolloff = parse_number(value, line_no)?,
                "tempo" => {
                    descriptors.tempo = parse_number(value, line_no)?;
                    tempo_seen = true;
                }
                "mfcc" => {
                    let values = parse_list(value, line_no)?;
                    if values.len() != MFCC_COUNT {
                        return Err(LoadError::Parse {
                            line: line_no,
                            message: format!(
                                "expected {} MFCC values, got {}",
                                MFCC_COUNT,
                                values.len()
                            ),
                        });
                    }
                    descriptors.mfcc.copy_from_slice(&values);
                    mfcc_seen = true;
                }
                "chroma" => rows.push(parse_list(value, line_no)?),
                _ => tracing::trace!(key, line = line_no, "ignoring unknown field"),
            }
        }

        if !tempo_seen {
            return Err(LoadError::Missing("tempo"));
        }
        if !mfcc_seen {
            return Err(LoadError::Missing("mfcc"));
        }
        if rows.is_empty() {
            return Err(LoadError::Missing("chroma"));
        }

        let chroma = match ChromaMatrix::new(rows) {
            Ok(chroma) => chroma,
            Err(source) if source.is_degenerate() => {
                return Err(LoadError::NoSignal {
                    track_id: track_id.to_string(),
                    descriptors: Box::new(descriptors),
                    source,
                })
            }
            Err(e) => return Err(e.into()),
        };
        descriptors.chroma_mean = chroma.mean();

        Ok(TrackInput {
            track_id: track_id.to_string(),
            chroma,
            descriptors,
        })
    }
}

fn parse_number(value: &str, line: usize) -> Result<f64, LoadError> {
    value.parse::<f64>().map_err(|e| LoadError::Parse {
        line,
        message: format!("'{}': {}", value, e),
    })
}

fn parse_list(value: &str, line: usize) -> Result<Vec<f64>, LoadError> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    value
        .split(',')
        .map(|v| parse_number(v.trim(), line))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Dump text with the given per-pitch-class energy repeated over `frames`
    pub(crate) fn dump(energies: [f64; 12], frames: usize) -> String {
        let mut out = String::from("# test dump\nrms=0.25\nspectral_centroid=1800\n");
        out.push_str("spectral_rolloff=3600\ntempo=120\n");
        out.push_str("mfcc=-200,100,1,2,3,4,5,6,7,8,9,10,11\n");
        for e in energies {
            let row: Vec<String> = (0..frames).map(|_| e.to_string()).collect();
            out.push_str(&format!("chroma={}\n", row.join(",")));
        }
        out
    }

    #[test]
    fn test_parse_dump() {
        let mut energies = [0.0; 12];
        energies[0] = 1.0;
        energies[4] = 0.5;
        let input = ChromaLoader::new().parse("12", &dump(energies, 3)).unwrap();

        assert_eq!(input.track_id, "12");
        assert_eq!(input.chroma.frames(), 3);
        assert_eq!(input.descriptors.rms, 0.25);
        assert_eq!(input.descriptors.tempo, 120.0);
        assert_eq!(input.descriptors.mfcc[0], -200.0);
        assert_eq!(input.descriptors.mfcc[12], 11.0);
        assert!((input.descriptors.chroma_mean - 1.5 / 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let text = format!("foo=bar\n{}", dump([1.0; 12], 1));
        assert!(ChromaLoader::new().parse("1", &text).is_ok());
    }

    #[test]
    fn test_missing_line_separator() {
        let err = ChromaLoader::new().parse("1", "rms 0.3").unwrap_err();
        assert!(matches!(err, LoadError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_bad_number() {
        let text = dump([1.0; 12], 1).replace("tempo=120", "tempo=fast");
        assert!(matches!(
            ChromaLoader::new().parse("1", &text),
            Err(LoadError::Parse { .. })
        ));
    }

    #[test]
    fn test_wrong_mfcc_count() {
        let text = dump([1.0; 12], 1).replace("mfcc=-200,100,", "mfcc=");
        assert!(matches!(
            ChromaLoader::new().parse("1", &text),
            Err(LoadError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_chroma() {
        let text = "tempo=100\nmfcc=0,0,0,0,0,0,0,0,0,0,0,0,0\n";
        assert!(matches!(
            ChromaLoader::new().parse("1", text),
            Err(LoadError::Missing("chroma"))
        ));
    }

    #[test]
    fn test_eleven_chroma_rows_rejected() {
        let full = dump([1.0; 12], 2);
        let mut dropped = false;
        let text: String = full
            .lines()
            .filter(|l| {
                if !dropped && l.starts_with("chroma=") {
                    dropped = true;
                    return false;
                }
                true
            })
            .map(|l| format!("{}\n", l))
            .collect();
        let err = ChromaLoader::new().parse("1", &text).unwrap_err();
        assert!(matches!(err, LoadError::Chroma(AnalysisError::InvalidInput(_))));
    }

    #[test]
    fn test_zero_frames_keeps_descriptors() {
        let text = dump([1.0; 12], 0);
        let err = ChromaLoader::new().parse("7", &text).unwrap_err();
        assert!(err.is_degenerate());
        match err {
            LoadError::NoSignal {
                track_id,
                descriptors,
                ..
            } => {
                assert_eq!(track_id, "7");
                assert_eq!(descriptors.tempo, 120.0);
                assert_eq!(descriptors.mfcc[0], -200.0);
                assert_eq!(descriptors.chroma_mean, 0.0);
            }
            other => panic!("expected NoSignal, got {:?}", other),
        }
    }
}
