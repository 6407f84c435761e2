//! Tonal analysis for tonal-features
//!
//! Estimates key, mode and best-fitting scale from a chromagram: chroma
//! aggregation, a validated scale catalog, template matching with a
//! deterministic tie-break, and confidence scores.

mod error;
mod key;
mod pitch;
mod profile;
mod scale;
mod tone;

pub use error::AnalysisError;
pub use key::{KeyCandidate, KeyMatcher, TIE_EPSILON};
pub use pitch::{PitchClass, PITCH_CLASSES};
pub use profile::{ChromaMatrix, PitchClassProfile};
pub use scale::{ScaleCatalog, ScaleTemplate};
pub use tone::{key_correlation, mode_label, third_comparison_mode, ToneResult};
