//! Per-track feature records
//!
//! A track's row combines scalar descriptors produced by the audio analysis
//! front end with the tonal estimate, keyed by track id.

use std::collections::BTreeMap;
use tonal_analysis::ToneResult;

/// Number of MFCC means carried per track
pub const MFCC_COUNT: usize = 13;

/// Length of the numeric feature vector from [`Descriptors::to_vector`]
pub const FEATURE_VECTOR_LEN: usize = 5 + MFCC_COUNT;

/// Scalar audio descriptors computed upstream
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Descriptors {
    /// Mean RMS energy
    pub rms: f64,
    /// Mean spectral centroid in Hz (brightness)
    pub spectral_centroid: f64,
    /// Mean spectral rolloff in Hz
    pub spectral_rolloff: f64,
    /// Mean over every cell of the chroma matrix
    pub chroma_mean: f64,
    /// Tempo in BPM
    pub tempo: f64,
    /// MFCC means, first coefficient first
    pub mfcc: [f64; MFCC_COUNT],
}

impl Descriptors {
    /// Fixed-length numeric vector: rms, centroid, rolloff, chroma mean, tempo, MFCCs
    pub fn to_vector(&self) -> [f64; FEATURE_VECTOR_LEN] {
        let mut v = [0.0f64; FEATURE_VECTOR_LEN];
        v[0] = self.rms;
        v[1] = self.spectral_centroid;
        v[2] = self.spectral_rolloff;
        v[3] = self.chroma_mean;
        v[4] = self.tempo;
        v[5..].copy_from_slice(&self.mfcc);
        v
    }
}

/// Flat tonal record as consumed by the regression step
#[derive(Debug, Clone, PartialEq)]
pub struct TonalFeatures {
    pub key: String,
    pub mode: String,
    pub scale_name: String,
    pub key_full: String,
    pub key_correlation: f64,
    pub scale_correlation: f64,
    /// Pitch names joined with ", "
    pub scale_pitches: String,
}

impl From<&ToneResult> for TonalFeatures {
    fn from(result: &ToneResult) -> Self {
        Self {
            key: result.key.name().to_string(),
            mode: result.mode.clone(),
            scale_name: result.scale_name.clone(),
            key_full: result.key_full(),
            key_correlation: result.key_correlation,
            scale_correlation: result.scale_correlation,
            scale_pitches: result.scale_pitches_joined(),
        }
    }
}

/// One track's merged feature row
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub track_id: String,
    pub descriptors: Option<Descriptors>,
    /// None when the track had no usable harmonic signal
    pub tonal: Option<TonalFeatures>,
}

impl FeatureRow {
    pub fn new(track_id: impl Into<String>) -> Self {
        Self {
            track_id: track_id.into(),
            descriptors: None,
            tonal: None,
        }
    }
}

/// Outer-merge two row sets by track id
///
/// Parts present on either side are kept; when both sides carry the same
/// part, the right-hand value wins. Output is sorted by track id.
pub fn merge_rows(left: Vec<FeatureRow>, right: Vec<FeatureRow>) -> Vec<FeatureRow> {
    let mut merged: BTreeMap<String, FeatureRow> = BTreeMap::new();

    for row in left.into_iter().chain(right) {
        let entry = merged
            .entry(row.track_id.clone())
            .or_insert_with(|| FeatureRow::new(row.track_id.clone()));
        if row.descriptors.is_some() {
            entry.descriptors = row.descriptors;
        }
        if row.tonal.is_some() {
            entry.tonal = row.tonal;
        }
    }

    merged.into_values().collect()
}
