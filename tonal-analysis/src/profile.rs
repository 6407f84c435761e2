//! Chroma aggregation
//!
//! Reduces a time-indexed chromagram (12 rows x T frames) to a single
//! pitch-class distribution that sums to 1.0.

use crate::error::AnalysisError;
use crate::pitch::{PitchClass, PITCH_CLASSES};

/// Validated 12 x T matrix of non-negative chroma energies
///
/// Row `i` holds pitch class `i` (0=C), column `t` is analysis frame `t`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChromaMatrix {
    rows: Vec<Vec<f64>>,
    frames: usize,
}

impl ChromaMatrix {
    /// Build a matrix from 12 pitch-class rows of equal length
    ///
    /// Zero frames is reported as [`AnalysisError::DegenerateInput`];
    /// shape problems and negative or non-finite values as
    /// [`AnalysisError::InvalidInput`].
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self, AnalysisError> {
        if rows.len() != PITCH_CLASSES {
            return Err(AnalysisError::InvalidInput(format!(
                "expected {} pitch-class rows, got {}",
                PITCH_CLASSES,
                rows.len()
            )));
        }

        let frames = rows[0].len();
        for (pc, row) in rows.iter().enumerate() {
            if row.len() != frames {
                return Err(AnalysisError::InvalidInput(format!(
                    "row {} has {} frames, expected {}",
                    PitchClass::from_index(pc),
                    row.len(),
                    frames
                )));
            }
            if let Some(bad) = row.iter().find(|v| !v.is_finite() || **v < 0.0) {
                return Err(AnalysisError::InvalidInput(format!(
                    "row {} contains invalid energy {}",
                    PitchClass::from_index(pc),
                    bad
                )));
            }
        }

        if frames == 0 {
            return Err(AnalysisError::DegenerateInput(
                "chroma matrix has zero frames".into(),
            ));
        }

        Ok(Self { rows, frames })
    }

    /// Build a matrix from frame-major data (one 12-bin chroma vector per frame)
    pub fn from_frames(frames: &[[f64; PITCH_CLASSES]]) -> Result<Self, AnalysisError> {
        let rows = (0..PITCH_CLASSES)
            .map(|pc| frames.iter().map(|frame| frame[pc]).collect())
            .collect();
        Self::new(rows)
    }

    /// Number of analysis frames (T)
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Energies of one pitch class across time
    pub fn row(&self, pitch_class: PitchClass) -> &[f64] {
        &self.rows[pitch_class.index()]
    }

    /// Per-pitch-class energy summed over time
    pub fn summed(&self) -> [f64; PITCH_CLASSES] {
        let mut sums = [0.0f64; PITCH_CLASSES];
        for (sum, row) in sums.iter_mut().zip(&self.rows) {
            *sum = row.iter().sum();
        }
        sums
    }

    /// Mean over every cell of the matrix
    pub fn mean(&self) -> f64 {
        let total: f64 = self.summed().iter().sum();
        total / (PITCH_CLASSES * self.frames) as f64
    }
}

/// Normalized 12-bin pitch-class distribution (sums to 1.0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchClassProfile {
    values: [f64; PITCH_CLASSES],
}

impl PitchClassProfile {
    /// Sum a chroma matrix over time and normalize to unit sum
    pub fn from_matrix(matrix: &ChromaMatrix) -> Result<Self, AnalysisError> {
        Self::from_energies(matrix.summed())
    }

    /// Normalize an already aggregated 12-bin energy vector
    pub fn from_energies(energies: [f64; PITCH_CLASSES]) -> Result<Self, AnalysisError> {
        if let Some(bad) = energies.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(AnalysisError::InvalidInput(format!(
                "profile contains invalid energy {}",
                bad
            )));
        }

        let total: f64 = energies.iter().sum();
        if total <= 0.0 {
            return Err(AnalysisError::DegenerateInput(
                "chroma energy sums to zero".into(),
            ));
        }

        let mut values = [0.0f64; PITCH_CLASSES];
        for (v, e) in values.iter_mut().zip(energies) {
            *v = e / total;
        }
        Ok(Self { values })
    }

    /// Normalized bin values in chroma order (0=C)
    pub fn values(&self) -> &[f64; PITCH_CLASSES] {
        &self.values
    }

    /// Normalized energy of one pitch class
    pub fn get(&self, pitch_class: PitchClass) -> f64 {
        self.values[pitch_class.index()]
    }

    /// Mean bin value (1/12 for any normalized profile)
    pub fn mean(&self) -> f64 {
        self.values.iter().sum::<f64>() / PITCH_CLASSES as f64
    }

    /// Pitch class with the highest energy
    ///
    /// Exact ties resolve to the lowest bin index.
    pub fn dominant(&self) -> PitchClass {
        let mut best = 0;
        for (i, v) in self.values.iter().enumerate().skip(1) {
            if *v > self.values[best] {
                best = i;
            }
        }
        PitchClass::from_index(best)
    }
}
