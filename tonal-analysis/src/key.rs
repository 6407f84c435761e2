//! Key and scale detection by template matching
//!
//! Implements scale-finding over a pitch-class profile:
//! 1. Rotate the profile so each of the 12 candidate roots sits at index 0
//! 2. Score every catalog template as the mean profile energy on its members
//! 3. Keep the best (root, template) pair with a deterministic tie-break

use crate::error::AnalysisError;
use crate::pitch::{PitchClass, PITCH_CLASSES};
use crate::profile::{ChromaMatrix, PitchClassProfile};
use crate::scale::{ScaleCatalog, ScaleTemplate};
use crate::tone::{key_correlation, mode_label, third_comparison_mode, ToneResult};
use std::sync::Arc;

/// Scores within this distance of the best score count as tied
///
/// Equal-by-construction scores of templates with different sizes (e.g. a
/// pentatonic subset of a major scale on a flat profile) can differ in the
/// last bits.
pub const TIE_EPSILON: f64 = 1e-12;

/// A scored (root, template) pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyCandidate<'a> {
    /// Root the template is placed at
    pub root: PitchClass,
    /// Template from the matcher's catalog
    pub template: &'a ScaleTemplate,
    /// Mean normalized energy on the template members
    pub score: f64,
}

/// Key and scale matcher over a fixed scale catalog
///
/// Stateless apart from the read-only catalog; one matcher can serve any
/// number of tracks and threads.
#[derive(Debug, Clone)]
pub struct KeyMatcher {
    catalog: Arc<ScaleCatalog>,
}

impl Default for KeyMatcher {
    fn default() -> Self {
        Self::standard()
    }
}

impl KeyMatcher {
    /// Matcher over the built-in catalog
    pub fn standard() -> Self {
        Self {
            catalog: ScaleCatalog::standard(),
        }
    }

    /// Matcher over a custom catalog
    pub fn new(catalog: Arc<ScaleCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &ScaleCatalog {
        &self.catalog
    }

    /// Aggregate a chroma matrix and analyze the resulting profile
    pub fn analyze_matrix(&self, matrix: &ChromaMatrix) -> Result<ToneResult, AnalysisError> {
        let profile = PitchClassProfile::from_matrix(matrix)?;
        Ok(self.analyze(&profile))
    }

    /// Estimate key, mode and scale for a normalized profile
    pub fn analyze(&self, profile: &PitchClassProfile) -> ToneResult {
        let best = self.best_candidate(profile);
        let key = profile.dominant();
        let mode = mode_label(best.template.name());

        tracing::debug!(
            key = %key,
            root = %best.root,
            scale = best.template.name(),
            score = best.score,
            "matched scale template"
        );
        let third_mode = third_comparison_mode(profile);
        if (mode == "major" || mode == "minor") && mode != third_mode {
            tracing::trace!(%mode, third_mode, "third comparison disagrees with template match");
        }

        ToneResult {
            key,
            scale_root: best.root,
            mode,
            scale_name: best.template.name().to_string(),
            key_correlation: key_correlation(profile),
            scale_correlation: best.score,
            scale_pitches: best.template.pitches(best.root),
        }
    }

    /// Highest-scoring (root, template) pair
    ///
    /// Every pair within [`TIE_EPSILON`] of the top score is a tie. Ties
    /// resolve to the earliest template in catalog order, then to the
    /// lowest root index.
    pub fn best_candidate(&self, profile: &PitchClassProfile) -> KeyCandidate<'_> {
        let candidates = self.candidates(profile);
        let top = Self::top_score(&candidates);

        let mut best = candidates[0];
        for candidate in &candidates {
            if top - candidate.score <= TIE_EPSILON {
                best = *candidate;
                break;
            }
        }
        best
    }

    /// Every (root, template) pair, best first, ties in tie-break order
    ///
    /// Candidates within [`TIE_EPSILON`] of the first member of their group
    /// form one tie group, ordered by catalog position then root.
    pub fn ranked(&self, profile: &PitchClassProfile) -> Vec<KeyCandidate<'_>> {
        let mut indexed: Vec<(usize, KeyCandidate<'_>)> =
            self.candidates(profile).into_iter().enumerate().collect();
        indexed.sort_by(|a, b| b.1.score.total_cmp(&a.1.score).then(a.0.cmp(&b.0)));

        let mut start = 0;
        while start < indexed.len() {
            let lead = indexed[start].1.score;
            let end = indexed[start..]
                .iter()
                .position(|(_, c)| lead - c.score > TIE_EPSILON)
                .map_or(indexed.len(), |offset| start + offset);
            indexed[start..end].sort_by_key(|(generated, _)| *generated);
            start = end;
        }

        indexed.into_iter().map(|(_, c)| c).collect()
    }

    /// Score of one template placed at one root
    pub fn score(profile: &PitchClassProfile, root: PitchClass, template: &ScaleTemplate) -> f64 {
        let rotated = Self::rotate_profile(profile.values(), root);
        Self::template_score(&rotated, template)
    }

    fn rotations(profile: &PitchClassProfile) -> [[f64; PITCH_CLASSES]; PITCH_CLASSES] {
        let mut rotations = [[0.0f64; PITCH_CLASSES]; PITCH_CLASSES];
        for (root, slot) in rotations.iter_mut().enumerate() {
            *slot = Self::rotate_profile(profile.values(), PitchClass::from_index(root));
        }
        rotations
    }

    /// All candidates in generation order (catalog, then ascending root)
    fn candidates(&self, profile: &PitchClassProfile) -> Vec<KeyCandidate<'_>> {
        let rotations = Self::rotations(profile);
        self.catalog
            .iter()
            .flat_map(|template| {
                rotations
                    .iter()
                    .enumerate()
                    .map(move |(root, rotated)| KeyCandidate {
                        root: PitchClass::from_index(root),
                        template,
                        score: Self::template_score(rotated, template),
                    })
            })
            .collect()
    }

    fn top_score(candidates: &[KeyCandidate<'_>]) -> f64 {
        candidates
            .iter()
            .map(|c| c.score)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Rotate the profile so that the given pitch class becomes index 0
    fn rotate_profile(values: &[f64; PITCH_CLASSES], root: PitchClass) -> [f64; PITCH_CLASSES] {
        let mut rotated = [0.0f64; PITCH_CLASSES];
        for (i, slot) in rotated.iter_mut().enumerate() {
            *slot = values[(i + root.index()) % PITCH_CLASSES];
        }
        rotated
    }

    /// Mean rotated energy on the template's offsets
    fn template_score(rotated: &[f64; PITCH_CLASSES], template: &ScaleTemplate) -> f64 {
        let sum: f64 = template
            .offsets()
            .iter()
            .map(|&o| rotated[o as usize])
            .sum();
        sum / template.len() as f64
    }
}
