//! Mode labels, confidence scores and the final tonal estimate

use crate::pitch::PitchClass;
use crate::profile::PitchClassProfile;
use std::fmt;

/// Tonal estimate for one track
#[derive(Debug, Clone, PartialEq)]
pub struct ToneResult {
    /// Strongest pitch class of the profile (names the key)
    pub key: PitchClass,
    /// Root of the winning scale template (may differ from `key`)
    pub scale_root: PitchClass,
    /// Coarse mode label: "major", "minor" or the lowercased scale name
    pub mode: String,
    /// Name of the winning scale template
    pub scale_name: String,
    /// Peak bin energy relative to the profile mean (1.0 = flat)
    pub key_correlation: f64,
    /// Mean profile energy on the winning scale's members
    pub scale_correlation: f64,
    /// Winning scale materialized at `scale_root`, in template order
    pub scale_pitches: Vec<PitchClass>,
}

impl ToneResult {
    /// "<key> <scale_name>", e.g. "A Natural Minor"
    pub fn key_full(&self) -> String {
        format!("{} {}", self.key, self.scale_name)
    }

    /// Scale pitch names joined with ", "
    pub fn scale_pitches_joined(&self) -> String {
        self.scale_pitches
            .iter()
            .map(|p| p.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ToneResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) key={:.3} scale={:.3}",
            self.key_full(),
            self.mode,
            self.key_correlation,
            self.scale_correlation
        )
    }
}

/// Derive the coarse mode label from a scale template name
///
/// Names containing "major" (any case) and Ionian map to "major"; names
/// containing "minor" and Aeolian map to "minor"; anything else is the
/// lowercased name.
pub fn mode_label(scale_name: &str) -> String {
    let lower = scale_name.to_lowercase();
    if lower.contains("major") || lower == "ionian" {
        "major".to_string()
    } else if lower.contains("minor") || lower == "aeolian" {
        "minor".to_string()
    } else {
        lower
    }
}

/// Strength of the dominant pitch class against a flat distribution
pub fn key_correlation(profile: &PitchClassProfile) -> f64 {
    profile.get(profile.dominant()) / profile.mean()
}

/// Major/minor guess from the third above the dominant pitch class
///
/// "major" when the major-third bin is strictly stronger than the
/// minor-third bin. Kept for comparison with older feature tables; the
/// template matcher is authoritative and the two can disagree.
pub fn third_comparison_mode(profile: &PitchClassProfile) -> &'static str {
    let root = profile.dominant();
    if profile.get(root.transpose(4)) > profile.get(root.transpose(3)) {
        "major"
    } else {
        "minor"
    }
}
