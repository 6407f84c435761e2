//! Scale templates and the static scale catalog
//!
//! A template is a named set of semitone offsets from a root. The catalog
//! order is significant: it is the first tie-break key of the matcher.

use crate::error::AnalysisError;
use crate::pitch::{PitchClass, PITCH_CLASSES};
use std::sync::{Arc, OnceLock};

/// Built-in templates in tie-break order
///
/// Ionian and Aeolian duplicate Major and Natural Minor; the earlier entry
/// wins an exact tie.
const STANDARD_SCALES: &[(&str, &[u8])] = &[
    ("Major", &[0, 2, 4, 5, 7, 9, 11]),
    ("Ionian", &[0, 2, 4, 5, 7, 9, 11]),
    ("Natural Minor", &[0, 2, 3, 5, 7, 8, 10]),
    ("Aeolian", &[0, 2, 3, 5, 7, 8, 10]),
    ("Harmonic Minor", &[0, 2, 3, 5, 7, 8, 11]),
    ("Melodic Minor", &[0, 2, 3, 5, 7, 9, 11]),
    ("Dorian", &[0, 2, 3, 5, 7, 9, 10]),
    ("Phrygian", &[0, 1, 3, 5, 7, 8, 10]),
    ("Lydian", &[0, 2, 4, 6, 7, 9, 11]),
    ("Mixolydian", &[0, 2, 4, 5, 7, 9, 10]),
    ("Locrian", &[0, 1, 3, 5, 6, 8, 10]),
    ("Major Pentatonic", &[0, 2, 4, 7, 9]),
    ("Minor Pentatonic", &[0, 3, 5, 7, 10]),
    ("Blues", &[0, 3, 5, 6, 7, 10]),
    ("Harmonic Major", &[0, 2, 4, 5, 7, 8, 11]),
    ("Neapolitan Major", &[0, 1, 3, 5, 7, 9, 11]),
    ("Neapolitan Minor", &[0, 1, 3, 5, 7, 8, 11]),
    ("Hungarian Minor", &[0, 2, 3, 6, 7, 8, 11]),
    ("Enigmatic", &[0, 1, 4, 6, 8, 10, 11]),
    ("Hijaz", &[0, 1, 4, 5, 7, 8, 10]),
];

const MAJOR_MINOR_SCALES: &[(&str, &[u8])] = &[
    ("Major", &[0, 2, 4, 5, 7, 9, 11]),
    ("Natural Minor", &[0, 2, 3, 5, 7, 8, 10]),
];

static STANDARD: OnceLock<Arc<ScaleCatalog>> = OnceLock::new();

/// A named scale: unique semitone offsets in 0..=11, always containing 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleTemplate {
    name: String,
    offsets: Vec<u8>,
}

impl ScaleTemplate {
    /// Create a validated template
    ///
    /// Offsets keep their given order; that order is also the order of
    /// materialized pitches.
    pub fn new(name: impl Into<String>, offsets: &[u8]) -> Result<Self, AnalysisError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AnalysisError::malformed(&name, "empty name"));
        }
        if offsets.is_empty() {
            return Err(AnalysisError::malformed(&name, "no offsets"));
        }

        let mut seen = [false; PITCH_CLASSES];
        for &offset in offsets {
            let slot = seen.get_mut(offset as usize).ok_or_else(|| {
                AnalysisError::malformed(&name, format!("offset {} outside 0..=11", offset))
            })?;
            if *slot {
                return Err(AnalysisError::malformed(
                    &name,
                    format!("duplicate offset {}", offset),
                ));
            }
            *slot = true;
        }
        if !seen[0] {
            return Err(AnalysisError::malformed(&name, "root offset 0 missing"));
        }

        Ok(Self {
            name,
            offsets: offsets.to_vec(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offsets(&self) -> &[u8] {
        &self.offsets
    }

    /// Number of scale members
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Concrete pitch classes of this scale placed at `root`, in offset order
    pub fn pitches(&self, root: PitchClass) -> Vec<PitchClass> {
        self.offsets.iter().map(|&o| root.transpose(o)).collect()
    }
}

/// Ordered, immutable collection of scale templates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleCatalog {
    templates: Vec<ScaleTemplate>,
}

impl ScaleCatalog {
    /// Build a catalog from already validated templates
    ///
    /// Rejects an empty catalog and duplicate names.
    pub fn new(templates: Vec<ScaleTemplate>) -> Result<Self, AnalysisError> {
        if templates.is_empty() {
            return Err(AnalysisError::malformed("<catalog>", "catalog is empty"));
        }
        for (i, t) in templates.iter().enumerate() {
            if templates[..i].iter().any(|other| other.name == t.name) {
                return Err(AnalysisError::malformed(&t.name, "duplicate template name"));
            }
        }
        Ok(Self { templates })
    }

    /// Build and validate a catalog from a `(name, offsets)` table
    pub fn from_table(table: &[(&str, &[u8])]) -> Result<Self, AnalysisError> {
        let templates = table
            .iter()
            .map(|(name, offsets)| ScaleTemplate::new(*name, offsets))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(templates)
    }

    /// The shared built-in catalog
    ///
    /// Built and validated on first use. A malformed built-in table is a
    /// programming error and aborts the process.
    pub fn standard() -> Arc<ScaleCatalog> {
        STANDARD
            .get_or_init(|| match Self::from_table(STANDARD_SCALES) {
                Ok(catalog) => Arc::new(catalog),
                Err(e) => panic!("built-in scale catalog is invalid: {}", e),
            })
            .clone()
    }

    /// Two-template catalog (Major, Natural Minor) for plain major/minor detection
    pub fn major_minor() -> Result<Self, AnalysisError> {
        Self::from_table(MAJOR_MINOR_SCALES)
    }

    /// Look up a template by exact name
    pub fn by_name(&self, name: &str) -> Option<&ScaleTemplate> {
        self.templates.iter().find(|t| t.name == name)
    }

    /// Text identifying the catalog's contents, order included
    ///
    /// Two catalogs yield the same fingerprint exactly when they hold the
    /// same templates in the same order.
    pub fn fingerprint(&self) -> String {
        self.templates
            .iter()
            .map(|t| {
                let offsets: Vec<String> = t.offsets.iter().map(|o| o.to_string()).collect();
                format!("{}:{}", t.name, offsets.join("."))
            })
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScaleTemplate> {
        self.templates.iter()
    }

    pub fn templates(&self) -> &[ScaleTemplate] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_is_valid() {
        let catalog = ScaleCatalog::standard();
        assert_eq!(catalog.len(), STANDARD_SCALES.len());
        for t in catalog.iter() {
            assert!(t.offsets().contains(&0), "{} lacks root", t.name());
            assert!(t.offsets().iter().all(|&o| o < 12));
            let mut sorted = t.offsets().to_vec();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), t.len(), "{} has duplicates", t.name());
        }
    }

    #[test]
    fn test_standard_catalog_contents() {
        let catalog = ScaleCatalog::standard();
        for name in [
            "Major",
            "Ionian",
            "Natural Minor",
            "Aeolian",
            "Harmonic Minor",
            "Melodic Minor",
            "Dorian",
            "Phrygian",
            "Lydian",
            "Mixolydian",
            "Locrian",
            "Major Pentatonic",
            "Minor Pentatonic",
            "Blues",
            "Harmonic Major",
            "Neapolitan Major",
            "Neapolitan Minor",
            "Hungarian Minor",
            "Enigmatic",
            "Hijaz",
        ] {
            assert!(catalog.by_name(name).is_some(), "missing {}", name);
        }
        assert_eq!(
            catalog.by_name("Major").unwrap().offsets(),
            catalog.by_name("Ionian").unwrap().offsets()
        );
        assert_eq!(catalog.templates()[0].name(), "Major");
    }

    #[test]
    fn test_standard_is_shared() {
        let a = ScaleCatalog::standard();
        let b = ScaleCatalog::standard();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_offset_out_of_range_rejected() {
        let err = ScaleTemplate::new("Broken", &[0, 4, 12]).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedCatalog { .. }));
    }

    #[test]
    fn test_duplicate_offset_rejected() {
        assert!(ScaleTemplate::new("Broken", &[0, 4, 4, 7]).is_err());
    }

    #[test]
    fn test_missing_root_rejected() {
        assert!(ScaleTemplate::new("Rootless", &[2, 4, 7]).is_err());
    }

    #[test]
    fn test_empty_offsets_rejected() {
        assert!(ScaleTemplate::new("Nothing", &[]).is_err());
    }

    #[test]
    fn test_malformed_table_rejected() {
        let table: &[(&str, &[u8])] = &[("Major", &[0, 2, 4]), ("Bad", &[1, 2])];
        assert!(ScaleCatalog::from_table(table).is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let t = ScaleTemplate::new("Major", &[0, 4, 7]).unwrap();
        assert!(ScaleCatalog::new(vec![t.clone(), t]).is_err());
        assert!(ScaleCatalog::new(Vec::new()).is_err());
    }

    #[test]
    fn test_fingerprint_tracks_contents() {
        let standard = ScaleCatalog::standard().fingerprint();
        let simple = ScaleCatalog::major_minor().unwrap().fingerprint();
        assert_eq!(simple, "Major:0.2.4.5.7.9.11;Natural Minor:0.2.3.5.7.8.10");
        assert_ne!(standard, simple);
        assert_eq!(standard, ScaleCatalog::from_table(STANDARD_SCALES).unwrap().fingerprint());

        let swapped = ScaleCatalog::from_table(&[MAJOR_MINOR_SCALES[1], MAJOR_MINOR_SCALES[0]])
            .unwrap()
            .fingerprint();
        assert_ne!(swapped, simple);
    }

    #[test]
    fn test_major_minor_catalog() {
        let catalog = ScaleCatalog::major_minor().unwrap();
        let names: Vec<&str> = catalog.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["Major", "Natural Minor"]);
    }

    #[test]
    fn test_pitches_of_d_major() {
        let catalog = ScaleCatalog::standard();
        let major = catalog.by_name("Major").unwrap();
        let names: Vec<&str> = major
            .pitches(PitchClass::D)
            .iter()
            .map(|p| p.name())
            .collect();
        assert_eq!(names, vec!["D", "E", "F#", "G", "A", "B", "C#"]);
    }

    #[test]
    fn test_pitches_keep_offset_order() {
        let t = ScaleTemplate::new("Custom", &[0, 7, 4]).unwrap();
        assert_eq!(
            t.pitches(PitchClass::C),
            vec![PitchClass::C, PitchClass::G, PitchClass::E]
        );
    }
}
