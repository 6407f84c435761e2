//! Pitch classes and their note names
//!
//! Index 0 = C, ascending by semitone up to 11 = B. Names use sharps.

use std::fmt;

/// Number of pitch classes in an octave
pub const PITCH_CLASSES: usize = 12;

/// One of the 12 semitone pitch classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    /// All pitch classes in chroma bin order
    pub const ALL: [PitchClass; PITCH_CLASSES] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Get the pitch class for a chroma bin index (wraps modulo 12)
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % PITCH_CLASSES]
    }

    /// Chroma bin index (0-11, where 0=C)
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Move up by the given number of semitones, wrapping at the octave
    pub fn transpose(&self, semitones: u8) -> Self {
        Self::from_index(self.index() + semitones as usize)
    }

    /// Note name using sharps ("C", "C#", ..., "B")
    pub fn name(&self) -> &'static str {
        use PitchClass::*;
        match self {
            C => "C",
            CSharp => "C#",
            D => "D",
            DSharp => "D#",
            E => "E",
            F => "F",
            FSharp => "F#",
            G => "G",
            GSharp => "G#",
            A => "A",
            ASharp => "A#",
            B => "B",
        }
    }

    /// Parse a note name
    ///
    /// Accepts the sharp spellings returned by [`PitchClass::name`] and the
    /// common flat spellings as enharmonic aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        use PitchClass::*;
        let pc = match name.trim() {
            "C" | "B#" => C,
            "C#" | "Db" => CSharp,
            "D" => D,
            "D#" | "Eb" => DSharp,
            "E" | "Fb" => E,
            "F" | "E#" => F,
            "F#" | "Gb" => FSharp,
            "G" => G,
            "G#" | "Ab" => GSharp,
            "A" => A,
            "A#" | "Bb" => ASharp,
            "B" | "Cb" => B,
            _ => return None,
        };
        Some(pc)
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_roundtrip() {
        for (i, pc) in PitchClass::ALL.iter().enumerate() {
            assert_eq!(pc.index(), i);
            assert_eq!(PitchClass::from_index(i), *pc);
        }
    }

    #[test]
    fn test_from_index_wraps() {
        assert_eq!(PitchClass::from_index(12), PitchClass::C);
        assert_eq!(PitchClass::from_index(23), PitchClass::B);
    }

    #[test]
    fn test_transpose() {
        assert_eq!(PitchClass::A.transpose(3), PitchClass::C);
        assert_eq!(PitchClass::B.transpose(1), PitchClass::C);
        assert_eq!(PitchClass::D.transpose(0), PitchClass::D);
    }

    #[test]
    fn test_names() {
        let names: Vec<&str> = PitchClass::ALL.iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec!["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"]
        );
        assert_eq!(PitchClass::FSharp.to_string(), "F#");
    }

    #[test]
    fn test_from_name_enharmonic() {
        assert_eq!(PitchClass::from_name("Db"), Some(PitchClass::CSharp));
        assert_eq!(PitchClass::from_name("A#"), Some(PitchClass::ASharp));
        assert_eq!(PitchClass::from_name("Bb"), Some(PitchClass::ASharp));
        assert_eq!(PitchClass::from_name("H"), None);
    }
}
