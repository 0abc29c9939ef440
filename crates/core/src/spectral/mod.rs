//! Parsing of catalog spectral-type strings such as `"G2V"` or `"M1.5Iab"`.
//!
//! The parser is total: every string, including empty and malformed ones,
//! yields a [`SpectralType`]. Unrecognised parts fall back to the defaults.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Harvard spectral letters, hottest first. The index is the spectral class.
pub const SPECTRAL_CLASSES: [char; 7] = ['O', 'B', 'A', 'F', 'G', 'K', 'M'];

/// Yerkes luminosity tokens in match priority order. A string containing
/// several tokens matches whichever comes first here.
pub const LUMINOSITY_TOKENS: [&str; 8] = ["IV", "V", "III", "II", "0", "Iab", "Ia", "Ib"];

/// Octave index assigned to each entry of [`LUMINOSITY_TOKENS`].
pub const LUMINOSITY_INDICES: [u8; 8] = [6, 7, 5, 4, 0, 3, 1, 2];

/// Spectral class used when the first character is not a known letter ('G').
pub const DEFAULT_SPECTRAL_CLASS: u8 = 4;

/// Luminosity index used when no token is found.
pub const DEFAULT_LUMINOSITY_CLASS: u8 = 6;

/// Parsed spectral classification of a single catalog object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpectralType {
    /// Index into [`SPECTRAL_CLASSES`], in `0..=6`.
    pub spectral_class: u8,
    /// Octave index taken from [`LUMINOSITY_INDICES`], in `0..=7`.
    pub luminosity_class: u8,
}

impl Default for SpectralType {
    fn default() -> Self {
        Self {
            spectral_class: DEFAULT_SPECTRAL_CLASS,
            luminosity_class: DEFAULT_LUMINOSITY_CLASS,
        }
    }
}

impl SpectralType {
    /// Parses a raw spectral-type string.
    pub fn parse(raw: &str) -> Self {
        let spectral_class = raw
            .chars()
            .next()
            .and_then(|first| SPECTRAL_CLASSES.iter().position(|&letter| letter == first))
            .map(|index| index as u8)
            .unwrap_or(DEFAULT_SPECTRAL_CLASS);

        // Octave 0 is a real match for the "0" token.
        let luminosity_class = LUMINOSITY_TOKENS
            .iter()
            .position(|token| raw.contains(token))
            .map(|index| LUMINOSITY_INDICES[index])
            .unwrap_or(DEFAULT_LUMINOSITY_CLASS);

        Self {
            spectral_class,
            luminosity_class,
        }
    }

    /// Spectral letter for this classification.
    pub fn letter(&self) -> char {
        SPECTRAL_CLASSES
            .get(self.spectral_class as usize)
            .copied()
            .unwrap_or(SPECTRAL_CLASSES[DEFAULT_SPECTRAL_CLASS as usize])
    }

    /// Luminosity token that maps to this octave index, if any.
    pub fn luminosity_token(&self) -> Option<&'static str> {
        LUMINOSITY_INDICES
            .iter()
            .position(|&index| index == self.luminosity_class)
            .map(|position| LUMINOSITY_TOKENS[position])
    }
}

impl From<&str> for SpectralType {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl fmt::Display for SpectralType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.luminosity_token() {
            Some(token) => write!(f, "{}{}", self.letter(), token),
            None => write!(f, "{}", self.letter()),
        }
    }
}
