use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{QueueEntry, SpectralType};

/// Note letters indexed by `6 - spectral_class`, so cooler stars sound higher.
pub const NOTES: [&str; 8] = ["C", "D", "E", "F", "G", "A", "B", "B#"];

/// Note value per luminosity index, used by [`DurationMode::Luminosity`].
pub const LUMINOSITY_NOTE_VALUES: [NoteValue; 8] = [
    NoteValue::Whole,
    NoteValue::Half,
    NoteValue::Quarter,
    NoteValue::Eighth,
    NoteValue::Sixteenth,
    NoteValue::Sixteenth,
    NoteValue::Sixteenth,
    NoteValue::Sixteenth,
];

/// Amplitude applied on top of the magnitude velocity.
pub const VOICE_AMPLITUDE: f32 = 0.5;

/// Tempo used when converting note values to seconds.
pub const DEFAULT_BPM: f64 = 120.0;

/// Musical note length expressed the way tone generators name them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteValue {
    #[serde(rename = "1n")]
    Whole,
    #[serde(rename = "2n")]
    Half,
    #[serde(rename = "4n")]
    Quarter,
    #[serde(rename = "8n")]
    Eighth,
    #[serde(rename = "16n")]
    Sixteenth,
}

impl NoteValue {
    /// Short form used by tone generators, e.g. `"4n"`.
    pub fn token(&self) -> &'static str {
        match self {
            NoteValue::Whole => "1n",
            NoteValue::Half => "2n",
            NoteValue::Quarter => "4n",
            NoteValue::Eighth => "8n",
            NoteValue::Sixteenth => "16n",
        }
    }

    /// Length in beats, where a quarter note is one beat.
    pub fn beats(&self) -> f64 {
        match self {
            NoteValue::Whole => 4.0,
            NoteValue::Half => 2.0,
            NoteValue::Quarter => 1.0,
            NoteValue::Eighth => 0.5,
            NoteValue::Sixteenth => 0.25,
        }
    }

    /// Length in seconds at `bpm` beats per minute.
    pub fn seconds(&self, bpm: f64) -> f64 {
        self.beats() * 60.0 / bpm.max(f64::EPSILON)
    }
}

impl fmt::Display for NoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Selects which table decides how long a triggered note rings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationMode {
    /// Tiered by apparent magnitude relative to the magnitude limit.
    #[default]
    Brightness,
    /// Looked up from the luminosity class.
    Luminosity,
}

/// Settings that shape the note derived from a queue entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappingSettings {
    pub dampening: f64,
    pub mag_limit: f64,
    pub duration_mode: DurationMode,
}

/// Concrete note routed to a voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteParameters {
    /// Note name with octave, e.g. `"E7"`.
    pub note: String,
    pub value: NoteValue,
    /// Amplitude handed to the voice, already scaled by [`VOICE_AMPLITUDE`].
    pub velocity: f32,
}

impl NoteParameters {
    /// Derives the note to play when the sweep line reaches `entry`.
    pub fn for_entry(entry: &QueueEntry, settings: &MappingSettings) -> Self {
        let value = match settings.duration_mode {
            DurationMode::Brightness => brightness_note_value(entry.magnitude, settings.mag_limit),
            DurationMode::Luminosity => luminosity_note_value(&entry.spectral),
        };

        Self {
            note: note_name(&entry.spectral),
            value,
            velocity: VOICE_AMPLITUDE * velocity(entry.magnitude, settings.dampening) as f32,
        }
    }
}

/// Note letter from the spectral class followed by the luminosity octave.
pub fn note_name(spectral: &SpectralType) -> String {
    let index = 6usize.saturating_sub(spectral.spectral_class as usize);
    format!("{}{}", NOTES[index.min(NOTES.len() - 1)], spectral.luminosity_class)
}

/// Loudness in `(0, 1]`. Anything brighter than magnitude 1 plays at full
/// velocity; fainter objects fall off as `(1 / magnitude)^dampening`.
pub fn velocity(magnitude: f64, dampening: f64) -> f64 {
    if magnitude < 1.0 {
        1.0
    } else {
        (1.0 / magnitude).powf(dampening)
    }
}

/// Brighter objects ring longer: below magnitude 2 a quarter, below half the
/// limit an eighth, anything fainter a sixteenth.
pub fn brightness_note_value(magnitude: f64, mag_limit: f64) -> NoteValue {
    if magnitude < 2.0 {
        NoteValue::Quarter
    } else if magnitude < mag_limit / 2.0 {
        NoteValue::Eighth
    } else {
        NoteValue::Sixteenth
    }
}

/// Note value looked up from the luminosity octave.
pub fn luminosity_note_value(spectral: &SpectralType) -> NoteValue {
    LUMINOSITY_NOTE_VALUES
        .get(spectral.luminosity_class as usize)
        .copied()
        .unwrap_or(NoteValue::Sixteenth)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(magnitude: f64, sp_type: &str) -> QueueEntry {
        QueueEntry {
            x: 0.0,
            magnitude,
            spectral: SpectralType::parse(sp_type),
        }
    }

    fn settings(dampening: f64) -> MappingSettings {
        MappingSettings {
            dampening,
            mag_limit: 5.0,
            duration_mode: DurationMode::Brightness,
        }
    }

    #[test]
    fn note_names_combine_letter_and_octave() {
        assert_eq!(note_name(&SpectralType::parse("G2V")), "E7");
        assert_eq!(note_name(&SpectralType::parse("M2Ia")), "C1");
        assert_eq!(note_name(&SpectralType::parse("O5III")), "B5");
    }

    #[test]
    fn velocity_is_full_for_bright_objects() {
        for magnitude in [-1.5, 0.0, 0.3, 0.999] {
            assert_eq!(velocity(magnitude, 2.0), 1.0);
        }
    }

    #[test]
    fn velocity_strictly_decreases_with_magnitude() {
        for dampening in [1.0, 1.5, 3.0] {
            let mut previous = velocity(1.0, dampening);
            let mut magnitude = 1.25;
            while magnitude < 12.0 {
                let current = velocity(magnitude, dampening);
                assert!(current < previous, "m={magnitude} d={dampening}");
                previous = current;
                magnitude += 0.25;
            }
        }
    }

    #[test]
    fn higher_dampening_compresses_faint_objects() {
        assert!(velocity(4.0, 3.0) < velocity(4.0, 1.0));
    }

    #[test]
    fn brightness_tiers_follow_the_limit() {
        assert_eq!(brightness_note_value(0.5, 5.0), NoteValue::Quarter);
        assert_eq!(brightness_note_value(1.5, 5.0), NoteValue::Quarter);
        assert_eq!(brightness_note_value(2.2, 5.0), NoteValue::Eighth);
        assert_eq!(brightness_note_value(3.0, 5.0), NoteValue::Sixteenth);
        assert_eq!(brightness_note_value(4.9, 5.0), NoteValue::Sixteenth);
    }

    #[test]
    fn parameters_scale_velocity_by_voice_amplitude() {
        let params = NoteParameters::for_entry(&entry(3.0, "G2V"), &settings(2.0));
        assert_eq!(params.note, "E7");
        assert_eq!(params.value, NoteValue::Sixteenth);
        let expected = 0.5 * (1.0f64 / 3.0).powi(2);
        assert!((params.velocity as f64 - expected).abs() < 1e-6);
    }

    #[test]
    fn luminosity_mode_uses_octave_table() {
        let settings = MappingSettings {
            duration_mode: DurationMode::Luminosity,
            ..settings(1.0)
        };
        let params = NoteParameters::for_entry(&entry(3.0, "M2Ia"), &settings);
        assert_eq!(params.value, NoteValue::Half);
    }

    #[test]
    fn note_values_convert_to_seconds() {
        assert!((NoteValue::Quarter.seconds(DEFAULT_BPM) - 0.5).abs() < 1e-12);
        assert!((NoteValue::Whole.seconds(60.0) - 4.0).abs() < 1e-12);
        assert_eq!(NoteValue::Sixteenth.to_string(), "16n");
    }
}
