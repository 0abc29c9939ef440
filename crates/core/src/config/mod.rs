use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{DurationMode, LineStyle, Result, SonifyError};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sweep: SweepConfig,
    pub audifier: AudifierConfig,
    pub voices: VoiceConfig,
    pub overlay: LineStyle,
}

impl AppConfig {
    /// Parses a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        self.sweep.validate()?;
        self.audifier.validate()?;
        self.voices.validate()
    }
}

/// Values the user tunes while listening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Objects at or fainter than this magnitude are left out.
    pub mag_limit: f64,
    /// Background drone volume in `[0, 1]`.
    pub volume: f32,
    /// Exponent applied to `1 / magnitude` for note velocity, at least 1.
    pub dampening: f64,
    /// Length of one sweep in seconds, between 30 and 120.
    pub duration: f64,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub duration_mode: DurationMode,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            mag_limit: 5.0,
            volume: 1.0,
            dampening: 1.0,
            duration: 30.0,
            looping: true,
            duration_mode: DurationMode::Brightness,
        }
    }
}

pub const MIN_DURATION: f64 = 30.0;
pub const MAX_DURATION: f64 = 120.0;

impl SweepConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.mag_limit.is_finite() {
            return Err(invalid(format!("magnitude limit {} is not finite", self.mag_limit)));
        }
        check_volume(self.volume)?;
        check_dampening(self.dampening)?;
        check_duration(self.duration)
    }

    /// Applies a single runtime change after validating it.
    pub fn apply(&mut self, change: ConfigChange) -> Result<()> {
        match change {
            ConfigChange::MagLimit(limit) if !limit.is_finite() => {
                return Err(invalid(format!("magnitude limit {limit} is not finite")))
            }
            ConfigChange::MagLimit(limit) => self.mag_limit = limit,
            ConfigChange::Volume(volume) => {
                check_volume(volume)?;
                self.volume = volume;
            }
            ConfigChange::Dampening(dampening) => {
                check_dampening(dampening)?;
                self.dampening = dampening;
            }
            ConfigChange::Duration(duration) => {
                check_duration(duration)?;
                self.duration = duration;
            }
            ConfigChange::Loop(looping) => self.looping = looping,
            ConfigChange::DurationMode(mode) => self.duration_mode = mode,
        }
        Ok(())
    }
}

/// A single field update coming from the controls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigChange {
    MagLimit(f64),
    Volume(f32),
    Dampening(f64),
    Duration(f64),
    Loop(bool),
    DurationMode(DurationMode),
}

/// Shape of the background drone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudifierConfig {
    /// Horizontal slices per bin, one harmonic each.
    pub channels: usize,
    /// Number of oscillators, one per vertical image strip.
    pub bins: usize,
    /// Fundamental of every oscillator in Hz.
    pub base_frequency: f32,
    /// Zero harmonics inserted before the image harmonics.
    pub padding: usize,
    /// Delay between loading an image and audible playback, in seconds.
    pub pre_roll: f64,
    pub sample_rate: u32,
}

impl Default for AudifierConfig {
    fn default() -> Self {
        Self {
            channels: 100,
            bins: 400,
            base_frequency: 50.0,
            padding: 0,
            pre_roll: 1.0,
            sample_rate: 48_000,
        }
    }
}

impl AudifierConfig {
    pub fn validate(&self) -> Result<()> {
        if self.channels == 0 || self.bins == 0 {
            return Err(invalid("audifier needs at least one bin and one channel".into()));
        }
        if !(self.base_frequency > 0.0) || self.sample_rate == 0 {
            return Err(invalid("audifier frequency and sample rate must be positive".into()));
        }
        if !(self.pre_roll >= 0.0) {
            return Err(invalid(format!("pre-roll {} must not be negative", self.pre_roll)));
        }
        Ok(())
    }
}

/// Discrete-note voice pool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub count: usize,
    /// How many pixels ahead of an object the sweep line triggers it.
    pub lookahead: f64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            count: 20,
            lookahead: 5.0,
        }
    }
}

impl VoiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(invalid("voice pool needs at least one voice".into()));
        }
        if !(self.lookahead >= 0.0) {
            return Err(invalid(format!("lookahead {} must not be negative", self.lookahead)));
        }
        Ok(())
    }
}

fn invalid(message: String) -> SonifyError {
    SonifyError::InvalidConfig(message)
}

fn check_volume(volume: f32) -> Result<()> {
    if (0.0..=1.0).contains(&volume) {
        Ok(())
    } else {
        Err(invalid(format!("volume {volume} is outside 0..=1")))
    }
}

fn check_dampening(dampening: f64) -> Result<()> {
    if dampening >= 1.0 && dampening.is_finite() {
        Ok(())
    } else {
        Err(invalid(format!("dampening {dampening} must be at least 1")))
    }
}

fn check_duration(duration: f64) -> Result<()> {
    if (MIN_DURATION..=MAX_DURATION).contains(&duration) {
        Ok(())
    } else {
        Err(invalid(format!(
            "duration {duration} is outside {MIN_DURATION}..={MAX_DURATION}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_use_defaults() {
        let config = AppConfig::from_json_str(r#"{"sweep": {"duration": 60, "loop": false}}"#)
            .unwrap();
        assert_eq!(config.sweep.duration, 60.0);
        assert!(!config.sweep.looping);
        assert_eq!(config.sweep.mag_limit, 5.0);
        assert_eq!(config.audifier.bins, 400);
        assert_eq!(config.voices.count, 20);
        assert_eq!(config.overlay.color, "#ffffff");
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(AppConfig::from_json_str(r#"{"sweep": {"duration": 10}}"#).is_err());
        assert!(AppConfig::from_json_str(r#"{"sweep": {"volume": 1.5}}"#).is_err());
        assert!(AppConfig::from_json_str(r#"{"sweep": {"dampening": 0.5}}"#).is_err());
        assert!(AppConfig::from_json_str(r#"{"audifier": {"bins": 0}}"#).is_err());
        assert!(AppConfig::from_json_str(r#"{"voices": {"count": 0}}"#).is_err());
    }

    #[test]
    fn applies_runtime_changes() {
        let mut sweep = SweepConfig::default();
        sweep.apply(ConfigChange::MagLimit(7.5)).unwrap();
        sweep.apply(ConfigChange::Volume(0.25)).unwrap();
        sweep.apply(ConfigChange::Loop(false)).unwrap();
        sweep.apply(ConfigChange::DurationMode(DurationMode::Luminosity)).unwrap();
        assert_eq!(sweep.mag_limit, 7.5);
        assert_eq!(sweep.volume, 0.25);
        assert!(!sweep.looping);
        assert_eq!(sweep.duration_mode, DurationMode::Luminosity);

        assert!(sweep.apply(ConfigChange::Duration(121.0)).is_err());
        assert_eq!(sweep.duration, 30.0);
    }

    #[test]
    fn change_events_deserialise_from_json() {
        let change: ConfigChange = serde_json::from_str(r#"{"volume": 0.5}"#).unwrap();
        assert_eq!(change, ConfigChange::Volume(0.5));
    }
}
