//! Background drone: every vertical strip of the image becomes one oscillator
//! whose harmonic spectrum is the brightness profile of that strip. The sweep
//! crossfades between neighbouring strips as it moves.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{AudifierConfig, AudioClock, ImageRegion, OscillatorBank, Result, SonifyError};

/// Harmonic series for one oscillator, cosine terms in `real` and sine
/// terms in `imag`. Index 0 is the DC term and is ignored when rendering.
/// Amplitudes are used as-is, without normalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodicWave {
    pub real: Vec<f32>,
    pub imag: Vec<f32>,
}

impl PeriodicWave {
    /// Magnitude-only wave: `padding` zero harmonics then `amplitudes`.
    pub fn from_amplitudes(amplitudes: &[f32], padding: usize) -> Self {
        let mut real = vec![0.0; padding];
        real.extend_from_slice(amplitudes);
        let imag = vec![0.0; real.len()];
        Self { real, imag }
    }

    pub fn len(&self) -> usize {
        self.real.len()
    }

    pub fn is_empty(&self) -> bool {
        self.real.is_empty()
    }
}

/// Computes the harmonic amplitudes of one bin: for each of `channels`
/// horizontal slices, the squared mean luminance divided by `channels`.
pub fn bin_amplitudes(region: &ImageRegion, bin: usize, bins: usize, channels: usize) -> Vec<f32> {
    let x_len = region.width as usize / bins;
    let y_len = region.height as usize / channels;
    if x_len == 0 || y_len == 0 {
        return vec![0.0; channels];
    }

    let cell = (x_len * y_len) as f32;
    (0..channels)
        .map(|channel| {
            let mut sum = 0.0;
            for y in channel * y_len..(channel + 1) * y_len {
                for x in bin * x_len..(bin + 1) * x_len {
                    sum += region.luminance(x as u32, y as u32);
                }
            }
            let mean = sum / cell;
            mean * mean / channels as f32
        })
        .collect()
}

/// Owns the oscillator bank and the master gain of the drone.
pub struct BackgroundAudifier {
    bank: Box<dyn OscillatorBank>,
    clock: Arc<dyn AudioClock>,
    config: AudifierConfig,
    gains: Vec<f32>,
    /// Bins currently holding a non-zero gain.
    active: Vec<usize>,
    volume: f32,
    started: bool,
    playing: bool,
    start_time: f64,
}

impl BackgroundAudifier {
    pub fn new(
        bank: Box<dyn OscillatorBank>,
        clock: Arc<dyn AudioClock>,
        config: AudifierConfig,
    ) -> Result<Self> {
        config.validate()?;
        if bank.len() != config.bins {
            return Err(SonifyError::InvalidConfig(format!(
                "oscillator bank has {} oscillators but {} bins are configured",
                bank.len(),
                config.bins
            )));
        }

        Ok(Self {
            bank,
            clock,
            gains: vec![0.0; config.bins],
            config,
            active: Vec::with_capacity(2),
            volume: 1.0,
            started: false,
            playing: false,
            start_time: 0.0,
        })
    }

    /// Installs one periodic wave per bin computed from `region`, then sets
    /// the start time one pre-roll after now so the oscillators can settle.
    pub fn set_image(&mut self, region: &ImageRegion) -> Result<()> {
        let AudifierConfig {
            bins,
            channels,
            padding,
            ..
        } = self.config;

        if (region.width as usize) < bins || (region.height as usize) < channels {
            tracing::warn!(
                width = region.width,
                height = region.height,
                bins,
                channels,
                "image smaller than the oscillator grid, drone will be silent"
            );
        }

        for bin in 0..bins {
            let amplitudes = bin_amplitudes(region, bin, bins, channels);
            let wave = PeriodicWave::from_amplitudes(&amplitudes, padding);
            self.bank.set_periodic_wave(bin, &wave)?;
        }

        self.start_time = self.clock.now() + self.config.pre_roll;
        tracing::debug!(bins, channels, start_time = self.start_time, "image loaded");
        Ok(())
    }

    /// Crossfades the two bins around `progress * bins`. Every other bin
    /// ends up silent, including bins left over from an earlier position.
    pub fn advance(&mut self, progress: f64) {
        let bins = self.gains.len();
        let scaled = progress.clamp(0.0, 1.0) * bins as f64;
        let mut current = scaled.floor() as usize;
        let mut dist = scaled - current as f64;
        if current >= bins {
            current = bins - 1;
            dist = 1.0;
        }

        let mut next = vec![(current, dist as f32)];
        if current + 1 < bins {
            next.push((current + 1, (1.0 - dist) as f32));
        }

        let stale: Vec<usize> = self
            .active
            .iter()
            .copied()
            .filter(|bin| next.iter().all(|(target, _)| target != bin))
            .collect();
        for bin in stale {
            self.set_gain(bin, 0.0);
        }

        self.active.clear();
        for (bin, gain) in next {
            self.set_gain(bin, gain);
            if gain != 0.0 {
                self.active.push(bin);
            }
        }
    }

    /// Sets the master volume. Audible immediately only while playing.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if self.playing {
            self.bank.set_master_gain(self.volume);
        }
    }

    /// Resumes the output and starts the oscillators the first time round.
    pub fn play(&mut self) -> Result<()> {
        self.bank.resume()?;
        if !self.started {
            self.bank.start()?;
            self.started = true;
        }
        self.playing = true;
        self.bank.set_master_gain(self.volume);
        Ok(())
    }

    /// Silences the master gain and every bin.
    pub fn stop(&mut self) {
        self.playing = false;
        self.bank.set_master_gain(0.0);
        for bin in 0..self.gains.len() {
            self.set_gain(bin, 0.0);
        }
        self.active.clear();
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn gains(&self) -> &[f32] {
        &self.gains
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn config(&self) -> &AudifierConfig {
        &self.config
    }

    pub fn bank(&self) -> &dyn OscillatorBank {
        self.bank.as_ref()
    }

    pub fn bank_mut(&mut self) -> &mut dyn OscillatorBank {
        self.bank.as_mut()
    }

    fn set_gain(&mut self, bin: usize, gain: f32) {
        self.gains[bin] = gain;
        self.bank.set_bin_gain(bin, gain);
    }
}

impl fmt::Debug for BackgroundAudifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundAudifier")
            .field("config", &self.config)
            .field("active", &self.active)
            .field("volume", &self.volume)
            .field("started", &self.started)
            .field("playing", &self.playing)
            .field("start_time", &self.start_time)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ManualClock, WavetableBank};

    fn config(bins: usize, channels: usize) -> AudifierConfig {
        AudifierConfig {
            bins,
            channels,
            ..AudifierConfig::default()
        }
    }

    fn audifier(bins: usize, channels: usize, clock: &ManualClock) -> BackgroundAudifier {
        let config = config(bins, channels);
        let bank = WavetableBank::new(&config);
        BackgroundAudifier::new(Box::new(bank), Arc::new(clock.clone()), config).unwrap()
    }

    #[test]
    fn amplitudes_square_the_mean_luminance() {
        // Left half white, right half black; top row grey.
        let mut region = ImageRegion::filled(4, 4, [0, 0, 0, 255]);
        for y in 0..4u32 {
            for x in 0..2u32 {
                let offset = 4 * (y * 4 + x) as usize;
                let level = if y < 2 { 51 } else { 255 };
                region.data[offset..offset + 3].copy_from_slice(&[level, level, level]);
            }
        }

        let left = bin_amplitudes(&region, 0, 2, 2);
        assert!((left[0] - 0.2 * 0.2 / 2.0).abs() < 1e-6);
        assert!((left[1] - 0.5).abs() < 1e-6);
        assert_eq!(bin_amplitudes(&region, 1, 2, 2), vec![0.0, 0.0]);
    }

    #[test]
    fn degenerate_grid_is_silent() {
        let region = ImageRegion::filled(3, 3, [255, 255, 255, 255]);
        assert_eq!(bin_amplitudes(&region, 0, 4, 2), vec![0.0, 0.0]);
    }

    #[test]
    fn waves_are_padded_with_zero_harmonics() {
        let wave = PeriodicWave::from_amplitudes(&[0.5, 0.25], 2);
        assert_eq!(wave.real, vec![0.0, 0.0, 0.5, 0.25]);
        assert_eq!(wave.imag, vec![0.0; 4]);
    }

    #[test]
    fn exactly_two_neighbouring_bins_sound() {
        let clock = ManualClock::new();
        let mut audifier = audifier(400, 4, &clock);

        let mut progress = 0.00123;
        while progress < 0.995 {
            audifier.advance(progress);
            let audible: Vec<(usize, f32)> = audifier
                .gains()
                .iter()
                .copied()
                .enumerate()
                .filter(|(_, gain)| *gain != 0.0)
                .collect();

            let current = (progress * 400.0).floor() as usize;
            assert_eq!(audible.len(), 2, "progress {progress}");
            assert_eq!(audible[0].0, current);
            assert_eq!(audible[1].0, current + 1);
            let sum: f32 = audible.iter().map(|(_, gain)| gain).sum();
            assert!((sum - 1.0).abs() < 1e-5);

            progress += 0.03717;
        }
    }

    #[test]
    fn jumping_back_silences_the_old_position() {
        let clock = ManualClock::new();
        let mut audifier = audifier(10, 2, &clock);
        audifier.advance(0.95);
        audifier.advance(0.05);
        let audible = audifier.gains().iter().filter(|gain| **gain != 0.0).count();
        assert_eq!(audible, 2);
        assert_eq!(audifier.gains()[9], 0.0);
    }

    #[test]
    fn end_of_sweep_keeps_last_bin() {
        let clock = ManualClock::new();
        let mut audifier = audifier(10, 2, &clock);
        audifier.advance(1.0);
        assert_eq!(audifier.gains()[9], 1.0);
        assert_eq!(audifier.gains().iter().filter(|gain| **gain != 0.0).count(), 1);
    }

    #[test]
    fn image_sets_start_time_after_pre_roll() {
        let clock = ManualClock::new();
        clock.set(3.0).unwrap();
        let mut audifier = audifier(4, 2, &clock);
        audifier
            .set_image(&ImageRegion::filled(8, 4, [128, 128, 128, 255]))
            .unwrap();
        assert!((audifier.start_time() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn stop_twice_leaves_everything_silent() {
        let clock = ManualClock::new();
        let mut audifier = audifier(10, 2, &clock);
        audifier.play().unwrap();
        audifier.advance(0.42);
        audifier.stop();
        audifier.stop();
        assert!(!audifier.is_playing());
        assert!(audifier.gains().iter().all(|gain| *gain == 0.0));
    }

    #[test]
    fn volume_changes_are_remembered_while_stopped() {
        let clock = ManualClock::new();
        let mut audifier = audifier(4, 2, &clock);
        audifier.set_volume(0.3);
        audifier.play().unwrap();
        assert_eq!(audifier.volume(), 0.3);
        audifier.set_volume(2.0);
        assert_eq!(audifier.volume(), 1.0);
    }

    #[test]
    fn bank_size_must_match_bins() {
        let clock = ManualClock::new();
        let bank = WavetableBank::new(&config(8, 2));
        let result =
            BackgroundAudifier::new(Box::new(bank), Arc::new(clock), config(10, 2));
        assert!(result.is_err());
    }
}
