use std::{fmt, sync::Arc};

use realfft::{num_complex::Complex32, ComplexToReal, RealFftPlanner};

use crate::{AudifierConfig, OscillatorBank, PeriodicWave, Result, SonifyError};

/// Samples per wavetable cycle.
pub const TABLE_SIZE: usize = 2048;

/// Turns harmonic series into single-cycle wavetables with an inverse FFT.
pub struct WavetableSynth {
    size: usize,
    plan: Arc<dyn ComplexToReal<f32>>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl WavetableSynth {
    pub fn new(size: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_inverse(size);
        let spectrum = plan.make_input_vec();
        let scratch = plan.make_scratch_vec();
        Self {
            size,
            plan,
            spectrum,
            scratch,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Renders `sum(real[k] cos(k t) + imag[k] sin(k t))` over one cycle.
    /// The DC term and harmonics at or above Nyquist are dropped.
    pub fn render(&mut self, wave: &PeriodicWave) -> Result<Vec<f32>> {
        let nyquist = self.size / 2;
        self.spectrum.fill(Complex32::new(0.0, 0.0));
        for (k, (re, im)) in wave.real.iter().zip(&wave.imag).enumerate().take(nyquist).skip(1) {
            self.spectrum[k] = Complex32::new(re / 2.0, -im / 2.0);
        }

        let mut table = self.plan.make_output_vec();
        self.plan
            .process_with_scratch(&mut self.spectrum, &mut table, &mut self.scratch)?;
        Ok(table)
    }
}

impl fmt::Debug for WavetableSynth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WavetableSynth")
            .field("size", &self.size)
            .finish()
    }
}

/// Software oscillator bank. All oscillators share one fundamental and one
/// phase, so only the bins with a non-zero gain cost anything to render.
#[derive(Debug)]
pub struct WavetableBank {
    synth: WavetableSynth,
    tables: Vec<Vec<f32>>,
    gains: Vec<f32>,
    master_gain: f32,
    phase: f32,
    phase_step: f32,
    running: bool,
    started: bool,
}

impl WavetableBank {
    pub fn new(config: &AudifierConfig) -> Self {
        let phase_step = config.base_frequency * TABLE_SIZE as f32 / config.sample_rate.max(1) as f32;
        Self {
            synth: WavetableSynth::new(TABLE_SIZE),
            tables: vec![vec![0.0; TABLE_SIZE]; config.bins],
            gains: vec![0.0; config.bins],
            master_gain: 0.0,
            phase: 0.0,
            phase_step,
            running: false,
            started: false,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    pub fn bin_gain(&self, bin: usize) -> f32 {
        self.gains.get(bin).copied().unwrap_or(0.0)
    }

    pub fn table(&self, bin: usize) -> Option<&[f32]> {
        self.tables.get(bin).map(Vec::as_slice)
    }

    fn sample(table: &[f32], phase: f32) -> f32 {
        let index = phase as usize % TABLE_SIZE;
        let next = (index + 1) % TABLE_SIZE;
        let frac = phase.fract();
        table[index] + (table[next] - table[index]) * frac
    }
}

impl OscillatorBank for WavetableBank {
    fn len(&self) -> usize {
        self.tables.len()
    }

    fn resume(&mut self) -> Result<()> {
        self.running = true;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if !self.running {
            return Err(SonifyError::AudioUnavailable(
                "oscillators started before the output was resumed".into(),
            ));
        }
        self.started = true;
        Ok(())
    }

    fn set_periodic_wave(&mut self, bin: usize, wave: &PeriodicWave) -> Result<()> {
        if bin >= self.tables.len() {
            return Err(SonifyError::InvalidInput("bin index outside the oscillator bank"));
        }
        self.tables[bin] = self.synth.render(wave)?;
        Ok(())
    }

    fn set_bin_gain(&mut self, bin: usize, gain: f32) {
        if let Some(slot) = self.gains.get_mut(bin) {
            *slot = gain;
        }
    }

    fn set_master_gain(&mut self, gain: f32) {
        self.master_gain = gain;
    }

    fn render(&mut self, output: &mut [f32]) {
        if !self.started || !self.running {
            output.fill(0.0);
            return;
        }

        let audible: Vec<(usize, f32)> = self
            .gains
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, gain)| *gain != 0.0)
            .collect();

        for sample in output.iter_mut() {
            let mut value = 0.0;
            for &(bin, gain) in &audible {
                value += Self::sample(&self.tables[bin], self.phase) * gain;
            }
            *sample = value * self.master_gain;
            self.phase = (self.phase + self.phase_step) % TABLE_SIZE as f32;
        }
    }
}

/// Root mean square of a block of samples.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(bins: usize) -> AudifierConfig {
        AudifierConfig {
            bins,
            channels: 4,
            base_frequency: 100.0,
            sample_rate: 48_000,
            ..AudifierConfig::default()
        }
    }

    #[test]
    fn fundamental_renders_a_cosine() {
        let mut synth = WavetableSynth::new(64);
        let table = synth
            .render(&PeriodicWave::from_amplitudes(&[0.0, 1.0], 0))
            .unwrap();
        assert!((table[0] - 1.0).abs() < 1e-5);
        assert!((table[16]).abs() < 1e-5);
        assert!((table[32] + 1.0).abs() < 1e-5);
    }

    #[test]
    fn dc_term_is_ignored() {
        let mut synth = WavetableSynth::new(64);
        let table = synth
            .render(&PeriodicWave::from_amplitudes(&[5.0], 0))
            .unwrap();
        assert!(table.iter().all(|value| value.abs() < 1e-6));
    }

    #[test]
    fn amplitudes_are_not_normalised() {
        let mut synth = WavetableSynth::new(64);
        let table = synth
            .render(&PeriodicWave::from_amplitudes(&[0.0, 0.25, 0.25], 0))
            .unwrap();
        assert!((table[0] - 0.5).abs() < 1e-5);
    }

    #[test]
    fn silent_until_started() {
        let mut bank = WavetableBank::new(&config(2));
        bank.set_periodic_wave(0, &PeriodicWave::from_amplitudes(&[0.0, 1.0], 0))
            .unwrap();
        bank.set_bin_gain(0, 1.0);
        bank.set_master_gain(1.0);

        let mut block = vec![1.0; 4096];
        bank.render(&mut block);
        assert_eq!(rms(&block), 0.0);

        assert!(bank.start().is_err());
        bank.resume().unwrap();
        bank.start().unwrap();
        bank.render(&mut block);
        assert!((rms(&block) - std::f32::consts::FRAC_1_SQRT_2).abs() < 0.05);
    }

    #[test]
    fn only_gained_bins_are_heard() {
        let mut bank = WavetableBank::new(&config(2));
        bank.resume().unwrap();
        bank.start().unwrap();
        bank.set_periodic_wave(1, &PeriodicWave::from_amplitudes(&[0.0, 1.0], 0))
            .unwrap();
        bank.set_bin_gain(0, 1.0);
        bank.set_master_gain(1.0);

        let mut block = vec![0.0; 128];
        bank.render(&mut block);
        assert_eq!(rms(&block), 0.0);
        assert!(bank.set_periodic_wave(2, &PeriodicWave::from_amplitudes(&[], 0)).is_err());
    }
}
