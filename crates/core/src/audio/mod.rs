//! Seams towards the audio backend: the monotonic clock, the oscillator bank
//! used for the background drone and the voices that render discrete notes.

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Instant,
};

use crate::{NoteParameters, PeriodicWave, Result, SonifyError};

/// Monotonic time source shared by the visual sweep and the audio output.
pub trait AudioClock: Send + Sync {
    /// Current time in seconds. Never decreases.
    fn now(&self) -> f64;
}

/// Clock backed by [`Instant`], starting at zero when created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioClock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    time: Arc<Mutex<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, delta: f64) -> Result<f64> {
        let mut time = self.lock()?;
        *time += delta.max(0.0);
        Ok(*time)
    }

    /// Moves the clock to `seconds`, ignoring requests to go backwards.
    pub fn set(&self, seconds: f64) -> Result<()> {
        let mut time = self.lock()?;
        *time = time.max(seconds);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, f64>> {
        self.time
            .lock()
            .map_err(|_| SonifyError::msg("manual clock has been poisoned"))
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        self.time.lock().map(|time| *time).unwrap_or_else(|poisoned| *poisoned.into_inner())
    }
}

/// Bank of continuously running oscillators, one per image bin, all routed
/// through a single master gain.
pub trait OscillatorBank: Send {
    /// Number of oscillators in the bank.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes sure the output context is running. Fails with
    /// [`SonifyError::AudioUnavailable`] when it cannot be resumed.
    fn resume(&mut self) -> Result<()>;

    /// Starts every oscillator. Called at most once per bank.
    fn start(&mut self) -> Result<()>;

    fn set_periodic_wave(&mut self, bin: usize, wave: &PeriodicWave) -> Result<()>;

    fn set_bin_gain(&mut self, bin: usize, gain: f32);

    fn set_master_gain(&mut self, gain: f32);

    /// Pulls the next block of mono samples. Banks that play through an
    /// external device leave `output` untouched.
    fn render(&mut self, _output: &mut [f32]) {}
}

/// Disposable unit that renders one triggered note at a time.
pub trait Voice: Send {
    /// Plays `note` starting at clock time `time`.
    fn trigger_attack_release(&mut self, note: &NoteParameters, time: f64);

    /// Releases the voice. Called exactly once by [`VoicePool`].
    fn dispose(&mut self);
}

/// Creates voices for the discrete-note pool.
pub trait VoiceFactory: Send {
    fn create_voice(&mut self) -> Result<Box<dyn Voice>>;
}

/// Fixed-size pool handing out voices round-robin.
pub struct VoicePool {
    voices: Vec<Box<dyn Voice>>,
    next: usize,
}

impl VoicePool {
    pub fn allocate(factory: &mut dyn VoiceFactory, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(SonifyError::InvalidInput("voice pool needs at least one voice"));
        }

        let voices = (0..size)
            .map(|_| factory.create_voice())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { voices, next: 0 })
    }

    /// Triggers `note` on the next voice in rotation. Returns `false` once
    /// the pool has been disposed.
    pub fn trigger(&mut self, note: &NoteParameters, time: f64) -> bool {
        if self.voices.is_empty() {
            return false;
        }

        let index = self.next % self.voices.len();
        self.next = (index + 1) % self.voices.len();
        self.voices[index].trigger_attack_release(note, time);
        true
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Disposes every voice. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        for mut voice in self.voices.drain(..) {
            voice.dispose();
        }
        self.next = 0;
    }
}

impl Drop for VoicePool {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for VoicePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoicePool")
            .field("voices", &self.voices.len())
            .field("next", &self.next)
            .finish()
    }
}
