//! Sweep scheduling: one frame callback advances the sweep line, fires the
//! notes it reaches, redraws the overlay and moves the drone crossfade, in
//! that order. Everything runs on the caller's thread.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    AppConfig, AudioClock, BackgroundAudifier, ConfigChange, DurationMode, ImageSurface,
    LineStyle, MappingSettings, NoteParameters, ObjectQueue, ObjectSource, Overlay, Result,
    SonifyError, SweepConfig, VoiceConfig, VoiceFactory, VoicePool,
};

/// Shared flag used to cancel a running session from outside the frame loop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Idle,
    Playing,
    Stopped,
}

/// Timing of the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepState {
    pub progress: f64,
    pub start_time: f64,
    pub playing: bool,
    pub looping: bool,
    /// Completed cycles in this session.
    pub cycle: u32,
}

impl SweepState {
    pub fn new(start_time: f64, looping: bool) -> Self {
        Self {
            progress: 0.0,
            start_time,
            playing: true,
            looping,
            cycle: 0,
        }
    }

    pub fn elapsed(&self, now: f64) -> f64 {
        now - self.start_time
    }

    pub fn restart(&mut self, now: f64) {
        self.start_time = now;
        self.progress = 0.0;
        self.cycle += 1;
    }
}

/// Result of a single frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// No session is running.
    Inactive,
    /// The oscillators are still settling before the sweep starts.
    PreRoll,
    Advanced {
        progress: f64,
        x: f64,
        triggered: usize,
    },
    /// A cycle ended and a new one started from a fresh snapshot.
    Looped { cycle: u32, queued: usize },
    /// A non-looping sweep reached the end and playback stopped.
    Finished,
}

/// Everything a session needs besides the configuration.
pub struct SessionRequest {
    pub audifier: BackgroundAudifier,
    pub image: Option<Box<dyn ImageSurface>>,
    pub overlay: Option<Box<dyn Overlay>>,
    pub objects: Box<dyn ObjectSource>,
    pub width: u32,
    pub height: u32,
}

impl SessionRequest {
    pub fn new(
        audifier: BackgroundAudifier,
        objects: Box<dyn ObjectSource>,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            audifier,
            image: None,
            overlay: None,
            objects,
            width,
            height,
        }
    }

    pub fn with_image(mut self, image: Box<dyn ImageSurface>) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_overlay(mut self, overlay: Box<dyn Overlay>) -> Self {
        self.overlay = Some(overlay);
        self
    }
}

/// Settings frozen when a session starts.
#[derive(Debug, Clone, Copy)]
struct SessionSettings {
    duration: f64,
    dampening: f64,
    duration_mode: DurationMode,
    /// Limit the current queue was built with; refreshed with each snapshot.
    mag_limit: f64,
}

struct Session {
    audifier: BackgroundAudifier,
    overlay: Box<dyn Overlay>,
    objects: Box<dyn ObjectSource>,
    width: u32,
    height: u32,
    settings: SessionSettings,
    sweep: SweepState,
    queue: ObjectQueue,
    pool: VoicePool,
    token: CancelToken,
}

/// Owns all playback state and exposes it through explicit lifecycle hooks.
pub struct SweepScheduler {
    clock: Arc<dyn AudioClock>,
    voices: Box<dyn VoiceFactory>,
    sweep: SweepConfig,
    voice_config: VoiceConfig,
    style: LineStyle,
    state: PlaybackState,
    session: Option<Session>,
    /// Audifier released by the last session, waiting to be taken back.
    parked: Option<BackgroundAudifier>,
}

impl SweepScheduler {
    pub fn new(
        clock: Arc<dyn AudioClock>,
        voices: Box<dyn VoiceFactory>,
        config: &AppConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            clock,
            voices,
            sweep: config.sweep.clone(),
            voice_config: config.voices.clone(),
            style: config.overlay.clone(),
            state: PlaybackState::Idle,
            session: None,
            parked: None,
        })
    }

    /// Starts a session. Any running session is fully stopped first.
    ///
    /// A missing image or overlay, an unreadable image or an unavailable
    /// audio output leave the scheduler idle; the audifier is kept so it can
    /// be taken back with [`SweepScheduler::take_audifier`] and retried.
    pub fn on_start(&mut self, request: SessionRequest) -> Result<()> {
        if self.session.is_some() {
            tracing::info!("stopping the running sweep before starting a new one");
            self.on_stop();
            self.parked = None;
        }

        let SessionRequest {
            mut audifier,
            image,
            overlay,
            objects,
            width,
            height,
        } = request;

        let (image, mut overlay) = match (image, overlay) {
            (Some(image), Some(overlay)) => (image, overlay),
            (image, _) => {
                let missing = if image.is_none() {
                    "image surface"
                } else {
                    "overlay surface"
                };
                tracing::warn!(missing, "sweep not started");
                self.parked = Some(audifier);
                return Err(SonifyError::MissingCollaborator(missing));
            }
        };

        let prepared = prepare_audio(&mut audifier, image.as_ref(), width, height, self.sweep.volume)
            .and_then(|()| VoicePool::allocate(self.voices.as_mut(), self.voice_config.count));
        let pool = match prepared {
            Ok(pool) => pool,
            Err(err) => {
                tracing::warn!(error = %err, "sweep not started");
                audifier.stop();
                self.parked = Some(audifier);
                return Err(err);
            }
        };

        let queue = ObjectQueue::snapshot(
            objects.as_ref(),
            f64::from(width),
            f64::from(height),
            self.sweep.mag_limit,
        );
        let sweep = SweepState::new(audifier.start_time(), self.sweep.looping);
        overlay.set_playing(true);

        tracing::info!(
            objects = queue.len(),
            duration = self.sweep.duration,
            looping = self.sweep.looping,
            "sweep started"
        );

        self.session = Some(Session {
            audifier,
            overlay,
            objects,
            width,
            height,
            settings: SessionSettings {
                duration: self.sweep.duration,
                dampening: self.sweep.dampening,
                duration_mode: self.sweep.duration_mode,
                mag_limit: self.sweep.mag_limit,
            },
            sweep,
            queue,
            pool,
            token: CancelToken::new(),
        });
        self.state = PlaybackState::Playing;
        Ok(())
    }

    /// Stops playback: silences the drone, clears the overlay, disposes the
    /// voices and cancels the session token. Calling it again is a no-op.
    pub fn on_stop(&mut self) {
        if self.session.is_some() {
            tracing::info!("sweep stopped");
            self.finish();
        }
    }

    /// Applies a control change. Volume is heard immediately; the magnitude
    /// limit applies from the next snapshot; the rest from the next session.
    pub fn on_config_change(&mut self, change: ConfigChange) -> Result<()> {
        self.sweep.apply(change)?;
        match change {
            ConfigChange::Volume(volume) => {
                if let Some(audifier) = self.audifier_mut() {
                    audifier.set_volume(volume);
                }
            }
            ConfigChange::MagLimit(limit) => {
                tracing::debug!(limit, "magnitude limit applies from the next snapshot");
            }
            _ => {}
        }
        Ok(())
    }

    /// Runs one frame.
    pub fn tick(&mut self) -> Result<FrameOutcome> {
        let Some(session) = self.session.as_mut() else {
            return Ok(FrameOutcome::Inactive);
        };

        if session.token.is_cancelled() {
            self.on_stop();
            return Ok(FrameOutcome::Inactive);
        }

        let now = self.clock.now();
        let elapsed = session.sweep.elapsed(now);
        if elapsed < 0.0 {
            return Ok(FrameOutcome::PreRoll);
        }

        let progress = elapsed / session.settings.duration;
        if progress < 1.0 {
            session.sweep.progress = progress;
            let x = progress * f64::from(session.width);

            let mapping = MappingSettings {
                dampening: session.settings.dampening,
                mag_limit: session.settings.mag_limit,
                duration_mode: session.settings.duration_mode,
            };
            let mut triggered = 0;
            while let Some(entry) = session.queue.pop_ready(x, self.voice_config.lookahead) {
                let note = NoteParameters::for_entry(&entry, &mapping);
                tracing::debug!(
                    x = entry.x,
                    magnitude = entry.magnitude,
                    note = %note.note,
                    value = %note.value,
                    velocity = note.velocity,
                    "note triggered"
                );
                if session.pool.trigger(&note, now) {
                    triggered += 1;
                }
            }

            session.overlay.draw_line(x, &self.style);
            session.audifier.advance(progress);

            return Ok(FrameOutcome::Advanced {
                progress,
                x,
                triggered,
            });
        }

        if session.sweep.looping {
            session.queue = ObjectQueue::snapshot(
                session.objects.as_ref(),
                f64::from(session.width),
                f64::from(session.height),
                self.sweep.mag_limit,
            );
            session.settings.mag_limit = self.sweep.mag_limit;
            session.sweep.restart(now);
            tracing::debug!(
                cycle = session.sweep.cycle,
                objects = session.queue.len(),
                start_time = now,
                "sweep looped"
            );
            return Ok(FrameOutcome::Looped {
                cycle: session.sweep.cycle,
                queued: session.queue.len(),
            });
        }

        tracing::info!("sweep finished");
        self.finish();
        Ok(FrameOutcome::Finished)
    }

    /// Hands back the audifier released by the last stopped or failed session.
    pub fn take_audifier(&mut self) -> Option<BackgroundAudifier> {
        self.parked.take()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn sweep_state(&self) -> Option<SweepState> {
        self.session.as_ref().map(|session| session.sweep)
    }

    /// Objects still waiting for the sweep line in this cycle.
    pub fn queued(&self) -> usize {
        self.session.as_ref().map_or(0, |session| session.queue.len())
    }

    /// Token that cancels the running session.
    pub fn cancel_token(&self) -> Option<CancelToken> {
        self.session.as_ref().map(|session| session.token.clone())
    }

    pub fn config(&self) -> &SweepConfig {
        &self.sweep
    }

    /// Audifier of the running session, or the one waiting to be taken.
    pub fn audifier(&self) -> Option<&BackgroundAudifier> {
        match &self.session {
            Some(session) => Some(&session.audifier),
            None => self.parked.as_ref(),
        }
    }

    pub fn audifier_mut(&mut self) -> Option<&mut BackgroundAudifier> {
        match &mut self.session {
            Some(session) => Some(&mut session.audifier),
            None => self.parked.as_mut(),
        }
    }

    fn finish(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.token.cancel();
            session.pool.dispose();
            session.audifier.stop();
            session.overlay.clear();
            session.overlay.set_playing(false);
            session.sweep.playing = false;
            self.parked = Some(session.audifier);
        }
        self.state = PlaybackState::Stopped;
    }
}

impl fmt::Debug for SweepScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SweepScheduler")
            .field("state", &self.state)
            .field("sweep", &self.sweep)
            .field("voices", &self.voice_config)
            .field("session", &self.sweep_state())
            .field("parked", &self.parked.is_some())
            .finish()
    }
}

fn prepare_audio(
    audifier: &mut BackgroundAudifier,
    image: &dyn ImageSurface,
    width: u32,
    height: u32,
    volume: f32,
) -> Result<()> {
    let region = image.image_data(0, 0, width, height)?;
    audifier.set_volume(volume);
    audifier.set_image(&region)?;
    audifier.play()
}

/// Repeats [`SweepScheduler::tick`] at a fixed frame interval.
#[derive(Debug, Clone, Copy)]
pub struct FrameDriver {
    interval: Duration,
    max_cycles: Option<u32>,
}

impl FrameDriver {
    pub fn new(fps: u32) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / f64::from(fps.max(1))),
            max_cycles: None,
        }
    }

    /// Stops a looping session once this many cycles have completed.
    pub fn with_max_cycles(mut self, cycles: u32) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs frames until the session finishes, is cancelled or reaches the
    /// cycle cap. `wait` yields between frames (sleeping, or stepping a
    /// manual clock); `on_frame` sees every outcome.
    pub fn run<W, F>(
        &self,
        scheduler: &mut SweepScheduler,
        mut wait: W,
        mut on_frame: F,
    ) -> Result<FrameOutcome>
    where
        W: FnMut(Duration) -> Result<()>,
        F: FnMut(&mut SweepScheduler, &FrameOutcome) -> Result<()>,
    {
        loop {
            let outcome = scheduler.tick()?;
            on_frame(scheduler, &outcome)?;

            match outcome {
                FrameOutcome::Inactive | FrameOutcome::Finished => return Ok(outcome),
                FrameOutcome::Looped { cycle, .. }
                    if self.max_cycles.is_some_and(|max| cycle >= max) =>
                {
                    tracing::info!(cycle, "cycle limit reached");
                    scheduler.on_stop();
                    return Ok(outcome);
                }
                _ => {}
            }

            wait(self.interval)?;
        }
    }
}
