//! Core library for the Starsweep sky sonifier.
//!
//! A vertical line sweeps across a sky image. The brightness of the image
//! drives a background drone made of one oscillator per vertical strip,
//! while catalog objects crossed by the line trigger discrete notes derived
//! from their magnitude and spectral type. Audio output, drawing and object
//! lookup are reached through traits so hosts can plug in their own.

pub mod audifier;
pub mod audio;
pub mod catalog;
pub mod config;
pub mod error;
pub mod image;
pub mod mapping;
pub mod overlay;
pub mod queue;
pub mod record;
pub mod spectral;
pub mod synth;
pub mod timeline;

pub use audifier::{bin_amplitudes, BackgroundAudifier, PeriodicWave};
pub use audio::{
    AudioClock, ManualClock, OscillatorBank, SystemClock, Voice, VoiceFactory, VoicePool,
};
pub use catalog::{parse_magnitude, CatalogData, CatalogObject, ObjectSource, StaticCatalog};
pub use config::{AppConfig, AudifierConfig, ConfigChange, SweepConfig, VoiceConfig};
pub use error::{Result, SonifyError};
pub use image::{ImageRegion, ImageSurface, RgbaImage};
pub use mapping::{note_name, DurationMode, MappingSettings, NoteParameters, NoteValue};
pub use overlay::{LineOverlay, LineStyle, Overlay};
pub use queue::{ObjectQueue, QueueEntry};
pub use record::{NoteEvent, Recorder, RecordingVoices, SharedRecorder};
pub use spectral::SpectralType;
pub use synth::{rms, WavetableBank, WavetableSynth};
pub use timeline::{
    CancelToken, FrameDriver, FrameOutcome, PlaybackState, SessionRequest, SweepScheduler,
    SweepState,
};
