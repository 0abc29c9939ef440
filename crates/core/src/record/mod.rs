use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use serde::{Deserialize, Serialize};

use crate::{NoteParameters, NoteValue, Result, Voice, VoiceFactory};

/// Recorder shared between the voices that write into it and the caller.
pub type SharedRecorder = Arc<Mutex<Recorder>>;

/// Note trigger captured by a [`RecordingVoice`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub voice: usize,
    pub note: String,
    pub value: NoteValue,
    pub time: f64,
    pub velocity: f32,
}

/// Collects everything the voice pool was asked to play.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Recorder {
    notes: Vec<NoteEvent>,
    disposed_voices: usize,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRecorder {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn record_note(&mut self, event: NoteEvent) {
        self.notes.push(event);
    }

    pub fn record_disposal(&mut self) {
        self.disposed_voices += 1;
    }

    pub fn notes(&self) -> &[NoteEvent] {
        &self.notes
    }

    pub fn disposed_voices(&self) -> usize {
        self.disposed_voices
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Voice factory whose voices only write into a [`Recorder`].
#[derive(Debug, Clone)]
pub struct RecordingVoices {
    recorder: SharedRecorder,
    created: usize,
}

impl RecordingVoices {
    pub fn new(recorder: SharedRecorder) -> Self {
        Self {
            recorder,
            created: 0,
        }
    }
}

impl VoiceFactory for RecordingVoices {
    fn create_voice(&mut self) -> Result<Box<dyn Voice>> {
        let voice = RecordingVoice {
            id: self.created,
            recorder: self.recorder.clone(),
            disposed: false,
        };
        self.created += 1;
        Ok(Box::new(voice))
    }
}

#[derive(Debug)]
struct RecordingVoice {
    id: usize,
    recorder: SharedRecorder,
    disposed: bool,
}

impl RecordingVoice {
    fn with_recorder(&self, f: impl FnOnce(&mut Recorder)) {
        match self.recorder.lock() {
            Ok(mut recorder) => f(&mut recorder),
            Err(_) => tracing::warn!(voice = self.id, "note recorder has been poisoned"),
        }
    }
}

impl Voice for RecordingVoice {
    fn trigger_attack_release(&mut self, note: &NoteParameters, time: f64) {
        if self.disposed {
            return;
        }
        let event = NoteEvent {
            voice: self.id,
            note: note.note.clone(),
            value: note.value,
            time,
            velocity: note.velocity,
        };
        self.with_recorder(|recorder| recorder.record_note(event));
    }

    fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.with_recorder(Recorder::record_disposal);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialises_recorded_notes() {
        let recorder = Recorder::shared();
        let mut voices = RecordingVoices::new(recorder.clone());
        let mut voice = voices.create_voice().unwrap();
        voice.trigger_attack_release(
            &NoteParameters {
                note: "E7".to_string(),
                value: NoteValue::Sixteenth,
                velocity: 0.25,
            },
            16.0,
        );

        let json = recorder.lock().unwrap().to_json().unwrap();
        assert!(json.contains("\"E7\""));
        assert!(json.contains("\"16n\""));
    }

    #[test]
    fn disposed_voice_stays_silent() {
        let recorder = Recorder::shared();
        let mut voices = RecordingVoices::new(recorder.clone());
        let mut voice = voices.create_voice().unwrap();
        voice.dispose();
        voice.dispose();
        voice.trigger_attack_release(
            &NoteParameters {
                note: "C1".to_string(),
                value: NoteValue::Quarter,
                velocity: 0.5,
            },
            0.0,
        );

        let recorder = recorder.lock().unwrap();
        assert!(recorder.notes().is_empty());
        assert_eq!(recorder.disposed_voices(), 1);
    }
}
