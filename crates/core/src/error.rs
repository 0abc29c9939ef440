/// Result alias that carries the custom [`SonifyError`] type.
pub type Result<T> = std::result::Result<T, SonifyError>;

/// Common error type for the sonification engine.
#[derive(Debug, thiserror::Error)]
pub enum SonifyError {
    /// Free-form failure, mostly used for poisoned shared state.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration or catalog files that are not valid JSON.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// Wavetable synthesis failed inside the FFT backend.
    #[error("{0}")]
    Fft(#[from] realfft::FftError),
    /// Sky images that could not be opened or decoded.
    #[error("{0}")]
    Image(#[from] ::image::ImageError),
    /// Data handed to the engine that it cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Configuration values outside their allowed ranges.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A collaborator required to start playback was not supplied. The
    /// scheduler stays idle when this is returned.
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),
    /// The audio output could not be resumed. Playback may be retried with
    /// the next play command.
    #[error("audio output unavailable: {0}")]
    AudioUnavailable(String),
}

impl SonifyError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for SonifyError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for SonifyError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
