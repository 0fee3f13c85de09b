/// Result alias that carries the custom [`VoxelgramError`] type.
pub type Result<T> = std::result::Result<T, VoxelgramError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum VoxelgramError {
    /// Grid dimensions outside the supported `[1, 32]` range per axis.
    #[error("invalid grid dimensions {x}x{y}x{z}: each axis must be in [1, 32]")]
    InvalidDimensions { x: u32, y: u32, z: u32 },
    /// Interchange data that is empty, ragged, or otherwise malformed.
    #[error("malformed grid data: {0}")]
    MalformedData(String),
    /// A preset name outside the closed set of procedural patterns.
    #[error("unknown preset `{0}`")]
    UnknownPreset(String),
    /// A generation response that cannot be turned into a frame sequence.
    #[error("synthesis failed: {0}")]
    Synthesis(String),
    /// The audio input source could not be acquired or sampled.
    #[error("audio source unavailable: {0}")]
    AudioSource(String),
    /// Free-form message for conditions without a dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON (de)serialization errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// Wrapper around FFT processing errors.
    #[error("{0}")]
    Fft(#[from] realfft::FftError),
}

impl VoxelgramError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for VoxelgramError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for VoxelgramError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
