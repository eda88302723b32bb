use thiserror::Error;

/// Errors raised while parsing or compliance-checking a video elementary
/// stream.
#[derive(Error, Debug)]
pub enum VideoError {
    /// Underlying bitstream I/O failed (short read, seek past end, ...).
    #[error("bitstream I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A start code was expected but not found at the expected position.
    #[error("missing start code, expected 0x000001{0:02X}")]
    MissingStartCode(u8),

    /// A field constancy rule (value must stay identical across the stream)
    /// was violated.
    #[error("{field} changed across the stream: was {previous}, now {current}")]
    NotConstant {
        field: &'static str,
        previous: String,
        current: String,
    },

    /// A decoded field violates a BDAV compliance bound.
    #[error("BDAV compliance violation: {0}")]
    NonCompliant(String),

    /// A reserved or forbidden codeword was encountered.
    #[error("forbidden value for {field}: {value}")]
    Forbidden { field: &'static str, value: u32 },
}

/// Convenience alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, VideoError>;
