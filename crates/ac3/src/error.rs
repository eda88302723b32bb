use thiserror::Error;

/// Errors raised while parsing or compliance-checking an AC-3 family
/// elementary stream.
#[derive(Error, Debug)]
pub enum Ac3Error {
    /// Underlying bitstream I/O failed (short read, seek past end, ...).
    #[error("bitstream I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `syncword` was not `0x0B77` at the expected frame offset.
    #[error("unexpected syncword 0x{0:04X}, expected 0x0B77")]
    BadSyncword(u16),

    /// `bsid` does not fall in a range this parser can interpret.
    #[error("unsupported bsid {0}")]
    UnsupportedBsid(u8),

    /// A reserved or forbidden codeword was encountered.
    #[error("forbidden value for {field}: {value}")]
    Forbidden { field: &'static str, value: u32 },

    /// A decoded field violates a BDAV compliance bound.
    #[error("BDAV compliance violation: {0}")]
    NonCompliant(String),

    /// A field that must stay constant across the stream changed.
    #[error("{field} changed across the stream: was {previous}, now {current}")]
    NotConstant {
        field: &'static str,
        previous: String,
        current: String,
    },

    /// A per-frame CRC did not match.
    #[error("CRC mismatch: expected 0x{expected:04X}, computed 0x{computed:04X}")]
    CrcMismatch { expected: u16, computed: u16 },

    /// The MLP/TrueHD access-unit header nibble-parity check failed.
    #[error("MLP access unit check_nibble XOR accumulator did not end at 0xF (got 0x{0:X})")]
    BadCheckNibble(u8),
}

/// Convenience alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, Ac3Error>;
