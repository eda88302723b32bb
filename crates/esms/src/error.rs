use thiserror::Error;

/// Errors raised while building or finalising an ESMS script.
#[derive(Error, Debug)]
pub enum EsmsError {
    /// Underlying I/O failed (short read/write, seek past end, ...).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `append_source_file` was called with a path already registered.
    #[error("source file already registered: {0}")]
    DuplicateSourceFile(String),

    /// The directory table already holds `MAX_DIR` entries.
    #[error("directory table is full (max {0} entries)")]
    DirectoryTableFull(u8),

    /// A directory id was registered twice.
    #[error("directory id {0} registered twice")]
    DuplicateDirectoryId(u8),

    /// `init_*_frame` was called while a previous frame is still open.
    #[error("a PES frame is already open; call write_frame first")]
    FrameAlreadyOpen,

    /// `append_command`/`set_extension_data`/`write_frame` was called with
    /// no frame open.
    #[error("no PES frame is open")]
    NoFrameOpen,

    /// A command referenced a source-file index beyond the registered table.
    #[error("source file index {0} out of range ({1} registered)")]
    InvalidSourceFileIndex(u8, u8),

    /// A command referenced a data-block index beyond the registered table.
    #[error("data block index {0} out of range ({1} registered)")]
    InvalidDataBlockIndex(u32, u32),

    /// `CHANGE_BYTEORDER`'s `length` was not a multiple of `unit_size`.
    #[error("byte-swap length {length} is not a multiple of unit_size {unit_size}")]
    MisalignedByteSwap { unit_size: u8, length: u32 },

    /// `set_extension_data` was called for a stream type with no defined
    /// extension payload.
    #[error("codec does not support frame extension data")]
    UnsupportedExtensionData,

    /// The byte stream ended before a section could be fully read.
    #[error("truncated ESMS stream while reading {0}")]
    Truncated(&'static str),

    /// A fixed 4-byte section tag didn't match what was expected.
    #[error("expected section magic {expected:?}, found {found:?}")]
    BadMagic { expected: [u8; 4], found: [u8; 4] },

    /// An unrecognised `stream_type` byte.
    #[error("unknown stream type byte {0:#04x}")]
    UnknownStreamType(u8),

    /// An unrecognised `coding_type` byte.
    #[error("unknown coding type byte {0:#04x}")]
    UnknownCodingType(u8),

    /// An unrecognised insert/erase mode byte.
    #[error("unknown mode byte {0:#04x}")]
    UnknownMode(u8),

    /// An unrecognised command `type` byte.
    #[error("unknown command type byte {0:#04x}")]
    UnknownCommandType(u8),

    /// An unrecognised format-spec tag (expected `VFMT` or `AFMT`).
    #[error("unknown format-spec tag {0:?}")]
    UnknownFormatSpecTag([u8; 4]),
}

/// Convenience alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, EsmsError>;
