use thiserror::Error;

/// Errors raised while dispatching a raw elementary stream to its codec
/// parser and building the resulting ESMS script.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Reading the input stream failed.
    #[error("I/O error reading source stream: {0}")]
    Io(#[from] std::io::Error),

    /// The AC-3/E-AC-3/TrueHD parser rejected the stream.
    #[error(transparent)]
    Ac3(#[from] ac3::Ac3Error),

    /// The H.262/H.264 parser rejected the stream.
    #[error(transparent)]
    Video(#[from] video::VideoError),

    /// The HDMV segment/Display-Set parser rejected the stream.
    #[error(transparent)]
    Hdmv(#[from] hdmv::HdmvError),

    /// Writing the ESMS script failed.
    #[error(transparent)]
    Esms(#[from] esms::EsmsError),

    /// The source contained no syncwords/start codes/segments for the
    /// requested [`crate::StreamType`] at all.
    #[error("no {0} frames found in the source stream")]
    NoFramesFound(&'static str),
}

/// Convenience alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, DispatchError>;
