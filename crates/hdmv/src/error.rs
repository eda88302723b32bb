use thiserror::Error;

/// Errors raised while assembling HDMV sequences, running the Display-Set
/// state machine, or re-deriving segment timestamps.
#[derive(Error, Debug)]
pub enum HdmvError {
    /// Underlying bitstream I/O failed (short read, truncated segment, ...).
    #[error("bitstream I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A segment's `segment_type` byte did not match any known type.
    #[error("unknown HDMV segment type 0x{0:02X}")]
    UnknownSegmentType(u8),

    /// A continuation or last-in-sequence fragment arrived with no matching
    /// pending sequence.
    #[error("{0:?} fragment with no pending sequence for id {1}")]
    UnexpectedFragment(crate::segment::SegmentType, u16),

    /// A sequence was left open (missing its `last_in_sequence` fragment)
    /// when the Display Set's `END` segment arrived.
    #[error("sequence {1} of type {0:?} was never closed before END")]
    UnclosedSequence(crate::segment::SegmentType, u16),

    /// `composition_number` did not continue from the previous Display Set.
    #[error("composition_number {current} does not continue from {previous} (mod 2^16)")]
    CompositionNumberDiscontinuity { previous: u16, current: u16 },

    /// The stream's first Display Set was not `epoch_start`.
    #[error("the first Display Set must have composition_state == epoch_start")]
    FirstDisplaySetNotEpochStart,

    /// `video_descriptor` changed within an epoch.
    #[error("video_descriptor changed within an epoch: was {previous:?}, now {current:?}")]
    VideoDescriptorChanged {
        previous: crate::segment::VideoDescriptor,
        current: crate::segment::VideoDescriptor,
    },

    /// A duplicate Display Set's sequence inventory did not match the
    /// previous Display Set's, by id or by content.
    #[error("duplicate Display Set sequence mismatch for {0:?} id {1}")]
    DuplicateDisplaySetMismatch(crate::segment::SegmentType, u16),

    /// A per-Display-Set or per-epoch sequence-count cap was exceeded.
    #[error("{scope} count for {segment_type:?} exceeded the cap of {cap} (got {actual})")]
    CountExceeded {
        scope: &'static str,
        segment_type: crate::segment::SegmentType,
        cap: u32,
        actual: u32,
    },

    /// Two Display Sets' decode/presentation intervals overlapped.
    #[error("Display Set decode interval [{decode_time}, {pres_time}] overlaps the previous Display Set's")]
    IntervalOverlap { decode_time: u64, pres_time: u64 },
}

/// Convenience alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, HdmvError>;
