//! Raw HDMV segment framing: `segment_type`, `segment_length`, and the
//! fragmentable-type sequence descriptor.

use bitstream::BitReader;

use crate::error::{HdmvError, Result};

/// HDMV `segment_type` values, shared by the PGS and IGS graphical formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentType {
    /// Palette Definition Segment.
    Pds,
    /// Object Definition Segment (fragmentable).
    Ods,
    /// Presentation Composition Segment (PGS).
    Pcs,
    /// Window Definition Segment.
    Wds,
    /// Interactive Composition Segment (IGS, fragmentable).
    Ics,
    /// End of Display Set Segment.
    End,
}

impl SegmentType {
    /// Decodes a raw `segment_type` byte.
    pub fn from_byte(value: u8) -> Result<Self> {
        match value {
            0x14 => Ok(Self::Pds),
            0x15 => Ok(Self::Ods),
            0x16 => Ok(Self::Pcs),
            0x17 => Ok(Self::Wds),
            0x18 => Ok(Self::Ics),
            0x80 => Ok(Self::End),
            other => Err(HdmvError::UnknownSegmentType(other)),
        }
    }

    /// Whether this type can be split across `first_in_sequence`/
    /// `last_in_sequence` fragments (BDAV §4.5.1): only ODS and ICS.
    pub fn is_fragmentable(self) -> bool {
        matches!(self, Self::Ods | Self::Ics)
    }
}

/// Raw segment framing, before sequence assembly: the 5-byte
/// `segment_type`/`segment_length` header plus the raw payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSegment {
    /// `segment_type`.
    pub segment_type: SegmentType,
    /// `segment_length`: payload byte count, excluding this header.
    pub segment_length: u16,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

/// Reads one `segment_type`(1) + `segment_length`(2) + payload header from
/// a byte-aligned reader.
pub fn read_raw_segment<T: std::io::Read>(reader: &mut BitReader<T>) -> Result<RawSegment> {
    let segment_type = SegmentType::from_byte(reader.read_bits(8)? as u8)?;
    let segment_length = reader.read_bits(16)? as u16;

    let mut payload = vec![0u8; segment_length as usize];
    for byte in payload.iter_mut() {
        *byte = reader.read_bits(8)? as u8;
    }

    Ok(RawSegment { segment_type, segment_length, payload })
}

/// `{first_in_sequence, last_in_sequence}`, carried by ODS and ICS
/// fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceDescriptor {
    /// `first_in_sequence_flag`.
    pub first_in_sequence: bool,
    /// `last_in_sequence_flag`.
    pub last_in_sequence: bool,
}

impl SequenceDescriptor {
    /// The descriptor implied for a non-fragmentable type: first and last
    /// at once.
    pub const WHOLE: Self = Self {
        first_in_sequence: true,
        last_in_sequence: true,
    };
}

/// `composition_state`, BDAV §4.5.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionState {
    /// `0x00`: Normal, an incremental update within the epoch.
    Normal,
    /// `0x40`: Acquisition Point, a full refresh not changing the epoch.
    AcquisitionPoint,
    /// `0x80`: Epoch Start, the first Display Set of a new epoch.
    EpochStart,
    /// `0xC0`: Epoch Continue, refreshes state without starting a new
    /// epoch (used when joining mid-stream).
    EpochContinue,
}

impl CompositionState {
    /// Decodes a raw `composition_state` byte.
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Normal),
            0x40 => Some(Self::AcquisitionPoint),
            0x80 => Some(Self::EpochStart),
            0xC0 => Some(Self::EpochContinue),
            _ => None,
        }
    }
}

/// `video_descriptor`, constant within an epoch (BDAV §4.5.2 rule 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoDescriptor {
    /// `video_width`.
    pub video_width: u16,
    /// `video_height`.
    pub video_height: u16,
    /// `frame_rate` code.
    pub frame_rate: u8,
}

/// `composition_descriptor`: `{composition_number, composition_state}`,
/// common to PCS and ICS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositionDescriptor {
    /// `composition_number`.
    pub composition_number: u16,
    /// `composition_state`.
    pub composition_state: CompositionState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_type_decodes_known_values() {
        assert_eq!(SegmentType::from_byte(0x14).unwrap(), SegmentType::Pds);
        assert_eq!(SegmentType::from_byte(0x80).unwrap(), SegmentType::End);
    }

    #[test]
    fn segment_type_rejects_unknown_value() {
        assert!(SegmentType::from_byte(0x42).is_err());
    }

    #[test]
    fn only_ods_and_ics_are_fragmentable() {
        assert!(SegmentType::Ods.is_fragmentable());
        assert!(SegmentType::Ics.is_fragmentable());
        assert!(!SegmentType::Pcs.is_fragmentable());
        assert!(!SegmentType::Pds.is_fragmentable());
    }

    #[test]
    fn composition_state_decodes_known_bytes() {
        assert_eq!(CompositionState::from_byte(0x80), Some(CompositionState::EpochStart));
        assert_eq!(CompositionState::from_byte(0x7F), None);
    }
}
