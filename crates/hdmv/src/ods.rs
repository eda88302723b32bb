//! Object Definition Segment (`ODS`): the fragmentable RLE bitmap segment.
//!
//! Every raw ODS segment (first, continuation, or last fragment alike)
//! repeats a small per-fragment header in front of its share of the
//! bitmap bytes; [`read_ods_fragment_header`] peels that off before the
//! remainder is handed to the sequence assembler. Once all fragments of a
//! sequence are concatenated, the result is the assembled `object_data()`
//! that [`read_ods`] decodes.

use bitstream::BitReader;

use crate::error::Result;
use crate::segment::SequenceDescriptor;

/// The per-fragment header repeated at the front of every ODS segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectFragmentHeader {
    /// `object_id`: identifies this object's sequence across the epoch.
    pub object_id: u16,
    /// `object_version_number`.
    pub object_version_number: u8,
    /// `sequence_descriptor`.
    pub sequence_descriptor: SequenceDescriptor,
}

/// Reads the 4-byte per-fragment header, returning it along with the
/// remaining fragment payload bytes (to be appended to the sequence
/// buffer).
pub fn read_ods_fragment_header(payload: &[u8]) -> Result<(ObjectFragmentHeader, &[u8])> {
    let mut reader = BitReader::new(std::io::Cursor::new(payload));

    let object_id = reader.read_bits(16)? as u16;
    let object_version_number = reader.read_bits(8)? as u8;
    let flags = reader.read_bits(8)? as u8;
    let sequence_descriptor = SequenceDescriptor {
        first_in_sequence: flags & 0x80 != 0,
        last_in_sequence: flags & 0x40 != 0,
    };

    Ok((
        ObjectFragmentHeader { object_id, object_version_number, sequence_descriptor },
        &payload[4..],
    ))
}

/// Decoded, fully-assembled `object_data()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDefinitionSegment {
    /// `object_data_length`: the RLE payload size in bytes, as declared by
    /// the stream (checked against the actual assembled size).
    pub object_data_length: u32,
    /// `object_width` in pixels.
    pub object_width: u16,
    /// `object_height` in pixels.
    pub object_height: u16,
    /// The run-length-encoded bitmap data.
    pub rle_data: Vec<u8>,
}

/// Decodes an assembled `object_data()` buffer (the concatenation of every
/// fragment's payload bytes, in sequence order).
pub fn read_ods(assembled: &[u8]) -> Result<ObjectDefinitionSegment> {
    let mut reader = BitReader::new(std::io::Cursor::new(assembled));

    let object_data_length = reader.read_bits(24)? as u32;
    let object_width = reader.read_bits(16)? as u16;
    let object_height = reader.read_bits(16)? as u16;
    let rle_data = assembled[7..].to_vec();

    Ok(ObjectDefinitionSegment { object_data_length, object_width, object_height, rle_data })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_header_splits_id_and_flags() {
        let payload = [0x00, 0x01, 0x00, 0xC0, 0xAA, 0xBB];
        let (header, rest) = read_ods_fragment_header(&payload).unwrap();
        assert_eq!(header.object_id, 1);
        assert!(header.sequence_descriptor.first_in_sequence);
        assert!(header.sequence_descriptor.last_in_sequence);
        assert_eq!(rest, &[0xAA, 0xBB]);
    }

    #[test]
    fn assembled_object_data_reads_dimensions() {
        let assembled = [
            0x00, 0x00, 0x02, // object_data_length = 2
            0x00, 0x10, // width = 16
            0x00, 0x08, // height = 8
            0xAA, 0xBB, // rle_data
        ];
        let ods = read_ods(&assembled).unwrap();
        assert_eq!(ods.object_width, 16);
        assert_eq!(ods.object_height, 8);
        assert_eq!(ods.rle_data, vec![0xAA, 0xBB]);
    }
}
