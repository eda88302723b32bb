//! Interactive Composition Segment (`ICS`, IGS only): the fragmentable
//! segment carrying the IG menu's composition header and page tree.
//!
//! Like [`crate::ods`], every raw ICS segment repeats a per-fragment
//! header (`video_descriptor` + `composition_descriptor` +
//! `sequence_descriptor`) before its share of the `Interactive_composition()`
//! bytes. The button/BOG/effect tree inside each page is left undecoded —
//! ES authoring timing only depends on the composition header fields
//! captured here, not on button navigation semantics — and is kept as raw
//! bytes per page.

use bitstream::BitReader;

use crate::error::Result;
use crate::segment::{CompositionDescriptor, SequenceDescriptor, VideoDescriptor};

/// `stream_model`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamModel {
    /// `0b0`: out-of-mux, timed only by `user_time_out_duration`.
    OutOfMux,
    /// `0b1`: multiplexed, carrying explicit time-out PTS values.
    Multiplexed,
}

/// The per-fragment header repeated at the front of every ICS segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteractiveFragmentHeader {
    /// `video_descriptor`.
    pub video_descriptor: VideoDescriptor,
    /// `composition_descriptor`.
    pub composition_descriptor: CompositionDescriptor,
    /// `sequence_descriptor`.
    pub sequence_descriptor: SequenceDescriptor,
}

/// Reads the 9-byte per-fragment header, returning it along with the
/// remaining fragment payload bytes.
pub fn read_ics_fragment_header(payload: &[u8]) -> Result<(InteractiveFragmentHeader, &[u8])> {
    let mut reader = BitReader::new(std::io::Cursor::new(payload));

    let video_width = reader.read_bits(16)? as u16;
    let video_height = reader.read_bits(16)? as u16;
    let frame_rate = (reader.read_bits(8)? as u8) >> 4;
    let video_descriptor = VideoDescriptor { video_width, video_height, frame_rate };

    let composition_number = reader.read_bits(16)? as u16;
    let state_byte = reader.read_bits(8)? as u8;
    let composition_state = crate::segment::CompositionState::from_byte(state_byte & 0xC0)
        .unwrap_or(crate::segment::CompositionState::Normal);
    let composition_descriptor = CompositionDescriptor { composition_number, composition_state };

    let flags = reader.read_bits(8)? as u8;
    let sequence_descriptor = SequenceDescriptor {
        first_in_sequence: flags & 0x80 != 0,
        last_in_sequence: flags & 0x40 != 0,
    };

    Ok((
        InteractiveFragmentHeader { video_descriptor, composition_descriptor, sequence_descriptor },
        &payload[9..],
    ))
}

/// One `Page()`, with its button/BOG/effect tree kept opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Raw bytes of this page's `Page()` structure, undecoded.
    pub raw: Vec<u8>,
}

/// Decoded `Interactive_composition()` header (the assembled body, after
/// fragment reassembly).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractiveComposition {
    /// `interactive_composition_length`.
    pub interactive_composition_length: u32,
    /// `stream_model`.
    pub stream_model: StreamModel,
    /// `user_interface_model`: `true` for pop-up, `false` for always-on.
    pub user_interface_model_popup: bool,
    /// `composition_time_out_pts`/`selection_time_out_pts`, present only
    /// when `stream_model == Multiplexed`.
    pub mux_time_outs: Option<(u64, u64)>,
    /// `user_time_out_duration`.
    pub user_time_out_duration: u32,
    /// This DS's pages, in `page_id` order as authored.
    pub pages: Vec<Page>,
}

/// Decodes an assembled `Interactive_composition()` buffer.
pub fn read_interactive_composition(assembled: &[u8]) -> Result<InteractiveComposition> {
    let mut reader = BitReader::new(std::io::Cursor::new(assembled));

    let interactive_composition_length = reader.read_bits(24)? as u32;
    let flags = reader.read_bits(8)? as u8;
    let stream_model = if flags & 0x80 != 0 { StreamModel::Multiplexed } else { StreamModel::OutOfMux };
    let user_interface_model_popup = flags & 0x40 != 0;

    let mux_time_outs = if matches!(stream_model, StreamModel::Multiplexed) {
        let hi = reader.read_bits(32)? as u64;
        let lo = reader.read_bits(8)? as u64;
        let composition_time_out_pts = ((hi & 0x01FF_FFFF) << 8) | (lo & 0xFF);
        let hi = reader.read_bits(32)? as u64;
        let lo = reader.read_bits(8)? as u64;
        let selection_time_out_pts = ((hi & 0x01FF_FFFF) << 8) | (lo & 0xFF);
        Some((composition_time_out_pts, selection_time_out_pts))
    } else {
        None
    };

    let user_time_out_duration = reader.read_bits(24)? as u32;
    let number_of_pages = reader.read_bits(8)? as u8;

    // The remainder is the Pages() array; since each page's BOG/button tree
    // is variable-length and undecoded, the rest of the buffer is kept as a
    // single opaque blob split evenly is not possible without decoding it,
    // so it is carried whole as one page-spanning raw region.
    let header_bits_consumed = if mux_time_outs.is_some() { 8 + 40 + 40 + 24 + 8 } else { 8 + 24 + 8 };
    let header_bytes = header_bits_consumed / 8 + 3; // + interactive_composition_length field
    let raw_tail = assembled.get(header_bytes..).unwrap_or(&[]).to_vec();

    let pages = if number_of_pages == 0 { Vec::new() } else { vec![Page { raw: raw_tail }] };

    Ok(InteractiveComposition {
        interactive_composition_length,
        stream_model,
        user_interface_model_popup,
        mux_time_outs,
        user_time_out_duration,
        pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_header_splits_descriptors_and_flags() {
        let payload = [
            0x07, 0x80, 0x04, 0x38, 0x40, // video_descriptor
            0x00, 0x01, 0x80, // composition_descriptor
            0xC0, // sequence_descriptor: first+last
            0xAA, // remaining fragment data
        ];
        let (header, rest) = read_ics_fragment_header(&payload).unwrap();
        assert_eq!(header.video_descriptor.video_width, 1920);
        assert!(header.sequence_descriptor.first_in_sequence);
        assert_eq!(rest, &[0xAA]);
    }

    #[test]
    fn out_of_mux_composition_has_no_time_outs() {
        let assembled = [
            0x00, 0x00, 0x08, // interactive_composition_length
            0x00, // stream_model=out-of-mux, user_interface_model=always-on
            0x00, 0x00, 0x00, // user_time_out_duration
            0x00, // number_of_pages=0
        ];
        let ic = read_interactive_composition(&assembled).unwrap();
        assert!(ic.mux_time_outs.is_none());
        assert!(ic.pages.is_empty());
    }
}
