//! Presentation Composition Segment (`PCS`, PGS only).

use bitstream::BitReader;

use crate::error::Result;
use crate::segment::{CompositionDescriptor, CompositionState, VideoDescriptor};

/// `Composition_object()`: places one ODS at a position, optionally
/// cropped, inside one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositionObject {
    /// `object_id_ref`.
    pub object_id_ref: u16,
    /// `window_id_ref`.
    pub window_id_ref: u8,
    /// `object_cropped_flag`.
    pub object_cropped: bool,
    /// `object_horizontal_position`, `object_vertical_position`.
    pub position: (u16, u16),
    /// Cropping rectangle, present only when `object_cropped`.
    pub cropping: Option<(u16, u16, u16, u16)>,
}

/// Decoded `Presentation_composition_segment()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationCompositionSegment {
    /// `video_descriptor`.
    pub video_descriptor: VideoDescriptor,
    /// `composition_descriptor`.
    pub composition_descriptor: CompositionDescriptor,
    /// `palette_update_flag`.
    pub palette_update_flag: bool,
    /// `palette_id_ref`.
    pub palette_id_ref: u8,
    /// `Composition_object()`s, at most 2 per BDAV.
    pub composition_objects: Vec<CompositionObject>,
}

fn read_video_descriptor<T: std::io::Read>(reader: &mut BitReader<T>) -> Result<VideoDescriptor> {
    let video_width = reader.read_bits(16)? as u16;
    let video_height = reader.read_bits(16)? as u16;
    let byte = reader.read_bits(8)? as u8;
    let frame_rate = byte >> 4;
    Ok(VideoDescriptor { video_width, video_height, frame_rate })
}

fn read_composition_descriptor<T: std::io::Read>(reader: &mut BitReader<T>) -> Result<CompositionDescriptor> {
    let composition_number = reader.read_bits(16)? as u16;
    let byte = reader.read_bits(8)? as u8;
    let composition_state = CompositionState::from_byte(byte & 0xC0).unwrap_or(CompositionState::Normal);
    Ok(CompositionDescriptor { composition_number, composition_state })
}

fn read_composition_object<T: std::io::Read>(reader: &mut BitReader<T>) -> Result<CompositionObject> {
    let object_id_ref = reader.read_bits(16)? as u16;
    let window_id_ref = reader.read_bits(8)? as u8;
    let flags = reader.read_bits(8)? as u8;
    let object_cropped = flags & 0x80 != 0;
    let x = reader.read_bits(16)? as u16;
    let y = reader.read_bits(16)? as u16;
    let cropping = if object_cropped {
        let cx = reader.read_bits(16)? as u16;
        let cy = reader.read_bits(16)? as u16;
        let cw = reader.read_bits(16)? as u16;
        let ch = reader.read_bits(16)? as u16;
        Some((cx, cy, cw, ch))
    } else {
        None
    };
    Ok(CompositionObject { object_id_ref, window_id_ref, object_cropped, position: (x, y), cropping })
}

/// Decodes a whole PCS payload (PCS is not fragmentable).
pub fn read_pcs(payload: &[u8]) -> Result<PresentationCompositionSegment> {
    let mut reader = BitReader::new(std::io::Cursor::new(payload));

    let video_descriptor = read_video_descriptor(&mut reader)?;
    let composition_descriptor = read_composition_descriptor(&mut reader)?;

    let flags = reader.read_bits(8)? as u8;
    let palette_update_flag = flags & 0x80 != 0;
    let palette_id_ref = reader.read_bits(8)? as u8;
    let number_of_composition_objects = reader.read_bits(8)? as u8;

    let mut composition_objects = Vec::with_capacity(number_of_composition_objects as usize);
    for _ in 0..number_of_composition_objects {
        composition_objects.push(read_composition_object(&mut reader)?);
    }

    Ok(PresentationCompositionSegment {
        video_descriptor,
        composition_descriptor,
        palette_update_flag,
        palette_id_ref,
        composition_objects,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_epoch_start_with_one_uncropped_object() {
        let payload = [
            0x07, 0x80, 0x04, 0x38, 0x40, // video_descriptor 1920x1080 @ 0x4
            0x00, 0x01, 0x80, // composition_number=1, composition_state=epoch_start(0x80)
            0x00, // palette_update_flag=0, reserved
            0x00, // palette_id_ref
            0x01, // number_of_composition_objects
            0x00, 0x01, // object_id_ref=1
            0x00, // window_id_ref=0
            0x00, // flags (not cropped)
            0x00, 0x00, // x=0
            0x00, 0x00, // y=0
        ];
        let pcs = read_pcs(&payload).unwrap();
        assert_eq!(pcs.video_descriptor.video_width, 1920);
        assert_eq!(pcs.composition_descriptor.composition_state, CompositionState::EpochStart);
        assert_eq!(pcs.composition_objects.len(), 1);
        assert!(!pcs.composition_objects[0].object_cropped);
    }
}
