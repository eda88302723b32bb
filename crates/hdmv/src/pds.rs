//! Palette Definition Segment (`PDS`).

use bitstream::BitReader;

use crate::error::Result;

/// A single `palette_entry()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteEntry {
    /// `palette_entry_id`.
    pub id: u8,
    /// `Y_value`.
    pub y: u8,
    /// `Cr_value`.
    pub cr: u8,
    /// `Cb_value`.
    pub cb: u8,
    /// `T_value` (alpha).
    pub t: u8,
}

/// Decoded `palette()` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteDefinitionSegment {
    /// `palette_id`: identifies this palette across the epoch.
    pub palette_id: u8,
    /// `palette_version_number`.
    pub palette_version_number: u8,
    /// The palette's entries, in stream order.
    pub entries: Vec<PaletteEntry>,
}

/// Decodes a fully-assembled PDS payload.
pub fn read_pds(payload: &[u8]) -> Result<PaletteDefinitionSegment> {
    let mut reader = BitReader::new(std::io::Cursor::new(payload));

    let palette_id = reader.read_bits(8)? as u8;
    let palette_version_number = reader.read_bits(8)? as u8;

    let entry_count = payload.len().saturating_sub(2) / 5;
    let mut entries = Vec::with_capacity(entry_count);
    for _ in 0..entry_count {
        let id = reader.read_bits(8)? as u8;
        let y = reader.read_bits(8)? as u8;
        let cr = reader.read_bits(8)? as u8;
        let cb = reader.read_bits(8)? as u8;
        let t = reader.read_bits(8)? as u8;
        entries.push(PaletteEntry { id, y, cr, cb, t });
    }

    Ok(PaletteDefinitionSegment { palette_id, palette_version_number, entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_two_entries() {
        let payload = [
            0x01, 0x02, // palette_id, version
            0x00, 0x10, 0x80, 0x80, 0xFF, // entry 0
            0x01, 0x20, 0x80, 0x80, 0xFF, // entry 1
        ];
        let pds = read_pds(&payload).unwrap();
        assert_eq!(pds.palette_id, 1);
        assert_eq!(pds.entries.len(), 2);
        assert_eq!(pds.entries[1].y, 0x20);
    }
}
