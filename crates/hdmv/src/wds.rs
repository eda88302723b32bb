//! Window Definition Segment (`WDS`).

use bitstream::BitReader;

use crate::error::Result;

/// A single `Window()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// `window_id`.
    pub window_id: u8,
    /// `window_horizontal_position`, `window_vertical_position`.
    pub position: (u16, u16),
    /// `window_width`, `window_height`.
    pub size: (u16, u16),
}

impl Window {
    /// Pixel count, `window_width * window_height`, used by the PGS
    /// window-transfer-duration formula.
    pub fn pixel_count(&self) -> u64 {
        self.size.0 as u64 * self.size.1 as u64
    }
}

/// Decoded `Window_definition_segment()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowDefinitionSegment {
    /// Every window defined by this WDS.
    pub windows: Vec<Window>,
}

/// Decodes a whole WDS payload (WDS is not fragmentable).
pub fn read_wds(payload: &[u8]) -> Result<WindowDefinitionSegment> {
    let mut reader = BitReader::new(std::io::Cursor::new(payload));

    let num_windows = reader.read_bits(8)? as u8;
    let mut windows = Vec::with_capacity(num_windows as usize);
    for _ in 0..num_windows {
        let window_id = reader.read_bits(8)? as u8;
        let x = reader.read_bits(16)? as u16;
        let y = reader.read_bits(16)? as u16;
        let width = reader.read_bits(16)? as u16;
        let height = reader.read_bits(16)? as u16;
        windows.push(Window { window_id, position: (x, y), size: (width, height) });
    }

    Ok(WindowDefinitionSegment { windows })
}
