//! Pure Rust parsers for the AC-3 family of BDAV audio elementary streams:
//! AC-3, E-AC-3, and MLP/Dolby TrueHD.
//!
//! Like [`video`](../video/index.html), this crate only decodes bitstream
//! headers (`syncinfo()`/`bsi()`/`major_sync_info()`) against a raw,
//! syncword-delimited elementary stream; it does not build or parse any
//! container format.
//!
//! ## Modules
//!
//! - [`ac3`]: AC-3 (`bsid <= 8`) syncframe decoding and compliance.
//! - [`eac3`]: E-AC-3 (`11 <= bsid <= 16`) syncframe decoding and compliance.
//! - [`mlp`]: MLP/TrueHD access-unit and major-sync decoding.
//!
//! [`StreamState`] ties these together: it scans a byte stream for the
//! `0x0B77` syncword, decodes the frame at that offset, enforces the BDAV
//! cross-frame constancy rules, and derives each frame's presentation
//! timestamp.
//!
//! ## License
//!
//! This project is licensed under the [MIT](./LICENSE.MIT) or [Apache-2.0](./LICENSE.Apache-2.0) license.
//! You can choose between one of them if you use this work.
//!
//! `SPDX-License-Identifier: MIT OR Apache-2.0`
#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod ac3;
pub mod eac3;
mod error;
pub mod mlp;

pub use error::{Ac3Error, Result};

/// AC-3/E-AC-3 carry exactly 1536 PCM samples per syncframe (ATSC A/52:2018
/// §2.2.1), regardless of bitrate.
pub const AC3_SAMPLES_PER_FRAME: u32 = 1536;

/// The 27 MHz system clock used to express a PTS tick here, matching the
/// BDAV authoring convention of deriving presentation time in system-clock
/// units before downscaling to the 90 kHz PES clock.
pub const SYSTEM_CLOCK_HZ: u64 = 27_000_000;

/// Which AC-3-family codec a syncframe belongs to, selected by `bsid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bsid {
    /// `bsid <= 8`: AC-3.
    Ac3,
    /// `11 <= bsid <= 16`: E-AC-3.
    Eac3,
}

impl Bsid {
    /// Classifies a raw `bsid` value, returning `None` for the `9..=10`
    /// reserved gap.
    pub fn classify(bsid: u8) -> Option<Self> {
        match bsid {
            0..=8 => Some(Self::Ac3),
            11..=16 => Some(Self::Eac3),
            _ => None,
        }
    }
}

/// Running per-stream state: either an AC-3 or an E-AC-3 core, carrying the
/// constancy-checked fields from the first frame and the PTS accumulator.
#[derive(Debug)]
pub enum StreamState {
    /// An AC-3 core stream.
    Ac3 {
        /// Constancy-checked fields from the first frame.
        constants: ac3::ConstantFields,
        /// Running PTS accumulator, in [`SYSTEM_CLOCK_HZ`] ticks.
        pts: u64,
    },
    /// An E-AC-3 core or dependent stream.
    Eac3 {
        /// Constancy-checked fields from the first frame.
        constants: eac3::ConstantFields,
        /// Running PTS accumulator, in [`SYSTEM_CLOCK_HZ`] ticks.
        pts: u64,
    },
}

impl StreamState {
    /// Initializes state from the stream's first AC-3 frame.
    pub fn start_ac3(sync_info: &ac3::SyncInfo, bsi: &ac3::BitStreamInfo) -> Result<Self> {
        ac3::check_sync_info_compliance(sync_info)?;
        Ok(Self::Ac3 {
            constants: ac3::ConstantFields::new(sync_info, bsi),
            pts: 0,
        })
    }

    /// Initializes state from the stream's first E-AC-3 frame.
    pub fn start_eac3(frame: &eac3::Eac3SyncFrame) -> Result<Self> {
        eac3::check_sync_frame_compliance(frame)?;
        Ok(Self::Eac3 {
            constants: eac3::ConstantFields::new(frame),
            pts: 0,
        })
    }

    /// Feeds a subsequent AC-3 frame, checking constancy and sample rate,
    /// and returns the frame's PTS (the PTS in effect before this frame's
    /// samples are added to the accumulator).
    pub fn observe_ac3(&mut self, sync_info: &ac3::SyncInfo, bsi: &ac3::BitStreamInfo) -> Result<u64> {
        ac3::check_sync_info_compliance(sync_info)?;
        let Self::Ac3 { constants, pts } = self else {
            return Err(Ac3Error::NonCompliant("AC-3 frame observed on a non-AC-3 stream".into()));
        };
        constants.check_same(&ac3::ConstantFields::new(sync_info, bsi))?;

        let frame_pts = *pts;
        *pts += SYSTEM_CLOCK_HZ * AC3_SAMPLES_PER_FRAME as u64 / 48_000;
        Ok(frame_pts)
    }

    /// Feeds a subsequent E-AC-3 frame, checking constancy, and returns the
    /// frame's PTS.
    pub fn observe_eac3(&mut self, frame: &eac3::Eac3SyncFrame) -> Result<u64> {
        eac3::check_sync_frame_compliance(frame)?;
        let Self::Eac3 { constants, pts } = self else {
            return Err(Ac3Error::NonCompliant("E-AC-3 frame observed on a non-E-AC-3 stream".into()));
        };
        constants.check_same(&eac3::ConstantFields::new(frame))?;

        let frame_pts = *pts;
        let sample_rate = frame.sample_rate().unwrap_or(48_000) as u64;
        *pts += SYSTEM_CLOCK_HZ * AC3_SAMPLES_PER_FRAME as u64 / sample_rate;
        Ok(frame_pts)
    }
}

/// Scans `data` for the next `0x0B77` syncword starting at or after
/// `from`, returning its byte offset.
pub fn find_next_syncword(data: &[u8], from: usize) -> Option<usize> {
    if from + 1 >= data.len() {
        return None;
    }
    data[from..].windows(2).position(|w| w[0] == 0x0B && w[1] == 0x77).map(|p| p + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_recognizes_ac3_and_eac3_ranges() {
        assert_eq!(Bsid::classify(8), Some(Bsid::Ac3));
        assert_eq!(Bsid::classify(16), Some(Bsid::Eac3));
        assert_eq!(Bsid::classify(9), None);
    }

    #[test]
    fn find_next_syncword_locates_offset() {
        let data = [0xFF, 0x0B, 0x77, 0x00];
        assert_eq!(find_next_syncword(&data, 0), Some(1));
    }

    #[test]
    fn ac3_single_frame_pts_matches_authoring_formula() {
        let sync_info = ac3::SyncInfo { crc1: 0, fscod: 0, frmsizecod: 0x20 };
        let bsi = ac3::BitStreamInfo {
            bsid: 8,
            bsmod: 0,
            acmod: ac3::AudioCodingMode::Stereo,
            lfeon: false,
            dialnorm: 31,
            copyrightb: false,
            origbs: true,
        };
        let mut state = StreamState::start_ac3(&sync_info, &bsi).unwrap();
        let first_pts = state.observe_ac3(&sync_info, &bsi).unwrap();
        assert_eq!(first_pts, 0);

        let second_pts = state.observe_ac3(&sync_info, &bsi).unwrap();
        assert_eq!(second_pts, 864_000);
    }
}
