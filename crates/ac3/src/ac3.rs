//! AC-3 (`bsid <= 8`) `syncinfo()`/`bsi()` decoding and BDAV compliance.
//!
//! Field names and decode order follow ATSC A/52:2018 §5.3/§5.4.

use bitstream::BitReader;
use tracing::warn;

use crate::error::{Ac3Error, Result};

/// `syncword` value, ATSC A/52:2018 §5.3.1.
pub const AC3_SYNCWORD: u16 = 0x0B77;
const AC3_WORD_SIZE_BYTES: u32 = 2;
const BDAV_MINIMAL_BITRATE_KBPS: u32 = 96;

const FRMSIZECOD_BITRATE_KBPS: [u32; 19] = [
    32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 448, 512, 576, 640,
];

/// `syncinfo()`, ATSC A/52:2018 §5.3.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncInfo {
    /// `crc1`, the frame's first CRC-16 word.
    pub crc1: u16,
    /// `fscod`: sample-rate code, `[0, 2]` (`3` is reserved).
    pub fscod: u8,
    /// `frmsizecod`: frame-size code, `[0, 37]` (`38..64` are reserved).
    pub frmsizecod: u8,
}

impl SyncInfo {
    /// Sample rate in Hz, or `None` for the reserved `fscod == 3`.
    pub fn sample_rate(&self) -> Option<u32> {
        match self.fscod {
            0 => Some(48_000),
            1 => Some(44_100),
            2 => Some(32_000),
            _ => None,
        }
    }

    /// Nominal bitrate in kbit/s, or `None` for a reserved `frmsizecod`.
    pub fn bitrate_kbps(&self) -> Option<u32> {
        FRMSIZECOD_BITRATE_KBPS.get((self.frmsizecod / 2) as usize).copied()
    }

    /// Frame size in bytes, assuming the BDAV-mandated 48 kHz sample rate
    /// (at 48 kHz, `frame_size = bitrate_kbps * AC3_WORD_SIZE_BYTES * 2`,
    /// with no padding word as used at 44.1 kHz).
    pub fn frame_size_bytes(&self) -> Option<u32> {
        self.bitrate_kbps().map(|kbps| kbps * AC3_WORD_SIZE_BYTES * 2)
    }
}

/// `bsi()` audio coding mode, ATSC A/52:2018 Table 5.8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodingMode {
    /// `0b000`: 1+1, dual mono (Ch1, Ch2).
    DualMono,
    /// `0b001`: 1/0 (C).
    Mono,
    /// `0b010`: 2/0 (L, R).
    Stereo,
    /// `0b011`: 3/0 (L, C, R).
    ThreeZero,
    /// `0b100`: 2/1 (L, R, S).
    TwoOne,
    /// `0b101`: 3/1 (L, C, R, S).
    ThreeOne,
    /// `0b110`: 2/2 (L, R, SL, SR).
    TwoTwo,
    /// `0b111`: 3/2 (L, C, R, SL, SR).
    ThreeTwo,
}

impl AudioCodingMode {
    fn from_code(value: u8) -> Self {
        match value {
            0 => Self::DualMono,
            1 => Self::Mono,
            2 => Self::Stereo,
            3 => Self::ThreeZero,
            4 => Self::TwoOne,
            5 => Self::ThreeOne,
            6 => Self::TwoTwo,
            _ => Self::ThreeTwo,
        }
    }

    fn code(self) -> u8 {
        match self {
            Self::DualMono => 0,
            Self::Mono => 1,
            Self::Stereo => 2,
            Self::ThreeZero => 3,
            Self::TwoOne => 4,
            Self::ThreeOne => 5,
            Self::TwoTwo => 6,
            Self::ThreeTwo => 7,
        }
    }

    /// `true` when `cmixlev` is present (three front channels: L, C, R).
    fn has_three_front_channels(self) -> bool {
        matches!(self, Self::ThreeZero | Self::ThreeOne | Self::ThreeTwo)
    }

    /// `true` when `surmixlev` is present (one or two surround channels).
    fn has_surround_channels(self) -> bool {
        matches!(self, Self::TwoOne | Self::ThreeOne | Self::TwoTwo | Self::ThreeTwo)
    }

    /// Non-LFE channel count, ATSC A/52:2018 Table 5.8's "N_chans".
    pub fn channel_count(self) -> u8 {
        match self {
            Self::DualMono => 2,
            Self::Mono => 1,
            Self::Stereo => 2,
            Self::ThreeZero | Self::TwoOne => 3,
            Self::ThreeOne | Self::TwoTwo => 4,
            Self::ThreeTwo => 5,
        }
    }
}

/// `bsi()`, ATSC A/52:2018 §5.4.
///
/// Only the fields that drive BDAV compliance checks, stream constancy, or
/// the ESMS format-specific-properties record are retained; the legacy
/// `langcod`/dual-mono/production-info fields are parsed for bit-alignment
/// but not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitStreamInfo {
    /// `bsid`, `[0, 8]` for this syntax.
    pub bsid: u8,
    /// `bsmod`: bitstream mode.
    pub bsmod: u8,
    /// `acmod`: audio coding mode.
    pub acmod: AudioCodingMode,
    /// `lfeon`: low-frequency-effects channel present.
    pub lfeon: bool,
    /// `dialnorm`: dialogue normalization level, `[1, 31]`; `0` is a
    /// documented non-fatal reserved value (see `DESIGN.md`).
    pub dialnorm: u8,
    /// `copyrightb`.
    pub copyrightb: bool,
    /// `origbs`: original bitstream flag.
    pub origbs: bool,
}

impl BitStreamInfo {
    /// Total channel count including the LFE channel, when present.
    pub fn nb_channels(&self) -> u8 {
        self.acmod.channel_count() + self.lfeon as u8
    }
}

/// Reads `syncinfo()`, including the leading `syncword`.
pub fn read_sync_info<T: std::io::Read>(reader: &mut BitReader<T>) -> Result<SyncInfo> {
    let syncword = reader.read_bits(16)? as u16;
    if syncword != AC3_SYNCWORD {
        return Err(Ac3Error::BadSyncword(syncword));
    }

    let crc1 = reader.read_bits(16)? as u16;
    let fscod = reader.read_bits(2)? as u8;
    let frmsizecod = reader.read_bits(6)? as u8;

    Ok(SyncInfo { crc1, fscod, frmsizecod })
}

/// Checks `syncinfo()` BDAV compliance: `fscod` must select 48 kHz and the
/// nominal bitrate must be at least 96 kbit/s.
pub fn check_sync_info_compliance(info: &SyncInfo) -> Result<()> {
    match info.sample_rate() {
        Some(48_000) => {}
        Some(other) => {
            return Err(Ac3Error::NonCompliant(format!("sample rate {other} Hz is not the BDAV-mandated 48000 Hz")));
        }
        None => return Err(Ac3Error::Forbidden { field: "fscod", value: info.fscod as u32 }),
    }

    match info.bitrate_kbps() {
        Some(kbps) if kbps < BDAV_MINIMAL_BITRATE_KBPS => {
            Err(Ac3Error::NonCompliant(format!("bitrate {kbps} kbps is below the BDAV 96 kbps minimum")))
        }
        Some(_) => Ok(()),
        None => Err(Ac3Error::Forbidden { field: "frmsizecod", value: info.frmsizecod as u32 }),
    }
}

/// Reads `bsi()`, consuming (but not retaining) the legacy fields that
/// follow `origbs` (`xbsi1`/`xbsi2`/timecode/`addbsi`).
pub fn read_bit_stream_info<T: std::io::Read>(reader: &mut BitReader<T>) -> Result<BitStreamInfo> {
    let bsid = reader.read_bits(5)? as u8;
    if bsid > 8 {
        return Err(Ac3Error::UnsupportedBsid(bsid));
    }

    let bsmod = reader.read_bits(3)? as u8;
    let acmod = AudioCodingMode::from_code(reader.read_bits(3)? as u8);

    if acmod.has_three_front_channels() {
        reader.skip_bits(2)?; // cmixlev
    }
    if acmod.has_surround_channels() {
        reader.skip_bits(2)?; // surmixlev
    }
    if acmod == AudioCodingMode::Stereo {
        let dsurmod = reader.read_bits(2)? as u8;
        if dsurmod == 3 {
            warn!("dsurmod uses reserved value 3, treating as \"not indicated\" (0)");
        }
    }

    let lfeon = reader.read_bit()?;

    let dialnorm = reader.read_bits(5)? as u8;
    if dialnorm == 0 {
        warn!("dialnorm uses reserved value 0, treating as the maximum attenuation default");
    }

    let compre = reader.read_bit()?;
    if compre {
        reader.skip_bits(8)?; // compr
    }

    let langcode = reader.read_bit()?;
    if langcode {
        reader.skip_bits(8)?; // langcod
    }

    let audprodie = reader.read_bit()?;
    if audprodie {
        reader.skip_bits(5 + 2)?; // mixlevel, roomtyp
    }

    if acmod == AudioCodingMode::DualMono {
        reader.skip_bits(5)?; // dialnorm2
        let compr2e = reader.read_bit()?;
        if compr2e {
            reader.skip_bits(8)?;
        }
        let langcod2e = reader.read_bit()?;
        if langcod2e {
            reader.skip_bits(8)?;
        }
        let audprodi2e = reader.read_bit()?;
        if audprodi2e {
            reader.skip_bits(5 + 2)?;
        }
    }

    let copyrightb = reader.read_bit()?;
    let origbs = reader.read_bit()?;

    if bsid == 0x6 {
        read_alternate_bsi(reader)?;
    } else {
        read_legacy_timecodes(reader)?;
    }

    let addbsie = reader.read_bit()?;
    if addbsie {
        let addbsil = reader.read_bits(6)? as u32;
        reader.skip_bits((addbsil + 1) * 8)?;
    }

    Ok(BitStreamInfo {
        bsid,
        bsmod,
        acmod,
        lfeon,
        dialnorm,
        copyrightb,
        origbs,
    })
}

fn read_alternate_bsi<T: std::io::Read>(reader: &mut BitReader<T>) -> Result<()> {
    // ETSI TS 102 366 Annex D: xbsi1/xbsi2.
    if reader.read_bit()? {
        let dmixmod = reader.read_bits(2)? as u8;
        if dmixmod == 3 {
            warn!("dmixmod uses reserved value 3, treating as \"not indicated\" (0)");
        }
        reader.skip_bits(3 + 3 + 3 + 3)?; // ltrtcmixlev, ltrtsurmixlev, lorocmixlev, lorosurmixlev
    }
    if reader.read_bit()? {
        reader.skip_bits(2 + 2 + 1 + 8 + 1)?; // dsurexmod, dheadphonmod, adconvtyp, xbsi2, encinfo
    }
    Ok(())
}

fn read_legacy_timecodes<T: std::io::Read>(reader: &mut BitReader<T>) -> Result<()> {
    if reader.read_bit()? {
        reader.skip_bits(16)?; // timecod1
    }
    if reader.read_bit()? {
        reader.skip_bits(14)?; // timecod2
    }
    Ok(())
}

/// Fields that must stay constant across every frame of an AC-3 stream
/// (BDAV §4.3): `fscod`, `frmsizecod`, `bsid`, `bsmod`, `acmod`, `lfeon`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantFields {
    fscod: u8,
    frmsizecod: u8,
    bsid: u8,
    bsmod: u8,
    acmod: u8,
    lfeon: bool,
}

impl ConstantFields {
    /// Extracts the constancy-checked subset of a frame's `syncinfo()` and
    /// `bsi()`.
    pub fn new(sync_info: &SyncInfo, bsi: &BitStreamInfo) -> Self {
        Self {
            fscod: sync_info.fscod,
            frmsizecod: sync_info.frmsizecod,
            bsid: bsi.bsid,
            bsmod: bsi.bsmod,
            acmod: bsi.acmod.code(),
            lfeon: bsi.lfeon,
        }
    }

    /// Returns an error naming the first field that differs from `self`.
    pub fn check_same(&self, other: &Self) -> Result<()> {
        macro_rules! check {
            ($field:ident) => {
                if self.$field != other.$field {
                    return Err(Ac3Error::NotConstant {
                        field: stringify!($field),
                        previous: format!("{:?}", self.$field),
                        current: format!("{:?}", other.$field),
                    });
                }
            };
        }
        check!(fscod);
        check!(frmsizecod);
        check!(bsid);
        check!(bsmod);
        check!(acmod);
        check!(lfeon);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_info_rejects_non_48khz_sample_rate() {
        let info = SyncInfo { crc1: 0, fscod: 1, frmsizecod: 0x20 };
        assert!(check_sync_info_compliance(&info).is_err());
    }

    #[test]
    fn sync_info_rejects_low_bitrate() {
        let info = SyncInfo { crc1: 0, fscod: 0, frmsizecod: 0 }; // 32 kbps
        assert!(check_sync_info_compliance(&info).is_err());
    }

    #[test]
    fn sync_info_frame_size_matches_192kbps_example() {
        // fscod=0 (48kHz), frmsizecod=0x20=32 -> bitrate 192 kbps, 768 bytes.
        let info = SyncInfo { crc1: 0, fscod: 0, frmsizecod: 0x20 };
        assert_eq!(info.bitrate_kbps(), Some(192));
        assert_eq!(info.frame_size_bytes(), Some(768));
    }

    #[test]
    fn nb_channels_counts_lfe() {
        let bsi = BitStreamInfo {
            bsid: 8,
            bsmod: 0,
            acmod: AudioCodingMode::Stereo,
            lfeon: true,
            dialnorm: 31,
            copyrightb: false,
            origbs: true,
        };
        assert_eq!(bsi.nb_channels(), 3);
    }

    #[test]
    fn constant_fields_detect_acmod_change() {
        let sync_info = SyncInfo { crc1: 0, fscod: 0, frmsizecod: 0x20 };
        let base = BitStreamInfo {
            bsid: 8,
            bsmod: 0,
            acmod: AudioCodingMode::Stereo,
            lfeon: false,
            dialnorm: 31,
            copyrightb: false,
            origbs: true,
        };
        let mut changed = base;
        changed.acmod = AudioCodingMode::ThreeTwo;

        let a = ConstantFields::new(&sync_info, &base);
        let b = ConstantFields::new(&sync_info, &changed);
        assert!(a.check_same(&b).is_err());
    }
}
