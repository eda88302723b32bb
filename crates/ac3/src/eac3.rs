//! E-AC-3 (`11 <= bsid <= 16`) `syncinfo()`/`bsi()` decoding and BDAV
//! compliance.
//!
//! Field names and decode order follow ATSC A/52:2018 Annex E.

use bitstream::BitReader;

use crate::ac3::AC3_SYNCWORD;
use crate::error::{Ac3Error, Result};

const AC3_WORD_SIZE_BYTES: u32 = 2;

/// `strmtyp`, Annex E Table E2.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    /// `0b00`: independent stream.
    Independent,
    /// `0b01`: dependent stream.
    Dependent,
    /// `0b10`: independent stream, not to be decoded by itself (AC-3
    /// convert-sync substream).
    IndependentNotDecodedAlone,
    /// `0b11`: reserved.
    Reserved,
}

impl StreamType {
    fn from_code(value: u8) -> Self {
        match value {
            0 => Self::Independent,
            1 => Self::Dependent,
            2 => Self::IndependentNotDecodedAlone,
            _ => Self::Reserved,
        }
    }

    fn code(self) -> u8 {
        match self {
            Self::Independent => 0,
            Self::Dependent => 1,
            Self::IndependentNotDecodedAlone => 2,
            Self::Reserved => 3,
        }
    }
}

/// `syncinfo()` + the constancy-relevant prefix of `bsi()` for an E-AC-3
/// frame, combined since both are read from the same fixed-position fields
/// (there is no separate CRC-protected `syncinfo()` header as in AC-3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eac3SyncFrame {
    /// `strmtyp`.
    pub strmtyp: StreamType,
    /// `substreamid`, `[0, 7]`.
    pub substreamid: u8,
    /// `frmsiz`: `(frame_size_words / AC3_WORD_SIZE_BYTES) - 1`.
    pub frmsiz: u16,
    /// `fscod`.
    pub fscod: u8,
    /// `fscod2`, only meaningful when `fscod == 3`.
    pub fscod2: u8,
    /// `numblkscod`.
    pub numblkscod: u8,
    /// `acmod`.
    pub acmod: u8,
    /// `lfeon`.
    pub lfeon: bool,
    /// `bsid`, `[11, 16]`.
    pub bsid: u8,
    /// `dialnorm`.
    pub dialnorm: u8,
}

impl Eac3SyncFrame {
    /// Frame size in bytes: `(frmsiz + 1) * AC3_WORD_SIZE_BYTES`.
    pub fn frame_size_bytes(&self) -> u32 {
        (self.frmsiz as u32 + 1) * AC3_WORD_SIZE_BYTES
    }

    /// Sample rate in Hz, honoring the `fscod == 3` (reduced sample rate)
    /// escape into `fscod2`.
    pub fn sample_rate(&self) -> Option<u32> {
        match self.fscod {
            0 => Some(48_000),
            1 => Some(44_100),
            2 => Some(32_000),
            3 => match self.fscod2 {
                0 => Some(24_000),
                1 => Some(22_050),
                2 => Some(16_000),
                _ => None,
            },
            _ => None,
        }
    }

    /// Number of audio blocks carried by this sync frame, Annex E Table
    /// E2.3 (the `fscod == 3` escape always carries 6 blocks).
    pub fn num_blocks_per_sync(&self) -> u32 {
        if self.fscod == 3 {
            return 6;
        }
        match self.numblkscod {
            0 => 1,
            1 => 2,
            2 => 3,
            _ => 6,
        }
    }
}

/// Reads `syncinfo()` and the constancy-relevant prefix of `bsi()` for an
/// E-AC-3 frame. `syncinfo()` in this syntax carries only the `syncword`;
/// the rest of the fields this struct needs live in `bsi()`.
pub fn read_sync_frame<T: std::io::Read>(reader: &mut BitReader<T>) -> Result<Eac3SyncFrame> {
    let syncword = reader.read_bits(16)? as u16;
    if syncword != AC3_SYNCWORD {
        return Err(Ac3Error::BadSyncword(syncword));
    }

    let strmtyp = StreamType::from_code(reader.read_bits(2)? as u8);
    let substreamid = reader.read_bits(3)? as u8;
    let frmsiz = reader.read_bits(11)? as u16;
    let fscod = reader.read_bits(2)? as u8;

    let (fscod2, numblkscod) = if fscod == 3 {
        (reader.read_bits(2)? as u8, 3)
    } else {
        (0, reader.read_bits(2)? as u8)
    };

    let acmod = reader.read_bits(3)? as u8;
    let lfeon = reader.read_bit()?;
    let bsid = reader.read_bits(5)? as u8;
    if !(11..=16).contains(&bsid) {
        return Err(Ac3Error::UnsupportedBsid(bsid));
    }
    let dialnorm = reader.read_bits(5)? as u8;

    Ok(Eac3SyncFrame {
        strmtyp,
        substreamid,
        frmsiz,
        fscod,
        fscod2,
        numblkscod,
        acmod,
        lfeon,
        bsid,
        dialnorm,
    })
}

/// Checks BDAV-relevant compliance bounds: the sample rate must resolve to
/// a known value and `substreamid` must be representable (`strmtyp ==
/// Reserved` is forbidden).
pub fn check_sync_frame_compliance(frame: &Eac3SyncFrame) -> Result<()> {
    if frame.sample_rate().is_none() {
        return Err(Ac3Error::Forbidden { field: "fscod/fscod2", value: frame.fscod as u32 });
    }
    if frame.strmtyp == StreamType::Reserved {
        return Err(Ac3Error::Forbidden { field: "strmtyp", value: 3 });
    }
    Ok(())
}

/// Fields that must stay constant across every frame of an E-AC-3
/// independent substream (BDAV §4.3): `strmtyp`, `substreamid`, `frmsiz`,
/// `fscod`, `fscod2`, `numblkscod`, `acmod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantFields {
    strmtyp: u8,
    substreamid: u8,
    frmsiz: u16,
    fscod: u8,
    fscod2: u8,
    numblkscod: u8,
    acmod: u8,
}

impl ConstantFields {
    /// Extracts the constancy-checked subset of a frame.
    pub fn new(frame: &Eac3SyncFrame) -> Self {
        Self {
            strmtyp: frame.strmtyp.code(),
            substreamid: frame.substreamid,
            frmsiz: frame.frmsiz,
            fscod: frame.fscod,
            fscod2: frame.fscod2,
            numblkscod: frame.numblkscod,
            acmod: frame.acmod,
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
        check!(strmtyp);
        check!(substreamid);
        check!(frmsiz);
        check!(fscod);
        check!(fscod2);
        check!(numblkscod);
        check!(acmod);
        Ok(())
    }
}
