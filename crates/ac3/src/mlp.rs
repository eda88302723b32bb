//! MLP/Dolby TrueHD access-unit and `major_sync_info()` decoding.
//!
//! Field names follow the Dolby TrueHD high-level bitstream description, as
//! grounded in `decodeMlpAccessUnit`/`decodeMlpMajorSyncInfo`.

use bitstream::{BitReader, CrcParams};

use crate::error::{Ac3Error, Result};

/// `format_sync` value identifying a TrueHD `major_sync_info()` (as opposed
/// to the DVD-Audio MLP sync word).
pub const TRUE_HD_SYNCWORD: u32 = 0xF872_6FBA;
/// High 24 bits of [`TRUE_HD_SYNCWORD`], used to detect a major sync without
/// fully committing to decoding one.
pub const MLP_SYNCWORD_PREFIX: u32 = 0xF872_6F;
/// `signature` field inside `major_sync_info()`.
pub const TRUE_HD_SIGNATURE: u16 = 0xB752;

/// An MLP/TrueHD access-unit header: `check_nibble`, `access_unit_length`,
/// `input_timing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessUnitHeader {
    /// `check_nibble`: the XOR parity nibble over the rest of this header.
    pub check_nibble: u8,
    /// `access_unit_length`, in 16-bit words.
    pub access_unit_length: u16,
    /// `input_timing`.
    pub input_timing: u16,
}

impl AccessUnitHeader {
    /// Access unit length in bytes.
    pub fn access_unit_length_bytes(&self) -> u32 {
        self.access_unit_length as u32 * 2
    }
}

/// Reads the four-nibble access-unit header and validates that
/// `check_nibble` XORed with every other nibble of the header ends at
/// `0xF`.
pub fn read_access_unit_header<T: std::io::Read>(reader: &mut BitReader<T>) -> Result<AccessUnitHeader> {
    let check_nibble = reader.read_bits(4)? as u8;
    let mut accumulator = check_nibble;

    let access_unit_length = reader.read_bits(12)? as u16;
    accumulator ^= xor_nibbles(access_unit_length as u64, 12);

    let input_timing = reader.read_bits(16)? as u16;
    accumulator ^= xor_nibbles(input_timing as u64, 16);

    if accumulator != 0xF {
        return Err(Ac3Error::BadCheckNibble(accumulator));
    }

    Ok(AccessUnitHeader {
        check_nibble,
        access_unit_length,
        input_timing,
    })
}

fn xor_nibbles(value: u64, bit_width: u32) -> u8 {
    let mut acc = 0u8;
    let mut remaining = bit_width;
    let mut v = value;
    while remaining > 0 {
        acc ^= (v & 0xF) as u8;
        v >>= 4;
        remaining -= 4;
    }
    acc
}

/// `format_info()`'s sampling-frequency code, Dolby TrueHD high-level
/// bitstream description Table 4.1.
pub fn sampling_frequency_hz(code: u8) -> Option<u32> {
    match code {
        0 => Some(48_000),
        1 => Some(96_000),
        2 => Some(192_000),
        8 => Some(44_100),
        9 => Some(88_200),
        10 => Some(176_400),
        _ => None,
    }
}

/// Decoded `major_sync_info()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MajorSyncInfo {
    /// `format_info`'s sampling-frequency code.
    pub sampling_frequency_code: u8,
    /// `flags.constant_fifo_buffer_delay`.
    pub constant_fifo_buffer_delay: bool,
    /// `flags.formatInfoAlternative8chAssSyntax`, i.e. the alternative 8-ch
    /// syntax flag.
    pub alternative_8ch_syntax: bool,
    /// `variable_rate`.
    pub variable_rate: bool,
    /// `peak_data_rate`, in units of `sampling_frequency / 16` bits/s.
    pub peak_data_rate: u16,
    /// `substreams`: number of TrueHD substreams, `[1, 4]`.
    pub substreams: u8,
}

impl MajorSyncInfo {
    /// Peak data rate in bit/s, derived from `peak_data_rate` and the
    /// sampling frequency (`DIV_ROUND_UP(peak_data_rate * sample_rate, 16)`).
    pub fn peak_data_rate_bps(&self) -> Option<u64> {
        let sample_rate = sampling_frequency_hz(self.sampling_frequency_code)? as u64;
        let numerator = self.peak_data_rate as u64 * sample_rate;
        Some(numerator.div_ceil(16))
    }
}

/// Reads `major_sync_info()`, including its `format_sync` word and trailing
/// CRC, verifying the CRC and returning an error on mismatch.
///
/// `channel_meaning()` is skipped at its fixed 64-bit size rather than fully
/// decoded: BDAV compliance for MLP only consults the fields captured in
/// [`MajorSyncInfo`] plus Atmos presence, which is instead derived from the
/// AC-3 `addbsi` EC3 extension per `spec.md` §4.3, not from this field.
pub fn read_major_sync_info<T: std::io::Read>(reader: &mut BitReader<T>) -> Result<MajorSyncInfo> {
    reader.attach_crc(CrcParams::MLP_MAJOR_SYNC)?;

    let format_sync = reader.read_bits(32)? as u32;
    if format_sync != TRUE_HD_SYNCWORD {
        return Err(Ac3Error::NonCompliant(format!(
            "unexpected MLP major sync format_sync 0x{format_sync:08X}, expected TrueHD 0x{TRUE_HD_SYNCWORD:08X}"
        )));
    }

    let format_info = reader.read_bits(32)? as u32;
    let sampling_frequency_code = (format_info & 0x0F) as u8;

    let signature = reader.read_bits(16)? as u16;
    if signature != TRUE_HD_SIGNATURE {
        return Err(Ac3Error::NonCompliant(format!(
            "unexpected MLP major sync signature 0x{signature:04X}, expected 0x{TRUE_HD_SIGNATURE:04X}"
        )));
    }

    let flags = reader.read_bits(16)? as u16;
    let constant_fifo_buffer_delay = (flags >> 15) & 0x1 == 1;
    let alternative_8ch_syntax = (flags >> 11) & 0x1 == 1;

    reader.skip_bits(16)?; // reserved

    let variable_rate = reader.read_bit()?;
    let peak_data_rate = reader.read_bits(15)? as u16;
    let substreams = reader.read_bits(4)? as u8;

    reader.skip_bits(2)?; // reserved
    reader.skip_bits(2)?; // extended_substream_info
    reader.skip_bits(8)?; // substream_info

    reader.skip_bits(64)?; // channel_meaning()

    let computed_crc = reader.take_crc().unwrap_or(0) as u16;
    let stored_crc = reader.read_bits(16)? as u16;
    if computed_crc != stored_crc {
        return Err(Ac3Error::CrcMismatch { expected: stored_crc, computed: computed_crc });
    }

    Ok(MajorSyncInfo {
        sampling_frequency_code,
        constant_fifo_buffer_delay,
        alternative_8ch_syntax,
        variable_rate,
        peak_data_rate,
        substreams,
    })
}
