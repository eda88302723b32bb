//! Byte-exact ESMS section encoders (`spec.md` §6.1-§6.5) and the
//! directory-table patching helper used by `update_header`.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{BigEndian, WriteBytesExt};

use crate::error::{EsmsError, Result};
use crate::model::{Command, CodingType, SourceFile, StreamType};

/// Number of directory slots reserved in the header. The distilled format
/// gives no numeric value for `MAX_DIR`; four matches the number of
/// directory ids this format defines (`ES_PROPERTIES`, `PES_CUTTING`,
/// `DATA_BLOCKS`, `FMT_SPEC_PROPERTIES`), so no stream ever needs a fifth
/// slot. Recorded as a judgment call in `DESIGN.md`.
pub const MAX_DIR: u8 = 4;

/// One directory-table entry's encoded size: `u8 id` + `u64 offset`.
const DIRECTORY_ENTRY_BYTES: u64 = 9;

/// Directory id: ES properties section.
pub const DIR_ES_PROPERTIES: u8 = 0;
/// Directory id: PES-cutting section.
pub const DIR_PES_CUTTING: u8 = 1;
/// Directory id: data-blocks section.
pub const DIR_DATA_BLOCKS: u8 = 2;
/// Directory id: format-specific-properties section.
pub const DIR_FMT_SPEC_PROPERTIES: u8 = 3;

/// The format version this crate writes.
pub const FORMAT_VERSION: u8 = 1;

/// Byte offset, from file start, of the `completed` flag.
pub const COMPLETED_BYTE_OFFSET: u64 = 5;
/// Byte offset, from file start, of `directory_count`.
pub const DIRECTORY_COUNT_OFFSET: u64 = 6;
/// Byte offset, from file start, of the first reserved directory slot.
pub const DIRECTORY_TABLE_OFFSET: u64 = 7;

/// Total size of the fixed header (magic through the reserved directory
/// slots).
pub const HEADER_LEN: u64 = 7 + DIRECTORY_ENTRY_BYTES * MAX_DIR as u64;

/// Writes the header with placeholder completion byte (0), placeholder
/// directory count (0), and zeroed reserved directory-slot space.
pub fn write_header<W: Write>(writer: &mut W) -> Result<()> {
    writer.write_all(b"ESMS")?;
    writer.write_u8(FORMAT_VERSION)?;
    writer.write_u8(0)?; // completed
    writer.write_u8(0)?; // directory_count
    writer.write_all(&[0u8; (DIRECTORY_ENTRY_BYTES * MAX_DIR as u64) as usize])?;
    Ok(())
}

/// Writes the `ESPR` section.
#[allow(clippy::too_many_arguments)]
pub fn write_es_properties<W: Write>(
    writer: &mut W,
    stream_type: StreamType,
    coding_type: CodingType,
    pts_reference: u64,
    bitrate: u32,
    pts_final: u64,
    script_flags: u64,
    source_files: &[SourceFile],
) -> Result<()> {
    writer.write_all(b"ESPR")?;
    writer.write_u8(stream_type as u8)?;
    writer.write_u8(coding_type as u8)?;
    writer.write_u64::<BigEndian>(pts_reference)?;
    writer.write_u32::<BigEndian>(bitrate)?;
    writer.write_u64::<BigEndian>(pts_final)?;
    writer.write_u64::<BigEndian>(script_flags)?;
    writer.write_u8(source_files.len() as u8)?;
    for file in source_files {
        let name_bytes = file.name.as_bytes();
        writer.write_u16::<BigEndian>(name_bytes.len() as u16)?;
        writer.write_all(name_bytes)?;
        writer.write_u16::<BigEndian>(file.crc_checked_bytes)?;
        writer.write_u32::<BigEndian>(file.crc32)?;
    }
    Ok(())
}

/// Writes the `DTBK` section.
pub fn write_data_blocks<W: Write>(writer: &mut W, blocks: &[Vec<u8>]) -> Result<()> {
    writer.write_all(b"DTBK")?;
    writer.write_u8(blocks.len() as u8)?;
    for block in blocks {
        writer.write_u32::<BigEndian>(block.len() as u32)?;
        writer.write_all(block)?;
    }
    Ok(())
}

/// Writes the `PESC` section's magic (its directory offset is this call's
/// position; frames are appended afterward with [`write_frame`]).
pub fn write_pes_cutting_magic<W: Write>(writer: &mut W) -> Result<()> {
    writer.write_all(b"PESC")?;
    Ok(())
}

/// Writes the `0xFF` end-of-frames marker that closes the `PESC` section.
pub fn write_end_of_frames<W: Write>(writer: &mut W) -> Result<()> {
    writer.write_u8(0xFF)?;
    Ok(())
}

pub(crate) const FLAG_PTS_LONG: u8 = 1 << 0;
pub(crate) const FLAG_DTS_PRESENT: u8 = 1 << 1;
pub(crate) const FLAG_DTS_LONG: u8 = 1 << 2;
pub(crate) const FLAG_LENGTH_LONG: u8 = 1 << 3;
pub(crate) const FLAG_EXTENSION_DATA_PRESENT: u8 = 1 << 4;

/// Serialises one PES-cutting frame record (`spec.md` §6.4).
pub fn write_frame_record<W: Write>(
    writer: &mut W,
    type_specific_byte: u8,
    pts: u64,
    dts: Option<u64>,
    extension_data: Option<&[u8]>,
    length: u32,
    commands: &[Command],
) -> Result<()> {
    let pts_long = pts > u32::MAX as u64;
    let dts_long = dts.map(|v| v > u32::MAX as u64).unwrap_or(false);
    let length_long = length > u16::MAX as u32;

    let mut flags = 0u8;
    if pts_long {
        flags |= FLAG_PTS_LONG;
    }
    if dts.is_some() {
        flags |= FLAG_DTS_PRESENT;
    }
    if dts_long {
        flags |= FLAG_DTS_LONG;
    }
    if length_long {
        flags |= FLAG_LENGTH_LONG;
    }
    if extension_data.is_some() {
        flags |= FLAG_EXTENSION_DATA_PRESENT;
    }

    writer.write_u8(type_specific_byte)?;
    writer.write_u8(flags)?;
    if pts_long {
        writer.write_u64::<BigEndian>(pts)?;
    } else {
        writer.write_u32::<BigEndian>(pts as u32)?;
    }
    if let Some(dts) = dts {
        if dts_long {
            writer.write_u64::<BigEndian>(dts)?;
        } else {
            writer.write_u32::<BigEndian>(dts as u32)?;
        }
    }
    if let Some(extension_data) = extension_data {
        writer.write_u16::<BigEndian>(extension_data.len() as u16)?;
        writer.write_all(extension_data)?;
    }
    if length_long {
        writer.write_u32::<BigEndian>(length)?;
    } else {
        writer.write_u16::<BigEndian>(length as u16)?;
    }
    writer.write_u8(commands.len() as u8)?;
    for command in commands {
        write_command(writer, command)?;
    }
    Ok(())
}

fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    let mut body = Vec::new();
    match command {
        Command::AddData { offset, mode, data } => {
            body.write_u32::<BigEndian>(*offset)?;
            body.write_u8(*mode as u8)?;
            body.write_all(data)?;
        }
        Command::ChangeByteOrder { unit_size, offset, length } => {
            body.write_u8(*unit_size)?;
            body.write_u32::<BigEndian>(*offset)?;
            body.write_u32::<BigEndian>(*length)?;
        }
        Command::AddPayloadData { src_file_idx, dst_offset, src_offset, size } => {
            let src_offset_64 = *src_offset > u32::MAX as u64;
            let size_32 = *size > u16::MAX as u32;
            let mut command_flags = 0u8;
            if src_offset_64 {
                command_flags |= 1 << 7;
            }
            if size_32 {
                command_flags |= 1 << 6;
            }
            body.write_u8(command_flags)?;
            body.write_u8(*src_file_idx)?;
            body.write_u32::<BigEndian>(*dst_offset)?;
            body.write_u32::<BigEndian>(*src_offset as u32)?;
            if src_offset_64 {
                body.write_u32::<BigEndian>((*src_offset >> 32) as u32)?;
            }
            body.write_u16::<BigEndian>(*size as u16)?;
            if size_32 {
                body.write_u16::<BigEndian>((*size >> 16) as u16)?;
            }
        }
        Command::AddPaddingData { offset, mode, length, fill_byte } => {
            body.write_u32::<BigEndian>(*offset)?;
            body.write_u8(*mode as u8)?;
            body.write_u32::<BigEndian>(*length)?;
            body.write_u8(*fill_byte)?;
        }
        Command::AddDataSection { offset, mode, data_block_idx } => {
            body.write_u32::<BigEndian>(*offset)?;
            body.write_u8(*mode as u8)?;
            body.write_u8(*data_block_idx)?;
        }
    }
    writer.write_u8(command.type_byte())?;
    writer.write_u16::<BigEndian>(body.len() as u16)?;
    writer.write_all(&body)?;
    Ok(())
}

/// Video `FMT_SPEC_PROPERTIES` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFormatSpec {
    /// 4-bit video-format code (packed with `frame_rate` into one byte).
    pub video_format: u8,
    /// 4-bit frame-rate code.
    pub frame_rate: u8,
    /// Profile id.
    pub profile: u8,
    /// Level id.
    pub level: u8,
    /// Whether every picture in the stream is a still picture.
    pub still_picture: bool,
    /// H.264-only fields; `None` for H.262.
    pub h264: Option<H264FormatSpec>,
}

/// H.264-specific tail of the video format-spec payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct H264FormatSpec {
    /// Annex A `constraint_set*_flag` bits, packed MSB-first.
    pub constraint_flags: u8,
    /// Coded Picture Buffer size, in bits.
    pub cpb_size: u32,
    /// Stream bitrate, in bits per second.
    pub bitrate: u32,
}

/// Audio `FMT_SPEC_PROPERTIES` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFormatSpec {
    /// 4-bit audio-format code (packed with `sample_rate` into one byte).
    pub audio_format: u8,
    /// 4-bit sample-rate code.
    pub sample_rate: u8,
    /// Bit depth, in bits per sample (0 for compressed formats).
    pub bit_depth: u8,
    /// AC-3-family-only fields; `None` for formats without them.
    pub ac3: Option<Ac3FormatSpec>,
}

/// AC-3-family tail of the audio format-spec payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ac3FormatSpec {
    /// Sub-sample-rate flag (`bsid` 8 half-rate variant).
    pub sub_sample_rate: u8,
    /// `bsid` field.
    pub bsid: u8,
    /// Constant (0) vs. variable (1) bitrate.
    pub bitrate_mode: u8,
    /// `frmsizecod`-derived bitrate code.
    pub bitrate_code: u8,
    /// Surround-channel processing mode.
    pub surround_mode: u8,
    /// Bitstream mode (`bsmod`).
    pub bsmod: u8,
    /// Channel count.
    pub num_channels: u8,
    /// Whether the full-service flag is set.
    pub full_svc: bool,
}

/// The `ESFP` section's payload, video or audio shaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatSpec {
    /// Video format-spec payload (`"VFMT"`).
    Video(VideoFormatSpec),
    /// Audio format-spec payload (`"AFMT"`).
    Audio(AudioFormatSpec),
}

/// Writes the `ESFP` section.
pub fn write_format_spec<W: Write>(writer: &mut W, spec: &FormatSpec) -> Result<()> {
    writer.write_all(b"ESFP")?;
    match spec {
        FormatSpec::Video(video) => {
            writer.write_all(b"VFMT\0\0\0\0")?;
            writer.write_u8((video.video_format << 4) | (video.frame_rate & 0x0F))?;
            writer.write_u8(video.profile)?;
            writer.write_u8(video.level)?;
            writer.write_u8(if video.still_picture { 0x80 } else { 0 })?;
            if let Some(h264) = &video.h264 {
                writer.write_u8(h264.constraint_flags)?;
                writer.write_u32::<BigEndian>(h264.cpb_size)?;
                writer.write_u32::<BigEndian>(h264.bitrate)?;
            }
        }
        FormatSpec::Audio(audio) => {
            writer.write_all(b"AFMT\0\0\0\0")?;
            writer.write_u8((audio.audio_format << 4) | (audio.sample_rate & 0x0F))?;
            writer.write_u8(audio.bit_depth)?;
            writer.write_u8(0)?; // reserved
            if let Some(ac3) = &audio.ac3 {
                writer.write_u8((ac3.sub_sample_rate << 7) | (ac3.bsid & 0x1F))?;
                writer.write_u8((ac3.bitrate_mode << 7) | (ac3.bitrate_code & 0x1F))?;
                let full_svc_bit = if ac3.full_svc { 1 } else { 0 };
                writer.write_u8((ac3.surround_mode << 6) | (ac3.bsmod << 3) | (ac3.num_channels << 1) | full_svc_bit)?;
            }
        }
    }
    Ok(())
}

/// Computes the CRC-32/MPEG-2 of up to the first 512 bytes of the file at
/// `path`, returning `(crc_checked_bytes, crc32)`.
pub fn crc_source_file(path: &Path) -> Result<(u16, u32)> {
    const CRC32_USED_BYTES: usize = 512;
    let mut file = std::fs::File::open(path)?;
    let mut buf = vec![0u8; CRC32_USED_BYTES];
    let mut total = 0usize;
    loop {
        let n = file.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
        if total == buf.len() {
            break;
        }
    }
    buf.truncate(total);
    Ok((total as u16, crate::crc32::crc32_mpeg2(&buf)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_record_uses_short_forms_below_32_bit_thresholds() {
        let mut buf = Vec::new();
        let commands = vec![Command::AddPayloadData { src_file_idx: 0, dst_offset: 0, src_offset: 0, size: 768 }];
        write_frame_record(&mut buf, 0, 864_000, None, None, 768, &commands).unwrap();

        // type_specific_byte, flags, pts(u32), length(u16), nb_commands
        assert_eq!(buf[0], 0); // type-specific
        assert_eq!(buf[1], 0); // flags: no long pts/dts, no length_long, no ext data, no dts
        let pts = u32::from_be_bytes(buf[2..6].try_into().unwrap());
        assert_eq!(pts, 864_000);
        let length = u16::from_be_bytes(buf[6..8].try_into().unwrap());
        assert_eq!(length, 768);
        assert_eq!(buf[8], 1); // nb_commands
    }

    #[test]
    fn frame_record_sets_long_flags_for_large_pts_and_length() {
        let mut buf = Vec::new();
        let big_pts = (u32::MAX as u64) + 1;
        write_frame_record(&mut buf, 0, big_pts, Some(5), None, (u16::MAX as u32) + 1, &[]).unwrap();
        let flags = buf[1];
        assert_ne!(flags & 0x01, 0); // PTS_long
        assert_ne!(flags & 0x02, 0); // DTS_present
        assert_eq!(flags & 0x04, 0); // DTS is small, not long
        assert_ne!(flags & 0x08, 0); // length_long
    }

    #[test]
    fn add_payload_data_uses_32_bit_size_field_above_16_bit_threshold() {
        let mut buf = Vec::new();
        let commands = vec![Command::AddPayloadData {
            src_file_idx: 2,
            dst_offset: 0,
            src_offset: 0,
            size: (u16::MAX as u32) + 100,
        }];
        write_frame_record(&mut buf, 0, 0, None, None, 0, &commands).unwrap();
        // command: type(1) + body_length(2) + flags(1) + src_file_idx(1) + dst_offset(4) + src_offset_lo(4) + size_lo(2) + size_hi(2)
        let command_start = 2 + 4 + 2 + 1; // flags+pts+length+nb_commands
        let command_flags = buf[command_start + 3];
        assert_ne!(command_flags & 0x40, 0); // size_32 bit set
    }

    #[test]
    fn change_byte_order_command_encodes_unit_size_offset_and_length() {
        // Misalignment rejection lives in the writer (exercised in its own
        // tests); this only checks the wire encoding of a valid command.
        let mut buf = Vec::new();
        let commands = vec![Command::ChangeByteOrder { unit_size: 2, offset: 0, length: 4 }];
        write_frame_record(&mut buf, 0, 0, None, None, 0, &commands).unwrap();
        let command_start = 2 + 4 + 2 + 1; // flags+pts+length+nb_commands
        assert_eq!(commands[0].type_byte(), 1);
        assert_eq!(buf[command_start], 1); // command type byte
        let body_length = u16::from_be_bytes(buf[command_start + 1..command_start + 3].try_into().unwrap());
        assert_eq!(body_length, 9); // unit_size(1) + offset(4) + length(4)
        assert_eq!(buf[command_start + 3], 2); // unit_size
    }
}

/// Reopens `path`, writes the final `completed = 1` byte, the directory
/// count, and the directory entries, at their fixed header offsets.
/// `directories` must have at most `MAX_DIR` entries.
pub fn update_header(path: &Path, directories: &[(u8, u64)]) -> Result<()> {
    if directories.len() > MAX_DIR as usize {
        return Err(EsmsError::DirectoryTableFull(MAX_DIR));
    }
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;

    file.seek(SeekFrom::Start(COMPLETED_BYTE_OFFSET))?;
    file.write_u8(1)?;

    file.seek(SeekFrom::Start(DIRECTORY_COUNT_OFFSET))?;
    file.write_u8(directories.len() as u8)?;

    file.seek(SeekFrom::Start(DIRECTORY_TABLE_OFFSET))?;
    let mut seen = std::collections::HashSet::new();
    for &(id, offset) in directories {
        if !seen.insert(id) {
            return Err(EsmsError::DuplicateDirectoryId(id));
        }
        file.write_u8(id)?;
        file.write_u64::<BigEndian>(offset)?;
    }
    Ok(())
}
