//! ESMS reader: the inverse of [`crate::format`]'s section encoders,
//! recovering a full script with no loss (`spec.md` §8 property 1).
//!
//! The on-disk layout is self-delimiting top to bottom (header, `PESC`
//! frames terminated by `0xFF`, `ESPR`, an optional `DTBK`, `ESFP`), so
//! [`read_esms`] walks it sequentially rather than consulting the
//! directory table `complete`/`update_header` produce — that table exists
//! for a muxer doing random-access lookups, not for recovering the
//! document end to end.

use std::io::{Cursor, Read, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{EsmsError, Result};
use crate::format::{
    self, Ac3FormatSpec, AudioFormatSpec, FormatSpec, H264FormatSpec, VideoFormatSpec, FLAG_DTS_LONG, FLAG_DTS_PRESENT,
    FLAG_EXTENSION_DATA_PRESENT, FLAG_LENGTH_LONG, FLAG_PTS_LONG,
};
use crate::model::{Command, CodingType, Mode, SourceFile, StreamType};

/// Marks the end of the `PESC` section's frame records. No legitimate
/// `type_specific_byte` (the first byte of a frame record) ever takes
/// this value: [`crate::model::FrameKind::type_specific_byte`] packs only
/// bits `[7:6]` (video) or bit 7 alone (audio), never all eight.
const END_OF_FRAMES: u8 = 0xFF;

/// One parsed `PESC` frame record (`spec.md` §6.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The per-frame-kind byte ([`crate::model::FrameKind::type_specific_byte`]).
    pub type_specific_byte: u8,
    /// Presentation timestamp, 27 MHz domain.
    pub pts: u64,
    /// Decode timestamp, if this frame carries one.
    pub dts: Option<u64>,
    /// Codec-specific extension data, if present.
    pub extension_data: Option<Vec<u8>>,
    /// The reconstructed PES-payload length this frame's commands imply.
    pub length: u32,
    /// The frame's reconstruction commands, in application order.
    pub commands: Vec<Command>,
}

/// A fully recovered ESMS script: every section [`crate::writer::EsmsWriter`]
/// writes, decoded back into the in-memory model with no loss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EsmsScript {
    /// `ES properties` `stream_type`.
    pub stream_type: StreamType,
    /// `ES properties` `coding_type`.
    pub coding_type: CodingType,
    /// The reference PTS the reconstructed stream's zero point maps to.
    pub pts_reference: u64,
    /// The stream's nominal bitrate, in bits per second.
    pub bitrate: u32,
    /// The highest PTS seen across all frames.
    pub pts_final: u64,
    /// Packed `--extract-core`/`--force-retiming`/segment-ordering flags.
    pub script_flags: u64,
    /// Registered source files, in registration order.
    pub source_files: Vec<SourceFile>,
    /// Registered inline data blocks, in registration order.
    pub data_blocks: Vec<Vec<u8>>,
    /// The codec-specific format-spec payload.
    pub format_spec: FormatSpec,
    /// `PESC` frame records, in write order.
    pub frames: Vec<Frame>,
}

type ByteCursor<'a> = Cursor<&'a [u8]>;

fn truncated(what: &'static str) -> EsmsError {
    EsmsError::Truncated(what)
}

fn read_u8(cursor: &mut ByteCursor, what: &'static str) -> Result<u8> {
    cursor.read_u8().map_err(|_| truncated(what))
}

fn read_u16(cursor: &mut ByteCursor, what: &'static str) -> Result<u16> {
    cursor.read_u16::<BigEndian>().map_err(|_| truncated(what))
}

fn read_u32(cursor: &mut ByteCursor, what: &'static str) -> Result<u32> {
    cursor.read_u32::<BigEndian>().map_err(|_| truncated(what))
}

fn read_u64(cursor: &mut ByteCursor, what: &'static str) -> Result<u64> {
    cursor.read_u64::<BigEndian>().map_err(|_| truncated(what))
}

fn read_bytes(cursor: &mut ByteCursor, len: usize, what: &'static str) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf).map_err(|_| truncated(what))?;
    Ok(buf)
}

fn expect_magic(cursor: &mut ByteCursor, expected: &[u8; 4], what: &'static str) -> Result<()> {
    let mut found = [0u8; 4];
    cursor.read_exact(&mut found).map_err(|_| truncated(what))?;
    if &found != expected {
        return Err(EsmsError::BadMagic { expected: *expected, found });
    }
    Ok(())
}

/// Parses one complete ESMS script from `bytes` (the bytes
/// [`crate::writer::EsmsWriter::into_inner`] hands back, whether or not
/// [`crate::writer::update_header`] has since patched its directory
/// table — this reader never reads that table).
pub fn read_esms(bytes: &[u8]) -> Result<EsmsScript> {
    let mut cursor = Cursor::new(bytes);

    expect_magic(&mut cursor, b"ESMS", "header magic")?;
    let _version = read_u8(&mut cursor, "header version")?;
    let _completed = read_u8(&mut cursor, "header completed flag")?;
    let _directory_count = read_u8(&mut cursor, "header directory count")?;
    cursor
        .seek(SeekFrom::Current((format::HEADER_LEN - 7) as i64))
        .map_err(|_| truncated("header reserved directory slots"))?;

    expect_magic(&mut cursor, b"PESC", "PESC magic")?;
    let frames = read_frames(&mut cursor)?;

    expect_magic(&mut cursor, b"ESPR", "ESPR magic")?;
    let stream_type = StreamType::from_byte(read_u8(&mut cursor, "ESPR stream_type")?)?;
    let coding_type = CodingType::from_byte(read_u8(&mut cursor, "ESPR coding_type")?)?;
    let pts_reference = read_u64(&mut cursor, "ESPR pts_reference")?;
    let bitrate = read_u32(&mut cursor, "ESPR bitrate")?;
    let pts_final = read_u64(&mut cursor, "ESPR pts_final")?;
    let script_flags = read_u64(&mut cursor, "ESPR script_flags")?;
    let source_files = read_source_files(&mut cursor)?;

    let data_blocks = if remaining_starts_with(&cursor, b"DTBK") {
        read_data_blocks(&mut cursor)?
    } else {
        Vec::new()
    };

    let format_spec = read_format_spec(&mut cursor, stream_type)?;

    Ok(EsmsScript {
        stream_type,
        coding_type,
        pts_reference,
        bitrate,
        pts_final,
        script_flags,
        source_files,
        data_blocks,
        format_spec,
        frames,
    })
}

/// Peeks the next four bytes without consuming them.
fn remaining_starts_with(cursor: &ByteCursor, tag: &[u8; 4]) -> bool {
    let pos = cursor.position() as usize;
    let data = cursor.get_ref();
    data.len() >= pos + 4 && &data[pos..pos + 4] == tag
}

fn read_frames(cursor: &mut ByteCursor) -> Result<Vec<Frame>> {
    let mut frames = Vec::new();
    loop {
        let marker = read_u8(cursor, "PESC frame marker")?;
        if marker == END_OF_FRAMES {
            return Ok(frames);
        }
        frames.push(read_frame_record(cursor, marker)?);
    }
}

fn read_frame_record(cursor: &mut ByteCursor, type_specific_byte: u8) -> Result<Frame> {
    let flags = read_u8(cursor, "frame flags")?;
    let pts_long = flags & FLAG_PTS_LONG != 0;
    let dts_present = flags & FLAG_DTS_PRESENT != 0;
    let dts_long = flags & FLAG_DTS_LONG != 0;
    let length_long = flags & FLAG_LENGTH_LONG != 0;
    let ext_present = flags & FLAG_EXTENSION_DATA_PRESENT != 0;

    let pts = if pts_long { read_u64(cursor, "frame pts")? } else { read_u32(cursor, "frame pts")? as u64 };
    let dts = if dts_present {
        Some(if dts_long { read_u64(cursor, "frame dts")? } else { read_u32(cursor, "frame dts")? as u64 })
    } else {
        None
    };
    let extension_data = if ext_present {
        let len = read_u16(cursor, "frame extension_data length")?;
        Some(read_bytes(cursor, len as usize, "frame extension_data")?)
    } else {
        None
    };
    let length = if length_long { read_u32(cursor, "frame length")? } else { read_u16(cursor, "frame length")? as u32 };

    let nb_commands = read_u8(cursor, "frame nb_commands")?;
    let mut commands = Vec::with_capacity(nb_commands as usize);
    for _ in 0..nb_commands {
        commands.push(read_command(cursor)?);
    }

    Ok(Frame { type_specific_byte, pts, dts, extension_data, length, commands })
}

fn read_command(cursor: &mut ByteCursor) -> Result<Command> {
    let type_byte = read_u8(cursor, "command type")?;
    let body_len = read_u16(cursor, "command body length")?;
    let body = read_bytes(cursor, body_len as usize, "command body")?;
    let mut body = Cursor::new(body.as_slice());

    let command = match type_byte {
        0 => {
            let offset = read_u32(&mut body, "AddData offset")?;
            let mode = Mode::from_byte(read_u8(&mut body, "AddData mode")?)?;
            let mut data = Vec::new();
            body.read_to_end(&mut data).map_err(|_| truncated("AddData data"))?;
            Command::AddData { offset, mode, data }
        }
        1 => {
            let unit_size = read_u8(&mut body, "ChangeByteOrder unit_size")?;
            let offset = read_u32(&mut body, "ChangeByteOrder offset")?;
            let length = read_u32(&mut body, "ChangeByteOrder length")?;
            Command::ChangeByteOrder { unit_size, offset, length }
        }
        2 => {
            let command_flags = read_u8(&mut body, "AddPayloadData flags")?;
            let src_file_idx = read_u8(&mut body, "AddPayloadData src_file_idx")?;
            let dst_offset = read_u32(&mut body, "AddPayloadData dst_offset")?;
            let src_offset_lo = read_u32(&mut body, "AddPayloadData src_offset")? as u64;
            let src_offset = if command_flags & (1 << 7) != 0 {
                let hi = read_u32(&mut body, "AddPayloadData src_offset high word")? as u64;
                (hi << 32) | src_offset_lo
            } else {
                src_offset_lo
            };
            let size_lo = read_u16(&mut body, "AddPayloadData size")? as u32;
            let size = if command_flags & (1 << 6) != 0 {
                let hi = read_u16(&mut body, "AddPayloadData size high word")? as u32;
                (hi << 16) | size_lo
            } else {
                size_lo
            };
            Command::AddPayloadData { src_file_idx, dst_offset, src_offset, size }
        }
        3 => {
            let offset = read_u32(&mut body, "AddPaddingData offset")?;
            let mode = Mode::from_byte(read_u8(&mut body, "AddPaddingData mode")?)?;
            let length = read_u32(&mut body, "AddPaddingData length")?;
            let fill_byte = read_u8(&mut body, "AddPaddingData fill_byte")?;
            Command::AddPaddingData { offset, mode, length, fill_byte }
        }
        4 => {
            let offset = read_u32(&mut body, "AddDataSection offset")?;
            let mode = Mode::from_byte(read_u8(&mut body, "AddDataSection mode")?)?;
            let data_block_idx = read_u8(&mut body, "AddDataSection data_block_idx")?;
            Command::AddDataSection { offset, mode, data_block_idx }
        }
        other => return Err(EsmsError::UnknownCommandType(other)),
    };
    Ok(command)
}

fn read_source_files(cursor: &mut ByteCursor) -> Result<Vec<SourceFile>> {
    let count = read_u8(cursor, "ESPR source file count")?;
    let mut files = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_len = read_u16(cursor, "ESPR source file name length")?;
        let name_bytes = read_bytes(cursor, name_len as usize, "ESPR source file name")?;
        let name = String::from_utf8_lossy(&name_bytes).into_owned();
        let crc_checked_bytes = read_u16(cursor, "ESPR source file crc_checked_bytes")?;
        let crc32 = read_u32(cursor, "ESPR source file crc32")?;
        files.push(SourceFile { name, crc_checked_bytes, crc32 });
    }
    Ok(files)
}

fn read_data_blocks(cursor: &mut ByteCursor) -> Result<Vec<Vec<u8>>> {
    expect_magic(cursor, b"DTBK", "DTBK magic")?;
    let count = read_u8(cursor, "DTBK block count")?;
    let mut blocks = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let len = read_u32(cursor, "DTBK block length")?;
        blocks.push(read_bytes(cursor, len as usize, "DTBK block data")?);
    }
    Ok(blocks)
}

/// Decodes the `ESFP` section. `stream_type` (already recovered from
/// `ESPR`) decides whether the `VFMT` tail carries [`H264FormatSpec`] and
/// whether the `AFMT` tail carries [`Ac3FormatSpec`] — the wire format
/// carries no separate presence flag for either, matching exactly which
/// `stream_type`s the dispatch submodules ever populate them for.
fn read_format_spec(cursor: &mut ByteCursor, stream_type: StreamType) -> Result<FormatSpec> {
    expect_magic(cursor, b"ESFP", "ESFP magic")?;
    let mut tag = [0u8; 4];
    cursor.read_exact(&mut tag).map_err(|_| truncated("ESFP tag"))?;
    let _reserved = read_bytes(cursor, 4, "ESFP reserved padding")?;

    match &tag {
        b"VFMT" => {
            let packed = read_u8(cursor, "VFMT video_format/frame_rate")?;
            let video_format = packed >> 4;
            let frame_rate = packed & 0x0F;
            let profile = read_u8(cursor, "VFMT profile")?;
            let level = read_u8(cursor, "VFMT level")?;
            let still_picture = read_u8(cursor, "VFMT still_picture")? & 0x80 != 0;
            let h264 = if stream_type == StreamType::H264 {
                let constraint_flags = read_u8(cursor, "VFMT h264 constraint_flags")?;
                let cpb_size = read_u32(cursor, "VFMT h264 cpb_size")?;
                let bitrate = read_u32(cursor, "VFMT h264 bitrate")?;
                Some(H264FormatSpec { constraint_flags, cpb_size, bitrate })
            } else {
                None
            };
            Ok(FormatSpec::Video(VideoFormatSpec { video_format, frame_rate, profile, level, still_picture, h264 }))
        }
        b"AFMT" => {
            let packed = read_u8(cursor, "AFMT audio_format/sample_rate")?;
            let audio_format = packed >> 4;
            let sample_rate = packed & 0x0F;
            let bit_depth = read_u8(cursor, "AFMT bit_depth")?;
            let _reserved = read_u8(cursor, "AFMT reserved")?;
            let ac3 = if matches!(stream_type, StreamType::Ac3 | StreamType::Eac3) {
                let byte0 = read_u8(cursor, "AFMT ac3 byte 0")?;
                let byte1 = read_u8(cursor, "AFMT ac3 byte 1")?;
                let byte2 = read_u8(cursor, "AFMT ac3 byte 2")?;
                Some(Ac3FormatSpec {
                    sub_sample_rate: byte0 >> 7,
                    bsid: byte0 & 0x1F,
                    bitrate_mode: byte1 >> 7,
                    bitrate_code: byte1 & 0x1F,
                    surround_mode: byte2 >> 6,
                    bsmod: (byte2 >> 3) & 0x07,
                    num_channels: (byte2 >> 1) & 0x03,
                    full_svc: byte2 & 0x01 != 0,
                })
            } else {
                None
            };
            Ok(FormatSpec::Audio(AudioFormatSpec { audio_format, sample_rate, bit_depth, ac3 }))
        }
        other => Err(EsmsError::UnknownFormatSpecTag(*other)),
    }
}
