//! The ESMS writer: accumulates source files, data blocks and PES frames,
//! and serialises them in the byte-exact layout of `spec.md` §6.

use std::io::Write;
use std::path::Path;

use crate::error::{EsmsError, Result};
use crate::format::{self, FormatSpec};
use crate::model::{Command, CodingType, FrameKind, Mode, PendingFrame, PictureType, SourceFile, StreamType};

/// Core-affecting options (`spec.md` §6.6), packed into `script_flags`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EsmsOptions {
    /// `--extract-core`: skip extension frames during audio parsing.
    pub extract_core: bool,
    /// `--force-retiming`: recompute HDMV timestamps rather than passing
    /// through header-supplied ones.
    pub force_retiming: bool,
    /// `--order-igs-segments-by-value`.
    pub order_igs_segments_by_value: bool,
    /// `--order-pgs-segments-by-value`.
    pub order_pgs_segments_by_value: bool,
}

const FLAG_EXTRACT_CORE: u64 = 1 << 0;
const FLAG_FORCE_RETIMING: u64 = 1 << 1;
const FLAG_ORDER_IGS_BY_VALUE: u64 = 1 << 2;
const FLAG_ORDER_PGS_BY_VALUE: u64 = 1 << 3;

impl EsmsOptions {
    fn script_flags(&self) -> u64 {
        let mut flags = 0u64;
        if self.extract_core {
            flags |= FLAG_EXTRACT_CORE;
        }
        if self.force_retiming {
            flags |= FLAG_FORCE_RETIMING;
        }
        if self.order_igs_segments_by_value {
            flags |= FLAG_ORDER_IGS_BY_VALUE;
        }
        if self.order_pgs_segments_by_value {
            flags |= FLAG_ORDER_PGS_BY_VALUE;
        }
        flags
    }
}

fn coding_type_for(stream_type: StreamType) -> CodingType {
    match stream_type {
        StreamType::H262 | StreamType::H264 => CodingType::Video,
        StreamType::Ac3 | StreamType::Eac3 | StreamType::TrueHd => CodingType::Audio,
        StreamType::Pgs | StreamType::Igs => CodingType::PrivateStream1,
    }
}

/// Builds and serialises one ESMS script.
///
/// `W` is the sequential output stream (typically a buffered `File`); it
/// need not be seekable. Finalising the header's `completed` flag and
/// directory table is a separate step, [`update_header`], performed by
/// reopening the file by path — matching the split between `complete` and
/// `update_header` in the distilled writer API.
pub struct EsmsWriter<W: Write> {
    writer: W,
    position: u64,
    stream_type: StreamType,
    coding_type: CodingType,
    format_spec: FormatSpec,
    options: EsmsOptions,
    source_files: Vec<SourceFile>,
    data_blocks: Vec<Vec<u8>>,
    pts_reference: u64,
    pts_final: u64,
    bitrate: u32,
    pending_frame: Option<PendingFrame>,
    header_written: bool,
    pes_cutting_offset: Option<u64>,
    completed: bool,
    frame_count: u32,
}

impl<W: Write> EsmsWriter<W> {
    /// Allocates a writer for `stream_type`, with `format_spec` describing
    /// the codec-specific properties to be written at `complete`.
    pub fn create(writer: W, stream_type: StreamType, format_spec: FormatSpec, options: EsmsOptions) -> Self {
        EsmsWriter {
            writer,
            position: 0,
            stream_type,
            coding_type: coding_type_for(stream_type),
            format_spec,
            options,
            source_files: Vec::new(),
            data_blocks: Vec::new(),
            pts_reference: 0,
            pts_final: 0,
            bitrate: 0,
            pending_frame: None,
            header_written: false,
            pes_cutting_offset: None,
            completed: false,
            frame_count: 0,
        }
    }

    /// The number of PES frames written so far via [`Self::write_frame`].
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Sets the reference PTS (the 27 MHz timestamp the reconstructed
    /// stream's zero point maps to).
    pub fn set_pts_reference(&mut self, pts_reference: u64) {
        self.pts_reference = pts_reference;
    }

    /// Sets the stream's nominal bitrate, in bits per second.
    pub fn set_bitrate(&mut self, bitrate: u32) {
        self.bitrate = bitrate;
    }

    fn track_write(&mut self, len: usize) {
        self.position += len as u64;
    }

    /// Registers a source file by path: reads up to the first 512 bytes
    /// and computes their CRC-32/MPEG-2, used by the muxer to detect the
    /// source file changing after the ESMS script was written.
    pub fn append_source_file(&mut self, path: &Path) -> Result<u8> {
        let name = path.to_string_lossy().into_owned();
        let (crc_checked_bytes, crc32) = format::crc_source_file(path)?;
        self.append_source_file_with_crc(name, crc_checked_bytes, crc32)
    }

    /// Registers a source file with an already-computed CRC, for callers
    /// that read the file themselves (e.g. to parse it) and don't want to
    /// reopen it here.
    pub fn append_source_file_with_crc(&mut self, name: impl Into<String>, crc_checked_bytes: u16, crc32: u32) -> Result<u8> {
        let name = name.into();
        if self.source_files.iter().any(|f| f.name == name) {
            return Err(EsmsError::DuplicateSourceFile(name));
        }
        if self.source_files.len() == u8::MAX as usize {
            return Err(EsmsError::InvalidSourceFileIndex(u8::MAX, self.source_files.len() as u8));
        }
        let idx = self.source_files.len() as u8;
        self.source_files.push(SourceFile { name, crc_checked_bytes, crc32 });
        Ok(idx)
    }

    /// Registers an inline data block (used by `ADD_DATA_SECTION`
    /// commands), returning its index.
    pub fn append_data_block(&mut self, bytes: Vec<u8>) -> Result<u32> {
        if self.data_blocks.len() == u8::MAX as usize {
            return Err(EsmsError::InvalidDataBlockIndex(u8::MAX as u32, self.data_blocks.len() as u32));
        }
        let idx = self.data_blocks.len() as u32;
        self.data_blocks.push(bytes);
        Ok(idx)
    }

    /// Replaces a previously-registered data block's contents.
    pub fn update_data_block(&mut self, idx: u32, bytes: Vec<u8>) -> Result<()> {
        let slot = self
            .data_blocks
            .get_mut(idx as usize)
            .ok_or(EsmsError::InvalidDataBlockIndex(idx, self.data_blocks.len() as u32))?;
        *slot = bytes;
        Ok(())
    }

    /// Writes the fixed header and opens the `PESC` section, recording its
    /// offset for later registration in the directory table.
    pub fn write_header(&mut self) -> Result<()> {
        format::write_header(&mut self.writer)?;
        self.track_write(format::HEADER_LEN as usize);
        self.pes_cutting_offset = Some(self.position);
        format::write_pes_cutting_magic(&mut self.writer)?;
        self.track_write(4);
        self.header_written = true;
        Ok(())
    }

    fn open_frame(&mut self, kind: FrameKind, pts: u64, dts: Option<u64>) -> Result<()> {
        if !self.header_written {
            return Err(EsmsError::NoFrameOpen);
        }
        if self.pending_frame.is_some() {
            return Err(EsmsError::FrameAlreadyOpen);
        }
        self.pending_frame = Some(PendingFrame { kind, pts, dts, extension_data: None, commands: Vec::new() });
        self.pts_final = self.pts_final.max(pts);
        Ok(())
    }

    /// Opens a video PES frame.
    pub fn init_video_frame(&mut self, picture_type: PictureType, pts: u64, dts: Option<u64>) -> Result<()> {
        self.open_frame(FrameKind::Video { picture_type }, pts, dts)
    }

    /// Opens an audio PES frame.
    pub fn init_audio_frame(&mut self, extension_frame: bool, pts: u64, dts: Option<u64>) -> Result<()> {
        self.open_frame(FrameKind::Audio { extension_frame }, pts, dts)
    }

    /// Opens an HDMV segment frame.
    pub fn init_hdmv_frame(&mut self, pts: u64, dts: Option<u64>) -> Result<()> {
        self.open_frame(FrameKind::Hdmv, pts, dts)
    }

    /// Attaches codec-specific extension data (currently only meaningful
    /// for H.264's `cpb_removal_time`/`dpb_output_time` pair) to the
    /// pending frame.
    pub fn set_extension_data(&mut self, data: Vec<u8>) -> Result<()> {
        let frame = self.pending_frame.as_mut().ok_or(EsmsError::NoFrameOpen)?;
        if !matches!(frame.kind, FrameKind::Video { .. }) || !matches!(self.stream_type, StreamType::H264) {
            return Err(EsmsError::UnsupportedExtensionData);
        }
        frame.extension_data = Some(data);
        Ok(())
    }

    /// Appends a reconstruction command to the pending frame.
    pub fn append_command(&mut self, command: Command) -> Result<()> {
        match &command {
            Command::ChangeByteOrder { unit_size, length, .. } => {
                if *unit_size == 0 || length % (*unit_size as u32) != 0 {
                    return Err(EsmsError::MisalignedByteSwap { unit_size: *unit_size, length: *length });
                }
            }
            Command::AddPayloadData { src_file_idx, .. } => {
                if *src_file_idx as usize >= self.source_files.len() {
                    return Err(EsmsError::InvalidSourceFileIndex(*src_file_idx, self.source_files.len() as u8));
                }
            }
            Command::AddDataSection { data_block_idx, .. } => {
                if *data_block_idx as usize >= self.data_blocks.len() {
                    return Err(EsmsError::InvalidDataBlockIndex(*data_block_idx as u32, self.data_blocks.len() as u32));
                }
            }
            Command::AddData { .. } | Command::AddPaddingData { .. } => {}
        }
        let frame = self.pending_frame.as_mut().ok_or(EsmsError::NoFrameOpen)?;
        frame.push_command(command);
        Ok(())
    }

    fn data_section_length(&self, data_block_idx: u8) -> u32 {
        self.data_blocks.get(data_block_idx as usize).map(|b| b.len() as u32).unwrap_or(0)
    }

    fn reconstructed_length(&self, frame: &PendingFrame) -> u32 {
        let mut length = frame.reconstructed_length();
        for command in &frame.commands {
            if let Command::AddDataSection { offset, mode, data_block_idx } = command {
                let region_size = self.data_section_length(*data_block_idx);
                match mode {
                    Mode::Erase => length = length.max(offset.saturating_add(region_size)),
                    Mode::Insert => length = length.saturating_add(region_size),
                }
            }
        }
        length
    }

    /// Serialises the pending frame and closes it.
    pub fn write_frame(&mut self) -> Result<()> {
        let frame = self.pending_frame.take().ok_or(EsmsError::NoFrameOpen)?;
        let length = self.reconstructed_length(&frame);
        let mut buf = Vec::new();
        format::write_frame_record(
            &mut buf,
            frame.kind.type_specific_byte(),
            frame.pts,
            frame.dts,
            frame.extension_data.as_deref(),
            length,
            &frame.commands,
        )?;
        self.writer.write_all(&buf)?;
        self.track_write(buf.len());
        self.frame_count += 1;
        Ok(())
    }

    /// Writes the end-of-frames marker and the trailing sections, and
    /// returns the directory entries [`format::update_header`] should
    /// later patch into the file at `path`.
    pub fn complete(&mut self) -> Result<Vec<(u8, u64)>> {
        if self.pending_frame.is_some() {
            return Err(EsmsError::FrameAlreadyOpen);
        }
        let pes_cutting_offset = self.pes_cutting_offset.ok_or(EsmsError::NoFrameOpen)?;

        format::write_end_of_frames(&mut self.writer)?;
        self.track_write(1);

        let es_properties_offset = self.position;
        let mut es_properties_buf = Vec::new();
        format::write_es_properties(
            &mut es_properties_buf,
            self.stream_type,
            self.coding_type,
            self.pts_reference,
            self.bitrate,
            self.pts_final,
            self.options.script_flags(),
            &self.source_files,
        )?;
        self.writer.write_all(&es_properties_buf)?;
        self.track_write(es_properties_buf.len());

        let mut directories = vec![(format::DIR_PES_CUTTING, pes_cutting_offset), (format::DIR_ES_PROPERTIES, es_properties_offset)];

        if !self.data_blocks.is_empty() {
            let data_blocks_offset = self.position;
            let mut data_blocks_buf = Vec::new();
            format::write_data_blocks(&mut data_blocks_buf, &self.data_blocks)?;
            self.writer.write_all(&data_blocks_buf)?;
            self.track_write(data_blocks_buf.len());
            directories.push((format::DIR_DATA_BLOCKS, data_blocks_offset));
        }

        let fmt_spec_offset = self.position;
        let mut fmt_spec_buf = Vec::new();
        format::write_format_spec(&mut fmt_spec_buf, &self.format_spec)?;
        self.writer.write_all(&fmt_spec_buf)?;
        self.track_write(fmt_spec_buf.len());
        directories.push((format::DIR_FMT_SPEC_PROPERTIES, fmt_spec_offset));

        self.completed = true;
        Ok(directories)
    }

    /// Unwraps the writer, returning the underlying sink.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Reopens `path` and patches the final `completed` flag and directory
/// table, finishing the script started with [`EsmsWriter`].
pub fn update_header(path: &Path, directories: &[(u8, u64)]) -> Result<()> {
    format::update_header(path, directories)
}
