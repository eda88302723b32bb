//! H.262 (MPEG-2) and H.264/AVC dispatch: scan a raw start-code/Annex-B
//! delimited elementary stream, track the running sequence/SPS state, and
//! emit one ESMS PES frame per coded picture.
//!
//! Both loops derive PTS/DTS in the same 27 MHz clock domain
//! [`esms::EsmsWriter::set_pts_reference`] runs on (confirmed against the
//! writer's own AC-3 test fixture, which pairs a 32 ms frame with a
//! 864,000-tick PTS — `0.032 * 27_000_000`), not the 90 kHz unit named in
//! [`video::h262::derive_timestamps`]'s doc comment; that comment describes
//! the function's conceptual clock, but the function itself is a pure
//! `gop_pts + n * frame_duration` computation indifferent to which clock its
//! inputs are expressed in.

use bytes::Bytes;

use expgolomb::BitReaderExpGolombExt;
use video::h262::{self, PictureCodingType, SequenceState};
use video::{iter_annex_b, NALUnitType, Sps};
use bitstream::BitReader;
use esms::format::{H264FormatSpec, VideoFormatSpec};
use esms::{Command, EsmsWriter, FormatSpec, PictureType};

use crate::error::{DispatchError, Result};
use crate::{esms_options, DispatchOutput, ParserOptions};

const SYSTEM_CLOCK_HZ: u64 = 27_000_000;

fn picture_type_of(coding_type: PictureCodingType) -> PictureType {
    match coding_type {
        PictureCodingType::I => PictureType::I,
        PictureCodingType::P => PictureType::P,
        PictureCodingType::B => PictureType::B,
        PictureCodingType::D => PictureType::D,
    }
}

fn find_start_codes(data: &[u8]) -> Vec<(usize, u8)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i + 3 < data.len() {
        if data[i] == 0x00 && data[i + 1] == 0x00 && data[i + 2] == 0x01 {
            out.push((i, data[i + 3]));
            i += 4;
        } else {
            i += 1;
        }
    }
    out
}

/// A picture's coded data runs from its `picture_start_code` up to the next
/// start code at picture level or above (the next picture, sequence header,
/// GOP header, or sequence end); everything in between (slice start codes,
/// the picture's own `picture_coding_extension`) belongs to it.
fn picture_payload_end(starts: &[(usize, u8)], idx: usize, data_len: usize) -> usize {
    starts[idx + 1..]
        .iter()
        .find(|&&(_, code)| matches!(code, h262::PICTURE_START_CODE | h262::SEQUENCE_HEADER_CODE | h262::GROUP_START_CODE) || code == 0xB7)
        .map(|&(offset, _)| offset)
        .unwrap_or(data_len)
}

/// BDAV `VFMT` `video_format` nibble, BD-ROM §5.3.4.3.1 Table 5-18. Derived
/// from picture height/scan type since neither `h262` nor `sps` retains the
/// original disambiguating authoring metadata (a stream at 1080 lines is
/// always progressive in this table; BDAV never authors 1080p50/60 H.262).
fn bd_video_format_code(height: u32, progressive: bool) -> u8 {
    match (height, progressive) {
        (480, _) => 1,
        (576, _) => 2,
        (720, _) => 4,
        (1080, false) => 3,
        (1080, true) => 5,
        _ => 0,
    }
}

/// Dispatches a raw H.262 (MPEG-2 Video) elementary stream.
pub fn dispatch_h262(data: &[u8], opts: &ParserOptions) -> Result<DispatchOutput> {
    let starts = find_start_codes(data);
    let seq_idx = starts
        .iter()
        .position(|&(_, code)| code == h262::SEQUENCE_HEADER_CODE)
        .ok_or(DispatchError::NoFramesFound("H.262"))?;

    let mut sequence_state = SequenceState::new();
    let (seq_offset, _) = starts[seq_idx];
    let header = h262::read_sequence_header(&mut BitReader::new(&data[seq_offset..]))?;
    sequence_state.observe_sequence_header(header)?;

    let mut extension = None;
    if let Some(&(ext_offset, h262::EXTENSION_START_CODE)) = starts.get(seq_idx + 1) {
        let mut reader = BitReader::new(&data[ext_offset..]);
        if h262::read_extension_id(&mut reader)? == 1 {
            let ext = h262::read_sequence_extension(&mut reader)?;
            sequence_state.observe_sequence_extension(ext)?;
            extension = Some(ext);
        }
    }

    let fps = h262::nominal_frame_rate(header.frame_rate_code)
        .expect("frame_rate_code already validated by check_sequence_header_compliance");
    let frame_duration = (SYSTEM_CLOCK_HZ as f64 / fps).round() as u64;

    let computed = sequence_state.computed_values();
    let height = computed.map(|c| c.vertical_size).unwrap_or(header.vertical_size_value as u32);
    let progressive = extension.map(|e| e.progressive_sequence).unwrap_or(false);

    let format_spec = FormatSpec::Video(VideoFormatSpec {
        video_format: bd_video_format_code(height, progressive),
        frame_rate: header.frame_rate_code,
        profile: extension.map(|e| e.profile_idc()).unwrap_or(0),
        level: extension.map(|e| e.level_idc()).unwrap_or(0),
        still_picture: false,
        h264: None,
    });

    let mut writer = EsmsWriter::create(Vec::new(), esms::StreamType::H262, format_spec, esms_options(opts));
    writer.set_pts_reference(opts.initial_pts);
    writer.write_header()?;

    let crc_len = data.len().min(512);
    let crc = esms::crc32_mpeg2(&data[..crc_len]);
    let src_idx = writer.append_source_file_with_crc(opts.source_name.clone(), crc_len as u16, crc)?;

    let mut decode_index = 0u32;
    let mut gop_start_decode_index = 0u32;
    let mut frames = 0u32;

    for (idx, &(offset, code)) in starts.iter().enumerate() {
        match code {
            h262::SEQUENCE_HEADER_CODE => {
                let header = h262::read_sequence_header(&mut BitReader::new(&data[offset..]))?;
                sequence_state.observe_sequence_header(header)?;
            }
            h262::EXTENSION_START_CODE => {
                let mut reader = BitReader::new(&data[offset..]);
                if h262::read_extension_id(&mut reader)? == 1 {
                    let ext = h262::read_sequence_extension(&mut reader)?;
                    sequence_state.observe_sequence_extension(ext)?;
                }
            }
            h262::GROUP_START_CODE => {
                gop_start_decode_index = decode_index;
            }
            h262::PICTURE_START_CODE => {
                let picture = h262::read_picture_header(&mut BitReader::new(&data[offset..]))?;
                sequence_state.observe_picture(picture.picture_coding_type)?;

                let gop_pts = gop_start_decode_index as u64 * frame_duration;
                let gop_picture_index = decode_index - gop_start_decode_index + 1;
                let ts = h262::derive_timestamps(
                    gop_pts,
                    frame_duration,
                    picture.temporal_reference,
                    gop_picture_index,
                    picture.picture_coding_type,
                );

                let end = picture_payload_end(&starts, idx, data.len());
                writer.init_video_frame(
                    picture_type_of(picture.picture_coding_type),
                    opts.initial_pts + ts.pts,
                    ts.dts.map(|dts| opts.initial_pts + dts),
                )?;
                writer.append_command(Command::AddPayloadData {
                    src_file_idx: src_idx,
                    dst_offset: 0,
                    src_offset: offset as u64,
                    size: (end - offset) as u32,
                })?;
                writer.write_frame()?;
                frames += 1;
                decode_index += 1;
            }
            0xB7 => break, // sequence_end_code
            _ => {}
        }
    }

    if frames == 0 {
        return Err(DispatchError::NoFramesFound("H.262"));
    }

    let directories = writer.complete()?;
    Ok(DispatchOutput { writer, directories })
}

/// Reads `slice_type` (mod 5) from a slice NAL unit's RBSP, to classify the
/// picture it belongs to. `first_mb_in_slice` is skipped; the value is only
/// needed for its ue(v) bit length.
fn slice_picture_type(rbsp: &[u8]) -> Result<PictureType> {
    let mut reader = BitReader::new(rbsp);
    let _first_mb_in_slice = reader.read_exp_golomb()?;
    let slice_type = reader.read_exp_golomb()? % 5;
    Ok(match slice_type {
        0 => PictureType::P,
        1 => PictureType::B,
        2 => PictureType::I,
        3 => PictureType::P, // SP: treated as a predictive picture
        _ => PictureType::I, // SI: treated as an intra picture
    })
}

/// Dispatches a raw H.264/AVC Annex B elementary stream.
///
/// Per-frame timing is a simplified, non-HRD derivation: pictures are
/// assumed to appear in the stream in decode order with no B-frame reorder
/// delay, so PTS and DTS are both `decode_index * frame_duration`. A full
/// re-derivation would track `pic_order_cnt`/VUI HRD parameters; BDAV H.264
/// authoring tools always carry real timestamps in their source container
/// (unlike raw-ES-only H.262), so this path exists for completeness rather
/// than as the primary H.264 ingestion route.
pub fn dispatch_h264(data: &[u8], opts: &ParserOptions) -> Result<DispatchOutput> {
    let bytes = Bytes::copy_from_slice(data);
    let units = iter_annex_b(&bytes);

    let sps_unit = units
        .iter()
        .find(|u| matches!(u.unit_type(), Ok(NALUnitType::SPS)))
        .ok_or(DispatchError::NoFramesFound("H.264"))?;
    // `Sps::parse` reads `forbidden_zero_bit`/`nal_ref_idc`/`nal_unit_type`
    // itself, so the header byte `NalUnit::rbsp` excludes has to go back in
    // front of it.
    let mut sps_bytes = Vec::with_capacity(1 + sps_unit.rbsp.len());
    sps_bytes.push(sps_unit.header);
    sps_bytes.extend_from_slice(&sps_unit.rbsp);
    let sps = Sps::parse_with_emulation_prevention(sps_bytes.as_slice())?;

    let frame_rate = sps.frame_rate().unwrap_or(25.0);
    let frame_duration = (SYSTEM_CLOCK_HZ as f64 / frame_rate).round() as u64;

    let format_spec = FormatSpec::Video(VideoFormatSpec {
        video_format: bd_video_format_code(sps.height() as u32, true),
        frame_rate: 0,
        profile: sps.profile_idc,
        level: 0,
        still_picture: false,
        h264: Some(H264FormatSpec {
            constraint_flags: 0,
            cpb_size: 0,
            bitrate: 0,
        }),
    });

    let mut writer = EsmsWriter::create(Vec::new(), esms::StreamType::H264, format_spec, esms_options(opts));
    writer.set_pts_reference(opts.initial_pts);
    writer.write_header()?;

    let crc_len = data.len().min(512);
    let crc = esms::crc32_mpeg2(&data[..crc_len]);
    let src_idx = writer.append_source_file_with_crc(opts.source_name.clone(), crc_len as u16, crc)?;

    let mut decode_index = 0u32;
    let mut frames = 0u32;

    for (idx, unit) in units.iter().enumerate() {
        let is_slice = matches!(
            unit.unit_type(),
            Ok(NALUnitType::NonIDRSliceLayerWithoutPartitioning) | Ok(NALUnitType::IDRSliceLayerWithoutPartitioning)
        );
        if !is_slice {
            continue;
        }

        let picture_type = slice_picture_type(unit.rbsp.as_ref())?;
        let pts = opts.initial_pts + decode_index as u64 * frame_duration;

        let end = units.get(idx + 1).map(|next| next.offset).unwrap_or(data.len());

        writer.init_video_frame(picture_type, pts, Some(pts))?;
        writer.append_command(Command::AddPayloadData {
            src_file_idx: src_idx,
            dst_offset: 0,
            src_offset: unit.offset as u64,
            size: (end - unit.offset) as u32,
        })?;
        writer.write_frame()?;
        frames += 1;
        decode_index += 1;
    }

    if frames == 0 {
        return Err(DispatchError::NoFramesFound("H.264"));
    }

    let directories = writer.complete()?;
    Ok(DispatchOutput { writer, directories })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `sequence_header()` (1920x1080, `aspect_ratio_information=3`,
    /// `frame_rate_code=4` i.e. 30000/1001) + `sequence_extension()`
    /// (Main profile/level, progressive) + one I `picture_header()`,
    /// followed by four bytes of filler slice payload.
    fn sample_h262_stream() -> Vec<u8> {
        vec![
            0x00, 0x00, 0x01, 0xB3, 0x78, 0x04, 0x38, 0x34, 0x00, 0x00, 0x60, 0x50, 0x00, 0x00, 0x01, 0xB5, 0x14, 0x8A, 0x00, 0x01, 0x00, 0x00,
            0x00, 0x00, 0x01, 0x00, 0x00, 0x08, 0x00, 0x00, 0xFF, 0xAA, 0x55, 0x01,
        ]
    }

    #[test]
    fn single_i_picture_h262_stream_dispatches_one_frame() {
        let data = sample_h262_stream();
        let opts = ParserOptions::default();
        let output = dispatch_h262(&data, &opts).expect("a compliant sequence_header + picture should dispatch");
        assert!(output.directories.iter().any(|&(id, _)| id == esms::DIR_PES_CUTTING));
        assert!(output.directories.iter().any(|&(id, _)| id == esms::DIR_FMT_SPEC_PROPERTIES));
    }

    #[test]
    fn h262_rejects_stream_with_no_sequence_header() {
        let data = vec![0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00];
        let opts = ParserOptions::default();
        assert!(dispatch_h262(&data, &opts).is_err());
    }

    /// A baseline-profile, 640x480, `vui_parameters_present_flag = 0` SPS
    /// (`nal_ref_idc=3`) followed by one IDR slice NAL unit whose RBSP
    /// encodes `first_mb_in_slice = 0`, `slice_type = 2` (I).
    fn sample_h264_stream() -> Vec<u8> {
        vec![
            0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x00, 0xF8, 0x14, 0x07, 0xA0, 0x00, 0x00, 0x01, 0x65, 0xB0, 0xAA, 0xBB,
        ]
    }

    #[test]
    fn single_idr_slice_h264_stream_dispatches_one_frame() {
        let data = sample_h264_stream();
        let opts = ParserOptions::default();
        let output = dispatch_h264(&data, &opts).expect("a compliant SPS + IDR slice should dispatch");
        assert!(output.directories.iter().any(|&(id, _)| id == esms::DIR_PES_CUTTING));
        assert!(output.directories.iter().any(|&(id, _)| id == esms::DIR_FMT_SPEC_PROPERTIES));
    }

    #[test]
    fn h264_rejects_stream_with_no_sps() {
        let data = vec![0x00, 0x00, 0x01, 0x65, 0xB0, 0xAA, 0xBB];
        let opts = ParserOptions::default();
        assert!(dispatch_h264(&data, &opts).is_err());
    }

    #[test]
    fn slice_picture_type_decodes_i_slice() {
        // first_mb_in_slice = ue(0) = "1", slice_type = ue(2) = "011".
        let rbsp = [0b1011_0000u8];
        assert_eq!(slice_picture_type(&rbsp).unwrap(), PictureType::I);
    }
}
