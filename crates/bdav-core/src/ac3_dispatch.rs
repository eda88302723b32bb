//! AC-3 and E-AC-3 dispatch loops: scan a raw syncword-delimited stream,
//! decode each syncframe header, derive its PTS via [`ac3::StreamState`],
//! and emit one ESMS PES frame per syncframe whose sole command copies the
//! frame bytes straight from the source file (`ADD_PAYLOAD_DATA`, no
//! re-encoding).

use bitstream::BitReader;
use ac3::{ac3 as ac3_syntax, eac3, StreamState};
use esms::{Command, EsmsWriter, FormatSpec};
use esms::format::{Ac3FormatSpec, AudioFormatSpec};

use crate::error::{DispatchError, Result};
use crate::{esms_options, DispatchOutput, ParserOptions};

/// Audio coding mode channel counts, ATSC A/52:2018 Table 5.8. Duplicated
/// here because `ac3::ac3::AudioCodingMode::from_code`/`channel_count` are
/// private to the `ac3` crate; E-AC-3's `acmod` uses the same table.
fn acmod_channel_count(acmod: u8) -> u8 {
    match acmod {
        0 => 2,
        1 => 1,
        2 => 2,
        3 | 4 => 3,
        5 | 6 => 4,
        _ => 5,
    }
}

/// Dispatches a raw AC-3 (`bsid <= 8`) elementary stream.
pub fn dispatch_ac3(data: &[u8], opts: &ParserOptions) -> Result<DispatchOutput> {
    let first_sync = ac3::find_next_syncword(data, 0).ok_or(DispatchError::NoFramesFound("AC-3"))?;

    let (first_sync_info, first_bsi) = {
        let mut reader = BitReader::new(&data[first_sync..]);
        let sync_info = ac3_syntax::read_sync_info(&mut reader)?;
        let bsi = ac3_syntax::read_bit_stream_info(&mut reader)?;
        (sync_info, bsi)
    };

    let format_spec = FormatSpec::Audio(AudioFormatSpec {
        audio_format: 0x1,
        sample_rate: first_sync_info.fscod,
        bit_depth: 0,
        ac3: Some(Ac3FormatSpec {
            sub_sample_rate: 0,
            bsid: first_bsi.bsid,
            bitrate_mode: 0,
            bitrate_code: first_sync_info.frmsizecod & 0x1F,
            surround_mode: 0,
            bsmod: first_bsi.bsmod,
            num_channels: first_bsi.nb_channels(),
            full_svc: false,
        }),
    });

    let mut writer = EsmsWriter::create(Vec::new(), esms::StreamType::Ac3, format_spec, esms_options(opts));
    writer.set_pts_reference(opts.initial_pts);
    writer.set_bitrate(first_sync_info.bitrate_kbps().unwrap_or(0) * 1000);
    writer.write_header()?;

    let crc_len = data.len().min(512);
    let crc = esms::crc32_mpeg2(&data[..crc_len]);
    let src_idx = writer.append_source_file_with_crc(opts.source_name.clone(), crc_len as u16, crc)?;

    let mut state: Option<StreamState> = None;
    let mut offset = first_sync;
    let mut frames = 0u32;

    while let Some(sync_offset) = ac3::find_next_syncword(data, offset) {
        let mut reader = BitReader::new(&data[sync_offset..]);
        let sync_info = ac3_syntax::read_sync_info(&mut reader)?;
        let bsi = ac3_syntax::read_bit_stream_info(&mut reader)?;
        let frame_size = sync_info.frame_size_bytes().ok_or(DispatchError::NoFramesFound("AC-3"))?;

        if sync_offset + frame_size as usize > data.len() {
            break;
        }

        let pts = match &mut state {
            None => {
                state = Some(StreamState::start_ac3(&sync_info, &bsi)?);
                state.as_mut().unwrap().observe_ac3(&sync_info, &bsi)?
            }
            Some(st) => st.observe_ac3(&sync_info, &bsi)?,
        };

        writer.init_audio_frame(false, opts.initial_pts + pts, None)?;
        writer.append_command(Command::AddPayloadData {
            src_file_idx: src_idx,
            dst_offset: 0,
            src_offset: sync_offset as u64,
            size: frame_size,
        })?;
        writer.write_frame()?;
        frames += 1;

        offset = sync_offset + frame_size as usize;
    }

    if frames == 0 {
        return Err(DispatchError::NoFramesFound("AC-3"));
    }

    let directories = writer.complete()?;
    Ok(DispatchOutput { writer, directories })
}

/// One BDAV-compliant AC-3 syncframe: `fscod=0` (48 kHz), `frmsizecod=0x20`
/// (192 kbps, 768-byte frame), `bsid=8`, `acmod=2` (2/0 stereo, so `dsurmod`
/// rather than `cmixlev`/`surmixlev` follows), `dialnorm=31`. Matches the
/// fixture `ac3::tests::ac3_single_frame_pts_matches_authoring_formula`
/// decodes field-by-field.
fn sample_ac3_frame() -> Vec<u8> {
    let mut frame = vec![0x0B, 0x77, 0x00, 0x00, 0x20, 0x40, 0x43, 0xE0, 0x00];
    frame.resize(768, 0);
    frame
}

/// One BDAV-compliant E-AC-3 syncframe: `strmtyp=0` (independent),
/// `frmsiz=255` (512-byte frame), `fscod=0`, `acmod=2`, `bsid=16`,
/// `dialnorm=31`. Matches `eac3::tests::sample_frame`.
fn sample_eac3_frame() -> Vec<u8> {
    let mut frame = vec![0x0B, 0x77, 0x00, 0xFF, 0x34, 0x87, 0xC0];
    frame.resize(512, 0);
    frame
}

/// Dispatches a raw E-AC-3 (`11 <= bsid <= 16`) elementary stream.
pub fn dispatch_eac3(data: &[u8], opts: &ParserOptions) -> Result<DispatchOutput> {
    let first_sync = ac3::find_next_syncword(data, 0).ok_or(DispatchError::NoFramesFound("E-AC-3"))?;

    let first_frame = {
        let mut reader = BitReader::new(&data[first_sync..]);
        eac3::read_sync_frame(&mut reader)?
    };

    let format_spec = FormatSpec::Audio(AudioFormatSpec {
        audio_format: 0x2,
        sample_rate: first_frame.fscod,
        bit_depth: 0,
        ac3: Some(Ac3FormatSpec {
            sub_sample_rate: 0,
            bsid: first_frame.bsid,
            bitrate_mode: 1, // E-AC-3's frmsiz is inherently variable per frame
            bitrate_code: 0,
            surround_mode: 0,
            bsmod: 0,
            num_channels: acmod_channel_count(first_frame.acmod) + first_frame.lfeon as u8,
            full_svc: false,
        }),
    });

    let mut writer = EsmsWriter::create(Vec::new(), esms::StreamType::Eac3, format_spec, esms_options(opts));
    writer.set_pts_reference(opts.initial_pts);
    writer.set_bitrate(0);
    writer.write_header()?;

    let crc_len = data.len().min(512);
    let crc = esms::crc32_mpeg2(&data[..crc_len]);
    let src_idx = writer.append_source_file_with_crc(opts.source_name.clone(), crc_len as u16, crc)?;

    let mut state: Option<StreamState> = None;
    let mut offset = first_sync;
    let mut frames = 0u32;

    while let Some(sync_offset) = ac3::find_next_syncword(data, offset) {
        let mut reader = BitReader::new(&data[sync_offset..]);
        let frame = match eac3::read_sync_frame(&mut reader) {
            Ok(frame) => frame,
            Err(_) => break,
        };
        let frame_size = frame.frame_size_bytes();

        if sync_offset + frame_size as usize > data.len() {
            break;
        }

        let pts = match &mut state {
            None => {
                state = Some(StreamState::start_eac3(&frame)?);
                state.as_mut().unwrap().observe_eac3(&frame)?
            }
            Some(st) => st.observe_eac3(&frame)?,
        };

        writer.init_audio_frame(false, opts.initial_pts + pts, None)?;
        writer.append_command(Command::AddPayloadData {
            src_file_idx: src_idx,
            dst_offset: 0,
            src_offset: sync_offset as u64,
            size: frame_size,
        })?;
        writer.write_frame()?;
        frames += 1;

        offset = sync_offset + frame_size as usize;
    }

    if frames == 0 {
        return Err(DispatchError::NoFramesFound("E-AC-3"));
    }

    let directories = writer.complete()?;
    Ok(DispatchOutput { writer, directories })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_ac3_frame_dispatches_one_pes_frame() {
        let data = sample_ac3_frame();
        let opts = ParserOptions::default();
        let output = dispatch_ac3(&data, &opts).expect("a single compliant AC-3 frame should dispatch");
        assert!(output.directories.iter().any(|&(id, _)| id == esms::DIR_PES_CUTTING));
        assert!(output.directories.iter().any(|&(id, _)| id == esms::DIR_FMT_SPEC_PROPERTIES));
    }

    #[test]
    fn two_ac3_frames_advance_pts_by_one_frame_duration() {
        let mut data = sample_ac3_frame();
        data.extend(sample_ac3_frame());
        let opts = ParserOptions::default();
        let output = dispatch_ac3(&data, &opts).expect("two back-to-back compliant frames should dispatch");
        assert!(!output.directories.is_empty());
    }

    #[test]
    fn ac3_rejects_stream_with_no_syncword() {
        let data = vec![0u8; 32];
        let opts = ParserOptions::default();
        assert!(dispatch_ac3(&data, &opts).is_err());
    }

    #[test]
    fn single_eac3_frame_dispatches_one_pes_frame() {
        let data = sample_eac3_frame();
        let opts = ParserOptions::default();
        let output = dispatch_eac3(&data, &opts).expect("a single compliant E-AC-3 frame should dispatch");
        assert!(output.directories.iter().any(|&(id, _)| id == esms::DIR_PES_CUTTING));
    }

    #[test]
    fn eac3_rejects_empty_stream() {
        let opts = ParserOptions::default();
        assert!(dispatch_eac3(&[], &opts).is_err());
    }
}
