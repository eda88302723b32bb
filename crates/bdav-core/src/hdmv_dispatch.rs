//! HDMV Presentation/Interactive Graphics dispatch: walk a raw
//! segment-delimited PGS or IGS stream, feed each composition segment and
//! its sequence-members through one [`hdmv::Epoch`], and derive each
//! Display Set's decode/presentation timestamps with [`hdmv::timing`]'s
//! recompute formulas rather than trusting header-supplied ones — the raw
//! ES this crate reads carries no SUP/MNU container timestamps at all, so
//! recompute mode always applies here regardless of
//! [`crate::ParserOptions::force_retiming`].
//!
//! [`hdmv::timing`]'s formulas are expressed in 90 kHz ticks; ESMS's PTS
//! fields run in the 27 MHz domain (see [`crate::video_dispatch`]'s note),
//! so every derived duration is scaled by 300 before it reaches the writer.

use bitstream::BitReader;

use hdmv::segment::{CompositionState, RawSegment, SegmentType};
use hdmv::sequence::FragmentAssembler;
use hdmv::timing::{self, ObjectPlacement};
use hdmv::Epoch;

use esms::{Command, EsmsWriter, FormatSpec};

use crate::error::{DispatchError, Result};
use crate::{esms_options, DispatchOutput, ParserOptions};

const PES_CLOCK_SCALE: u64 = 300;

fn to_27mhz(ticks_90khz: u64) -> u64 {
    ticks_90khz * PES_CLOCK_SCALE
}

/// BDAV `VFMT` `video_format` nibble (BD-ROM §5.3.4.3.1 Table 5-18),
/// height-only since HDMV graphics planes carry no progressive/interlaced
/// distinction of their own — they inherit the underlying video plane's.
fn bd_video_format_code(height: u32) -> u8 {
    match height {
        480 => 1,
        576 => 2,
        720 => 4,
        1080 => 5,
        _ => 0,
    }
}

/// Which BDAV §4.5.4 timestamp-table row a Display Set's raw segment
/// takes. Every raw segment (including each fragment of a fragmented
/// ODS/ICS) is tagged so the emission loop can look up its timing
/// without re-walking the segment list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentRole {
    /// PCS (PGS) or ICS (IGS), including every fragment of a fragmented
    /// ICS — all share the composition's own timing.
    Composition,
    /// WDS (PGS only).
    Wds,
    /// PDS.
    Palette,
    /// ODS, naming its index into `object_sizes`/`DisplaySetTimings::objects`
    /// (completion order; every fragment of one object shares its index).
    Object(usize),
    /// `END`.
    End,
}

/// One assembled Display Set: the raw segments that compose it (in stream
/// order, with their absolute source offsets and timestamp roles), plus
/// the decoded PCS/ICS and the object/window sizes needed for its
/// decode-duration formula.
struct DisplaySet {
    segments: Vec<(usize, RawSegment)>,
    segment_roles: Vec<SegmentRole>,
    object_sizes: Vec<(u16, u16)>,
    window_sizes: Vec<(u16, u16)>,
    /// `(palette_id, assembled PDS payload)`, one per PDS segment.
    palettes: Vec<(u8, Vec<u8>)>,
    /// `(object_id, assembled ODS payload)`, one per completed object, in
    /// completion order — parallel to `object_sizes`.
    objects: Vec<(u16, Vec<u8>)>,
    video_width: u16,
    video_height: u16,
    composition_number: u16,
    composition_state: CompositionState,
}

fn walk_raw_segments(data: &[u8]) -> Result<Vec<(usize, RawSegment)>> {
    let mut out = Vec::new();
    let mut offset = 0usize;
    while offset < data.len() {
        let mut reader = BitReader::new(&data[offset..]);
        let segment = hdmv::segment::read_raw_segment(&mut reader)?;
        let consumed = 3 + segment.segment_length as usize;
        out.push((offset, segment));
        offset += consumed;
    }
    Ok(out)
}

/// Groups a flat segment stream into Display Sets, split at each `END`
/// segment (BDAV §4.5.1: exactly one `END` closes every Display Set).
fn group_display_sets(segments: Vec<(usize, RawSegment)>) -> Vec<Vec<(usize, RawSegment)>> {
    let mut sets = Vec::new();
    let mut current = Vec::new();
    for entry in segments {
        let is_end = entry.1.segment_type == SegmentType::End;
        current.push(entry);
        if is_end {
            sets.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        sets.push(current);
    }
    sets
}

/// Dispatches a raw PGS (subtitle) elementary stream.
pub fn dispatch_pgs(data: &[u8], opts: &ParserOptions) -> Result<DispatchOutput> {
    dispatch_hdmv(data, opts, esms::StreamType::Pgs, true)
}

/// Dispatches a raw IGS (menu) elementary stream.
pub fn dispatch_igs(data: &[u8], opts: &ParserOptions) -> Result<DispatchOutput> {
    dispatch_hdmv(data, opts, esms::StreamType::Igs, false)
}

fn dispatch_hdmv(data: &[u8], opts: &ParserOptions, stream_type: esms::StreamType, is_pgs: bool) -> Result<DispatchOutput> {
    let raw_segments = walk_raw_segments(data)?;
    if raw_segments.is_empty() {
        return Err(DispatchError::NoFramesFound(if is_pgs { "PGS" } else { "IGS" }));
    }
    let display_sets_raw = group_display_sets(raw_segments);

    let first_ds = if is_pgs {
        decode_pgs_display_set(&display_sets_raw[0])?
    } else {
        decode_igs_display_set(&display_sets_raw[0])?
    };

    // `esms`'s `ESFP` section has no HDMV-shaped variant; BDAV authoring
    // tools carry the epoch's `video_descriptor` there instead, so the
    // first Display Set's dimensions are recorded via the video format
    // spec even though `profile`/`level`/`frame_rate` are meaningless for
    // a graphics-only stream.
    let format_spec = FormatSpec::Video(esms::format::VideoFormatSpec {
        video_format: bd_video_format_code(first_ds.video_height as u32),
        frame_rate: 0,
        profile: 0,
        level: 0,
        still_picture: false,
        h264: None,
    });

    let mut writer = EsmsWriter::create(Vec::new(), stream_type, format_spec, esms_options(opts));
    writer.set_pts_reference(opts.initial_pts);
    writer.write_header()?;

    let crc_len = data.len().min(512);
    let crc = esms::crc32_mpeg2(&data[..crc_len]);
    let src_idx = writer.append_source_file_with_crc(opts.source_name.clone(), crc_len as u16, crc)?;

    let mut epoch = Epoch::new();
    let mut emptied_windows: Vec<(u16, u16)> = Vec::new();
    let mut frames = 0u32;
    let mut pts_27mhz = opts.initial_pts;

    for raw_ds in display_sets_raw {
        let ds = if is_pgs { decode_pgs_display_set(&raw_ds)? } else { decode_igs_display_set(&raw_ds)? };

        let is_epoch_start = ds.composition_state == CompositionState::EpochStart;
        let video_descriptor = hdmv::segment::VideoDescriptor {
            video_width: ds.video_width,
            video_height: ds.video_height,
            frame_rate: 0,
        };
        epoch.begin_display_set(ds.composition_number, ds.composition_state, video_descriptor)?;
        for (palette_id, content) in &ds.palettes {
            epoch.register_palette(*palette_id, content)?;
        }
        for (object_id, content) in &ds.objects {
            epoch.register_object(*object_id, content)?;
        }

        let mut per_ds_counts = std::collections::HashMap::new();
        for (_, segment) in &raw_ds {
            *per_ds_counts.entry(segment.segment_type).or_insert(0u32) += 1;
        }
        epoch.check_counts(&per_ds_counts)?;

        let decode_duration_90khz = if is_pgs {
            // Treats every window the previous Display Set drew as emptied by
            // this one; a tighter derivation would diff the two window sets
            // and charge only windows absent from the new WDS.
            let plane_init = timing::plane_initialization_time(ds.video_width, ds.video_height, is_epoch_start, &emptied_windows);
            let placement = placement_for(&ds.object_sizes, &ds.window_sizes);
            let object_computation = placement.map(timing::object_computation_duration_pgs).unwrap_or(0);
            timing::decode_duration_pgs(plane_init, object_computation)
        } else {
            let obj_decode = timing::obj_decode_duration_igs(&ds.object_sizes);
            let ic_decode = timing::ic_decode_duration_igs(obj_decode, ds.video_width, ds.video_height, is_epoch_start);
            let in_effect_window = ds.window_sizes.first().copied().unwrap_or((0, 0));
            let default_button_area = ds.window_sizes.first().copied().unwrap_or((0, 0));
            let ic_transfer = timing::ic_transfer_duration_igs(in_effect_window, default_button_area);
            timing::decode_duration_igs(ic_decode, ic_transfer)
        };

        let decode_time = pts_27mhz;
        let pres_time = decode_time + to_27mhz(decode_duration_90khz);
        epoch.check_interval(decode_time, pres_time)?;

        // Per-object decode durations (completion order), the other input
        // `display_set_timings` needs beyond the DS-level duration already
        // folded into `decode_duration_90khz` above.
        let object_decode_durations: Vec<u64> = ds
            .object_sizes
            .iter()
            .map(|&(w, h)| if is_pgs { timing::ods_decode_duration_pgs(w, h) } else { timing::od_decode_duration_igs(w, h) })
            .collect();
        let wds_drawing_duration = is_pgs.then(|| timing::window_drawing_duration(&ds.window_sizes));
        let segment_timings =
            timing::display_set_timings(decode_duration_90khz, wds_drawing_duration, &object_decode_durations, timing::od_transfer_duration_igs);

        for (index, &(offset, ref segment)) in ds.segments.iter().enumerate() {
            let timing = match ds.segment_roles[index] {
                SegmentRole::Composition => segment_timings.composition,
                SegmentRole::Wds => segment_timings.wds.expect("WDS role only tagged for PGS streams"),
                SegmentRole::Palette => segment_timings.palette,
                SegmentRole::Object(object_index) => segment_timings.objects[object_index],
                SegmentRole::End => segment_timings.end,
            };
            let segment_pts = decode_time + to_27mhz(timing.pts_offset);
            let segment_dts = timing.dts_offset.map(|offset| decode_time + to_27mhz(offset));

            writer.init_hdmv_frame(segment_pts, segment_dts)?;
            writer.append_command(Command::AddPayloadData {
                src_file_idx: src_idx,
                dst_offset: 0,
                src_offset: offset as u64,
                size: 3 + segment.segment_length as u32,
            })?;
            writer.write_frame()?;
            frames += 1;
        }

        emptied_windows = ds.window_sizes.clone();
        epoch.complete_display_set();
        pts_27mhz = pres_time;
    }

    if frames == 0 {
        return Err(DispatchError::NoFramesFound(if is_pgs { "PGS" } else { "IGS" }));
    }

    let directories = writer.complete()?;
    Ok(DispatchOutput { writer, directories })
}

/// Resolves a Display Set's composition objects and windows into the
/// pipelining case [`hdmv::timing::object_computation_duration_pgs`]
/// expects. Display Sets with no composition objects (a WDS/PDS-only
/// update) need no object-decode term at all.
fn placement_for(object_sizes: &[(u16, u16)], window_sizes: &[(u16, u16)]) -> Option<ObjectPlacement> {
    match object_sizes {
        [] => None,
        [only] => {
            let window = window_sizes.first().copied().unwrap_or(*only);
            Some(ObjectPlacement::One { object: *only, window })
        }
        [a, b, ..] => {
            if window_sizes.len() >= 2 {
                Some(ObjectPlacement::TwoDifferentWindows {
                    object_a: *a,
                    window_a: window_sizes[0],
                    object_b: *b,
                    window_b: window_sizes[1],
                })
            } else {
                let window = window_sizes.first().copied().unwrap_or(*a);
                Some(ObjectPlacement::TwoSameWindow { object_a: *a, object_b: *b, window })
            }
        }
    }
}

/// Assigns a raw ODS fragment's [`SegmentRole::Object`] index, keyed by
/// `object_id` and stable across that object's fragments. Indices are
/// handed out in first-fragment order, which BDAV authoring always makes
/// coincide with completion order (objects are never interleaved within
/// a Display Set).
fn object_role_index(next_index: &mut usize, index_by_id: &mut std::collections::HashMap<u16, usize>, object_id: u16) -> usize {
    *index_by_id.entry(object_id).or_insert_with(|| {
        let index = *next_index;
        *next_index += 1;
        index
    })
}

fn decode_pgs_display_set(raw: &[(usize, RawSegment)]) -> Result<DisplaySet> {
    let mut object_sizes = Vec::new();
    let mut window_sizes = Vec::new();
    let mut palettes = Vec::new();
    let mut objects = Vec::new();
    let mut video_width = 0;
    let mut video_height = 0;
    let mut composition_number = 0;
    let mut composition_state = CompositionState::Normal;
    let mut ods_assembler = FragmentAssembler::new(SegmentType::Ods);
    let mut next_object_index = 0usize;
    let mut object_index_by_id = std::collections::HashMap::new();
    let mut segment_roles = Vec::with_capacity(raw.len());

    for (_, segment) in raw {
        match segment.segment_type {
            SegmentType::Pcs => {
                let pcs = hdmv::pcs::read_pcs(&segment.payload)?;
                video_width = pcs.video_descriptor.video_width;
                video_height = pcs.video_descriptor.video_height;
                composition_number = pcs.composition_descriptor.composition_number;
                composition_state = pcs.composition_descriptor.composition_state;
                segment_roles.push(SegmentRole::Composition);
            }
            SegmentType::Wds => {
                let wds = hdmv::wds::read_wds(&segment.payload)?;
                window_sizes.extend(wds.windows.iter().map(|w| w.size));
                segment_roles.push(SegmentRole::Wds);
            }
            SegmentType::Pds => {
                let pds = hdmv::pds::read_pds(&segment.payload)?;
                palettes.push((pds.palette_id, segment.payload.clone()));
                segment_roles.push(SegmentRole::Palette);
            }
            SegmentType::Ods => {
                let (header, rest) = hdmv::ods::read_ods_fragment_header(&segment.payload)?;
                let object_index = object_role_index(&mut next_object_index, &mut object_index_by_id, header.object_id);
                segment_roles.push(SegmentRole::Object(object_index));
                if let Some(assembled) = ods_assembler.feed(header.object_id, header.sequence_descriptor, rest)? {
                    let ods = hdmv::ods::read_ods(&assembled)?;
                    object_sizes.push((ods.object_width, ods.object_height));
                    objects.push((header.object_id, assembled));
                }
            }
            SegmentType::End => segment_roles.push(SegmentRole::End),
            SegmentType::Ics => {}
        }
    }
    ods_assembler.check_closed()?;

    Ok(DisplaySet {
        segments: raw.to_vec(),
        segment_roles,
        object_sizes,
        window_sizes,
        palettes,
        objects,
        video_width,
        video_height,
        composition_number,
        composition_state,
    })
}

fn decode_igs_display_set(raw: &[(usize, RawSegment)]) -> Result<DisplaySet> {
    let mut object_sizes = Vec::new();
    let mut palettes = Vec::new();
    let mut objects = Vec::new();
    let mut video_width = 0;
    let mut video_height = 0;
    let mut composition_number = 0;
    let mut composition_state = CompositionState::Normal;
    let mut ods_assembler = FragmentAssembler::new(SegmentType::Ods);
    let mut ics_assembler = FragmentAssembler::new(SegmentType::Ics);
    let mut page_areas: Vec<(u16, u16)> = Vec::new();
    let mut next_object_index = 0usize;
    let mut object_index_by_id = std::collections::HashMap::new();
    let mut segment_roles = Vec::with_capacity(raw.len());

    for (_, segment) in raw {
        match segment.segment_type {
            SegmentType::Ics => {
                let (header, rest) = hdmv::ics::read_ics_fragment_header(&segment.payload)?;
                video_width = header.video_descriptor.video_width;
                video_height = header.video_descriptor.video_height;
                composition_number = header.composition_descriptor.composition_number;
                composition_state = header.composition_descriptor.composition_state;
                segment_roles.push(SegmentRole::Composition);
                if let Some(assembled) = ics_assembler.feed(0, header.sequence_descriptor, rest)? {
                    let composition = hdmv::ics::read_interactive_composition(&assembled)?;
                    if !composition.pages.is_empty() {
                        page_areas.push((video_width, video_height));
                    }
                }
            }
            SegmentType::Pds => {
                let pds = hdmv::pds::read_pds(&segment.payload)?;
                palettes.push((pds.palette_id, segment.payload.clone()));
                segment_roles.push(SegmentRole::Palette);
            }
            SegmentType::Ods => {
                let (header, rest) = hdmv::ods::read_ods_fragment_header(&segment.payload)?;
                let object_index = object_role_index(&mut next_object_index, &mut object_index_by_id, header.object_id);
                segment_roles.push(SegmentRole::Object(object_index));
                if let Some(assembled) = ods_assembler.feed(header.object_id, header.sequence_descriptor, rest)? {
                    let ods = hdmv::ods::read_ods(&assembled)?;
                    object_sizes.push((ods.object_width, ods.object_height));
                    objects.push((header.object_id, assembled));
                }
            }
            SegmentType::End => segment_roles.push(SegmentRole::End),
            SegmentType::Pcs | SegmentType::Wds => {}
        }
    }
    ods_assembler.check_closed()?;
    ics_assembler.check_closed()?;

    Ok(DisplaySet {
        segments: raw.to_vec(),
        segment_roles,
        object_sizes,
        window_sizes: page_areas,
        palettes,
        objects,
        video_width,
        video_height,
        composition_number,
        composition_state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment_bytes(segment_type: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![segment_type];
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn epoch_start_pcs_payload() -> Vec<u8> {
        vec![
            0x07, 0x80, 0x04, 0x38, 0x40, // video_descriptor 1920x1080
            0x00, 0x00, 0x80, // composition_number=0, epoch_start
            0x00, // palette_update_flag=0
            0x00, // palette_id_ref
            0x00, // number_of_composition_objects=0
        ]
    }

    #[test]
    fn single_display_set_pgs_stream_emits_one_frame_per_segment() {
        let mut data = Vec::new();
        data.extend(segment_bytes(0x16, &epoch_start_pcs_payload())); // PCS
        data.extend(segment_bytes(0x80, &[])); // END

        let opts = ParserOptions::default();
        let output = dispatch_pgs(&data, &opts).expect("single epoch-start PCS + END should dispatch");
        assert!(!output.directories.is_empty());
        assert_eq!(output.writer.frame_count(), 2);
    }

    #[test]
    fn one_pes_frame_is_emitted_per_raw_segment_not_per_display_set() {
        let pds_payload = {
            let mut v = vec![0x01]; // palette_id
            v.push(0x00); // palette_version_number
            v.extend_from_slice(&[0, 0, 0, 0, 0]); // one palette entry
            v
        };

        let mut data = Vec::new();
        data.extend(segment_bytes(0x16, &epoch_start_pcs_payload())); // PCS
        data.extend(segment_bytes(0x14, &pds_payload)); // PDS
        data.extend(segment_bytes(0x80, &[])); // END

        let opts = ParserOptions::default();
        let output = dispatch_pgs(&data, &opts).expect("PCS + PDS + END should dispatch");
        // Three raw segments in this Display Set, so three PES frames.
        assert_eq!(output.writer.frame_count(), 3);
    }

    #[test]
    fn empty_stream_is_rejected() {
        let opts = ParserOptions::default();
        assert!(dispatch_pgs(&[], &opts).is_err());
    }

    #[test]
    fn placement_for_no_objects_is_none() {
        assert!(placement_for(&[], &[]).is_none());
    }

    #[test]
    fn placement_for_two_objects_one_window_is_same_window() {
        let placement = placement_for(&[(100, 100), (50, 50)], &[(200, 200)]);
        assert!(matches!(placement, Some(ObjectPlacement::TwoSameWindow { .. })));
    }
}
