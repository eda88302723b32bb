//! MPEG-2 Video (ITU-T H.262) start-code level header decoding and BDAV
//! compliance checking.
//!
//! Unlike [`crate::sps`], which decodes a single self-contained NAL unit,
//! H.262 compliance checking is stateful across the whole stream: several
//! fields (picture size, aspect ratio, frame-rate, bitrate, VBV buffer size,
//! the MPEG-1 constrained-parameters flag) must stay constant from the first
//! `sequence_header()` onward, and DTS/PTS re-derivation needs the most
//! recent GOP's presentation time plus each picture's position within it.
//! [`SequenceState`] carries that running state; the free functions here are
//! pure decode/check steps over a [`BitReader`].

use bitstream::BitReader;

use crate::{Result, VideoError};

/// `sequence_header_code` start code value (last byte of `0x000001B3`).
pub const SEQUENCE_HEADER_CODE: u8 = 0xB3;
/// `extension_start_code` (`0x000001B5`).
pub const EXTENSION_START_CODE: u8 = 0xB5;
/// `group_start_code` (`0x000001B8`).
pub const GROUP_START_CODE: u8 = 0xB8;
/// Picture start codes are `0x00000100`; every other `picture_header` shares
/// this start code value.
pub const PICTURE_START_CODE: u8 = 0x00;

const SEQUENCE_EXTENSION_ID: u8 = 1;
const SEQUENCE_DISPLAY_EXTENSION_ID: u8 = 2;
const PICTURE_CODING_EXTENSION_ID: u8 = 8;
const QUANT_MATRIX_EXTENSION_ID: u8 = 3;
const COPYRIGHT_EXTENSION_ID: u8 = 4;

/// Decoded `sequence_header()`, ISO/IEC 13818-2 §6.2.2.1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceHeader {
    /// `horizontal_size_value`, low 12 bits of the full horizontal size.
    pub horizontal_size_value: u16,
    /// `vertical_size_value`, low 12 bits of the full vertical size.
    pub vertical_size_value: u16,
    /// `aspect_ratio_information`, `[1, 4]` once forbidden/reserved values
    /// are rejected.
    pub aspect_ratio_information: u8,
    /// `frame_rate_code`, `[1, 8]` once forbidden/reserved values are
    /// rejected.
    pub frame_rate_code: u8,
    /// `bit_rate_value`, low 18 bits of the bitrate in units of 400 bit/s.
    pub bit_rate_value: u32,
    /// `vbv_buffer_size_value`, low 10 bits of the VBV buffer size in units
    /// of 16 KiB.
    pub vbv_buffer_size_value: u16,
    /// `constrained_parameters_flag`: MPEG-1 constrained-parameters mode.
    pub constrained_parameters_flag: bool,
}

/// Decoded `sequence_extension()`, ISO/IEC 13818-2 §6.2.2.3.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceExtension {
    /// `profile_and_level_indication`.
    pub profile_and_level_indication: u8,
    /// `progressive_sequence`.
    pub progressive_sequence: bool,
    /// `chroma_format`, must be `1` (4:2:0) for BDAV.
    pub chroma_format: u8,
    /// `horizontal_size_extension`, high 2 bits of horizontal size.
    pub horizontal_size_extension: u8,
    /// `vertical_size_extension`, high 2 bits of vertical size.
    pub vertical_size_extension: u8,
    /// `bit_rate_extension`, high 12 bits of bitrate.
    pub bit_rate_extension: u16,
    /// `vbv_buffer_size_extension`, high 8 bits of VBV buffer size.
    pub vbv_buffer_size_extension: u8,
    /// `low_delay`: must be `false` for BDAV (no low-delay streams).
    pub low_delay: bool,
}

impl SequenceExtension {
    /// `profile_idc`: high nibble of `profile_and_level_indication`.
    pub fn profile_idc(&self) -> u8 {
        self.profile_and_level_indication >> 4
    }

    /// `level_idc`: low nibble of `profile_and_level_indication`.
    pub fn level_idc(&self) -> u8 {
        self.profile_and_level_indication & 0x0F
    }
}

/// Full-precision picture size/bitrate/VBV values, combining the base
/// `sequence_header()` fields with their `sequence_extension()` high bits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceComputedValues {
    /// Full horizontal size, in pixels.
    pub horizontal_size: u32,
    /// Full vertical size, in pixels.
    pub vertical_size: u32,
    /// Full bitrate, in units of 400 bit/s.
    pub bit_rate: u32,
    /// Full VBV buffer size, in units of 16 KiB.
    pub vbv_buffer_size: u32,
}

impl SequenceComputedValues {
    fn combine(header: &SequenceHeader, ext: &SequenceExtension) -> Self {
        Self {
            horizontal_size: ((ext.horizontal_size_extension as u32) << 12) | header.horizontal_size_value as u32,
            vertical_size: ((ext.vertical_size_extension as u32) << 12) | header.vertical_size_value as u32,
            bit_rate: ((ext.bit_rate_extension as u32) << 18) | header.bit_rate_value,
            vbv_buffer_size: ((ext.vbv_buffer_size_extension as u32) << 10) | header.vbv_buffer_size_value as u32,
        }
    }

    /// Bitrate in bit/s (the stored unit is 400 bit/s).
    pub fn bit_rate_bps(&self) -> u64 {
        self.bit_rate as u64 * 400
    }
}

/// `picture_coding_type`, ISO/IEC 13818-2 Table 6-12.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureCodingType {
    /// Intra-coded.
    I,
    /// Predictive-coded.
    P,
    /// Bidirectionally-predictive-coded.
    B,
    /// DC intra-coded (MPEG-1 only, forbidden in BDAV streams).
    D,
}

impl PictureCodingType {
    fn from_code(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::I),
            2 => Ok(Self::P),
            3 => Ok(Self::B),
            4 => Ok(Self::D),
            _ => Err(VideoError::Forbidden {
                field: "picture_coding_type",
                value: value as u32,
            }),
        }
    }
}

/// Decoded `picture_header()`, ISO/IEC 13818-2 §6.2.3.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PictureHeader {
    /// `temporal_reference`: position of this picture within its GOP.
    pub temporal_reference: u16,
    /// `picture_coding_type`.
    pub picture_coding_type: PictureCodingType,
    /// `vbv_delay`.
    pub vbv_delay: u16,
}

/// Decoded `picture_coding_extension()`, ISO/IEC 13818-2 §6.2.3.1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PictureCodingExtension {
    /// `picture_structure`: `1` top field, `2` bottom field, `3` frame.
    pub picture_structure: u8,
    /// `top_field_first`.
    pub top_field_first: bool,
    /// `frame_pred_frame_dct`.
    pub frame_pred_frame_dct: bool,
    /// `progressive_frame`.
    pub progressive_frame: bool,
    /// `repeat_first_field`.
    pub repeat_first_field: bool,
}

/// Reads `sequence_header()`, including the leading start code.
pub fn read_sequence_header<T: std::io::Read>(reader: &mut BitReader<T>) -> Result<SequenceHeader> {
    let code = reader.read_bits(32)? as u32;
    if code != 0x0000_0100 | SEQUENCE_HEADER_CODE as u32 {
        return Err(VideoError::MissingStartCode(SEQUENCE_HEADER_CODE));
    }

    let horizontal_size_value = reader.read_bits(12)? as u16;
    let vertical_size_value = reader.read_bits(12)? as u16;
    let aspect_ratio_information = reader.read_bits(4)? as u8;
    let frame_rate_code = reader.read_bits(4)? as u8;
    let bit_rate_value = reader.read_bits(18)? as u32;
    let marker_bit = reader.read_bit()?;
    if !marker_bit {
        return Err(VideoError::NonCompliant("sequence_header marker_bit == 0".into()));
    }
    let vbv_buffer_size_value = reader.read_bits(10)? as u16;
    let constrained_parameters_flag = reader.read_bit()?;

    skip_quantiser_matrices(reader)?;

    Ok(SequenceHeader {
        horizontal_size_value,
        vertical_size_value,
        aspect_ratio_information,
        frame_rate_code,
        bit_rate_value,
        vbv_buffer_size_value,
        constrained_parameters_flag,
    })
}

fn skip_quantiser_matrices<T: std::io::Read>(reader: &mut BitReader<T>) -> Result<()> {
    if reader.read_bit()? {
        reader.skip_bits(8 * 64)?;
    }
    if reader.read_bit()? {
        reader.skip_bits(8 * 64)?;
    }
    Ok(())
}

/// Checks `sequence_header()` compliance: forbidden/reserved codewords and,
/// when `constrained_parameters_flag` is set, the MPEG-1 constrained
/// parameter bounds (ISO/IEC 11172-2 §2.4.3.2).
pub fn check_sequence_header_compliance(header: &SequenceHeader) -> Result<()> {
    if header.horizontal_size_value == 0 {
        return Err(VideoError::NonCompliant("horizontal_size_value == 0".into()));
    }
    if header.vertical_size_value == 0 {
        return Err(VideoError::NonCompliant("vertical_size_value == 0".into()));
    }
    if header.aspect_ratio_information == 0 || header.aspect_ratio_information >= 5 {
        return Err(VideoError::Forbidden {
            field: "aspect_ratio_information",
            value: header.aspect_ratio_information as u32,
        });
    }
    if header.frame_rate_code == 0 || header.frame_rate_code >= 9 {
        return Err(VideoError::Forbidden {
            field: "frame_rate_code",
            value: header.frame_rate_code as u32,
        });
    }
    if header.bit_rate_value == 0 {
        return Err(VideoError::NonCompliant("bit_rate_value == 0".into()));
    }

    if header.constrained_parameters_flag {
        if header.horizontal_size_value > 768 {
            return Err(VideoError::NonCompliant(format!(
                "horizontal_size_value {} exceeds the 768px MPEG-1 constrained-parameters limit",
                header.horizontal_size_value
            )));
        }
        if header.vertical_size_value > 576 {
            return Err(VideoError::NonCompliant(format!(
                "vertical_size_value {} exceeds the 576px MPEG-1 constrained-parameters limit",
                header.vertical_size_value
            )));
        }
        let macroblocks = ((header.horizontal_size_value as u32 + 15) / 16) * ((header.vertical_size_value as u32 + 15) / 16);
        if macroblocks > 396 {
            return Err(VideoError::NonCompliant(format!(
                "{macroblocks} luma macroblocks exceeds the 396 MPEG-1 constrained-parameters limit"
            )));
        }
        if header.frame_rate_code > 5 {
            return Err(VideoError::NonCompliant(
                "frame_rate_code exceeds 30 FPS under MPEG-1 constrained parameters".into(),
            ));
        }
    }

    Ok(())
}

/// Reads `extension_start_code` plus `extension_start_code_identifier`,
/// returning the identifier so the caller can dispatch to the right
/// extension decoder. Consumes the 32-bit start code and the 4-bit
/// identifier.
pub fn read_extension_id<T: std::io::Read>(reader: &mut BitReader<T>) -> Result<u8> {
    let code = reader.read_bits(32)? as u32;
    if code != 0x0000_0100 | EXTENSION_START_CODE as u32 {
        return Err(VideoError::MissingStartCode(EXTENSION_START_CODE));
    }
    Ok(reader.read_bits(4)? as u8)
}

/// Reads `sequence_extension()`, assuming the start code and
/// `extension_start_code_identifier` were already consumed via
/// [`read_extension_id`].
pub fn read_sequence_extension<T: std::io::Read>(reader: &mut BitReader<T>) -> Result<SequenceExtension> {
    let profile_and_level_indication = reader.read_bits(8)? as u8;
    let progressive_sequence = reader.read_bit()?;
    let chroma_format = reader.read_bits(2)? as u8;
    let horizontal_size_extension = reader.read_bits(2)? as u8;
    let vertical_size_extension = reader.read_bits(2)? as u8;
    let bit_rate_extension = reader.read_bits(12)? as u16;
    let _marker_bit = reader.read_bit()?;
    let vbv_buffer_size_extension = reader.read_bits(8)? as u8;
    let low_delay = reader.read_bit()?;
    let _frame_rate_extension_n = reader.read_bits(2)?;
    let _frame_rate_extension_d = reader.read_bits(5)?;

    Ok(SequenceExtension {
        profile_and_level_indication,
        progressive_sequence,
        chroma_format,
        horizontal_size_extension,
        vertical_size_extension,
        bit_rate_extension,
        vbv_buffer_size_extension,
        low_delay,
    })
}

/// BDAV-allowed H.262 profile codes (ISO/IEC 13818-2 Table 8-8, high nibble
/// of `profile_and_level_indication`): Main (4) and, for backward
/// compatibility with some authoring tools, High (1).
const BDAV_ALLOWED_PROFILES: [u8; 2] = [4, 1];
/// BDAV-allowed H.262 level codes: Main (8) and High (4).
const BDAV_ALLOWED_LEVELS: [u8; 2] = [8, 4];

/// Checks `sequence_extension()` compliance: BDAV requires 4:2:0 chroma, a
/// Main/High profile and Main/High level, and forbids low-delay streams.
pub fn check_sequence_extension_compliance(ext: &SequenceExtension) -> Result<()> {
    if ext.chroma_format != 1 {
        return Err(VideoError::NonCompliant(format!(
            "chroma_format {} is not 4:2:0, the only format allowed on BDAV",
            ext.chroma_format
        )));
    }
    if !BDAV_ALLOWED_PROFILES.contains(&ext.profile_idc()) {
        return Err(VideoError::NonCompliant(format!(
            "profile_idc {} is not an allowed BDAV profile (Main/High)",
            ext.profile_idc()
        )));
    }
    if !BDAV_ALLOWED_LEVELS.contains(&ext.level_idc()) {
        return Err(VideoError::NonCompliant(format!(
            "level_idc {} is not an allowed BDAV level (Main/High)",
            ext.level_idc()
        )));
    }
    if ext.low_delay {
        return Err(VideoError::NonCompliant("low_delay streams are not allowed on BDAV".into()));
    }
    Ok(())
}

/// Reads `picture_header()`, including its leading start code
/// (`0x00000100`).
pub fn read_picture_header<T: std::io::Read>(reader: &mut BitReader<T>) -> Result<PictureHeader> {
    let code = reader.read_bits(32)? as u32;
    if code != 0x0000_0100 {
        return Err(VideoError::MissingStartCode(PICTURE_START_CODE));
    }

    let temporal_reference = reader.read_bits(10)? as u16;
    let picture_coding_type = PictureCodingType::from_code(reader.read_bits(3)? as u8)?;
    let vbv_delay = reader.read_bits(16)? as u16;

    if matches!(picture_coding_type, PictureCodingType::P | PictureCodingType::B) {
        let full_pel_forward_vector = reader.read_bit()?;
        let _ = full_pel_forward_vector;
        let forward_f_code = reader.read_bits(3)? as u8;
        let _ = forward_f_code;
    }
    if matches!(picture_coding_type, PictureCodingType::B) {
        let full_pel_backward_vector = reader.read_bit()?;
        let _ = full_pel_backward_vector;
        let backward_f_code = reader.read_bits(3)? as u8;
        let _ = backward_f_code;
    }

    Ok(PictureHeader {
        temporal_reference,
        picture_coding_type,
        vbv_delay,
    })
}

/// Reads `picture_coding_extension()`, assuming the start code and
/// identifier were already consumed via [`read_extension_id`].
pub fn read_picture_coding_extension<T: std::io::Read>(reader: &mut BitReader<T>) -> Result<PictureCodingExtension> {
    let _f_code = [
        [reader.read_bits(4)? as u8, reader.read_bits(4)? as u8],
        [reader.read_bits(4)? as u8, reader.read_bits(4)? as u8],
    ];
    let _intra_dc_precision = reader.read_bits(2)?;
    let picture_structure = reader.read_bits(2)? as u8;
    let top_field_first = reader.read_bit()?;
    let frame_pred_frame_dct = reader.read_bit()?;
    let _concealment_motion_vectors = reader.read_bit()?;
    let _q_scale_type = reader.read_bit()?;
    let _intra_vlc_format = reader.read_bit()?;
    let _alternate_scan = reader.read_bit()?;
    let repeat_first_field = reader.read_bit()?;
    let _chroma_420_type = reader.read_bit()?;
    let progressive_frame = reader.read_bit()?;

    Ok(PictureCodingExtension {
        picture_structure,
        top_field_first,
        frame_pred_frame_dct,
        progressive_frame,
        repeat_first_field,
    })
}

/// `frame_rate_code` → nominal frame rate, in units of frames-per-1001000
/// (i.e. the value times `1001/1000` integer ratios collapse to whole
/// numbers); returned as frames per second for convenience.
pub fn nominal_frame_rate(frame_rate_code: u8) -> Option<f64> {
    const VALUES: [f64; 9] = [
        -1.0,
        24000.0 / 1001.0,
        24.0,
        25.0,
        30000.0 / 1001.0,
        30.0,
        50.0,
        60000.0 / 1001.0,
        60.0,
    ];
    VALUES.get(frame_rate_code as usize).copied().filter(|v| *v > 0.0)
}

/// Re-derives DTS/PTS for a picture given the GOP's presentation time base
/// and the picture's position within decode order.
///
/// Per BDAV authoring convention: `PTS = gop_pts + temporal_reference ×
/// frame_duration`; `DTS` for I/P pictures is `gop_pts + (gop_picture_index
/// − 1) × frame_duration` (there is no decode-order delay for B-pictures,
/// whose DTS equals their PTS and is therefore omitted — decoders derive it
/// implicitly).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PictureTimestamps {
    /// Presentation timestamp, in 90 kHz clock ticks.
    pub pts: u64,
    /// Decode timestamp, in 90 kHz clock ticks. `None` for B-pictures.
    pub dts: Option<u64>,
}

/// Computes [`PictureTimestamps`] for one picture.
///
/// `gop_pts` and `frame_duration` are both in 90 kHz clock ticks;
/// `gop_picture_index` is this picture's 1-based position in decode order
/// within the GOP.
pub fn derive_timestamps(
    gop_pts: u64,
    frame_duration: u64,
    temporal_reference: u16,
    gop_picture_index: u32,
    coding_type: PictureCodingType,
) -> PictureTimestamps {
    let pts = gop_pts + temporal_reference as u64 * frame_duration;
    let dts = match coding_type {
        PictureCodingType::B => None,
        _ => Some(gop_pts + (gop_picture_index.saturating_sub(1)) as u64 * frame_duration),
    };
    PictureTimestamps { pts, dts }
}

/// Running compliance state for an H.262 elementary stream, enforcing field
/// constancy across `sequence_header()`/`sequence_extension()` occurrences
/// and the consecutive-B-picture limit.
#[derive(Debug, Default)]
pub struct SequenceState {
    header: Option<SequenceHeader>,
    extension: Option<SequenceExtension>,
    consecutive_b_pictures: u32,
}

impl SequenceState {
    /// Creates an empty state, to be fed the first `sequence_header()` of
    /// the stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a `sequence_header()`, enforcing constancy against any prior
    /// occurrence.
    pub fn observe_sequence_header(&mut self, header: SequenceHeader) -> Result<()> {
        check_sequence_header_compliance(&header)?;
        if let Some(previous) = self.header {
            if previous != header {
                return Err(VideoError::NotConstant {
                    field: "sequence_header",
                    previous: format!("{previous:?}"),
                    current: format!("{header:?}"),
                });
            }
        }
        self.header = Some(header);
        Ok(())
    }

    /// Records a `sequence_extension()`, enforcing constancy against any
    /// prior occurrence.
    pub fn observe_sequence_extension(&mut self, ext: SequenceExtension) -> Result<()> {
        check_sequence_extension_compliance(&ext)?;
        if let Some(previous) = self.extension {
            if previous != ext {
                return Err(VideoError::NotConstant {
                    field: "sequence_extension",
                    previous: format!("{previous:?}"),
                    current: format!("{ext:?}"),
                });
            }
        }
        self.extension = Some(ext);
        Ok(())
    }

    /// Computed full-precision size/bitrate/VBV values, once both the
    /// sequence header and extension have been observed.
    pub fn computed_values(&self) -> Option<SequenceComputedValues> {
        Some(SequenceComputedValues::combine(self.header.as_ref()?, self.extension.as_ref()?))
    }

    /// Feeds one picture's coding type, enforcing the ≤2-consecutive-B-picture
    /// rule (BDAV §4.4).
    pub fn observe_picture(&mut self, coding_type: PictureCodingType) -> Result<()> {
        if coding_type == PictureCodingType::B {
            self.consecutive_b_pictures += 1;
            if self.consecutive_b_pictures > 2 {
                return Err(VideoError::NonCompliant(
                    "more than 2 consecutive B-pictures, BDAV allows at most 2".into(),
                ));
            }
        } else {
            self.consecutive_b_pictures = 0;
        }
        Ok(())
    }
}
