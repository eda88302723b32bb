//! BDAV elementary-stream dispatcher: routes a raw ES to its codec parser
//! and produces an ESMS script describing how to rebuild its PES stream.
//!
//! [`parse_stream`] is the single public entry point. It owns one bit
//! reader over the caller's buffer, one [`esms::EsmsWriter`], and (for
//! HDMV stream types) one [`hdmv::Epoch`], and hands off to the module
//! matching the caller's declared [`StreamType`]:
//!
//! - [`ac3_dispatch`]: AC-3 and E-AC-3 audio.
//! - [`truehd_dispatch`]: MLP/Dolby TrueHD audio.
//! - [`video_dispatch`]: H.262 (MPEG-2) and H.264/AVC video.
//! - [`hdmv_dispatch`]: HDMV Presentation/Interactive Graphics (PGS/IGS).

mod ac3_dispatch;
mod error;
mod hdmv_dispatch;
mod truehd_dispatch;
mod video_dispatch;

use std::io::{Read, Seek, SeekFrom};

pub use error::{DispatchError, Result};

/// Which codec the source buffer passed to [`parse_stream`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    /// MPEG-2 (H.262) video, start-code delimited.
    H262,
    /// H.264/AVC video, Annex B delimited.
    H264,
    /// AC-3 (Dolby Digital) audio, syncword delimited.
    Ac3,
    /// E-AC-3 (Dolby Digital Plus) audio, syncword delimited.
    Eac3,
    /// MLP/Dolby TrueHD audio, contiguous access units.
    TrueHd,
    /// HDMV Presentation Graphics Stream (subtitles), raw segments.
    Pgs,
    /// HDMV Interactive Graphics Stream (menus), raw segments.
    Igs,
}

/// Caller-supplied dispatch options, mirroring the core-affecting flags
/// an ESMS script records in its `script_flags` field plus the bits every
/// dispatcher needs regardless of codec.
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Name recorded for the registered source file (the ESMS `ES_fn`
    /// entry), normally the path the caller read `source` from.
    pub source_name: String,
    /// PTS, in [`ac3::SYSTEM_CLOCK_HZ`]-domain (27 MHz) ticks — the same
    /// clock [`esms::EsmsWriter::set_pts_reference`] runs on — that this
    /// stream's first frame should be offset to. Added to every derived
    /// PTS/DTS before it reaches the writer.
    pub initial_pts: u64,
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

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            source_name: String::new(),
            initial_pts: 0,
            extract_core: false,
            force_retiming: false,
            order_igs_segments_by_value: false,
            order_pgs_segments_by_value: false,
        }
    }
}

/// Packs [`ParserOptions`]' shared flags into an [`esms::EsmsOptions`].
/// Every dispatch submodule goes through this rather than repeating the
/// field-by-field mapping.
pub(crate) fn esms_options(opts: &ParserOptions) -> esms::EsmsOptions {
    esms::EsmsOptions {
        extract_core: opts.extract_core,
        force_retiming: opts.force_retiming,
        order_igs_segments_by_value: opts.order_igs_segments_by_value,
        order_pgs_segments_by_value: opts.order_pgs_segments_by_value,
    }
}

/// The finished in-memory ESMS script plus the directory-table offsets
/// [`esms::EsmsWriter::complete`] recorded. The distilled dispatch
/// signature returns a bare `EsmsWriter`, but any caller that flushes
/// `writer`'s bytes to a real file still needs these offsets to patch the
/// header in place via [`esms::update_header`] — so this crate returns
/// both together rather than making the caller re-derive them.
pub struct DispatchOutput {
    /// The completed writer, wrapping an in-memory `Vec<u8>` buffer.
    pub writer: esms::EsmsWriter<Vec<u8>>,
    /// `(directory_id, byte_offset)` pairs, in the order `complete`
    /// produced them, for [`esms::update_header`].
    pub directories: Vec<(u8, u64)>,
}

/// Reads `source` fully into memory, then dispatches it to the parser for
/// `kind`, producing a complete in-memory ESMS script.
pub fn parse_stream<R: Read + Seek>(kind: StreamType, mut source: R, opts: &ParserOptions) -> Result<DispatchOutput> {
    source.seek(SeekFrom::Start(0))?;
    let mut data = Vec::new();
    source.read_to_end(&mut data)?;

    match kind {
        StreamType::Ac3 => ac3_dispatch::dispatch_ac3(&data, opts),
        StreamType::Eac3 => ac3_dispatch::dispatch_eac3(&data, opts),
        StreamType::TrueHd => truehd_dispatch::dispatch_truehd(&data, opts),
        StreamType::H262 => video_dispatch::dispatch_h262(&data, opts),
        StreamType::H264 => video_dispatch::dispatch_h264(&data, opts),
        StreamType::Pgs => hdmv_dispatch::dispatch_pgs(&data, opts),
        StreamType::Igs => hdmv_dispatch::dispatch_igs(&data, opts),
    }
}
