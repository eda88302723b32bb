//! IGS/PGS decode/transfer-duration recompute formulas (BDAV §4.5.4), all
//! expressed in 90 kHz ticks unless noted. Rates that the prose describes
//! only informally (the PG two-objects pipelining cases) are resolved
//! here as a documented judgment call — see `DESIGN.md`.

/// Rounds `numerator / denominator` up to the next integer.
fn div_ceil_u64(numerator: u64, denominator: u64) -> u64 {
    numerator.div_ceil(denominator)
}

/// The object-buffer-to-graphical-plane transfer rate shared by IGS and
/// PGS: `128 Mb/s`, expressed against the 90 kHz clock as `9 * pixels /
/// 1600` ticks (ceiling).
pub fn window_transfer_duration(width: u16, height: u16) -> u64 {
    div_ceil_u64(9 * width as u64 * height as u64, 1600)
}

/// Plane-clear time for a `width`x`height` area against the same 128 Mb/s
/// transfer rate but expressed per BDAV's plane-initialisation constant
/// (`9 * pixels / 3200`): used both for IGS's `PLANE_CLEAR_TIME` and
/// PGS's `PLANE_INITIALIZATION_TIME` at `epoch_start`.
pub fn plane_clear_time(width: u16, height: u16) -> u64 {
    div_ceil_u64(9 * width as u64 * height as u64, 3200)
}

/// `OD_DECODE_DURATION(ODS)`: the IG pixel-decode rate is 1.6 Gb/s.
pub fn od_decode_duration_igs(width: u16, height: u16) -> u64 {
    div_ceil_u64(90_000 * 8 * width as u64 * height as u64, 1_600_000_000)
}

/// `OD_TRANSFER_DURATION(ODS) = 9 * OD_DECODE_DURATION(ODS)`, charged only
/// when another ODS follows in the Display Set.
pub fn od_transfer_duration_igs(decode_duration: u64) -> u64 {
    9 * decode_duration
}

/// `OBJ_DECODE_DURATION(DS)`: sums decode and transfer durations over every
/// ODS of the Display Set, omitting the transfer term for the last ODS.
pub fn obj_decode_duration_igs(object_sizes: &[(u16, u16)]) -> u64 {
    let mut total = 0u64;
    for (index, &(width, height)) in object_sizes.iter().enumerate() {
        let decode = od_decode_duration_igs(width, height);
        total += decode;
        if index + 1 < object_sizes.len() {
            total += od_transfer_duration_igs(decode);
        }
    }
    total
}

/// `IC_DECODE_DURATION(DS)`: at `epoch_start`, the plane must also be
/// cleared, so it dominates if larger than the object-decode cost.
pub fn ic_decode_duration_igs(obj_decode_duration: u64, video_width: u16, video_height: u16, is_epoch_start: bool) -> u64 {
    if is_epoch_start {
        obj_decode_duration.max(plane_clear_time(video_width, video_height))
    } else {
        obj_decode_duration
    }
}

/// `IC_TRANSFER_DURATION(DS)`: the larger of the first page's in-effect
/// window transfer time and the default button's initial-state area
/// transfer time.
pub fn ic_transfer_duration_igs(in_effect_window: (u16, u16), default_button_area: (u16, u16)) -> u64 {
    window_transfer_duration(in_effect_window.0, in_effect_window.1)
        .max(window_transfer_duration(default_button_area.0, default_button_area.1))
}

/// `DECODE_DURATION(DS)` for IGS: `IC_DECODE_DURATION + IC_TRANSFER_DURATION`.
pub fn decode_duration_igs(ic_decode_duration: u64, ic_transfer_duration: u64) -> u64 {
    ic_decode_duration + ic_transfer_duration
}

/// `ODS decode duration` for PGS: the PG pixel-decode rate is 256 Mb/s.
pub fn ods_decode_duration_pgs(width: u16, height: u16) -> u64 {
    div_ceil_u64(90_000 * 8 * width as u64 * height as u64, 256_000_000)
}

/// `PLANE_INITIALIZATION_TIME(DS)`: at `epoch_start`, the whole video
/// plane is cleared; otherwise, only windows the new DS leaves empty
/// (relative to the previous DS) are cleared, plus one tick of overhead.
pub fn plane_initialization_time(
    video_width: u16,
    video_height: u16,
    is_epoch_start: bool,
    emptied_windows: &[(u16, u16)],
) -> u64 {
    if is_epoch_start {
        return plane_clear_time(video_width, video_height);
    }
    emptied_windows.iter().map(|&(w, h)| window_transfer_duration(w, h)).sum::<u64>() + 1
}

/// How a Display Set's (at most 2) composition objects are placed onto
/// windows, which determines how much decode/transfer pipelining the PG
/// decoder can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectPlacement {
    /// Exactly one composition object, in one window.
    One { object: (u16, u16), window: (u16, u16) },
    /// Two composition objects sharing one window: the second object's
    /// decode cannot overlap the first's window transfer, since both
    /// write to the same destination.
    TwoSameWindow { object_a: (u16, u16), object_b: (u16, u16), window: (u16, u16) },
    /// Two composition objects in separate windows: the second object's
    /// decode can overlap the first object's window transfer.
    TwoDifferentWindows { object_a: (u16, u16), window_a: (u16, u16), object_b: (u16, u16), window_b: (u16, u16) },
}

/// The object-decode-and-transfer component of the PGS decode duration,
/// per the three placement cases.
pub fn object_computation_duration_pgs(placement: ObjectPlacement) -> u64 {
    match placement {
        ObjectPlacement::One { object, window } => {
            ods_decode_duration_pgs(object.0, object.1) + window_transfer_duration(window.0, window.1)
        }
        ObjectPlacement::TwoSameWindow { object_a, object_b, window } => {
            ods_decode_duration_pgs(object_a.0, object_a.1)
                + ods_decode_duration_pgs(object_b.0, object_b.1)
                + window_transfer_duration(window.0, window.1)
        }
        ObjectPlacement::TwoDifferentWindows { object_a, window_a, object_b, window_b } => {
            let decode_a = ods_decode_duration_pgs(object_a.0, object_a.1);
            let transfer_a = window_transfer_duration(window_a.0, window_a.1);
            let decode_b = ods_decode_duration_pgs(object_b.0, object_b.1);
            let transfer_b = window_transfer_duration(window_b.0, window_b.1);
            decode_a + transfer_a.max(decode_b) + transfer_b
        }
    }
}

/// `DECODE_DURATION(DS)` for PGS: the larger of plane-initialisation and
/// object-computation outcomes.
pub fn decode_duration_pgs(plane_initialization_time: u64, object_computation_duration: u64) -> u64 {
    plane_initialization_time.max(object_computation_duration)
}

/// A WDS's drawing duration: the sum of each window's transfer time.
pub fn window_drawing_duration(windows: &[(u16, u16)]) -> u64 {
    windows.iter().map(|&(w, h)| window_transfer_duration(w, h)).sum()
}

/// One segment's presentation timestamp and optional decode timestamp,
/// both 90 kHz tick offsets from the Display Set's own `decode_time`
/// (BDAV §4.5.4's per-segment timestamp table). `dts_offset` is `None`
/// for segment types the table gives no decode timestamp at all (PDS,
/// END) rather than one that happens to equal zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentTiming {
    /// `PTS` offset from the Display Set's `decode_time`.
    pub pts_offset: u64,
    /// `DTS` offset from the Display Set's `decode_time`, or `None` if
    /// this segment type carries no decode timestamp.
    pub dts_offset: Option<u64>,
}

/// Every segment's derived timing within one Display Set, keyed by role.
pub struct DisplaySetTimings {
    /// PCS (PGS) or ICS (IGS): `DTS = decode_time`, `PTS = pres_time`.
    pub composition: SegmentTiming,
    /// WDS (PGS only): `DTS = decode_time`, `PTS = pres_time -
    /// drawing_duration`.
    pub wds: Option<SegmentTiming>,
    /// Every PDS in the Display Set shares this timing: `PTS =
    /// decode_time`, no `DTS`.
    pub palette: SegmentTiming,
    /// One entry per composition object, in ODS-completion order.
    pub objects: Vec<SegmentTiming>,
    /// `END`: `PTS` = the running decode time after the last object, no
    /// `DTS`.
    pub end: SegmentTiming,
}

/// Walks one Display Set's segments and assigns each the BDAV §4.5.4
/// per-segment timestamp, relative to the Display Set's own
/// `decode_duration` (`pres_time - decode_time`). `wds_drawing_duration`
/// is `Some` only for PGS. `object_decode_durations` lists each
/// composition object's decode duration ([`od_decode_duration_igs`] for
/// IGS, [`ods_decode_duration_pgs`] for PGS) in completion order;
/// `object_transfer_duration` derives an object's transfer duration from
/// its decode duration ([`od_transfer_duration_igs`] for both stream
/// types — BDAV specifies the PG object transfer term the same way).
pub fn display_set_timings(
    decode_duration: u64,
    wds_drawing_duration: Option<u64>,
    object_decode_durations: &[u64],
    object_transfer_duration: impl Fn(u64) -> u64,
) -> DisplaySetTimings {
    let composition = SegmentTiming { dts_offset: Some(0), pts_offset: decode_duration };
    let wds = wds_drawing_duration
        .map(|drawing| SegmentTiming { dts_offset: Some(0), pts_offset: decode_duration.saturating_sub(drawing) });
    let palette = SegmentTiming { dts_offset: None, pts_offset: 0 };

    let mut objects = Vec::with_capacity(object_decode_durations.len());
    let mut running = 0u64;
    for (index, &decode) in object_decode_durations.iter().enumerate() {
        let dts = running;
        let pts = dts + decode;
        objects.push(SegmentTiming { dts_offset: Some(dts), pts_offset: pts });
        let transfer = if index + 1 < object_decode_durations.len() { object_transfer_duration(decode) } else { 0 };
        running += decode + transfer;
    }
    let end = SegmentTiming { dts_offset: None, pts_offset: running };

    DisplaySetTimings { composition, wds, palette, objects, end }
}
