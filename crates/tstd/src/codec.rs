//! Per-codec T-STD buffering-chain construction helpers (BDAV §4.6's fixed
//! constants table), grounded on `bdavStd.c`'s per-codec chain builders and
//! the `codec/{ac3,dts,h264,hdmv,lpcm}.h` constant headers.
//!
//! Each helper builds a two-stage chain — a Transport Buffer (`TB`) feeding
//! a codec-specific stage-2 buffer — and returns `(tb, stage2)` node ids
//! already linked and inserted into `model`.

use crate::buffer::{Buffer, Discipline};
use crate::node::{Model, Node, NodeId};

const BITS_PER_BYTE: u64 = 8;
const MAIN_CLOCK_HZ: f64 = 27_000_000.0;

fn bits_per_tick(bits_per_second: f64) -> f64 {
    bits_per_second / MAIN_CLOCK_HZ
}

fn transport_buffer(model: &mut Model, rx_bits_per_sec: f64) -> NodeId {
    model.insert(Node::Buffer(Buffer::new("TB", 512 * BITS_PER_BYTE, false, false, Discipline::Leaking { bits_per_tick: bits_per_tick(rx_bits_per_sec) })))
}

fn chain(model: &mut Model, tb: NodeId, stage2: NodeId) -> (NodeId, NodeId) {
    model.link_output(tb, stage2);
    (tb, stage2)
}

/// `BDAV_STD_SYSTEM_*`: PAT/PMT/SIT. Stage-2 leaks at `max(80 kb/s,
/// transport_rate/500)`.
pub fn system(model: &mut Model, transport_rate_bits_per_sec: u64) -> (NodeId, NodeId) {
    let tb = transport_buffer(model, 1_000_000.0);
    let leak_rate = (80_000.0f64).max(transport_rate_bits_per_sec as f64 / 500.0);
    let main = model.insert(Node::Buffer(Buffer::new("B", 1536 * BITS_PER_BYTE, false, false, Discipline::Leaking { bits_per_tick: bits_per_tick(leak_rate) })));
    chain(model, tb, main)
}

/// `BDAV_STD_AC3_*`.
pub fn ac3(model: &mut Model) -> (NodeId, NodeId) {
    let tb = transport_buffer(model, 2_000_000.0);
    let main = model.insert(Node::Buffer(Buffer::new("B", 3360 * BITS_PER_BYTE, false, false, Discipline::RemovalTimestamp)));
    chain(model, tb, main)
}

/// DTS core substream.
pub fn dts_core(model: &mut Model) -> (NodeId, NodeId) {
    let tb = transport_buffer(model, 2_000_000.0);
    let main = model.insert(Node::Buffer(Buffer::new("B", 9088 * BITS_PER_BYTE, false, false, Discipline::RemovalTimestamp)));
    chain(model, tb, main)
}

/// DTS-HD High Resolution extension substream.
pub fn dts_hdhr(model: &mut Model) -> (NodeId, NodeId) {
    let tb = transport_buffer(model, 8_000_000.0);
    let main = model.insert(Node::Buffer(Buffer::new("B", 17814 * BITS_PER_BYTE, false, false, Discipline::RemovalTimestamp)));
    chain(model, tb, main)
}

/// DTS-HD Master Audio extension substream.
pub fn dts_hdma(model: &mut Model) -> (NodeId, NodeId) {
    let tb = transport_buffer(model, 32_000_000.0);
    let main = model.insert(Node::Buffer(Buffer::new("B", 66432 * BITS_PER_BYTE, false, false, Discipline::RemovalTimestamp)));
    chain(model, tb, main)
}

/// LPCM at or below 96 kHz.
pub fn lpcm_96k(model: &mut Model) -> (NodeId, NodeId) {
    let tb = transport_buffer(model, 16_588_800.0);
    let main = model.insert(Node::Buffer(Buffer::new("B", 536_832 * BITS_PER_BYTE, false, false, Discipline::RemovalTimestamp)));
    chain(model, tb, main)
}

/// LPCM at 192 kHz.
pub fn lpcm_192k(model: &mut Model) -> (NodeId, NodeId) {
    let tb = transport_buffer(model, 33_177_600.0);
    let main = model.insert(Node::Buffer(Buffer::new("B", 1_073_664 * BITS_PER_BYTE, false, false, Discipline::RemovalTimestamp)));
    chain(model, tb, main)
}

/// HDMV PG/IG (subtitle/menu graphics) stream.
pub fn hdmv_graphics(model: &mut Model) -> (NodeId, NodeId) {
    let tb = transport_buffer(model, 16_000_000.0);
    let main = model.insert(Node::Buffer(Buffer::new("EB", 1024 * 1024 * BITS_PER_BYTE, false, false, Discipline::RemovalTimestamp)));
    chain(model, tb, main)
}

/// `MaxBR` (maximum video bit rate, bits/s) per Annex A H.264 level, for the
/// common BDAV authoring levels (Table A-1, `cpbBrNalFactor = 1200` applied
/// by the caller per BDAV's `MB` leaking-rate formula).
pub fn h264_max_br_for_level(level_times_ten: u32) -> u64 {
    match level_times_ten {
        0..=30 => 192_000,
        31 => 768_000,
        32..=39 => 2_000_000,
        40 => 4_000_000,
        41..=49 => 10_000_000,
        50 => 10_000_000,
        _ => 24_000_000,
    }
}

/// H.264 video elementary stream: `TB` at `min(1.2 * bitrate, 48 Mb/s)`
/// feeding a leaking Multiplex Buffer (`MB`, rate `1200 * MaxBR(level)`)
/// which itself feeds a removal-timestamp Elementary Buffer (`EB`, size
/// `cpb_size` from the stream's HRD parameters).
pub fn h264(model: &mut Model, bitrate_bits_per_sec: u64, level_times_ten: u32, cpb_size_bits: u64) -> (NodeId, NodeId, NodeId) {
    let tb_rate = ((bitrate_bits_per_sec as f64) * 1.2).min(48_000_000.0);
    let tb = transport_buffer(model, tb_rate);
    let max_br = h264_max_br_for_level(level_times_ten);
    let mb = model.insert(Node::Buffer(Buffer::new("MB", cpb_size_bits, false, false, Discipline::Leaking { bits_per_tick: bits_per_tick(1200.0 * max_br as f64) })));
    let eb = model.insert(Node::Buffer(Buffer::new("EB", cpb_size_bits, false, false, Discipline::RemovalTimestamp)));
    model.link_output(tb, mb);
    model.link_output(mb, eb);
    (tb, mb, eb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::TStdOptions;

    #[test]
    fn ac3_chain_matches_fixed_constants() {
        let mut model = Model::new(TStdOptions::default());
        let (tb, main) = ac3(&mut model);
        assert_eq!(model.buffer(tb).unwrap().capacity_bits(), 512 * 8);
        assert_eq!(model.buffer(main).unwrap().capacity_bits(), 3360 * 8);
    }

    #[test]
    fn system_stage2_leak_rate_follows_transport_rate() {
        let mut model = Model::new(TStdOptions::default());
        let (_, main) = system(&mut model, 100_000_000);
        assert_eq!(model.buffer(main).unwrap().capacity_bits(), 1536 * 8);
    }
}
