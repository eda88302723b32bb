use bytes::Bytes;

use crate::NALUnitType;

/// A single NAL unit sliced out of an Annex B elementary stream, still
/// carrying its emulation-prevention bytes (`0x03` after `0x00 0x00`).
///
/// `[`Sps::parse_with_emulation_prevention`] expects exactly this payload.
#[derive(Debug, Clone, PartialEq)]
pub struct NalUnit {
    /// Byte offset of the start code that introduced this unit, within the
    /// stream passed to [`iter_annex_b`].
    pub offset: usize,
    /// `forbidden_zero_bit`/`nal_ref_idc`/`nal_unit_type` header byte.
    pub header: u8,
    /// Raw payload, excluding the 3- or 4-byte start code and the header
    /// byte itself.
    pub rbsp: Bytes,
}

impl NalUnit {
    /// Decodes `nal_unit_type` from the header byte (low 5 bits).
    pub fn unit_type(&self) -> Result<NALUnitType, std::io::Error> {
        NALUnitType::try_from(self.header & 0x1F)
    }
}

/// Splits a raw Annex B bytestream into NAL units at `0x000001`/`0x00000001`
/// start codes.
///
/// Trailing `cabac_zero_word`/trailing zero padding between the last unit and
/// the end of the buffer is dropped silently, matching how an Annex B
/// demuxer treats padding after the final access unit delimiter.
pub fn iter_annex_b(data: &Bytes) -> Vec<NalUnit> {
    let starts = find_start_codes(data);
    let mut units = Vec::with_capacity(starts.len());

    for (idx, &(code_start, payload_start)) in starts.iter().enumerate() {
        let end = starts
            .get(idx + 1)
            .map(|&(next_code_start, _)| trim_trailing_zeros(data, next_code_start))
            .unwrap_or_else(|| data.len());

        if payload_start >= end {
            continue;
        }

        let header = data[payload_start];
        let rbsp = data.slice(payload_start + 1..end);
        units.push(NalUnit {
            offset: code_start,
            header,
            rbsp,
        });
    }

    units
}

/// Returns `(start_code_offset, payload_offset)` pairs for every start code
/// found in `data`, in ascending order.
fn find_start_codes(data: &[u8]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut i = 0;

    while i + 2 < data.len() {
        if data[i] == 0x00 && data[i + 1] == 0x00 && data[i + 2] == 0x01 {
            out.push((i, i + 3));
            i += 3;
        } else {
            i += 1;
        }
    }

    out
}

fn trim_trailing_zeros(data: &[u8], mut end: usize) -> usize {
    while end > 0 && data[end - 1] == 0x00 {
        end -= 1;
    }
    end
}
