//! HDMV PGS/IGS segment parsing, Display-Set assembly, and timestamp
//! re-derivation for BDAV subtitle/menu graphics streams.
//!
//! This crate covers the whole HDMV pipeline described in `spec.md`
//! §4.5: raw segment framing ([`segment`]), per-segment-type decoding
//! ([`pds`], [`ods`], [`pcs`], [`wds`], [`ics`]), fragment reassembly
//! ([`sequence`]), the Display-Set/epoch state machine
//! ([`display_set`]), and the decode/transfer-duration recompute
//! formulas ([`timing`]).
//!
//! ## Modules
//!
//! - [`segment`]: `segment_type`/`segment_length` framing, composition
//!   and video descriptors, sequence descriptors.
//! - [`pds`], [`ods`], [`pcs`], [`wds`], [`ics`]: per-segment-type payload
//!   decoding.
//! - [`sequence`]: first/continuation/last fragment reassembly.
//! - [`display_set`]: the Display-Set/epoch state machine — composition
//!   continuity, video-descriptor constancy, sequence inventory, count
//!   caps, decode-interval overlap checking.
//! - [`timing`]: IGS/PGS decode/transfer-duration formulas.
//!
//! ## License
//!
//! This project is licensed under the [MIT](./LICENSE.MIT) or [Apache-2.0](./LICENSE.Apache-2.0) license.
//! You can choose between one of them if you use this work.
//!
//! `SPDX-License-Identifier: MIT OR Apache-2.0`
#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod display_set;
mod error;
pub mod ics;
pub mod ods;
pub mod pcs;
pub mod pds;
pub mod segment;
pub mod sequence;
pub mod timing;
pub mod wds;

pub use display_set::{DisplaySetPhase, Epoch, SequenceCaps};
pub use error::{HdmvError, Result};
pub use segment::{CompositionState, SegmentType, SequenceDescriptor, VideoDescriptor};

/// Which HDMV graphics stream type a parse session targets; governs
/// which decode-duration formulas ([`timing`]) and segment set apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HdmvStreamType {
    /// Presentation Graphics Stream (subtitles): PCS/WDS/PDS/ODS/END.
    Pgs,
    /// Interactive Graphics Stream (menus): ICS/PDS/ODS/END.
    Igs,
}

impl HdmvStreamType {
    /// Whether `segment_type` is valid for this stream type (PCS is
    /// PGS-only, ICS is IGS-only; the rest are shared).
    pub fn accepts(self, segment_type: SegmentType) -> bool {
        match (self, segment_type) {
            (Self::Pgs, SegmentType::Ics) => false,
            (Self::Igs, SegmentType::Pcs) => false,
            (Self::Igs, SegmentType::Wds) => false,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pgs_rejects_ics_and_igs_rejects_pcs() {
        assert!(!HdmvStreamType::Pgs.accepts(SegmentType::Ics));
        assert!(!HdmvStreamType::Igs.accepts(SegmentType::Pcs));
        assert!(HdmvStreamType::Pgs.accepts(SegmentType::Pds));
    }
}
