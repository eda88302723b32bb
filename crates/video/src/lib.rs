//! Pure Rust parsers for the BDAV video elementary-stream codecs.
//!
//! This crate provides header-only bitstream parsing and BDAV compliance
//! checking for the two video codecs allowed on a BDAV track: MPEG-2 Video
//! (H.262) and H.264/AVC. Both parsers operate directly on a raw
//! byte-aligned, start-code delimited elementary stream (Annex B for H.264,
//! ITU-T H.262 Annex B equivalent for MPEG-2) rather than a container sample
//! format; there is no MP4/FLV box building here.
//!
//! ## Modules
//!
//! - [`h262`]: MPEG-2 Video sequence/picture/GOP header decoding and BDAV
//!   compliance rules, plus DTS/PTS re-derivation from `temporal_reference`.
//! - [`sps`] (re-exported): H.264 Sequence Parameter Set decoding, used to
//!   derive width/height/frame-rate/profile/level for compliance checking.
//!
//! ## License
//!
//! This project is licensed under the [MIT](./LICENSE.MIT) or [Apache-2.0](./LICENSE.Apache-2.0) license.
//! You can choose between one of them if you use this work.
//!
//! `SPDX-License-Identifier: MIT OR Apache-2.0`
#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(unsafe_code)]

mod enums;
mod error;
pub mod h262;
mod io;
mod nal;
mod sps;

pub use enums::*;
pub use error::{VideoError, Result};
pub use io::EmulationPreventionIo;
pub use nal::{NalUnit, iter_annex_b};
pub use sps::*;
