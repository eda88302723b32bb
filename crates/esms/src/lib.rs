//! Elementary-Stream Manipulation Script (ESMS) writer: a byte-exact binary
//! format describing how to reconstruct a PES-packetised elementary stream
//! from one or more source files plus a sequence of cut/splice commands,
//! without re-encoding or copying the source media (`spec.md` §4.2, §6.1-§6.5).
//!
//! ## Modules
//!
//! - [`model`]: the in-memory types (stream/source-file/data-block
//!   registries, commands, pending frames).
//! - [`format`]: the byte-exact section encoders and the directory-table
//!   patching helper.
//! - [`writer`]: [`writer::EsmsWriter`], the public builder API.
//! - [`reader`]: [`reader::read_esms`], the inverse of `format`/`writer`,
//!   recovering a full script for round-trip verification.
//! - `crc32`: a standalone CRC-32/MPEG-2 digest for source-file registration.
//!
//! ## License
//!
//! This project is licensed under the [MIT](./LICENSE.MIT) or [Apache-2.0](./LICENSE.Apache-2.0) license.
//! You can choose between one of them if you use this work.
//!
//! `SPDX-License-Identifier: MIT OR Apache-2.0`
#![deny(missing_docs)]
#![deny(unsafe_code)]

mod crc32;
mod error;
pub mod format;
pub mod model;
pub mod reader;
pub mod writer;

pub use crc32::crc32_mpeg2;
pub use error::{EsmsError, Result};
pub use format::{
    Ac3FormatSpec, FormatSpec, H264FormatSpec, VideoFormatSpec, DIR_DATA_BLOCKS, DIR_ES_PROPERTIES, DIR_FMT_SPEC_PROPERTIES,
    DIR_PES_CUTTING, MAX_DIR,
};
pub use model::{Command, CodingType, FrameKind, Mode, PendingFrame, PictureType, SourceFile, StreamType};
pub use reader::{read_esms, EsmsScript, Frame};
pub use writer::{update_header, EsmsOptions, EsmsWriter};
