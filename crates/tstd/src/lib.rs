//! BDAV T-STD (Transport-Stream System Target Decoder) buffering model
//! simulation: a tree of buffers, filters and routes with leaking and
//! removal-timestamp output disciplines, used to validate that a proposed
//! mux of elementary streams would not underflow or overflow real decoder
//! buffers (`spec.md` §4.6).
//!
//! ## Modules
//!
//! - [`buffer`]: a single buffer's fill/drain bookkeeping, under either
//!   discipline.
//! - [`node`]: the arena-based graph (`Model`, [`node::NodeId`]) tying
//!   buffers and PID filters together, replacing the original pointer tree.
//! - [`codec`]: per-codec chain-construction helpers for the BDAV fixed
//!   constants table.
//! - [`throttle`]: the underflow warning rate-limiter.
//!
//! ## License
//!
//! This project is licensed under the [MIT](./LICENSE.MIT) or [Apache-2.0](./LICENSE.Apache-2.0) license.
//! You can choose between one of them if you use this work.
//!
//! `SPDX-License-Identifier: MIT OR Apache-2.0`
#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod buffer;
pub mod codec;
mod error;
pub mod node;
pub mod throttle;

pub use buffer::{Buffer, BufferFrame, CheckOutcome, Discipline, DrainOutcome};
pub use error::{Result, TStdError};
pub use node::{FilterContext, FilterDecision, Model, Node, NodeId, PidMatch, TStdOptions};
