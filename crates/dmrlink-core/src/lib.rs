//! dmrlink-core: Core types, frame codec, and error definitions for dmrlink.
//!
//! This crate defines the pieces shared by both master-link protocol
//! clients. Applications that only consume decoded frames depend on these
//! types without pulling in either protocol engine.
//!
//! # Key types
//!
//! - [`DmrId`] -- the 24-bit DMR identifier
//! - [`Frame`] / [`frame::parse`] -- the typed DMR frame codec
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod frame;
pub mod id;

// Re-export key types at crate root for ergonomic `use dmrlink_core::*`.
pub use error::{Error, Result};
pub use frame::{EmbeddedData, Frame, FullLc, Lc, Voice};
pub use id::DmrId;
