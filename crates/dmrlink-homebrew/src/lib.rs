//! dmrlink-homebrew: Homebrew repeater-linking protocol client.
//!
//! The Homebrew protocol (used by MMDVMHost and compatible software) links
//! a repeater -- or software posing as one -- to a DMR master server over
//! UDP. This crate provides [`HomebrewClient`], the repeater-side protocol
//! engine, plus the wire codecs for the `RPTC` configuration record and
//! the 53-byte `DMRD` data record.
//!
//! The client authenticates with a four-step handshake, keeps the link
//! alive with `MSTPING`, and exchanges DMR bursts as [`DmrData`] records.

pub mod client;
pub mod config;
pub mod wire;

pub use client::HomebrewClient;
pub use config::Config;
pub use wire::{DmrData, Options, TimeSlot};
