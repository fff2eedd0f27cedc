//! dmrlink-test-harness: Mock master server for protocol-level testing.
//!
//! This crate provides [`MockMaster`], a scripted UDP responder that lets
//! the protocol clients be tested deterministically without a real
//! BrandMeister master or network infrastructure.

pub mod mock_master;

pub use mock_master::MockMaster;
