//! # dmrlink -- DMR Master Server Clients for Rust
//!
//! `dmrlink` is an asynchronous Rust library for connecting to DMR master
//! servers of the BrandMeister family. It implements the client side of
//! two UDP protocols: **Homebrew**, which links a repeater (or software
//! posing as one) into the network, and **Rewind**, which attaches simple
//! external applications that consume or produce traffic for specific
//! DMR IDs.
//!
//! ## Quick Start
//!
//! Add `dmrlink` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! dmrlink = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! Attach to a master and watch group calls:
//!
//! ```no_run
//! use dmrlink::rewind::{ClientOptions, RewindClient, RewindEvent, SessionType};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> dmrlink::Result<()> {
//!     let mut options = ClientOptions {
//!         remote_id: 2040073,
//!         ..ClientOptions::default()
//!     };
//!     options.subscriptions.insert(204, SessionType::GroupVoice);
//!
//!     let client = RewindClient::new_with_options("master.example.org", "secret", options).await?;
//!     let (tx, mut rx) = mpsc::channel(64);
//!
//!     tokio::spawn(async move {
//!         while let Some(event) = rx.recv().await {
//!             if let RewindEvent::SuperHeader(sh) = event {
//!                 println!("call {} -> {}", sh.source, sh.target);
//!             }
//!         }
//!     });
//!
//!     client.listen_and_serve(tx).await
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate                  | Purpose                                       |
//! |------------------------|-----------------------------------------------|
//! | `dmrlink-core`         | DMR identifiers, frame codec, errors          |
//! | `dmrlink-transport`    | Connected-UDP datagram transport              |
//! | `dmrlink-homebrew`     | Homebrew repeater-linking protocol client     |
//! | `dmrlink-rewind`       | Rewind external-application protocol client   |
//! | **`dmrlink`**          | This facade crate -- re-exports everything    |
//!
//! ## Feature Flags
//!
//! Each protocol client is gated behind a feature flag:
//!
//! | Feature    | Enables                            | Default |
//! |------------|------------------------------------|---------|
//! | `homebrew` | [`homebrew`] module                | yes     |
//! | `rewind`   | [`rewind`] module                  | yes     |
//!
//! ## Concurrency model
//!
//! Each client owns one UDP socket and spawns one background receive task;
//! all protocol state lives in the `listen_and_serve` event loop. Decoded
//! frames flow to the caller through a `tokio::sync::mpsc` sink supplied
//! to `listen_and_serve`. Backpressure from the sink stalls the event loop
//! by design -- on a radio link, falling behind is a failure mode, not a
//! throughput event.
//!
//! ## License note
//!
//! Connecting to amateur radio DMR networks generally requires a
//! recognized amateur radio license; check the policy of the network you
//! link to.

pub use dmrlink_core::*;

/// Connected-UDP transport shared by the protocol clients.
pub mod transport {
    pub use dmrlink_transport::*;
}

/// Homebrew repeater-linking protocol backend.
///
/// Provides [`HomebrewClient`](homebrew::HomebrewClient) and the wire
/// codecs for the `RPTC` configuration record and the 53-byte `DMRD`
/// record.
#[cfg(feature = "homebrew")]
pub mod homebrew {
    pub use dmrlink_homebrew::*;
}

/// Rewind simple-external-application protocol backend.
///
/// Provides [`RewindClient`](rewind::RewindClient), the packet taxonomy,
/// and the [`RewindEvent`](rewind::RewindEvent) consumer stream.
#[cfg(feature = "rewind")]
pub mod rewind {
    pub use dmrlink_rewind::*;
}
