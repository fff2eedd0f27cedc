//! dmrlink-transport: UDP transport for the dmrlink protocol clients.
//!
//! Both master-link protocols are datagram based, so this crate provides a
//! single [`UdpTransport`] wrapping a [`tokio::net::UdpSocket`] with error
//! mapping consistent with the rest of the library. Protocol engines own
//! one transport each; the receive worker and the event loop share it
//! through an `Arc`.

pub mod udp;

pub use udp::UdpTransport;
