//! CANETH gateway.
//!
//! Bridges a CAN bus to a remote host over UDP. Frames from the bus pass an
//! [`AdmissionFilter`](filter::AdmissionFilter) before they are encoded and
//! sent, datagrams from the host are decoded and transmitted on the bus.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod bridge;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod filter;
#[cfg(feature = "udp")]
pub mod udp;

// re-export
pub use caneth as proto;

pub use bridge::{Bridge, PollReport, State};
pub use config::{BitRate, BusConfig, Timing};
pub use error::{BridgeError, UnsupportedRate};
pub use filter::AdmissionFilter;
