//! Byte-link transports for portlink.
//!
//! The protocol only needs an ordered, reliable byte stream in each direction.
//! This crate provides that over:
//! - Unix domain sockets (device emulation, tests, local tooling)
//! - Serial ports (behind the `serial` feature)
//!
//! Everything above this layer talks to a [`LinkStream`].

pub mod error;
pub mod traits;

#[cfg(feature = "serial")]
pub mod serial;
#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use traits::LinkStream;

#[cfg(feature = "serial")]
pub use serial::{available_ports, PortSummary, SerialConfig, SerialLink, DEFAULT_BAUD_RATE};
#[cfg(unix)]
pub use uds::UnixDomainSocket;
