//! Framed four-port commands over serial links.
//!
//! A host sends `0xAA b0 b1 b2 b3 0x55`; the device echoes each payload byte
//! as it arrives and, when the terminator matches, writes the four bytes to
//! its output ports in one step.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte links (Unix domain sockets, serial ports behind `serial`)
//! - [`frame`]: Wire format, the device-side receiver, and the host-side commander

/// Re-export transport types.
pub mod transport {
    pub use portlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use portlink_frame::*;
}
