//! Framed port commands over a byte link.
//!
//! A command is six bytes on the wire:
//! - `0xAA` start marker
//! - four payload bytes, one per output port, each echoed back on receipt
//! - `0x55` terminator, which commits the payload to the ports
//!
//! [`FrameReceiver`] is the device side state machine, [`LinkResponder`]
//! drives it from a stream, and [`FrameCommander`] is the host side that
//! sends a frame and checks the echoes.

pub mod codec;
pub mod commander;
pub mod error;
pub mod marker;
pub mod ports;
pub mod receiver;
pub mod responder;

#[cfg(feature = "async")]
pub use codec::LinkCodec;
pub use codec::{encode_frame, Frame, FrameConfig};
pub use commander::{Acknowledgement, FrameCommander};
pub use error::{FrameError, Result};
pub use marker::{END_MARKER, FRAME_LEN, PAYLOAD_LEN, START_MARKER};
pub use ports::{OutputPorts, PortApplier, PORT_COUNT};
pub use receiver::{FrameReceiver, Ingest, Outcome, ReceiverState, ReceiverStats};
pub use responder::LinkResponder;
