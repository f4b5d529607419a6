//! Wire constants.
//!
//! Only position decides what a byte means. A payload byte equal to either
//! marker is taken literally.

/// Opens a frame. Only looked for between frames.
pub const START_MARKER: u8 = 0xAA;

/// Closes a frame. Anything else in this position discards the frame.
pub const END_MARKER: u8 = 0x55;

/// Payload bytes per frame, one per output port.
pub const PAYLOAD_LEN: usize = 4;

/// Start marker + payload + terminator.
pub const FRAME_LEN: usize = PAYLOAD_LEN + 2;
