/// Errors raised by the host and device link drivers.
///
/// Protocol-level rejections inside [`FrameReceiver`](crate::FrameReceiver)
/// are never errors; they are reported as [`Outcome`](crate::Outcome)s.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An echoed byte differed from the payload byte that was sent.
    #[error("echo mismatch at payload byte {index} (sent 0x{expected:02X}, got 0x{actual:02X})")]
    EchoMismatch { index: usize, expected: u8, actual: u8 },

    /// No complete echo arrived within the read timeout on any attempt.
    #[error("no acknowledgement after {attempts} attempt(s)")]
    NoAcknowledgement { attempts: u32 },

    /// An I/O error occurred on the link.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link closed while a frame or its echo was in flight.
    #[error("link closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;

pub(crate) fn from_transport(err: portlink_transport::TransportError) -> FrameError {
    use portlink_transport::TransportError;

    match err {
        TransportError::Io(io) | TransportError::Accept(io) => FrameError::Io(io),
        TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
            FrameError::Io(source)
        }
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
