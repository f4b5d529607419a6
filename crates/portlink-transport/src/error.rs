use std::path::PathBuf;

/// Errors raised while opening or driving a byte link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding a listening socket failed.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Connecting to a listening socket failed.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Accepting an incoming link failed.
    #[error("failed to accept link: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on an open link.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path exceeds `sockaddr_un.sun_path`.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// Opening or configuring a serial device failed.
    #[error("serial port {path}: {message}")]
    Serial { path: String, message: String },
}

pub type Result<T> = std::result::Result<T, TransportError>;
