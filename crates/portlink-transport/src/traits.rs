use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use crate::error::Result;

/// A connected byte link: everything the protocol layers read from and write to.
///
/// Wraps either a Unix domain socket stream or, with the `serial` feature,
/// an open serial device.
pub struct LinkStream {
    inner: LinkStreamInner,
}

enum LinkStreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    #[cfg(feature = "serial")]
    Serial(Box<dyn serialport::SerialPort>),
}

/// Serial ports always carry a timeout; this stands in for "block forever".
#[cfg(feature = "serial")]
const SERIAL_BLOCKING_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

impl Read for LinkStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.read(buf),
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(port) => port.read(buf),
        }
    }
}

impl Write for LinkStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.write(buf),
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(port) => port.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.flush(),
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(port) => port.flush(),
        }
    }
}

impl LinkStream {
    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: LinkStreamInner::Unix(stream),
        }
    }

    #[cfg(feature = "serial")]
    pub(crate) fn from_serial(port: Box<dyn serialport::SerialPort>) -> Self {
        Self {
            inner: LinkStreamInner::Serial(port),
        }
    }

    /// Set the read timeout. `None` blocks until data arrives.
    ///
    /// Serial ports share one timeout between reads and writes, so this also
    /// bounds writes on a serial link.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(port) => port
                .set_timeout(timeout.unwrap_or(SERIAL_BLOCKING_TIMEOUT))
                .map_err(|err| std::io::Error::from(err).into()),
        }
    }

    /// Set the write timeout.
    ///
    /// A no-op on serial links, where [`set_read_timeout`](Self::set_read_timeout)
    /// governs both directions.
    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(_) => {
                let _ = timeout;
                Ok(())
            }
        }
    }

    /// Open a second handle onto the same link.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(port) => {
                let cloned = port.try_clone().map_err(std::io::Error::from)?;
                Ok(Self::from_serial(cloned))
            }
        }
    }

    /// Drop whatever the peer has sent that nobody has read yet.
    ///
    /// Used before issuing a command so stale echoes from an earlier attempt
    /// cannot be mistaken for the new acknowledgement. Returns the number of
    /// bytes discarded.
    pub fn discard_input(&mut self) -> Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => {
                stream.set_nonblocking(true)?;
                let drained = drain_nonblocking(stream);
                stream.set_nonblocking(false)?;
                Ok(drained?)
            }
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(port) => {
                let pending = port.bytes_to_read().map_err(std::io::Error::from)?;
                port.clear(serialport::ClearBuffer::Input)
                    .map_err(std::io::Error::from)?;
                Ok(pending as usize)
            }
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(_) => "unix-domain-socket",
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(_) => "serial",
        }
    }
}

#[cfg(unix)]
fn drain_nonblocking(stream: &mut std::os::unix::net::UnixStream) -> std::io::Result<usize> {
    let mut drained = 0usize;
    let mut chunk = [0u8; 256];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => return Ok(drained),
            Ok(n) => drained += n,
            Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(drained),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}

impl std::fmt::Debug for LinkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkStream")
            .field("type", &self.transport_name())
            .finish()
    }
}
