use std::io::{ErrorKind, Read, Write};

use tracing::debug;

use crate::error::{FrameError, Result};
use crate::ports::PortApplier;
use crate::receiver::{FrameReceiver, Ingest, ReceiverStats};

const READ_CHUNK_SIZE: usize = 64;

/// Device side of a link: feeds received bytes to a [`FrameReceiver`] and
/// writes each echo back before the next byte is ingested.
pub struct LinkResponder<T, A> {
    inner: T,
    receiver: FrameReceiver<A>,
}

impl<T: Read + Write, A: PortApplier> LinkResponder<T, A> {
    pub fn new(inner: T, applier: A) -> Self {
        Self {
            inner,
            receiver: FrameReceiver::new(applier),
        }
    }

    /// Read once from the link and process whatever arrived.
    ///
    /// `observe` sees every [`Ingest`], after its echo (if the host is still
    /// there) has been flushed.
    /// Returns the number of bytes processed. EOF, a reset connection or a
    /// host that vanished while echoes were going out is reported as
    /// [`FrameError::ConnectionClosed`]; a read timeout surfaces as
    /// [`FrameError::Io`] with `WouldBlock` or `TimedOut`.
    pub fn poll<F>(&mut self, observe: F) -> Result<usize>
    where
        F: FnMut(&Ingest),
    {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = loop {
            match self.inner.read(&mut chunk) {
                Ok(n) => break n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::ConnectionReset => {
                    return Err(FrameError::ConnectionClosed)
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        };

        if read == 0 {
            return Err(FrameError::ConnectionClosed);
        }

        self.process(&chunk[..read], observe)?;
        Ok(read)
    }

    /// Process bytes that were already read from the link.
    ///
    /// Every byte is ingested even if the host goes away part way through:
    /// echoes stop, the rest of the chunk still reaches the receiver, and
    /// the call then returns [`FrameError::ConnectionClosed`].
    pub fn process<F>(&mut self, bytes: &[u8], mut observe: F) -> Result<()>
    where
        F: FnMut(&Ingest),
    {
        let mut host_gone = false;
        for &byte in bytes {
            let ingest = self.receiver.ingest(byte);
            if let (Some(echo), false) = (ingest.echo, host_gone) {
                match self.send_echo(echo) {
                    Ok(()) => {}
                    Err(FrameError::ConnectionClosed) => {
                        debug!("host closed the link, finishing chunk without echoes");
                        host_gone = true;
                    }
                    Err(err) => return Err(err),
                }
            }
            observe(&ingest);
        }

        if host_gone {
            Err(FrameError::ConnectionClosed)
        } else {
            Ok(())
        }
    }

    /// Serve until the host closes the link.
    pub fn run(&mut self) -> Result<ReceiverStats> {
        loop {
            match self.poll(|_| {}) {
                Ok(_) => {}
                Err(FrameError::ConnectionClosed) => return Ok(self.receiver.stats()),
                Err(err) => return Err(err),
            }
        }
    }

    fn send_echo(&mut self, echo: u8) -> Result<()> {
        if let Err(err) = self.inner.write_all(&[echo]) {
            return Err(write_error(err));
        }
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(write_error(err)),
            }
        }
    }

    pub fn receiver(&self) -> &FrameReceiver<A> {
        &self.receiver
    }

    pub fn receiver_mut(&mut self) -> &mut FrameReceiver<A> {
        &mut self.receiver
    }

    /// Borrow the underlying link.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying link.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Give back the link and the applier.
    pub fn into_parts(self) -> (T, A) {
        (self.inner, self.receiver.into_applier())
    }
}

fn write_error(err: std::io::Error) -> FrameError {
    match err.kind() {
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::WriteZero => {
            FrameError::ConnectionClosed
        }
        _ => FrameError::Io(err),
    }
}
