use std::io::{ErrorKind, Read, Write};

use bytes::BytesMut;
use portlink_transport::LinkStream;
use tracing::{debug, warn};

use crate::codec::{encode_frame, Frame, FrameConfig};
use crate::error::{from_transport, FrameError, Result};
use crate::marker::{FRAME_LEN, PAYLOAD_LEN};

/// A frame whose echo came back intact.
///
/// This proves the payload reached the device unchanged. The protocol has no
/// signal for the terminator, so it does not prove the ports were written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acknowledgement {
    pub frame: Frame,
    /// Attempt (1-based) that produced the matching echo.
    pub attempts: u32,
}

/// Host side of a link: sends frames and checks their echoes.
pub struct FrameCommander<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read + Write> FrameCommander<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(FRAME_LEN),
            config,
        }
    }

    /// Send `frame` and wait for its four echo bytes, retrying per the config.
    ///
    /// A timeout or a mismatched echo triggers another attempt after
    /// `retry_backoff`. When every attempt fails the last failure is returned:
    /// [`FrameError::EchoMismatch`] or [`FrameError::NoAcknowledgement`].
    pub fn apply(&mut self, frame: &Frame) -> Result<Acknowledgement> {
        self.apply_with(frame, |_| Ok(()))
    }

    fn apply_with<F>(&mut self, frame: &Frame, mut before_attempt: F) -> Result<Acknowledgement>
    where
        F: FnMut(&mut T) -> Result<()>,
    {
        let attempts = self.config.attempts.max(1);
        let mut last_mismatch = None;

        for attempt in 1..=attempts {
            before_attempt(&mut self.inner)?;
            self.send(frame)?;

            match self.read_echo(frame) {
                Ok(()) => {
                    debug!(payload = ?frame.payload, attempt, "frame acknowledged");
                    return Ok(Acknowledgement {
                        frame: *frame,
                        attempts: attempt,
                    });
                }
                Err(err @ FrameError::EchoMismatch { .. }) => {
                    warn!(attempt, error = %err, "echo did not match");
                    last_mismatch = Some(err);
                }
                Err(FrameError::Io(err)) if is_timeout(&err) => {
                    warn!(attempt, "no echo before timeout");
                    last_mismatch = None;
                }
                Err(err) => return Err(err),
            }

            if attempt < attempts && !self.config.retry_backoff.is_zero() {
                std::thread::sleep(self.config.retry_backoff);
            }
        }

        Err(last_mismatch.unwrap_or(FrameError::NoAcknowledgement { attempts }))
    }

    /// Write the frame without waiting for echoes.
    pub fn send(&mut self, frame: &Frame) -> Result<()> {
        self.buf.clear();
        encode_frame(frame, &mut self.buf);

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    fn read_echo(&mut self, frame: &Frame) -> Result<()> {
        let mut echo = [0u8; PAYLOAD_LEN];
        let mut filled = 0usize;
        while filled < PAYLOAD_LEN {
            match self.inner.read(&mut echo[filled..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        for (index, (&expected, actual)) in frame.payload.iter().zip(echo).enumerate() {
            if expected != actual {
                return Err(FrameError::EchoMismatch {
                    index,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Borrow the underlying link.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying link.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the commander and return the link.
    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameCommander<LinkStream> {
    /// Wrap a link, applying the configured timeouts to it.
    pub fn with_config_link(mut inner: LinkStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(from_transport)?;
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(from_transport)?;
        Ok(Self::with_config(inner, config))
    }

    /// Like [`apply`](Self::apply), but discards unread input before every
    /// attempt so a late echo from a previous attempt is never mistaken for
    /// the current one.
    pub fn apply_fresh(&mut self, frame: &Frame) -> Result<Acknowledgement> {
        self.apply_with(frame, |link| {
            let dropped = link.discard_input().map_err(from_transport)?;
            if dropped > 0 {
                debug!(dropped, "discarded stale input");
            }
            Ok(())
        })
    }
}

fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::os::unix::net::UnixStream;
    use std::time::Duration;

    use super::*;
    use crate::ports::OutputPorts;
    use crate::responder::LinkResponder;

    enum Reply {
        Bytes(Vec<u8>),
        Timeout,
    }

    /// Answers each read from a script; records everything written.
    struct ScriptedDevice {
        replies: VecDeque<Reply>,
        written: Vec<u8>,
    }

    impl ScriptedDevice {
        fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: replies.into(),
                written: Vec::new(),
            }
        }
    }

    impl Read for ScriptedDevice {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.replies.pop_front() {
                Some(Reply::Bytes(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Reply::Timeout) => Err(std::io::Error::from(ErrorKind::TimedOut)),
                None => Ok(0),
            }
        }
    }

    impl Write for ScriptedDevice {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn quick_config(attempts: u32) -> FrameConfig {
        FrameConfig {
            attempts,
            retry_backoff: Duration::ZERO,
            ..FrameConfig::default()
        }
    }

    #[test]
    fn first_attempt_acknowledged() {
        let device = ScriptedDevice::new(vec![Reply::Bytes(vec![1, 2, 3, 4])]);
        let mut commander = FrameCommander::with_config(device, quick_config(3));

        let ack = commander.apply(&Frame::new([1, 2, 3, 4])).unwrap();
        assert_eq!(ack.attempts, 1);
        assert_eq!(commander.get_ref().written, vec![0xAA, 1, 2, 3, 4, 0x55]);
    }

    #[test]
    fn echo_split_across_reads() {
        let device = ScriptedDevice::new(vec![
            Reply::Bytes(vec![1]),
            Reply::Bytes(vec![2, 3]),
            Reply::Bytes(vec![4]),
        ]);
        let mut commander = FrameCommander::with_config(device, quick_config(1));
        assert!(commander.apply(&Frame::new([1, 2, 3, 4])).is_ok());
    }

    #[test]
    fn retries_after_timeout() {
        let device = ScriptedDevice::new(vec![Reply::Timeout, Reply::Bytes(vec![9, 9, 9, 9])]);
        let mut commander = FrameCommander::with_config(device, quick_config(3));

        let ack = commander.apply(&Frame::new([9, 9, 9, 9])).unwrap();
        assert_eq!(ack.attempts, 2);
        assert_eq!(commander.get_ref().written.len(), 2 * FRAME_LEN);
    }

    #[test]
    fn gives_up_after_configured_attempts() {
        let device = ScriptedDevice::new(vec![Reply::Timeout, Reply::Timeout, Reply::Timeout]);
        let mut commander = FrameCommander::with_config(device, quick_config(3));

        let err = commander.apply(&Frame::new([1, 2, 3, 4])).unwrap_err();
        assert!(matches!(err, FrameError::NoAcknowledgement { attempts: 3 }));
        assert_eq!(commander.get_ref().written.len(), 3 * FRAME_LEN);
    }

    #[test]
    fn reports_mismatch_when_last_attempt_mismatches() {
        let device = ScriptedDevice::new(vec![
            Reply::Timeout,
            Reply::Bytes(vec![1, 2, 0xFF, 4]),
        ]);
        let mut commander = FrameCommander::with_config(device, quick_config(2));

        let err = commander.apply(&Frame::new([1, 2, 3, 4])).unwrap_err();
        assert!(matches!(
            err,
            FrameError::EchoMismatch {
                index: 2,
                expected: 3,
                actual: 0xFF
            }
        ));
    }

    #[test]
    fn mismatch_then_good_echo_succeeds() {
        let device = ScriptedDevice::new(vec![
            Reply::Bytes(vec![0, 0, 0, 0]),
            Reply::Bytes(vec![5, 6, 7, 8]),
        ]);
        let mut commander = FrameCommander::with_config(device, quick_config(3));
        assert_eq!(commander.apply(&Frame::new([5, 6, 7, 8])).unwrap().attempts, 2);
    }

    #[test]
    fn closed_link_is_not_retried() {
        let device = ScriptedDevice::new(vec![]);
        let mut commander = FrameCommander::with_config(device, quick_config(3));

        let err = commander.apply(&Frame::new([1, 2, 3, 4])).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
        assert_eq!(commander.get_ref().written.len(), FRAME_LEN);
    }

    #[test]
    fn zero_attempts_still_sends_once() {
        let device = ScriptedDevice::new(vec![Reply::Bytes(vec![1, 1, 1, 1])]);
        let mut commander = FrameCommander::with_config(device, quick_config(0));
        assert!(commander.apply(&Frame::new([1, 1, 1, 1])).is_ok());
    }

    #[test]
    fn drives_a_real_responder() {
        let (host, device) = UnixStream::pair().unwrap();
        host.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let ports = OutputPorts::new();
        let observer = ports.clone();

        let device_thread = std::thread::spawn(move || {
            let mut responder = LinkResponder::new(device, ports);
            responder.run().unwrap()
        });

        let mut commander = FrameCommander::with_config(host, quick_config(1));
        commander.apply(&Frame::new([0x01, 0x02, 0x03, 0x04])).unwrap();
        commander.apply(&Frame::new([0xAA, 0x55, 0x00, 0xFF])).unwrap();

        drop(commander);
        let stats = device_thread.join().unwrap();
        assert_eq!(stats.frames_applied, 2);
        assert_eq!(observer.snapshot(), [0xAA, 0x55, 0x00, 0xFF]);
    }
}
