use std::time::Duration;

use bytes::{BufMut, BytesMut};

use crate::marker::{END_MARKER, FRAME_LEN, PAYLOAD_LEN, START_MARKER};

/// One port command: a byte for each output port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Frame {
    /// Port values, index 0 first on the wire.
    pub payload: [u8; PAYLOAD_LEN],
}

impl Frame {
    pub const fn new(payload: [u8; PAYLOAD_LEN]) -> Self {
        Self { payload }
    }

    /// Value destined for port `index`.
    pub fn port(&self, index: usize) -> Option<u8> {
        self.payload.get(index).copied()
    }

    /// The six bytes this frame occupies on the wire.
    pub fn to_wire(&self) -> [u8; FRAME_LEN] {
        let mut wire = [0u8; FRAME_LEN];
        wire[0] = START_MARKER;
        wire[1..=PAYLOAD_LEN].copy_from_slice(&self.payload);
        wire[FRAME_LEN - 1] = END_MARKER;
        wire
    }
}

impl From<[u8; PAYLOAD_LEN]> for Frame {
    fn from(payload: [u8; PAYLOAD_LEN]) -> Self {
        Self::new(payload)
    }
}

/// Encode a frame into the wire format.
///
/// ```text
/// ┌────────┬────────┬────────┬────────┬────────┬────────┐
/// │ 0xAA   │ port 0 │ port 1 │ port 2 │ port 3 │ 0x55   │
/// │ start  │        │        │        │        │ end    │
/// └────────┴────────┴────────┴────────┴────────┴────────┘
/// ```
///
/// Payload bytes are never escaped.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) {
    dst.reserve(FRAME_LEN);
    dst.put_u8(START_MARKER);
    dst.put_slice(&frame.payload);
    dst.put_u8(END_MARKER);
}

/// Link timing and retry policy for the host side.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// How long to wait for echo bytes. Default: 1 s.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking links.
    pub write_timeout: Option<Duration>,
    /// Total send attempts per frame, including the first. Default: 3.
    pub attempts: u32,
    /// Pause between attempts. Default: 200 ms.
    pub retry_backoff: Duration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            read_timeout: Some(Duration::from_secs(1)),
            write_timeout: None,
            attempts: 3,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

#[cfg(feature = "async")]
pub use self::link_codec::LinkCodec;

#[cfg(feature = "async")]
mod link_codec {
    use bytes::{Buf, BufMut, BytesMut};
    use tokio_util::codec::{Decoder, Encoder};

    use super::{encode_frame, Frame};
    use crate::error::FrameError;
    use crate::ports::OutputPorts;
    use crate::receiver::{FrameReceiver, Ingest, Outcome};

    /// Device-side codec for `tokio_util::codec::Framed`.
    ///
    /// Decoding runs every byte through a [`FrameReceiver`] that commits to
    /// the codec's [`OutputPorts`], yielding each event except ignored noise.
    /// Encoding accepts a `u8` (an echo) or a whole [`Frame`] (host side).
    ///
    /// Echoes must be sent before the next item is decoded to keep the
    /// one-echo-per-byte ordering.
    #[derive(Debug)]
    pub struct LinkCodec {
        receiver: FrameReceiver<OutputPorts>,
    }

    impl LinkCodec {
        pub fn new(ports: OutputPorts) -> Self {
            Self {
                receiver: FrameReceiver::new(ports),
            }
        }

        pub fn receiver(&self) -> &FrameReceiver<OutputPorts> {
            &self.receiver
        }
    }

    impl Decoder for LinkCodec {
        type Item = Ingest;
        type Error = FrameError;

        fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Ingest>, FrameError> {
            while src.has_remaining() {
                let ingest = self.receiver.ingest(src.get_u8());
                if ingest.outcome != Outcome::Ignored {
                    return Ok(Some(ingest));
                }
            }
            Ok(None)
        }
    }

    impl Encoder<Frame> for LinkCodec {
        type Error = FrameError;

        fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
            encode_frame(&frame, dst);
            Ok(())
        }
    }

    impl Encoder<u8> for LinkCodec {
        type Error = FrameError;

        fn encode(&mut self, echo: u8, dst: &mut BytesMut) -> Result<(), FrameError> {
            dst.put_u8(echo);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_markers_around_payload() {
        let mut buf = BytesMut::new();
        encode_frame(&Frame::new([0x01, 0x02, 0x03, 0x04]), &mut buf);
        assert_eq!(buf.as_ref(), &[0xAA, 0x01, 0x02, 0x03, 0x04, 0x55]);
    }

    #[test]
    fn marker_values_in_payload_are_not_escaped() {
        let frame = Frame::new([0xAA, 0x55, 0xAA, 0x55]);
        assert_eq!(frame.to_wire(), [0xAA, 0xAA, 0x55, 0xAA, 0x55, 0x55]);

        let mut buf = BytesMut::new();
        encode_frame(&frame, &mut buf);
        assert_eq!(buf.as_ref(), frame.to_wire().as_slice());
    }

    #[test]
    fn consecutive_frames_append() {
        let mut buf = BytesMut::new();
        encode_frame(&Frame::new([1, 2, 3, 4]), &mut buf);
        encode_frame(&Frame::new([5, 6, 7, 8]), &mut buf);
        assert_eq!(buf.len(), 2 * FRAME_LEN);
        assert_eq!(&buf[FRAME_LEN..], &[0xAA, 5, 6, 7, 8, 0x55]);
    }

    #[test]
    fn port_accessor() {
        let frame = Frame::from([9, 8, 7, 6]);
        assert_eq!(frame.port(0), Some(9));
        assert_eq!(frame.port(3), Some(6));
        assert_eq!(frame.port(4), None);
    }

    #[test]
    fn default_retry_policy() {
        let cfg = FrameConfig::default();
        assert_eq!(cfg.read_timeout, Some(Duration::from_secs(1)));
        assert_eq!(cfg.attempts, 3);
        assert_eq!(cfg.retry_backoff, Duration::from_millis(200));
    }

    #[cfg(feature = "async")]
    mod codec {
        use futures_util::{SinkExt, StreamExt};
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio_util::codec::Framed;

        use crate::ports::OutputPorts;
        use crate::receiver::Outcome;
        use crate::{Frame, LinkCodec};

        #[tokio::test]
        async fn device_codec_echoes_and_applies() {
            let (mut host, device) = tokio::io::duplex(64);
            let ports = OutputPorts::new();
            let mut framed = Framed::new(device, LinkCodec::new(ports.clone()));

            host.write_all(&[0x10, 0xAA, 0x05, 0x06, 0x07, 0x08, 0x55])
                .await
                .unwrap();

            let mut outcomes = Vec::new();
            while let Some(event) = framed.next().await {
                let event = event.unwrap();
                if let Some(echo) = event.echo {
                    SinkExt::<u8>::send(&mut framed, echo).await.unwrap();
                }
                let done = event.applied();
                outcomes.push(event.outcome);
                if done {
                    break;
                }
            }

            assert_eq!(outcomes.first(), Some(&Outcome::Started));
            assert_eq!(
                outcomes.last(),
                Some(&Outcome::Applied(Frame::new([0x05, 0x06, 0x07, 0x08])))
            );
            assert_eq!(ports.snapshot(), [0x05, 0x06, 0x07, 0x08]);

            let mut echoes = [0u8; 4];
            host.read_exact(&mut echoes).await.unwrap();
            assert_eq!(echoes, [0x05, 0x06, 0x07, 0x08]);
        }

        #[tokio::test]
        async fn host_codec_writes_wire_frame() {
            let (host, mut device) = tokio::io::duplex(64);
            let mut framed = Framed::new(host, LinkCodec::new(OutputPorts::new()));

            SinkExt::<Frame>::send(&mut framed, Frame::new([1, 2, 3, 4]))
                .await
                .unwrap();

            let mut wire = [0u8; 6];
            device.read_exact(&mut wire).await.unwrap();
            assert_eq!(wire, [0xAA, 1, 2, 3, 4, 0x55]);
        }
    }
}
