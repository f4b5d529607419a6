use tracing::{debug, trace};

use crate::codec::Frame;
use crate::marker::{END_MARKER, PAYLOAD_LEN, START_MARKER};
use crate::ports::PortApplier;

/// Where the receiver is within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// Between frames, scanning for `0xAA`.
    AwaitingStart,
    /// Next byte is stored at this payload index.
    Collecting(usize),
    /// Payload complete; next byte must be `0x55`.
    AwaitingTerminator,
}

/// What a single byte did to the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Noise between frames. Not buffered, not echoed.
    Ignored,
    /// Start marker seen; collection begins.
    Started,
    /// Payload byte stored (and echoed).
    Staged { index: usize },
    /// Terminator matched; the payload was committed to the ports.
    Applied(Frame),
    /// Terminator mismatched; the frame was discarded.
    Rejected { terminator: u8 },
    /// The receiver found itself in an impossible state and reset.
    Desync,
}

/// Result of [`FrameReceiver::ingest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ingest {
    /// Byte to send back to the host before the next byte is ingested.
    pub echo: Option<u8>,
    pub outcome: Outcome,
}

impl Ingest {
    fn silent(outcome: Outcome) -> Self {
        Self {
            echo: None,
            outcome,
        }
    }

    /// Whether this byte committed a frame to the ports.
    pub fn applied(&self) -> bool {
        matches!(self.outcome, Outcome::Applied(_))
    }
}

/// Running totals for one receiver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    pub noise_bytes: u64,
    pub frames_applied: u64,
    pub frames_rejected: u64,
    pub desyncs: u64,
}

/// Byte-at-a-time frame receiver.
///
/// Owns its staging buffer and state, so any number of receivers can run side
/// by side (one per link). `ingest` takes `&mut self`: a link fed from more
/// than one source has to funnel its bytes through a single owner, e.g. a
/// `Mutex<FrameReceiver<_>>` or one consumer thread behind a channel.
///
/// The staged payload reaches the [`PortApplier`] only after all four payload
/// bytes and a matching terminator arrived in sequence. Every terminal
/// transition, success or not, clears the buffer and returns to
/// [`ReceiverState::AwaitingStart`].
#[derive(Debug)]
pub struct FrameReceiver<A> {
    state: ReceiverState,
    staged: [u8; PAYLOAD_LEN],
    applier: A,
    stats: ReceiverStats,
}

impl<A: PortApplier> FrameReceiver<A> {
    pub fn new(applier: A) -> Self {
        Self {
            state: ReceiverState::AwaitingStart,
            staged: [0; PAYLOAD_LEN],
            applier,
            stats: ReceiverStats::default(),
        }
    }

    /// Feed the next byte from the link.
    pub fn ingest(&mut self, byte: u8) -> Ingest {
        match self.state {
            ReceiverState::AwaitingStart if byte == START_MARKER => {
                self.state = ReceiverState::Collecting(0);
                Ingest::silent(Outcome::Started)
            }
            ReceiverState::AwaitingStart => {
                self.stats.noise_bytes += 1;
                trace!(byte, "ignoring byte outside frame");
                Ingest::silent(Outcome::Ignored)
            }
            ReceiverState::Collecting(index) if index < PAYLOAD_LEN => {
                self.staged[index] = byte;
                self.state = if index + 1 == PAYLOAD_LEN {
                    ReceiverState::AwaitingTerminator
                } else {
                    ReceiverState::Collecting(index + 1)
                };
                Ingest {
                    echo: Some(self.staged[index]),
                    outcome: Outcome::Staged { index },
                }
            }
            ReceiverState::Collecting(index) => {
                debug!(index, "receiver desync, resetting");
                self.stats.desyncs += 1;
                self.reset();
                Ingest::silent(Outcome::Desync)
            }
            ReceiverState::AwaitingTerminator if byte == END_MARKER => {
                let payload = self.staged;
                self.applier.apply(payload);
                self.stats.frames_applied += 1;
                self.reset();
                trace!(?payload, "frame applied");
                Ingest::silent(Outcome::Applied(Frame::new(payload)))
            }
            ReceiverState::AwaitingTerminator => {
                debug!(terminator = byte, "bad terminator, frame discarded");
                self.stats.frames_rejected += 1;
                self.reset();
                Ingest::silent(Outcome::Rejected { terminator: byte })
            }
        }
    }

    /// Feed a run of bytes, collecting the echoes in order.
    ///
    /// Returns the echo bytes and the number of frames applied. Only useful
    /// where the echoes can be delayed until the whole run is processed,
    /// e.g. offline decoding.
    pub fn ingest_all(&mut self, bytes: &[u8]) -> (Vec<u8>, usize) {
        let mut echoes = Vec::new();
        let mut applied = 0;
        for &byte in bytes {
            let ingest = self.ingest(byte);
            echoes.extend(ingest.echo);
            applied += usize::from(ingest.applied());
        }
        (echoes, applied)
    }

    /// Drop any partial frame and wait for a new start marker.
    pub fn reset(&mut self) {
        self.state = ReceiverState::AwaitingStart;
        self.staged = [0; PAYLOAD_LEN];
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// Payload bytes collected for the frame in progress.
    pub fn staged(&self) -> &[u8] {
        match self.state {
            ReceiverState::Collecting(index) => &self.staged[..index.min(PAYLOAD_LEN)],
            ReceiverState::AwaitingTerminator => &self.staged,
            ReceiverState::AwaitingStart => &[],
        }
    }

    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    pub fn applier(&self) -> &A {
        &self.applier
    }

    pub fn applier_mut(&mut self) -> &mut A {
        &mut self.applier
    }

    pub fn into_applier(self) -> A {
        self.applier
    }
}
