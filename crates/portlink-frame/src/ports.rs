use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::marker::PAYLOAD_LEN;

/// Number of byte-wide output registers.
pub const PORT_COUNT: usize = PAYLOAD_LEN;

/// Commits a validated payload to the outside world.
///
/// Called only after the terminator matched, exactly once per accepted frame.
/// Implementations must make all four bytes visible together.
pub trait PortApplier {
    fn apply(&mut self, payload: [u8; PORT_COUNT]);
}

impl<F> PortApplier for F
where
    F: FnMut([u8; PORT_COUNT]),
{
    fn apply(&mut self, payload: [u8; PORT_COUNT]) {
        self(payload)
    }
}

/// Four byte-wide output registers.
///
/// The registers are packed into one atomic word, so a reader on another
/// thread sees either the previous frame or the new one, never a mix.
/// Clones share the same registers.
#[derive(Debug, Clone, Default)]
pub struct OutputPorts {
    registers: Arc<AtomicU32>,
}

impl OutputPorts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers preloaded with `initial`.
    pub fn with_values(initial: [u8; PORT_COUNT]) -> Self {
        Self {
            registers: Arc::new(AtomicU32::new(u32::from_le_bytes(initial))),
        }
    }

    /// Write all four registers in one step.
    pub fn commit(&self, payload: [u8; PORT_COUNT]) {
        self.registers
            .store(u32::from_le_bytes(payload), Ordering::Release);
    }

    /// Current value of every register.
    pub fn snapshot(&self) -> [u8; PORT_COUNT] {
        self.registers.load(Ordering::Acquire).to_le_bytes()
    }

    /// Current value of one register, `None` past the last port.
    pub fn port(&self, index: usize) -> Option<u8> {
        self.snapshot().get(index).copied()
    }
}

impl PortApplier for OutputPorts {
    fn apply(&mut self, payload: [u8; PORT_COUNT]) {
        self.commit(payload);
    }
}
