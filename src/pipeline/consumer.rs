use crate::pipeline::error::{Error, Result};
use crate::ts::TSPacket;

/// Accepts packets one at a time. `send_packet(None)` is the flush sentinel:
/// it signals end-of-input and must propagate downstream exactly once. Any
/// call after a flush must fail with [`Error::InvalidOperation`].
pub trait PacketConsumer {
    fn send_packet(&mut self, packet: Option<&TSPacket>) -> Result<()>;
}

/// Helper consumers share: once flushed, refuse any further `send_packet`.
#[derive(Debug, Default)]
pub struct FlushGuard {
    flushed: bool,
}

impl FlushGuard {
    /// Call at the top of `send_packet`. Errors if already flushed;
    /// otherwise records a `None` packet as the flush.
    pub fn check(&mut self, packet: Option<&TSPacket>) -> Result<()> {
        if self.flushed {
            return Err(Error::InvalidOperation(
                "send_packet called after flush".to_string(),
            ));
        }
        if packet.is_none() {
            self.flushed = true;
        }
        Ok(())
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed
    }
}
