use crate::pipeline::cancellation::CancellationToken;
use crate::pipeline::error::{ReadOutcome, Result};
use crate::pipeline::pipe::ConsumerList;
use crate::ts::TSPacket;

/// Produces packets one at a time.
pub trait PacketSource {
    /// Reads one packet into `out`. `out` is only meaningful when the
    /// return value is [`ReadOutcome::Success`].
    fn read_packet(&mut self, out: &mut Option<TSPacket>) -> Result<ReadOutcome>;
}

/// Drives `source` to completion, delivering every packet it produces to
/// `consumers` in registration order. Checks `cancel` before each
/// `read_packet` and before each per-consumer delivery; on cancellation
/// returns `Success` rather than `NoMorePacket`, so callers can tell "user
/// stopped us" from "stream ended". Never retries `NeedMoreInput` itself —
/// that is returned straight back to the caller, who decides whether to
/// re-drive the pump.
pub fn pump(
    source: &mut dyn PacketSource,
    consumers: &mut ConsumerList,
    cancel: &CancellationToken,
) -> Result<ReadOutcome> {
    loop {
        if cancel.is_cancelled() {
            return Ok(ReadOutcome::Success);
        }
        let mut packet = None;
        match source.read_packet(&mut packet)? {
            ReadOutcome::Success => {
                consumers.dispatch(packet.as_ref(), cancel)?;
            }
            other => return Ok(other),
        }
    }
}
