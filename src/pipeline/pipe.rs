use crate::pipeline::cancellation::CancellationToken;
use crate::pipeline::consumer::PacketConsumer;
use crate::pipeline::error::Result;
use crate::ts::TSPacket;

/// An opaque handle returned by [`ConsumerList::add`]. Rust trait objects
/// have no default identity comparison, so removal goes through this handle
/// rather than the consumer value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerHandle(u64);

/// An ordered list of downstream consumers, shared by every stage that is a
/// [`Pipe`]. Delivery order equals insertion order.
#[derive(Default)]
pub struct ConsumerList {
    next_id: u64,
    consumers: Vec<(ConsumerHandle, Box<dyn PacketConsumer + Send>)>,
}

impl ConsumerList {
    pub fn new() -> Self {
        ConsumerList::default()
    }

    pub fn add(&mut self, consumer: Box<dyn PacketConsumer + Send>) -> ConsumerHandle {
        let handle = ConsumerHandle(self.next_id);
        self.next_id += 1;
        self.consumers.push((handle, consumer));
        handle
    }

    /// Returns whether a consumer with that handle was present.
    pub fn remove(&mut self, handle: ConsumerHandle) -> bool {
        let before = self.consumers.len();
        self.consumers.retain(|(h, _)| *h != handle);
        self.consumers.len() != before
    }

    pub fn clear(&mut self) {
        self.consumers.clear();
    }

    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }

    /// Delivers `packet` to every consumer in registration order, checking
    /// `cancel` before each delivery. Stops (without error) the moment
    /// cancellation is observed.
    pub fn dispatch(&mut self, packet: Option<&TSPacket>, cancel: &CancellationToken) -> Result<()> {
        for (_, consumer) in self.consumers.iter_mut() {
            if cancel.is_cancelled() {
                return Ok(());
            }
            consumer.send_packet(packet)?;
        }
        Ok(())
    }
}

/// Capability interface for stages that fan packets out to multiple
/// consumers. Default methods delegate to an owned [`ConsumerList`].
pub trait Pipe {
    fn consumers(&mut self) -> &mut ConsumerList;

    fn add_consumer(&mut self, consumer: Box<dyn PacketConsumer + Send>) -> ConsumerHandle {
        self.consumers().add(consumer)
    }

    fn remove_consumer(&mut self, handle: ConsumerHandle) -> bool {
        self.consumers().remove(handle)
    }

    fn clear_consumers(&mut self) {
        self.consumers().clear()
    }
}
