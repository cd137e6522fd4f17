use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TryRecvError};
use std::sync::{Arc, Mutex};

use crate::pipeline::consumer::PacketConsumer;
use crate::pipeline::error::{Error, ReadOutcome, Result};
use crate::pipeline::source::PacketSource;
use crate::ts::TSPacket;

/// Bridges a producer thread and a consumer thread: the only boundary in
/// this crate where packets cross threads. `send_packet` is the
/// [`PacketConsumer`] side (producer thread); `read_packet` is the
/// [`PacketSource`] side (consumer thread). `flushed` is a one-way latch —
/// once a `None` packet is sent, every later `send_packet` call errors.
///
/// An unbounded queue never blocks `send_packet`; a bounded queue (built
/// with [`PacketQueue::bounded`]) blocks the sending thread when full,
/// using `std::sync::mpsc`'s own backpressure, until the consumer drains it
/// or the queue is flushed. `read_packet` never blocks: an empty,
/// unflushed queue reports [`ReadOutcome::NeedMoreInput`].
pub struct PacketQueueProducer {
    sender: SyncSender<Option<TSPacket>>,
    flushed: Arc<Mutex<bool>>,
}

pub struct PacketQueueConsumer {
    receiver: Receiver<Option<TSPacket>>,
    flushed: Arc<Mutex<bool>>,
}

/// Creates a bounded queue: `send_packet` blocks the calling thread once
/// `capacity` packets are outstanding.
pub fn bounded(capacity: usize) -> (PacketQueueProducer, PacketQueueConsumer) {
    build(capacity.max(1))
}

/// Creates an effectively unbounded queue: `send_packet` never blocks.
pub fn unbounded() -> (PacketQueueProducer, PacketQueueConsumer) {
    build(usize::MAX / 2)
}

fn build(capacity: usize) -> (PacketQueueProducer, PacketQueueConsumer) {
    let (sender, receiver) = sync_channel(capacity);
    let flushed = Arc::new(Mutex::new(false));
    (
        PacketQueueProducer {
            sender,
            flushed: flushed.clone(),
        },
        PacketQueueConsumer { receiver, flushed },
    )
}

impl PacketConsumer for PacketQueueProducer {
    fn send_packet(&mut self, packet: Option<&TSPacket>) -> Result<()> {
        {
            let mut flushed = self.flushed.lock().unwrap();
            if *flushed {
                return Err(Error::InvalidOperation(
                    "send_packet called on a flushed queue".to_string(),
                ));
            }
            if packet.is_none() {
                *flushed = true;
            }
        }
        // The consumer side never outlives the producer's last send within
        // this crate's usage, but a detached consumer is a quiet drop, not
        // a panic: queues are torn down independently of pumps.
        let _ = self.sender.send(packet.cloned());
        Ok(())
    }
}

impl PacketSource for PacketQueueConsumer {
    fn read_packet(&mut self, out: &mut Option<TSPacket>) -> Result<crate::pipeline::error::ReadOutcome> {
        match self.receiver.try_recv() {
            Ok(Some(packet)) => {
                *out = Some(packet);
                Ok(ReadOutcome::Success)
            }
            Ok(None) => Ok(ReadOutcome::NoMorePacket),
            Err(TryRecvError::Empty) => {
                if *self.flushed.lock().unwrap() {
                    Ok(ReadOutcome::NoMorePacket)
                } else {
                    Ok(ReadOutcome::NeedMoreInput)
                }
            }
            Err(TryRecvError::Disconnected) => Ok(ReadOutcome::NoMorePacket),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(pid: u16) -> TSPacket {
        let mut raw = [0u8; 188];
        raw[0] = 0x47;
        raw[1] = (pid >> 8) as u8 & 0x1f;
        raw[2] = pid as u8;
        raw[3] = 0x10;
        TSPacket::parse(&raw).unwrap()
    }

    #[test]
    fn empty_unflushed_queue_needs_more_input() {
        let (_producer, mut consumer) = unbounded();
        let mut out = None;
        assert_eq!(consumer.read_packet(&mut out).unwrap(), ReadOutcome::NeedMoreInput);
    }

    #[test]
    fn drains_in_order_then_reports_end_of_stream() {
        let (mut producer, mut consumer) = unbounded();
        for pid in [1u16, 2, 3] {
            producer.send_packet(Some(&packet(pid))).unwrap();
        }
        producer.send_packet(None).unwrap();

        let mut seen = Vec::new();
        loop {
            let mut out = None;
            match consumer.read_packet(&mut out).unwrap() {
                ReadOutcome::Success => seen.push(out.unwrap().pid()),
                ReadOutcome::NoMorePacket => break,
                ReadOutcome::NeedMoreInput => panic!("queue should not need more input once flushed"),
            }
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn send_after_flush_is_invalid_operation() {
        let (mut producer, _consumer) = unbounded();
        producer.send_packet(None).unwrap();
        let err = producer.send_packet(Some(&packet(1))).unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
    }
}
