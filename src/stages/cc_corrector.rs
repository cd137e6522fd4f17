use std::collections::HashMap;

use crate::pipeline::{ConsumerList, PacketConsumer, Pipe, Result};
use crate::ts::TSPacket;

/// Rewrites continuity counters into an unbroken per-PID sequence,
/// absorbing whatever discontinuities the upstream packets carried. A
/// discontinuity-indicator packet re-syncs that PID's counter to the
/// incoming value instead of incrementing.
#[derive(Default)]
pub struct CcCorrector {
    counters: HashMap<u16, u8>,
    consumers: ConsumerList,
}

impl CcCorrector {
    pub fn new() -> Self {
        CcCorrector::default()
    }
}

impl Pipe for CcCorrector {
    fn consumers(&mut self) -> &mut ConsumerList {
        &mut self.consumers
    }
}

impl PacketConsumer for CcCorrector {
    fn send_packet(&mut self, packet: Option<&TSPacket>) -> Result<()> {
        let packet = match packet {
            None => return self.consumers.dispatch(None, &Default::default()),
            Some(p) => p,
        };

        let mut corrected = packet.clone();
        let pid = packet.pid();
        let next = match self.counters.get(&pid) {
            Some(&prev) if !packet.discontinuity_indicator() => (prev + 1) % 16,
            _ => packet.continuity_counter(),
        };
        self.counters.insert(pid, next);
        corrected.set_continuity_counter(next);

        self.consumers.dispatch(Some(&corrected), &Default::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recorder(Arc<Mutex<Vec<TSPacket>>>);
    impl PacketConsumer for Recorder {
        fn send_packet(&mut self, packet: Option<&TSPacket>) -> Result<()> {
            if let Some(p) = packet {
                self.0.lock().unwrap().push(p.clone());
            }
            Ok(())
        }
    }

    fn packet(pid: u16, cc: u8, discontinuity: bool) -> TSPacket {
        let mut raw = [0xffu8; 188];
        raw[0] = 0x47;
        raw[1] = (pid >> 8) as u8 & 0x1f;
        raw[2] = pid as u8;
        raw[3] = 0x10 | (cc & 0xf);
        let mut p = TSPacket::parse(&raw).unwrap();
        if discontinuity {
            // give it an adaptation field to carry the flag.
            let mut raw = [0xffu8; 188];
            raw[0] = 0x47;
            raw[1] = (pid >> 8) as u8 & 0x1f;
            raw[2] = pid as u8;
            raw[3] = 0x30 | (cc & 0xf);
            raw[4] = 1;
            raw[5] = 0x80;
            p = TSPacket::parse(&raw).unwrap();
        }
        p
    }

    #[test]
    fn first_packet_on_a_pid_passes_through_unchanged() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut cc = CcCorrector::new();
        cc.add_consumer(Box::new(Recorder(log.clone())));
        cc.send_packet(Some(&packet(0x100, 7, false))).unwrap();
        assert_eq!(log.lock().unwrap()[0].continuity_counter(), 7);
    }

    #[test]
    fn subsequent_packets_increment_mod_16() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut cc = CcCorrector::new();
        cc.add_consumer(Box::new(Recorder(log.clone())));
        cc.send_packet(Some(&packet(0x100, 15, false))).unwrap();
        cc.send_packet(Some(&packet(0x100, 9, false))).unwrap(); // upstream cc is irrelevant
        let seen = log.lock().unwrap();
        assert_eq!(seen[0].continuity_counter(), 15);
        assert_eq!(seen[1].continuity_counter(), 0);
    }

    #[test]
    fn discontinuity_resyncs_instead_of_incrementing() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut cc = CcCorrector::new();
        cc.add_consumer(Box::new(Recorder(log.clone())));
        cc.send_packet(Some(&packet(0x100, 3, false))).unwrap();
        cc.send_packet(Some(&packet(0x100, 9, true))).unwrap();
        let seen = log.lock().unwrap();
        assert_eq!(seen[1].continuity_counter(), 9);
    }
}
