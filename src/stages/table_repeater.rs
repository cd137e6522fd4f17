use crate::pipeline::{ConsumerList, PacketConsumer, Pipe, Result};
use crate::psi::assembler::PsiTableAssembler;
use crate::psi::packetizer::packetize;
use crate::psi::sdt::SDT_PID;
use crate::stages::table_cache::TableCache;
use crate::ts::{TSPacket, PAT_PID};

/// Keeps the latest version of the PSI table carried on `pid` and
/// re-injects a fresh carousel of it every `period` forwarded packets.
/// Which table kind `pid` names (PAT, SDT, or a PMT) is inferred the same
/// way [`crate::psi::assembler::PsiTableAssembler`] infers it, by watching
/// a self-owned assembler — no separate `TableKind` parameter is needed.
pub struct TableRepeater {
    pid: u16,
    period: usize,
    packets_since_last_injection: usize,
    discovery: PsiTableAssembler<TableCache>,
    table_cc: u8,
    consumers: ConsumerList,
}

impl TableRepeater {
    pub fn new(pid: u16, period: usize) -> Self {
        TableRepeater {
            pid,
            period,
            packets_since_last_injection: 0,
            discovery: PsiTableAssembler::new(TableCache::default()),
            table_cc: 0,
            consumers: ConsumerList::new(),
        }
    }

    fn latest_table_bytes(&self) -> Option<Vec<u8>> {
        let cache = self.discovery.handler();
        if self.pid == PAT_PID {
            cache.pat.as_ref().map(|t| t.encode())
        } else if self.pid == SDT_PID {
            cache.sdt.as_ref().map(|t| t.encode())
        } else {
            cache.pmt.get(&self.pid).map(|t| t.encode())
        }
    }
}

impl Pipe for TableRepeater {
    fn consumers(&mut self) -> &mut ConsumerList {
        &mut self.consumers
    }
}

impl PacketConsumer for TableRepeater {
    fn send_packet(&mut self, packet: Option<&TSPacket>) -> Result<()> {
        let packet = match packet {
            None => return self.consumers.dispatch(None, &Default::default()),
            Some(p) => p,
        };

        self.discovery.feed(packet);
        self.packets_since_last_injection += 1;

        if self.packets_since_last_injection >= self.period {
            if let Some(bytes) = self.latest_table_bytes() {
                let (carousel, next_cc) = packetize(&bytes, self.pid, self.table_cc);
                self.table_cc = next_cc;
                for out in &carousel {
                    self.consumers.dispatch(Some(out), &Default::default())?;
                }
            }
            self.packets_since_last_injection = 0;
        }

        self.consumers.dispatch(Some(packet), &Default::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PacketConsumer as _;
    use crate::testutil::SyntheticTs;
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

    #[test]
    fn repeats_pat_every_period_packets_once_seen() {
        let ts = SyntheticTs::single_program();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut repeater = TableRepeater::new(PAT_PID, 5);
        repeater.add_consumer(Box::new(Recorder(log.clone())));
        for p in ts.packets() {
            repeater.send_packet(Some(p)).unwrap();
        }
        let seen = log.lock().unwrap();
        // every forwarded packet appears, plus extra PAT-pid injections.
        let pat_count = seen.iter().filter(|p| p.pid() == PAT_PID).count();
        let original_pat_count = ts.packets().iter().filter(|p| p.pid() == PAT_PID).count();
        assert!(pat_count > original_pat_count);
    }

    #[test]
    fn below_period_no_extra_injection_happens() {
        let ts = SyntheticTs::single_program();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut repeater = TableRepeater::new(PAT_PID, 10_000);
        repeater.add_consumer(Box::new(Recorder(log.clone())));
        for p in ts.packets() {
            repeater.send_packet(Some(p)).unwrap();
        }
        assert_eq!(log.lock().unwrap().len(), ts.packets().len());
    }
}
