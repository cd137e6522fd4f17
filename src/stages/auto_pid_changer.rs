use std::collections::{HashMap, HashSet};

use crate::pipeline::{ConsumerList, PacketConsumer, Pipe, Result};
use crate::provider::PidProvider;
use crate::psi::assembler::PsiTableAssembler;
use crate::stages::pid_changer::PidChanger;
use crate::stages::pid_map::PidMap;
use crate::stages::table_cache::TableCache;
use crate::ts::TSPacket;

/// Watches PAT/PMT version changes and grows the wrapped [`PidChanger`]'s
/// map automatically, drawing fresh destinations from a [`PidProvider`] for
/// every referenced PID not already covered by the preset map or a prior
/// assignment. The wrapped changer is owned directly (composition, not a
/// shared handle) and its map is updated synchronously before the packet
/// that triggered the update is forwarded, so the map is never observed
/// mid-update by a concurrent reader.
pub struct AutoPidChanger {
    changer: PidChanger,
    provider: Box<dyn PidProvider + Send>,
    preset: HashMap<u16, u16>,
    assigned: HashMap<u16, u16>,
    reserved_sources: HashSet<u16>,
    discovery: PsiTableAssembler<TableCache>,
}

impl AutoPidChanger {
    pub fn new(mut provider: Box<dyn PidProvider + Send>, preset: HashMap<u16, u16>) -> Self {
        for &destination in preset.values() {
            provider.reserve(destination);
        }
        AutoPidChanger {
            changer: PidChanger::new(PidMap::default()),
            provider,
            preset,
            assigned: HashMap::new(),
            reserved_sources: HashSet::new(),
            discovery: PsiTableAssembler::new(TableCache::default()),
        }
    }

    pub fn map(&self) -> &PidMap {
        self.changer.map()
    }

    fn referenced_pids(&self) -> Vec<u16> {
        let cache = self.discovery.handler();
        let mut pids = Vec::new();
        if let Some(pat) = &cache.pat {
            pids.extend(pat.program_association.values().copied());
        }
        for pmt in cache.pmt.values() {
            pids.push(pmt.pcr_pid);
            pids.extend(pmt.stream_info.iter().map(|s| s.elementary_pid));
        }
        pids
    }

    fn assign(&mut self, pid: u16) -> Result<()> {
        if self.assigned.contains_key(&pid) {
            return Ok(());
        }
        let destination = if let Some(&preset) = self.preset.get(&pid) {
            preset
        } else {
            self.provider.allocate()?
        };
        self.assigned.insert(pid, destination);
        Ok(())
    }
}

impl Pipe for AutoPidChanger {
    fn consumers(&mut self) -> &mut ConsumerList {
        self.changer.consumers()
    }
}

impl PacketConsumer for AutoPidChanger {
    fn send_packet(&mut self, packet: Option<&TSPacket>) -> Result<()> {
        let packet = match packet {
            None => return self.changer.send_packet(None),
            Some(p) => p,
        };

        let pid = packet.pid();
        if self.reserved_sources.insert(pid) {
            self.provider.reserve(pid);
        }
        self.discovery.feed(packet);

        for referenced in self.referenced_pids() {
            self.assign(referenced)?;
        }

        let map = PidMap::build(self.assigned.iter().map(|(s, d)| (*s, *d)))?;
        self.changer.set_map(map);

        self.changer.send_packet(Some(packet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PacketConsumer as _;
    use crate::provider::SequentialPidProvider;
    use crate::psi::pmt::TSProgramMapSection;
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
    fn preset_entry_is_never_overridden_and_others_get_fresh_pids() {
        let ts = SyntheticTs::two_programs();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut preset = HashMap::new();
        preset.insert(0x200u16, 0x400u16);
        let mut changer = AutoPidChanger::new(Box::new(SequentialPidProvider::new()), preset);
        changer.add_consumer(Box::new(Recorder(log.clone())));
        for p in ts.packets() {
            changer.send_packet(Some(p)).unwrap();
        }

        assert_eq!(changer.map().get(0x200), Some(0x400));
        let destinations: HashSet<u16> = [0x200u16, 0x201, 0x210, 0x211]
            .iter()
            .map(|pid| changer.map().get(*pid).unwrap())
            .collect();
        assert_eq!(destinations.len(), 4, "every remapped pid must be distinct");

        let seen = log.lock().unwrap();
        assert!(seen.iter().any(|p| p.pid() == 0x400));
    }
}
