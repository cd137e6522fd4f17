use std::collections::HashMap;

use crate::pipeline::{ConsumerList, PacketConsumer, Pipe, Result};
use crate::psi::assembler::PsiTableAssembler;
use crate::psi::pat::ProgramAssociationSection;
use crate::psi::packetizer::packetize;
use crate::psi::pmt::TSProgramMapSection;
use crate::stages::pid_map::PidMap;
use crate::stages::table_cache::TableCache;
use crate::ts::{TSPacket, PAT_PID};

/// Rewrites PIDs according to a [`PidMap`]: the raw PID of every packet,
/// plus the PAT/PMT section content of any table that references a
/// remapped PID. See module docs on `stages` for the cycle-replacement
/// mechanism.
pub struct PidChanger {
    map: PidMap,
    assembler: PsiTableAssembler<TableCache>,
    in_replaced_cycle: HashMap<u16, bool>,
    table_cc: HashMap<u16, u8>,
    consumers: ConsumerList,
}

impl PidChanger {
    pub fn new(map: PidMap) -> Self {
        PidChanger {
            map,
            assembler: PsiTableAssembler::new(TableCache::default()),
            in_replaced_cycle: HashMap::new(),
            table_cc: HashMap::new(),
            consumers: ConsumerList::new(),
        }
    }

    pub fn map(&self) -> &PidMap {
        &self.map
    }

    /// Replaces the map in place. Used by `AutoPidChanger`, which mutates
    /// this between packet deliveries, never mid-packet.
    pub fn set_map(&mut self, map: PidMap) {
        self.map = map;
    }

    fn needs_pat_rewrite(&self, pat: &ProgramAssociationSection) -> bool {
        pat.program_association
            .values()
            .any(|pid| self.map.contains_source(*pid))
    }

    fn needs_pmt_rewrite(&self, pmt: &TSProgramMapSection, source_pid: u16) -> bool {
        self.map.contains_source(source_pid)
            || self.map.contains_source(pmt.pcr_pid)
            || pmt
                .stream_info
                .iter()
                .any(|s| self.map.contains_source(s.elementary_pid))
    }

    fn build_replacement(&mut self, pid: u16) -> Option<Vec<TSPacket>> {
        let (bytes, dest_pid) = if pid == PAT_PID {
            let pat = self.assembler.handler().pat.clone()?;
            if !self.needs_pat_rewrite(&pat) {
                return None;
            }
            let mut rewritten = pat;
            for pmt_pid in rewritten.program_association.values_mut() {
                *pmt_pid = self.map.map_or_pass_through(*pmt_pid);
            }
            rewritten.bump_version();
            (rewritten.encode(), PAT_PID)
        } else {
            let pmt = self.assembler.handler().pmt.get(&pid).cloned()?;
            if !self.needs_pmt_rewrite(&pmt, pid) {
                return None;
            }
            let mut rewritten = pmt;
            rewritten.pcr_pid = self.map.map_or_pass_through(rewritten.pcr_pid);
            for stream in rewritten.stream_info.iter_mut() {
                stream.elementary_pid = self.map.map_or_pass_through(stream.elementary_pid);
            }
            rewritten.bump_version();
            let dest_pid = self.map.map_or_pass_through(pid);
            (rewritten.encode(), dest_pid)
        };

        let cc = *self.table_cc.get(&pid).unwrap_or(&0);
        let (packets, next_cc) = packetize(&bytes, dest_pid, cc);
        self.table_cc.insert(pid, next_cc);
        Some(packets)
    }
}

impl Pipe for PidChanger {
    fn consumers(&mut self) -> &mut ConsumerList {
        &mut self.consumers
    }
}

impl PacketConsumer for PidChanger {
    fn send_packet(&mut self, packet: Option<&TSPacket>) -> Result<()> {
        let packet = match packet {
            None => return self.consumers.dispatch(None, &Default::default()),
            Some(p) => p,
        };

        let pid = packet.pid();
        self.assembler.feed(packet);
        let tracked = pid == PAT_PID || self.assembler.pmt_pids().contains(&pid);

        if tracked {
            if packet.payload_unit_start_indicator() {
                if let Some(replacement) = self.build_replacement(pid) {
                    self.in_replaced_cycle.insert(pid, true);
                    for out in &replacement {
                        self.consumers.dispatch(Some(out), &Default::default())?;
                    }
                    return Ok(());
                }
                self.in_replaced_cycle.insert(pid, false);
            } else if *self.in_replaced_cycle.get(&pid).unwrap_or(&false) {
                return Ok(());
            }
        }

        let mut out = packet.clone();
        if let Some(mapped) = self.map.get(pid) {
            out.set_pid(mapped);
        }
        self.consumers.dispatch(Some(&out), &Default::default())
    }
}
