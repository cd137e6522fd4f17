use std::collections::HashMap;

use crate::pipeline::{ConsumerList, PacketConsumer, Pipe, Result};
use crate::psi::assembler::PsiTableAssembler;
use crate::psi::packetizer::packetize;
use crate::psi::pat::ProgramAssociationSection;
use crate::psi::sdt::{ServiceDescriptionSection, SDT_PID};
use crate::stages::table_cache::TableCache;
use crate::ts::{TSPacket, PAT_PID};

/// Demultiplexes a single service out of a multi-program Transport Stream:
/// keeps that service's PAT entry, PMT, SDT entry and elementary streams,
/// and drops everything belonging to any other program. Until the first
/// PAT is decoded, every non-PAT packet is dropped (the canonical,
/// memory-bounded choice the spec leaves open).
pub struct MptsToSpts {
    service_id: u16,
    discovery: PsiTableAssembler<TableCache>,
    cached_pat: Option<(u8, Vec<u8>)>,
    pat_cc: u8,
    cached_sdt: Option<(u8, Vec<u8>)>,
    sdt_cc: u8,
    consumers: ConsumerList,
}

impl MptsToSpts {
    pub fn new(service_id: u16) -> Self {
        MptsToSpts {
            service_id,
            discovery: PsiTableAssembler::new(TableCache::default()),
            cached_pat: None,
            pat_cc: 0,
            cached_sdt: None,
            sdt_cc: 0,
            consumers: ConsumerList::new(),
        }
    }

    fn target_pmt_pid(&self) -> Option<u16> {
        self.discovery
            .handler()
            .pat
            .as_ref()
            .and_then(|pat| pat.program_association.get(&self.service_id).copied())
    }

    fn filtered_pat(&self, pat: &ProgramAssociationSection, pmt_pid: u16) -> ProgramAssociationSection {
        let mut program_association = HashMap::new();
        program_association.insert(self.service_id, pmt_pid);
        let mut filtered = ProgramAssociationSection {
            transport_stream_id: pat.transport_stream_id,
            version_number: pat.version_number,
            current_next_indicator: pat.current_next_indicator,
            program_association,
        };
        filtered.bump_version();
        filtered
    }

    fn filtered_sdt(&self, sdt: &ServiceDescriptionSection) -> ServiceDescriptionSection {
        let mut filtered = ServiceDescriptionSection {
            transport_stream_id: sdt.transport_stream_id,
            version_number: sdt.version_number,
            current_next_indicator: sdt.current_next_indicator,
            original_network_id: sdt.original_network_id,
            services: sdt
                .services
                .iter()
                .filter(|s| s.service_id == self.service_id)
                .cloned()
                .collect(),
        };
        filtered.bump_version();
        filtered
    }

    fn belongs_to_other_program_elementary_stream(&self, pid: u16, own_pmt_pid: Option<u16>) -> bool {
        self.discovery.handler().pmt.iter().any(|(pmt_pid, pmt)| {
            Some(*pmt_pid) != own_pmt_pid && pmt.stream_info.iter().any(|s| s.elementary_pid == pid)
        })
    }

    /// Re-encodes the filtered PAT only when the source PAT's version
    /// actually changed, so repeated cycles of an unchanged PAT don't bump
    /// our output version on every repetition.
    fn refresh_cached_pat(&mut self, pat: &ProgramAssociationSection, pmt_pid: u16) {
        let stale = self.cached_pat.as_ref().map(|(v, _)| *v) != Some(pat.version_number);
        if stale {
            let filtered = self.filtered_pat(pat, pmt_pid);
            self.cached_pat = Some((pat.version_number, filtered.encode()));
        }
    }

    fn refresh_cached_sdt(&mut self, sdt: &ServiceDescriptionSection) {
        let stale = self.cached_sdt.as_ref().map(|(v, _)| *v) != Some(sdt.version_number);
        if stale {
            let filtered = self.filtered_sdt(sdt);
            self.cached_sdt = Some((sdt.version_number, filtered.encode()));
        }
    }
}

impl Pipe for MptsToSpts {
    fn consumers(&mut self) -> &mut ConsumerList {
        &mut self.consumers
    }
}

impl PacketConsumer for MptsToSpts {
    fn send_packet(&mut self, packet: Option<&TSPacket>) -> Result<()> {
        let packet = match packet {
            None => return self.consumers.dispatch(None, &Default::default()),
            Some(p) => p,
        };

        self.discovery.feed(packet);
        let pid = packet.pid();
        let pmt_pid_set = self.discovery.pmt_pids().clone();
        let own_pmt_pid = self.target_pmt_pid();

        if self.discovery.handler().pat.is_none() && pid != PAT_PID {
            return Ok(());
        }

        if pid == PAT_PID {
            if !packet.payload_unit_start_indicator() {
                return Ok(());
            }
            let pat = self.discovery.handler().pat.clone();
            if let (Some(pat), Some(pmt_pid)) = (pat, own_pmt_pid) {
                self.refresh_cached_pat(&pat, pmt_pid);
                let bytes = self.cached_pat.as_ref().unwrap().1.clone();
                let (carousel, next_cc) = packetize(&bytes, PAT_PID, self.pat_cc);
                self.pat_cc = next_cc;
                for out in &carousel {
                    self.consumers.dispatch(Some(out), &Default::default())?;
                }
            }
            return Ok(());
        }

        if pid == SDT_PID {
            if !packet.payload_unit_start_indicator() {
                return Ok(());
            }
            if let Some(sdt) = self.discovery.handler().sdt.clone() {
                self.refresh_cached_sdt(&sdt);
                let bytes = self.cached_sdt.as_ref().unwrap().1.clone();
                let (carousel, next_cc) = packetize(&bytes, SDT_PID, self.sdt_cc);
                self.sdt_cc = next_cc;
                for out in &carousel {
                    self.consumers.dispatch(Some(out), &Default::default())?;
                }
            }
            return Ok(());
        }

        if Some(pid) == own_pmt_pid {
            return self.consumers.dispatch(Some(packet), &Default::default());
        }

        if pmt_pid_set.contains(&pid) {
            return Ok(());
        }

        if self.belongs_to_other_program_elementary_stream(pid, own_pmt_pid) {
            return Ok(());
        }

        self.consumers.dispatch(Some(packet), &Default::default())
    }
}
