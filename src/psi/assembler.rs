use std::collections::{HashMap, HashSet};

use log::warn;

use crate::psi::pat::ProgramAssociationSection;
use crate::psi::pmt::TSProgramMapSection;
use crate::psi::sdt::ServiceDescriptionSection;
use crate::psi::SectionBuffer;
use crate::ts::{TSPacket, PAT_PID};
use crate::psi::sdt::SDT_PID;

/// Receives decoded PSI tables from a [`PsiTableAssembler`]. PID discovery
/// (which PIDs carry a PMT) happens inside the assembler itself, per the PAT
/// it has already seen; `handle_pmt` is told the PID the table arrived on
/// since a `TSProgramMapSection` carries no PID of its own.
pub trait TableHandler {
    fn handle_pat(&mut self, table: &ProgramAssociationSection) {
        let _ = table;
    }
    fn handle_pmt(&mut self, table: &TSProgramMapSection, source_pid: u16) {
        let _ = (table, source_pid);
    }
    fn handle_sdt(&mut self, table: &ServiceDescriptionSection) {
        let _ = table;
    }
}

/// A no-op handler, useful as a placeholder or in tests exercising only the
/// assembler's PID-discovery behaviour.
#[derive(Debug, Default)]
pub struct NullTableHandler;
impl TableHandler for NullTableHandler {}

/// Reassembles PAT, PMT (one buffer per discovered PID), and SDT sections
/// from a packet stream, dispatching completed tables to a [`TableHandler`].
/// PMT PIDs to watch are discovered from the latest PAT; a PID dropped from
/// a later PAT stops being tracked.
pub struct PsiTableAssembler<H> {
    handler: H,
    pat_buffer: SectionBuffer,
    sdt_buffer: SectionBuffer,
    pmt_buffers: HashMap<u16, SectionBuffer>,
    pmt_pids: HashSet<u16>,
}

impl<H: TableHandler> PsiTableAssembler<H> {
    pub fn new(handler: H) -> Self {
        PsiTableAssembler {
            handler,
            pat_buffer: SectionBuffer::new(),
            sdt_buffer: SectionBuffer::new(),
            pmt_buffers: HashMap::new(),
            pmt_pids: HashSet::new(),
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    /// PMT PIDs discovered from the most recently completed PAT.
    pub fn pmt_pids(&self) -> &HashSet<u16> {
        &self.pmt_pids
    }

    /// Feeds one packet. Malformed sections are logged and dropped; the
    /// previously known table, if any, remains the latest.
    pub fn feed(&mut self, packet: &TSPacket) {
        let pid = packet.pid();
        if pid == PAT_PID {
            self.feed_pat(packet);
        } else if pid == SDT_PID {
            self.feed_sdt(packet);
        } else if self.pmt_pids.contains(&pid) {
            self.feed_pmt(packet, pid);
        }
    }

    fn feed_pat(&mut self, packet: &TSPacket) {
        let sections = match self.pat_buffer.feed(packet) {
            Ok(sections) => sections,
            Err(e) => {
                warn!("malformed PAT section on pid {}: {}", packet.pid(), e);
                return;
            }
        };
        for section in sections {
            match ProgramAssociationSection::parse(&section) {
                Ok(pat) => {
                    self.pmt_pids = pat.program_association.values().copied().collect();
                    self.pmt_buffers.retain(|pid, _| self.pmt_pids.contains(pid));
                    self.handler.handle_pat(&pat);
                }
                Err(e) => warn!("failed to decode PAT: {}", e),
            }
        }
    }

    fn feed_sdt(&mut self, packet: &TSPacket) {
        let sections = match self.sdt_buffer.feed(packet) {
            Ok(sections) => sections,
            Err(e) => {
                warn!("malformed SDT section on pid {}: {}", packet.pid(), e);
                return;
            }
        };
        for section in sections {
            match ServiceDescriptionSection::parse(&section) {
                Ok(sdt) => self.handler.handle_sdt(&sdt),
                Err(e) => warn!("failed to decode SDT: {}", e),
            }
        }
    }

    fn feed_pmt(&mut self, packet: &TSPacket, pid: u16) {
        let buffer = self.pmt_buffers.entry(pid).or_default();
        let sections = match buffer.feed(packet) {
            Ok(sections) => sections,
            Err(e) => {
                warn!("malformed PMT section on pid {}: {}", pid, e);
                return;
            }
        };
        for section in sections {
            match TSProgramMapSection::parse(&section) {
                Ok(pmt) => self.handler.handle_pmt(&pmt, pid),
                Err(e) => warn!("failed to decode PMT on pid {}: {}", pid, e),
            }
        }
    }
}
