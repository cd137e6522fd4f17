use std::collections::HashMap;

use crate::psi::assembler::TableHandler;
use crate::psi::pat::ProgramAssociationSection;
use crate::psi::pmt::TSProgramMapSection;
use crate::psi::sdt::ServiceDescriptionSection;

/// A [`TableHandler`] that just remembers the latest decoded table of each
/// kind. Several stages (the PID changers, the table repeater, the
/// MPTS→SPTS filter) drive their own [`crate::psi::assembler::PsiTableAssembler`]
/// purely to keep this cache current, then act on it from `send_packet`.
#[derive(Debug, Default)]
pub struct TableCache {
    pub pat: Option<ProgramAssociationSection>,
    pub sdt: Option<ServiceDescriptionSection>,
    pub pmt: HashMap<u16, TSProgramMapSection>,
}

impl TableHandler for TableCache {
    fn handle_pat(&mut self, table: &ProgramAssociationSection) {
        self.pat = Some(table.clone());
    }

    fn handle_pmt(&mut self, table: &TSProgramMapSection, source_pid: u16) {
        self.pmt.insert(source_pid, table.clone());
    }

    fn handle_sdt(&mut self, table: &ServiceDescriptionSection) {
        self.sdt = Some(table.clone());
    }
}
