pub mod auto_pid_changer;
pub mod cc_corrector;
pub mod joined_source;
pub mod mpts_to_spts;
pub mod pid_changer;
pub mod pid_map;
mod table_cache;
pub mod table_repeater;

pub use auto_pid_changer::AutoPidChanger;
pub use cc_corrector::CcCorrector;
pub use joined_source::{JoinedTsStream, OnSourceListExhausted};
pub use mpts_to_spts::MptsToSpts;
pub use pid_changer::PidChanger;
pub use pid_map::PidMap;
pub use table_repeater::TableRepeater;
