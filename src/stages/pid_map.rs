use std::collections::HashMap;

use crate::pipeline::error::Error;
use crate::ts::{NULL_PID, PAT_PID};

/// Reserved PID range that can never be a PID-map destination: the
/// low reserved block `0x0000-0x001F` and the null PID `0x1FFF`.
fn is_reserved_destination(pid: u16) -> bool {
    pid <= 0x001f || pid == NULL_PID
}

/// A validated `source_pid -> destination_pid` map: injective on its
/// domain, PID 0 never remapped, no reserved destination. Built once via
/// [`PidMap::build`] and immutable afterward — the auto PID changer builds
/// a fresh one whenever it needs to add an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PidMap {
    forward: HashMap<u16, u16>,
}

impl PidMap {
    /// Validates and builds a map from `entries`. Rejects a remap of PID 0,
    /// a reserved destination, a non-injective mapping (two sources to the
    /// same destination), or a duplicate source.
    pub fn build(entries: impl IntoIterator<Item = (u16, u16)>) -> Result<PidMap, Error> {
        let mut forward = HashMap::new();
        let mut seen_destinations = HashMap::new();
        for (source, destination) in entries {
            if source == PAT_PID {
                return Err(Error::InvalidPidMap("PAT PID 0 may not be remapped".to_string()));
            }
            if is_reserved_destination(destination) {
                return Err(Error::InvalidPidMap(format!(
                    "destination pid {:#x} is reserved",
                    destination
                )));
            }
            if forward.contains_key(&source) {
                return Err(Error::InvalidPidMap(format!("duplicate source pid {:#x}", source)));
            }
            if let Some(existing_source) = seen_destinations.insert(destination, source) {
                return Err(Error::InvalidPidMap(format!(
                    "destination pid {:#x} claimed by both {:#x} and {:#x}",
                    destination, existing_source, source
                )));
            }
            forward.insert(source, destination);
        }
        Ok(PidMap { forward })
    }

    pub fn get(&self, source: u16) -> Option<u16> {
        self.forward.get(&source).copied()
    }

    pub fn contains_source(&self, source: u16) -> bool {
        self.forward.contains_key(&source)
    }

    pub fn contains_destination(&self, destination: u16) -> bool {
        self.forward.values().any(|d| *d == destination)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.forward.iter().map(|(s, d)| (*s, *d))
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Maps `pid` through the map, or returns it unchanged if unmapped
    /// (the "pass through" rule).
    pub fn map_or_pass_through(&self, pid: u16) -> u16 {
        self.get(pid).unwrap_or(pid)
    }
}
