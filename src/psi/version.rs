use std::collections::HashMap;

/// Per-table-instance version tracking FSM: `Unseen -> Known(v)`. First
/// sighting always counts as a change; later sightings only fire when the
/// version actually differs from the last one recorded.
#[derive(Debug, Default)]
pub struct VersionTracker {
    known: HashMap<u16, u8>,
}

impl VersionTracker {
    pub fn new() -> Self {
        VersionTracker::default()
    }

    /// `key` identifies the table instance (e.g. the PAT's fixed key, or a
    /// PMT's source PID). Returns whether this call represents a version
    /// change worth firing a handler for.
    pub fn observe(&mut self, key: u16, version: u8) -> bool {
        match self.known.insert(key, version) {
            None => true,
            Some(previous) => previous != version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sighting_is_a_change() {
        let mut t = VersionTracker::new();
        assert!(t.observe(0, 3));
    }

    #[test]
    fn repeated_version_is_suppressed() {
        let mut t = VersionTracker::new();
        assert!(t.observe(0, 3));
        assert!(!t.observe(0, 3));
    }

    #[test]
    fn version_change_fires_again() {
        let mut t = VersionTracker::new();
        t.observe(0, 3);
        assert!(t.observe(0, 4));
    }

    #[test]
    fn distinct_keys_track_independently() {
        let mut t = VersionTracker::new();
        assert!(t.observe(0x100, 1));
        assert!(t.observe(0x110, 1));
    }
}
