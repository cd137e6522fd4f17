use std::collections::{HashSet, VecDeque};

use crate::pipeline::error::{ReadOutcome, Result};
use crate::pipeline::source::PacketSource;
use crate::ts::TSPacket;

/// Capability interface invoked when a [`JoinedTsStream`]'s source list
/// becomes empty: a chance to append more sources before the stream
/// reports end-of-input. A trait rather than a raw closure so an embedder
/// can carry state across calls (e.g. a playlist position).
pub trait OnSourceListExhausted {
    fn on_source_list_exhausted_soon(&mut self, sources: &mut VecDeque<Box<dyn PacketSource + Send>>);
}

/// A no-op hook: the list stays empty and the stream reports end-of-input.
#[derive(Debug, Default)]
pub struct NeverRefill;
impl OnSourceListExhausted for NeverRefill {
    fn on_source_list_exhausted_soon(&mut self, _sources: &mut VecDeque<Box<dyn PacketSource + Send>>) {}
}

/// A source that reads from the head of an ordered list of sources,
/// advancing to the next one as each is exhausted. Continuity correction
/// across the join is left to a downstream `CcCorrector`; this stage's
/// only obligation is to mark the first packet of each PID seen after a
/// switch with the discontinuity indicator, so that corrector re-syncs
/// cleanly instead of reporting a continuity error.
pub struct JoinedTsStream {
    sources: VecDeque<Box<dyn PacketSource + Send>>,
    on_exhausted: Box<dyn OnSourceListExhausted + Send>,
    stamped_since_switch: HashSet<u16>,
    switched: bool,
}

impl JoinedTsStream {
    pub fn new(
        sources: VecDeque<Box<dyn PacketSource + Send>>,
        on_exhausted: Box<dyn OnSourceListExhausted + Send>,
    ) -> Self {
        JoinedTsStream {
            sources,
            on_exhausted,
            stamped_since_switch: HashSet::new(),
            switched: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl PacketSource for JoinedTsStream {
    fn read_packet(&mut self, out: &mut Option<TSPacket>) -> Result<ReadOutcome> {
        loop {
            if self.sources.is_empty() {
                self.on_exhausted.on_source_list_exhausted_soon(&mut self.sources);
                if self.sources.is_empty() {
                    return Ok(ReadOutcome::NoMorePacket);
                }
            }

            let outcome = self.sources.front_mut().unwrap().read_packet(out)?;
            match outcome {
                ReadOutcome::Success => {
                    if self.switched {
                        if let Some(packet) = out.as_mut() {
                            if self.stamped_since_switch.insert(packet.pid()) {
                                packet.set_discontinuity_indicator(true);
                            }
                        }
                    }
                    return Ok(ReadOutcome::Success);
                }
                ReadOutcome::NeedMoreInput => return Ok(ReadOutcome::NeedMoreInput),
                ReadOutcome::NoMorePacket => {
                    self.sources.pop_front();
                    self.stamped_since_switch.clear();
                    self.switched = true;
                }
            }
        }
    }
}
