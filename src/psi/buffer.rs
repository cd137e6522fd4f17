use anyhow::{bail, Result};
use bytes::{Bytes, BytesMut};

use crate::ts::TSPacket;

const INITIAL_BUFFER: usize = 4096;

#[derive(Debug)]
enum State {
    Initial,
    Partial,
    Full,
}

/// Reassembles PSI sections from the stream of packets that arrive on one
/// PID. Unlike the byte-stream `Buffer` this codebase used to build on top
/// of an async `Stream`, this is a plain push target: a pipeline stage
/// calls `feed` once per packet it owns and receives back however many
/// complete sections that packet's bytes happened to finish.
#[derive(Debug)]
pub struct SectionBuffer {
    state: State,
    counter: u8,
    buf: BytesMut,
}

impl Default for SectionBuffer {
    fn default() -> Self {
        SectionBuffer::new()
    }
}

impl SectionBuffer {
    pub fn new() -> Self {
        SectionBuffer {
            state: State::Initial,
            counter: 0,
            buf: BytesMut::with_capacity(INITIAL_BUFFER),
        }
    }

    fn feed_packet(&mut self, packet: &TSPacket) -> Result<()> {
        let bytes = match packet.payload() {
            Some(data) => data,
            None => bail!("malformed psi packet, no payload"),
        };
        if packet.payload_unit_start_indicator() {
            check_len!(bytes.len(), 1);
            let pointer_field = usize::from(bytes[0]);
            check_len!(bytes.len(), pointer_field + 1);
            self.buf.clear();
            self.buf.extend_from_slice(&bytes[pointer_field + 1..]);
            self.counter = packet.continuity_counter();
            self.state = State::Partial;
        } else {
            if matches!(self.state, State::Initial) {
                // continuation packet before any section start: nothing to append to.
                return Ok(());
            }
            if self.counter == packet.continuity_counter() {
                // duplicate packet, do nothing.
                return Ok(());
            } else if (self.counter + 1) % 16 == packet.continuity_counter() {
                self.counter = packet.continuity_counter();
            } else {
                self.state = State::Initial;
                bail!("psi section discontinued");
            }
            self.buf.extend_from_slice(bytes);
        }
        Ok(())
    }

    /// Feeds one packet, returning every complete section it yields (zero,
    /// one, or more if the packet's payload happened to close out a
    /// pending section and start new ones in the same 184 bytes).
    pub fn feed(&mut self, packet: &TSPacket) -> Result<Vec<Bytes>> {
        if packet.transport_error_indicator() {
            return Ok(Vec::new());
        }
        if packet.payload_unit_start_indicator() || !matches!(self.state, State::Initial) {
            self.feed_packet(packet)?;
        }

        let mut sections = Vec::new();
        loop {
            match self.state {
                State::Initial => break,
                State::Partial => {
                    if self.buf.len() < 3 {
                        break;
                    }
                    let section_length =
                        (usize::from(self.buf[1] & 0xf) << 8) | usize::from(self.buf[2]);
                    if self.buf.len() < section_length + 3 {
                        break;
                    }
                    self.state = State::Full;
                }
                State::Full => {
                    self.state = State::Partial;
                    let section_length =
                        (usize::from(self.buf[1] & 0xf) << 8) | usize::from(self.buf[2]);
                    sections.push(self.buf.split_to(section_length + 3).freeze());
                }
            }
        }
        Ok(sections)
    }
}
