use anyhow::{bail, Result};

pub const TS_PACKET_LENGTH: usize = 188;
pub const SYNC_BYTE: u8 = 0x47;
pub const PAT_PID: u16 = 0x0000;
pub const NULL_PID: u16 = 0x1fff;

/// A single 188-byte Transport Stream packet.
///
/// The packet owns its raw bytes. Accessors read directly out of the byte
/// array; mutators (`set_pid`, `set_continuity_counter`,
/// `set_discontinuity_indicator`) rewrite the relevant bits in place, which
/// is the only sanctioned way a pipeline stage may alter a packet in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TSPacket {
    raw: [u8; TS_PACKET_LENGTH],
}

impl TSPacket {
    pub fn parse(bytes: &[u8]) -> Result<TSPacket> {
        if bytes.len() != TS_PACKET_LENGTH {
            bail!("packet length is not {}: {}", TS_PACKET_LENGTH, bytes.len());
        }
        if bytes[0] != SYNC_BYTE {
            bail!("sync byte does not match 0x47: {:#x}", bytes[0]);
        }
        let mut raw = [0u8; TS_PACKET_LENGTH];
        raw.copy_from_slice(bytes);
        Ok(TSPacket { raw })
    }

    /// A null packet (PID 0x1FFF), stuffed with 0xFF and no adaptation field.
    pub fn null() -> TSPacket {
        let mut raw = [0xffu8; TS_PACKET_LENGTH];
        raw[0] = SYNC_BYTE;
        raw[1] = 0x1f;
        raw[2] = 0xff;
        raw[3] = 0x10;
        TSPacket { raw }
    }

    pub fn as_bytes(&self) -> &[u8; TS_PACKET_LENGTH] {
        &self.raw
    }

    pub fn into_bytes(self) -> [u8; TS_PACKET_LENGTH] {
        self.raw
    }

    pub fn transport_error_indicator(&self) -> bool {
        self.raw[1] & 0x80 > 0
    }

    pub fn payload_unit_start_indicator(&self) -> bool {
        self.raw[1] & 0x40 > 0
    }

    pub fn set_payload_unit_start_indicator(&mut self, pusi: bool) {
        if pusi {
            self.raw[1] |= 0x40;
        } else {
            self.raw[1] &= !0x40;
        }
    }

    pub fn transport_priority(&self) -> bool {
        self.raw[1] & 0x20 > 0
    }

    pub fn pid(&self) -> u16 {
        (u16::from(self.raw[1] & 0x1f) << 8) | u16::from(self.raw[2])
    }

    pub fn set_pid(&mut self, pid: u16) {
        self.raw[1] = (self.raw[1] & 0xe0) | ((pid >> 8) as u8 & 0x1f);
        self.raw[2] = pid as u8;
    }

    pub fn transport_scrambling_control(&self) -> u8 {
        self.raw[3] >> 6
    }

    fn adaptation_field_control(&self) -> u8 {
        (self.raw[3] & 0x30) >> 4
    }

    pub fn has_adaptation_field(&self) -> bool {
        matches!(self.adaptation_field_control(), 0b10 | 0b11)
    }

    pub fn has_payload(&self) -> bool {
        matches!(self.adaptation_field_control(), 0b01 | 0b11)
    }

    pub fn continuity_counter(&self) -> u8 {
        self.raw[3] & 0xf
    }

    pub fn set_continuity_counter(&mut self, cc: u8) {
        self.raw[3] = (self.raw[3] & 0xf0) | (cc & 0xf);
    }

    fn adaptation_field_length(&self) -> usize {
        if self.has_adaptation_field() {
            usize::from(self.raw[4])
        } else {
            0
        }
    }

    pub fn discontinuity_indicator(&self) -> bool {
        self.has_adaptation_field() && self.adaptation_field_length() > 0 && self.raw[5] & 0x80 > 0
    }

    /// Sets the discontinuity indicator in place. Only meaningful when the
    /// packet already carries an adaptation field with at least one flags
    /// byte; a packet with none is left unchanged, since conjuring
    /// adaptation field space up would shift the payload and invalidate
    /// whatever `pid`/`cc` a caller just stamped onto this same packet.
    /// Returns whether the bit was actually set.
    pub fn set_discontinuity_indicator(&mut self, set: bool) -> bool {
        if !self.has_adaptation_field() || self.adaptation_field_length() == 0 {
            return false;
        }
        if set {
            self.raw[5] |= 0x80;
        } else {
            self.raw[5] &= !0x80;
        }
        true
    }

    fn payload_offset(&self) -> usize {
        if self.has_adaptation_field() {
            5 + self.adaptation_field_length()
        } else {
            4
        }
    }

    pub fn payload(&self) -> Option<&[u8]> {
        if !self.has_payload() {
            return None;
        }
        let offset = self.payload_offset();
        if offset > TS_PACKET_LENGTH {
            return None;
        }
        Some(&self.raw[offset..])
    }

    pub fn has_pcr(&self) -> bool {
        self.has_adaptation_field() && self.adaptation_field_length() >= 7 && self.raw[5] & 0x10 > 0
    }

    /// 42-bit PCR value (27MHz-relative base * 300 + extension), the way
    /// TSDuck's `TSPacket::getPCR` exposes it.
    pub fn pcr(&self) -> Option<u64> {
        if !self.has_pcr() {
            return None;
        }
        let b = &self.raw[6..12];
        let base = (u64::from(b[0]) << 25)
            | (u64::from(b[1]) << 17)
            | (u64::from(b[2]) << 9)
            | (u64::from(b[3]) << 1)
            | (u64::from(b[4]) >> 7);
        let ext = (u64::from(b[4] & 0x1) << 8) | u64::from(b[5]);
        Some(base * 300 + ext)
    }

    fn pes_header(&self) -> Option<&[u8]> {
        if !self.payload_unit_start_indicator() {
            return None;
        }
        let payload = self.payload()?;
        if payload.len() < 9 || payload[0] != 0 || payload[1] != 0 || payload[2] != 1 {
            return None;
        }
        Some(payload)
    }

    pub fn has_pts(&self) -> bool {
        self.pes_header().is_some_and(|h| h.len() >= 14 && h[7] & 0x80 > 0)
    }

    pub fn pts(&self) -> Option<u64> {
        let h = self.pes_header()?;
        if h.len() < 14 || h[7] & 0x80 == 0 {
            return None;
        }
        Some(parse_timestamp(&h[9..14]))
    }

    pub fn has_dts(&self) -> bool {
        self.pes_header().is_some_and(|h| h.len() >= 19 && h[7] & 0xc0 == 0xc0)
    }

    pub fn dts(&self) -> Option<u64> {
        let h = self.pes_header()?;
        if h.len() < 19 || h[7] & 0xc0 != 0xc0 {
            return None;
        }
        Some(parse_timestamp(&h[14..19]))
    }
}

/// Decodes a 5-byte PTS/DTS field: a 33-bit value spread across marker bits.
fn parse_timestamp(b: &[u8]) -> u64 {
    (u64::from(b[0] & 0x0e) << 29)
        | (u64::from(b[1]) << 22)
        | (u64::from(b[2] & 0xfe) << 14)
        | (u64::from(b[3]) << 7)
        | (u64::from(b[4]) >> 1)
}
