use anyhow::{bail, Result};

use crate::crc32;
use crate::psi::descriptor::Descriptor;
use crate::util;

pub const TS_PROGRAM_MAP_SECTION: u8 = 0x02;

pub const STREAM_TYPE_VIDEO: u8 = 0x2;
pub const STREAM_TYPE_PES_PRIVATE_DATA: u8 = 0x6;
pub const STREAM_TYPE_ADTS: u8 = 0xf;
pub const STREAM_TYPE_H264: u8 = 0x1b;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub stream_type: u8,
    pub elementary_pid: u16,
    pub descriptors: Vec<Descriptor>,
}

impl StreamInfo {
    fn parse(bytes: &[u8]) -> Result<(StreamInfo, usize)> {
        check_len!(bytes.len(), 5);
        let stream_type = bytes[0];
        let elementary_pid = (u16::from(bytes[1] & 0x1f) << 8) | u16::from(bytes[2]);
        let es_info_length = (usize::from(bytes[3] & 0xf) << 8) | usize::from(bytes[4]);
        check_len!(bytes.len(), 5 + es_info_length);
        let descriptors = Descriptor::parse_loop(&bytes[5..5 + es_info_length])?;
        Ok((
            StreamInfo {
                stream_type,
                elementary_pid,
                descriptors,
            },
            5 + es_info_length,
        ))
    }

    fn encode(&self) -> Vec<u8> {
        let descriptor_bytes = Descriptor::encode_loop(&self.descriptors);
        let mut out = Vec::with_capacity(5 + descriptor_bytes.len());
        out.push(self.stream_type);
        out.push(0xe0 | ((self.elementary_pid >> 8) as u8 & 0x1f));
        out.push(self.elementary_pid as u8);
        out.push(0xf0 | ((descriptor_bytes.len() >> 8) as u8 & 0xf));
        out.push(descriptor_bytes.len() as u8);
        out.extend_from_slice(&descriptor_bytes);
        out
    }
}

/// A decoded `TS_program_map_section` (PMT), owning its stream list and
/// descriptors so the PID-rewriting stages can substitute PIDs in place and
/// re-encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TSProgramMapSection {
    pub program_number: u16,
    pub version_number: u8,
    pub current_next_indicator: bool,
    pub pcr_pid: u16,
    pub descriptors: Vec<Descriptor>,
    pub stream_info: Vec<StreamInfo>,
}

impl TSProgramMapSection {
    pub fn parse(bytes: &[u8]) -> Result<TSProgramMapSection> {
        check_len!(bytes.len(), 12);
        let table_id = bytes[0];
        if table_id != TS_PROGRAM_MAP_SECTION {
            bail!("table_id should be 0x02: {}", table_id);
        }
        let section_length = (usize::from(bytes[1] & 0xf) << 8) | usize::from(bytes[2]);
        if section_length >= 1021 {
            bail!("section_length too large for PMT: {}", section_length);
        }
        check_len!(bytes.len(), 3 + section_length);
        check_len!(section_length, 9 + 4);
        let program_number = (u16::from(bytes[3]) << 8) | u16::from(bytes[4]);
        let version_number = (bytes[5] & 0x3e) >> 1;
        let current_next_indicator = bytes[5] & 0x1 != 0;
        let pcr_pid = (u16::from(bytes[8] & 0x1f) << 8) | u16::from(bytes[9]);
        let program_info_length = (usize::from(bytes[10] & 0xf) << 8) | usize::from(bytes[11]);

        check_len!(bytes.len(), 12 + program_info_length);
        let descriptors = Descriptor::parse_loop(&bytes[12..12 + program_info_length])?;

        let mut stream_info = vec![];
        {
            let mut bytes = &bytes[12 + program_info_length..3 + section_length - 4];
            while !bytes.is_empty() {
                let (info, n) = StreamInfo::parse(bytes)?;
                stream_info.push(info);
                check_len!(bytes.len(), n);
                bytes = &bytes[n..];
            }
        }

        let crc_bytes = &bytes[3 + section_length - 4..3 + section_length];
        let expected_crc = util::read_u32(crc_bytes)?;
        let actual_crc = crc32::crc32(&bytes[..3 + section_length - 4]);
        if expected_crc != actual_crc {
            bail!("PMT CRC mismatch: {:#x} != {:#x}", actual_crc, expected_crc);
        }

        Ok(TSProgramMapSection {
            program_number,
            version_number,
            current_next_indicator,
            pcr_pid,
            descriptors,
            stream_info,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let program_descriptor_bytes = Descriptor::encode_loop(&self.descriptors);
        let stream_bytes: Vec<u8> = self.stream_info.iter().flat_map(|s| s.encode()).collect();

        let mut body = Vec::with_capacity(9 + program_descriptor_bytes.len() + stream_bytes.len());
        body.push((self.program_number >> 8) as u8);
        body.push(self.program_number as u8);
        body.push(0xc0 | (self.version_number << 1) | (self.current_next_indicator as u8));
        body.push(0x00); // section_number
        body.push(0x00); // last_section_number
        body.push(0xe0 | ((self.pcr_pid >> 8) as u8 & 0x1f));
        body.push(self.pcr_pid as u8);
        body.push(0xf0 | ((program_descriptor_bytes.len() >> 8) as u8 & 0xf));
        body.push(program_descriptor_bytes.len() as u8);
        body.extend_from_slice(&program_descriptor_bytes);
        body.extend_from_slice(&stream_bytes);

        let section_length = body.len() + 4;
        let mut out = Vec::with_capacity(3 + section_length);
        out.push(TS_PROGRAM_MAP_SECTION);
        out.push(0xb0 | ((section_length >> 8) as u8 & 0xf));
        out.push(section_length as u8);
        out.extend_from_slice(&body);
        let crc = crc32::crc32(&out);
        out.extend_from_slice(&crc.to_be_bytes());
        out
    }

    pub fn bump_version(&mut self) {
        self.version_number = (self.version_number + 1) % 32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TSProgramMapSection {
        TSProgramMapSection {
            program_number: 1,
            version_number: 0,
            current_next_indicator: true,
            pcr_pid: 0x200,
            descriptors: vec![],
            stream_info: vec![
                StreamInfo {
                    stream_type: STREAM_TYPE_VIDEO,
                    elementary_pid: 0x200,
                    descriptors: vec![],
                },
                StreamInfo {
                    stream_type: STREAM_TYPE_ADTS,
                    elementary_pid: 0x201,
                    descriptors: vec![],
                },
            ],
        }
    }

    #[test]
    fn encode_then_parse_round_trips() {
        let pmt = sample();
        let encoded = pmt.encode();
        let decoded = TSProgramMapSection::parse(&encoded).unwrap();
        assert_eq!(decoded, pmt);
    }

    #[test]
    fn stream_pid_rewrite_is_visible_after_reencode() {
        let mut pmt = sample();
        pmt.stream_info[0].elementary_pid = 0x300;
        let encoded = pmt.encode();
        let decoded = TSProgramMapSection::parse(&encoded).unwrap();
        assert_eq!(decoded.stream_info[0].elementary_pid, 0x300);
        assert_eq!(decoded.stream_info[0].stream_type, STREAM_TYPE_VIDEO);
    }
}
