use anyhow::{bail, Result};

use crate::crc32;
use crate::psi::descriptor::Descriptor;
use crate::util;

pub const SDT_PID: u16 = 0x0011;
pub const SERVICE_DESCRIPTION_SECTION: u8 = 0x42;
#[allow(dead_code)]
pub const OTHER_STREAM_TABLE_ID: u8 = 0x46;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub service_id: u16,
    pub eit_schedule_flag: bool,
    pub eit_present_following_flag: bool,
    pub running_status: u8,
    pub free_ca_mode: bool,
    pub descriptors: Vec<Descriptor>,
}

impl Service {
    fn parse(bytes: &[u8]) -> Result<(Service, usize)> {
        check_len!(bytes.len(), 5);
        let service_id = (u16::from(bytes[0]) << 8) | u16::from(bytes[1]);
        let eit_schedule_flag = (bytes[2] >> 1) & 0x1 != 0;
        let eit_present_following_flag = bytes[2] & 0x1 != 0;
        let running_status = bytes[3] >> 5;
        let free_ca_mode = (bytes[3] >> 4) & 0x1 != 0;
        let descriptors_loop_length = (usize::from(bytes[3] & 0xf) << 8) | usize::from(bytes[4]);
        check_len!(bytes.len(), 5 + descriptors_loop_length);
        let descriptors = Descriptor::parse_loop(&bytes[5..5 + descriptors_loop_length])?;
        Ok((
            Service {
                service_id,
                eit_schedule_flag,
                eit_present_following_flag,
                running_status,
                free_ca_mode,
                descriptors,
            },
            5 + descriptors_loop_length,
        ))
    }

    fn encode(&self) -> Vec<u8> {
        let descriptor_bytes = Descriptor::encode_loop(&self.descriptors);
        let mut out = Vec::with_capacity(5 + descriptor_bytes.len());
        out.push((self.service_id >> 8) as u8);
        out.push(self.service_id as u8);
        out.push(
            0xfc | ((self.eit_schedule_flag as u8) << 1) | (self.eit_present_following_flag as u8),
        );
        out.push(
            (self.running_status << 5)
                | ((self.free_ca_mode as u8) << 4)
                | ((descriptor_bytes.len() >> 8) as u8 & 0xf),
        );
        out.push(descriptor_bytes.len() as u8);
        out.extend_from_slice(&descriptor_bytes);
        out
    }
}

/// A decoded `service_description_section` (SDT), actual-stream table only;
/// `other_transport_stream` (`table_id` 0x46) is rejected rather than
/// silently merged in, since this pipeline never joins another TS's service
/// list into one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptionSection {
    pub transport_stream_id: u16,
    pub version_number: u8,
    pub current_next_indicator: bool,
    pub original_network_id: u16,
    pub services: Vec<Service>,
}

impl ServiceDescriptionSection {
    pub fn parse(bytes: &[u8]) -> Result<ServiceDescriptionSection> {
        check_len!(bytes.len(), 11);
        let table_id = bytes[0];
        if table_id != SERVICE_DESCRIPTION_SECTION {
            bail!("only actual-stream SDT (table_id 0x42) is supported: {}", table_id);
        }
        let section_length = (usize::from(bytes[1] & 0xf) << 8) | usize::from(bytes[2]);
        if section_length > 1021 {
            bail!("section_length too large for SDT: {}", section_length);
        }
        check_len!(bytes.len(), 3 + section_length);
        check_len!(section_length, 8 + 4);
        let transport_stream_id = (u16::from(bytes[3]) << 8) | u16::from(bytes[4]);
        let version_number = (bytes[5] >> 1) & 0x1f;
        let current_next_indicator = bytes[5] & 0x1 != 0;
        let original_network_id = (u16::from(bytes[8]) << 8) | u16::from(bytes[9]);

        let mut services = Vec::new();
        {
            let mut bytes = &bytes[11..3 + section_length - 4];
            while !bytes.is_empty() {
                let (service, n) = Service::parse(bytes)?;
                services.push(service);
                check_len!(bytes.len(), n);
                bytes = &bytes[n..];
            }
        }

        let crc_bytes = &bytes[3 + section_length - 4..3 + section_length];
        let expected_crc = util::read_u32(crc_bytes)?;
        let actual_crc = crc32::crc32(&bytes[..3 + section_length - 4]);
        if expected_crc != actual_crc {
            bail!("SDT CRC mismatch: {:#x} != {:#x}", actual_crc, expected_crc);
        }

        Ok(ServiceDescriptionSection {
            transport_stream_id,
            version_number,
            current_next_indicator,
            original_network_id,
            services,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let service_bytes: Vec<u8> = self.services.iter().flat_map(|s| s.encode()).collect();

        let mut body = Vec::with_capacity(8 + service_bytes.len());
        body.push((self.transport_stream_id >> 8) as u8);
        body.push(self.transport_stream_id as u8);
        body.push(0xc0 | (self.version_number << 1) | (self.current_next_indicator as u8));
        body.push(0x00); // section_number
        body.push(0x00); // last_section_number
        body.push((self.original_network_id >> 8) as u8);
        body.push(self.original_network_id as u8);
        body.push(0xff); // reserved_future_use
        body.extend_from_slice(&service_bytes);

        let section_length = body.len() + 4;
        let mut out = Vec::with_capacity(3 + section_length);
        out.push(SERVICE_DESCRIPTION_SECTION);
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
