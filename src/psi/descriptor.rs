use anyhow::{bail, Result};

use crate::util;

pub const SERVICE_DESCRIPTOR_TAG: u8 = 0x48;

/// A generic MPEG/DVB descriptor: a one-byte tag, a one-byte length, and a
/// raw payload. Descriptor bodies outside the PAT/PMT/SDT rewrite path
/// (EIT/NIT/BAT/CAT, the DVB descriptor long tail) are never interpreted —
/// they round-trip through the pipeline as opaque bytes, exactly as the
/// payload carried here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub tag: u8,
    pub payload: Vec<u8>,
}

impl Descriptor {
    pub fn parse(bytes: &[u8]) -> Result<(Descriptor, usize)> {
        check_len!(bytes.len(), 2);
        let tag = bytes[0];
        let length = usize::from(bytes[1]);
        check_len!(bytes.len(), 2 + length);
        Ok((
            Descriptor {
                tag,
                payload: bytes[2..2 + length].to_vec(),
            },
            2 + length,
        ))
    }

    pub fn parse_loop(mut bytes: &[u8]) -> Result<Vec<Descriptor>> {
        let mut descriptors = Vec::new();
        while !bytes.is_empty() {
            let (descriptor, n) = Descriptor::parse(bytes)?;
            descriptors.push(descriptor);
            bytes = &bytes[n..];
        }
        Ok(descriptors)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.payload.len());
        out.push(self.tag);
        out.push(self.payload.len() as u8);
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn encode_loop(descriptors: &[Descriptor]) -> Vec<u8> {
        descriptors.iter().flat_map(|d| d.encode()).collect()
    }
}

/// The `service_descriptor` (tag 0x48) carried in an SDT entry: provider
/// and service name bytes, left undecoded (see the crate-level note on
/// character-set conversion being an external collaborator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub service_type: u8,
    pub service_provider_name: Vec<u8>,
    pub service_name: Vec<u8>,
}

impl ServiceDescriptor {
    pub fn parse(descriptor: &Descriptor) -> Result<ServiceDescriptor> {
        if descriptor.tag != SERVICE_DESCRIPTOR_TAG {
            bail!("not a service_descriptor: tag={:#x}", descriptor.tag);
        }
        let bytes = &descriptor.payload;
        check_len!(bytes.len(), 2);
        let service_type = bytes[0];
        let provider_name_length = usize::from(bytes[1]);
        check_len!(bytes.len(), 2 + provider_name_length + 1);
        let service_provider_name = bytes[2..2 + provider_name_length].to_vec();
        let rest = &bytes[2 + provider_name_length..];
        let service_name_length = usize::from(rest[0]);
        check_len!(rest.len(), 1 + service_name_length);
        let service_name = rest[1..1 + service_name_length].to_vec();
        Ok(ServiceDescriptor {
            service_type,
            service_provider_name,
            service_name,
        })
    }

    pub fn encode(&self) -> Descriptor {
        let mut payload = Vec::with_capacity(3 + self.service_provider_name.len() + self.service_name.len());
        payload.push(self.service_type);
        payload.push(self.service_provider_name.len() as u8);
        payload.extend_from_slice(&self.service_provider_name);
        payload.push(self.service_name.len() as u8);
        payload.extend_from_slice(&self.service_name);
        Descriptor {
            tag: SERVICE_DESCRIPTOR_TAG,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_round_trips() {
        let d = Descriptor {
            tag: 0x09,
            payload: vec![1, 2, 3, 4],
        };
        let encoded = d.encode();
        let (parsed, n) = Descriptor::parse(&encoded).unwrap();
        assert_eq!(n, encoded.len());
        assert_eq!(parsed, d);
    }

    #[test]
    fn service_descriptor_round_trips() {
        let sd = ServiceDescriptor {
            service_type: 0x01,
            service_provider_name: b"Provider".to_vec(),
            service_name: b"Service".to_vec(),
        };
        let encoded = sd.encode();
        let decoded = ServiceDescriptor::parse(&encoded).unwrap();
        assert_eq!(decoded, sd);
    }
}
