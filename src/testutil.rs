//! Synthesises minimal multi-program Transport Streams for tests, so
//! pipeline tests can drive whole stage chains without binary fixture
//! files. Test-only: gated behind `#[cfg(test)]` at the point of use.

use std::collections::HashMap;

use crate::psi::pat::ProgramAssociationSection;
use crate::psi::packetizer::packetize;
use crate::psi::pmt::{StreamInfo, TSProgramMapSection, STREAM_TYPE_ADTS, STREAM_TYPE_VIDEO};
use crate::psi::sdt::{Service, ServiceDescriptionSection};
use crate::ts::TSPacket;

/// One program in a synthetic TS: its PMT PID plus the video/audio
/// elementary PIDs carried under it.
#[derive(Debug, Clone, Copy)]
pub struct ProgramSpec {
    pub service_id: u16,
    pub pmt_pid: u16,
    pub video_pid: u16,
    pub audio_pid: u16,
}

/// A synthesised Transport Stream: PAT + one PMT per program + SDT +
/// a handful of dummy elementary-stream packets per program, each table
/// packetised the same way the real pipeline does.
pub struct SyntheticTs {
    packets: Vec<TSPacket>,
}

impl SyntheticTs {
    pub fn single_program() -> Self {
        SyntheticTs::new(
            1,
            &[ProgramSpec {
                service_id: 1,
                pmt_pid: 0x100,
                video_pid: 0x200,
                audio_pid: 0x201,
            }],
        )
    }

    pub fn two_programs() -> Self {
        SyntheticTs::new(
            1,
            &[
                ProgramSpec {
                    service_id: 1,
                    pmt_pid: 0x100,
                    video_pid: 0x200,
                    audio_pid: 0x201,
                },
                ProgramSpec {
                    service_id: 2,
                    pmt_pid: 0x110,
                    video_pid: 0x210,
                    audio_pid: 0x211,
                },
            ],
        )
    }

    pub fn three_programs() -> Self {
        SyntheticTs::new(
            1,
            &[
                ProgramSpec {
                    service_id: 1,
                    pmt_pid: 0x100,
                    video_pid: 0x200,
                    audio_pid: 0x201,
                },
                ProgramSpec {
                    service_id: 2,
                    pmt_pid: 0x110,
                    video_pid: 0x210,
                    audio_pid: 0x211,
                },
                ProgramSpec {
                    service_id: 3,
                    pmt_pid: 0x120,
                    video_pid: 0x220,
                    audio_pid: 0x221,
                },
            ],
        )
    }

    pub fn new(transport_stream_id: u16, programs: &[ProgramSpec]) -> Self {
        let mut packets = Vec::new();

        let mut program_association = HashMap::new();
        for p in programs {
            program_association.insert(p.service_id, p.pmt_pid);
        }
        let pat = ProgramAssociationSection {
            transport_stream_id,
            version_number: 0,
            current_next_indicator: true,
            program_association,
        };
        let (pat_packets, _) = packetize(&pat.encode(), crate::ts::PAT_PID, 0);
        packets.extend(pat_packets);

        for p in programs {
            let pmt = TSProgramMapSection {
                program_number: p.service_id,
                version_number: 0,
                current_next_indicator: true,
                pcr_pid: p.video_pid,
                descriptors: vec![],
                stream_info: vec![
                    StreamInfo {
                        stream_type: STREAM_TYPE_VIDEO,
                        elementary_pid: p.video_pid,
                        descriptors: vec![],
                    },
                    StreamInfo {
                        stream_type: STREAM_TYPE_ADTS,
                        elementary_pid: p.audio_pid,
                        descriptors: vec![],
                    },
                ],
            };
            let (pmt_packets, _) = packetize(&pmt.encode(), p.pmt_pid, 0);
            packets.extend(pmt_packets);
        }

        let sdt = ServiceDescriptionSection {
            transport_stream_id,
            version_number: 0,
            current_next_indicator: true,
            original_network_id: 1,
            services: programs
                .iter()
                .map(|p| Service {
                    service_id: p.service_id,
                    eit_schedule_flag: false,
                    eit_present_following_flag: false,
                    running_status: 4,
                    free_ca_mode: false,
                    descriptors: vec![],
                })
                .collect(),
        };
        let (sdt_packets, _) = packetize(&sdt.encode(), crate::psi::sdt::SDT_PID, 0);
        packets.extend(sdt_packets);

        for p in programs {
            for i in 0..5u8 {
                packets.push(dummy_es_packet(p.video_pid, i));
                packets.push(dummy_es_packet(p.audio_pid, i));
            }
        }

        SyntheticTs { packets }
    }

    pub fn packets(&self) -> &[TSPacket] {
        &self.packets
    }

    pub fn into_packets(self) -> Vec<TSPacket> {
        self.packets
    }
}

fn dummy_es_packet(pid: u16, cc: u8) -> TSPacket {
    let mut raw = [0xffu8; 188];
    raw[0] = crate::ts::SYNC_BYTE;
    raw[1] = (pid >> 8) as u8 & 0x1f;
    raw[2] = pid as u8;
    raw[3] = 0x10 | (cc & 0xf);
    raw[4..8].copy_from_slice(&[0x00, 0x00, 0x01, 0xe0]);
    TSPacket::parse(&raw).unwrap()
}
