//! A Transport Stream packet-processing pipeline: PSI table decoding and
//! reassembly, PID remapping, continuity-counter correction, table
//! repetition, MPTS→SPTS demuxing, and multi-source stream joining, built
//! around a small synchronous pipe-chain core.

#[macro_use]
mod util;

pub mod crc32;
pub mod pipeline;
pub mod provider;
pub mod psi;
pub mod stages;
pub mod ts;

#[cfg(test)]
mod testutil;
