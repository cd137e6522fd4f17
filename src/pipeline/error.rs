use thiserror::Error;

/// Fatal and recoverable error kinds raised by the pipeline stages.
///
/// `NoMorePacket`/cancellation are not represented here — they are expected
/// control flow reported through [`ReadOutcome`], not failures.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("malformed packet: {0}")]
    MalformedPacket(#[source] anyhow::Error),

    #[error("malformed table on pid {pid}: {source}")]
    MalformedTable {
        pid: u16,
        #[source]
        source: anyhow::Error,
    },

    #[error("pid provider exhausted its free range")]
    PidExhausted,

    #[error("invalid pid map: {0}")]
    InvalidPidMap(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Result of attempting to read one packet from a [`crate::pipeline::source::PacketSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A packet was produced.
    Success,
    /// Transient: no packet is ready yet: the caller should yield and retry.
    NeedMoreInput,
    /// Terminal: the source is permanently exhausted.
    NoMorePacket,
}
