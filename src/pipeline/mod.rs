pub mod cancellation;
pub mod consumer;
pub mod error;
pub mod pipe;
pub mod queue;
pub mod source;

pub use cancellation::CancellationToken;
pub use consumer::{FlushGuard, PacketConsumer};
pub use error::{Error, ReadOutcome, Result};
pub use pipe::{ConsumerHandle, ConsumerList, Pipe};
pub use source::{pump, PacketSource};
