//! Producer/consumer workers that drive frames through a [`crate::MediaSystem`]
//!
//! A producer takes a block, fills it from a [`ByteSource`], flushes it for
//! reader visibility and sends it, retrying backpressure with a fixed backoff.
//! A consumer pulls frames, writes them to a [`ByteSink`] and releases them,
//! exiting once after end of stream. Both check a shared [`StopSignal`]
//! between waits.

pub mod consumer;
pub mod pipeline;
pub mod producer;
pub mod retry;
pub mod sink;
pub mod source;
pub mod stop;

pub use consumer::{Consumer, ConsumerReport};
pub use pipeline::{Pipeline, PipelineConfig, PipelineHandle, PipelineReport};
pub use producer::{Producer, ProducerReport};
pub use retry::{send_with_retry, RetryPolicy, SendOutcome};
pub use sink::{ByteSink, ChecksumSink, FileSink, NullSink};
pub use source::{read_full, ByteSource, FileSource, MemorySource, SyntheticSource};
pub use stop::StopSignal;
