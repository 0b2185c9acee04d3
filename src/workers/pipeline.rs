//! Producer/consumer thread pair around one channel (and an optional bound output)

use std::thread::{self, JoinHandle};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    buffers::{BackingType, BlockPool, CacheMode, PoolConfig, PoolId},
    channels::{ChannelAttr, ChannelId},
    config::SystemConfig,
    error::{FrameBindError, Result},
    frame::FrameInfo,
    system::MediaSystem,
};

use super::{
    consumer::{Consumer, ConsumerReport},
    producer::{Producer, ProducerReport},
    retry::RetryPolicy,
    sink::ByteSink,
    source::ByteSource,
    stop::StopSignal,
};

/// Everything needed to run one pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Thread name prefix
    pub name: String,
    /// Channel the producer sends on
    pub input: ChannelId,
    pub input_attr: ChannelAttr,
    /// Channel bound to `input` that the consumer reads; `None` reads `input` directly
    pub output: Option<(ChannelId, ChannelAttr)>,
    /// Geometry and format of every frame
    pub frame: FrameInfo,
    pub pool_blocks: usize,
    pub pool_backing: BackingType,
    pub pool_cache_mode: CacheMode,
    /// Passes over the source, -1 to loop forever
    pub loop_count: i32,
    /// Frames to send before end of stream, -1 for no limit
    pub snap_count: i64,
    pub retry: RetryPolicy,
    pub recv_timeout_ms: i32,
}

impl PipelineConfig {
    /// Pipeline with the worker timeouts of a default [`SystemConfig`]
    pub fn new(name: impl Into<String>, input: ChannelId, input_attr: ChannelAttr, frame: FrameInfo) -> Self {
        Self::for_system(&SystemConfig::default(), name, input, input_attr, frame)
    }

    /// Pipeline whose send and receive timeouts come from `system`
    pub fn for_system(
        system: &SystemConfig,
        name: impl Into<String>,
        input: ChannelId,
        input_attr: ChannelAttr,
        frame: FrameInfo,
    ) -> Self {
        Self {
            name: name.into(),
            input,
            input_attr,
            output: None,
            frame,
            pool_blocks: 4,
            pool_backing: BackingType::default(),
            pool_cache_mode: CacheMode::default(),
            loop_count: 1,
            snap_count: -1,
            retry: RetryPolicy::from_config(system),
            recv_timeout_ms: system.recv_timeout_ms,
        }
    }

    pub fn with_output(mut self, output: ChannelId, attr: ChannelAttr) -> Self {
        self.output = Some((output, attr));
        self
    }

    pub fn with_pool_blocks(mut self, blocks: usize) -> Self {
        self.pool_blocks = blocks;
        self
    }

    pub fn with_backing(mut self, backing: BackingType) -> Self {
        self.pool_backing = backing;
        self
    }

    pub fn with_cache_mode(mut self, mode: CacheMode) -> Self {
        self.pool_cache_mode = mode;
        self
    }

    pub fn with_loop_count(mut self, loops: i32) -> Self {
        self.loop_count = loops;
        self
    }

    pub fn with_snap_count(mut self, snaps: i64) -> Self {
        self.snap_count = snaps;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_recv_timeout_ms(mut self, timeout_ms: i32) -> Self {
        self.recv_timeout_ms = timeout_ms;
        self
    }

    /// Channel the consumer reads from
    pub fn read_channel(&self) -> ChannelId {
        self.output.as_ref().map(|(id, _)| *id).unwrap_or(self.input)
    }

    pub fn validate(&self) -> Result<()> {
        self.frame.validate()?;
        if self.frame.buffer_size() == 0 {
            return Err(FrameBindError::invalid_argument("frame", "Frame size cannot be zero"));
        }
        if self.pool_blocks == 0 {
            return Err(FrameBindError::invalid_argument("pool_blocks", "Pool needs at least one block"));
        }
        if self.loop_count == 0 {
            return Err(FrameBindError::invalid_argument("loop_count", "Loop count cannot be zero"));
        }
        Ok(())
    }
}

/// Combined outcome of a finished pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub bytes_written: u64,
    pub reached_eos: bool,
    pub send_retries: u64,
    pub checksum_mismatches: u64,
}

/// Entry point for running pipelines
pub struct Pipeline;

impl Pipeline {
    /// Set up pool and channels, then start the producer and consumer threads
    ///
    /// On failure everything set up so far is torn down again.
    pub fn spawn(
        system: &MediaSystem,
        config: PipelineConfig,
        source: Box<dyn ByteSource>,
        sink: Box<dyn ByteSink>,
        stop: StopSignal,
    ) -> Result<PipelineHandle> {
        config.validate()?;

        let mut setup = Setup::new(system, &config.name);
        let (pool_id, pool) = match setup.build(&config) {
            Ok(built) => built,
            Err(e) => {
                setup.undo();
                return Err(e);
            }
        };

        let producer = Producer {
            system: system.clone(),
            channel: config.input,
            pool,
            template: config.frame.clone(),
            source,
            loop_count: config.loop_count,
            snap_count: config.snap_count,
            retry: config.retry,
            stop: stop.clone(),
        };
        let consumer = Consumer {
            system: system.clone(),
            channel: config.read_channel(),
            sink,
            recv_timeout_ms: config.recv_timeout_ms,
            stop: stop.clone(),
        };

        let producer = match thread::Builder::new()
            .name(format!("{}-send", config.name))
            .spawn(move || producer.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                setup.undo();
                return Err(FrameBindError::from_io(e, "spawning producer thread"));
            }
        };
        let consumer = match thread::Builder::new()
            .name(format!("{}-recv", config.name))
            .spawn(move || consumer.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                stop.stop();
                if let Err(join_error) = join_worker(Some(producer), &config.name) {
                    warn!("Pipeline '{}' producer: {}", config.name, join_error);
                }
                setup.undo();
                return Err(FrameBindError::from_io(e, "spawning consumer thread"));
            }
        };

        info!("Pipeline '{}' running", config.name);
        Ok(PipelineHandle {
            system: system.clone(),
            config,
            pool_id,
            stop,
            producer: Some(producer),
            consumer: Some(consumer),
        })
    }
}

/// What `spawn` has set up so far, in creation order
struct Setup<'a> {
    system: &'a MediaSystem,
    name: &'a str,
    pool_id: Option<PoolId>,
    created: Vec<ChannelId>,
    started: Vec<ChannelId>,
    bound: Option<(ChannelId, ChannelId)>,
}

impl<'a> Setup<'a> {
    fn new(system: &'a MediaSystem, name: &'a str) -> Self {
        Self {
            system,
            name,
            pool_id: None,
            created: Vec::new(),
            started: Vec::new(),
            bound: None,
        }
    }

    fn build(&mut self, config: &PipelineConfig) -> Result<(PoolId, BlockPool)> {
        let system = self.system;
        let pool_config = PoolConfig::new(format!("{}-pool", config.name))
            .with_max_size(config.frame.buffer_size())
            .with_block_count(config.pool_blocks)
            .with_backing(config.pool_backing)
            .with_cache_mode(config.pool_cache_mode);
        let pool_id = system.create_pool(pool_config)?;
        self.pool_id = Some(pool_id);
        let pool = system.pool(pool_id)?;

        system.create_channel(config.input, config.input_attr.clone())?;
        self.created.push(config.input);
        if let Some((output, attr)) = &config.output {
            system.create_channel(*output, attr.clone())?;
            self.created.push(*output);
            system.bind(config.input, *output)?;
            self.bound = Some((config.input, *output));
            system.start_receiving(*output, -1)?;
            self.started.push(*output);
        }
        system.start_receiving(config.input, -1)?;
        self.started.push(config.input);
        Ok((pool_id, pool))
    }

    /// Tear down in reverse; every channel walks the lifecycle to Destroyed
    fn undo(self) {
        let system = self.system;
        let name = self.name;
        let note = |result: Result<()>| {
            if let Err(e) = result {
                warn!("Pipeline '{}' rollback: {}", name, e);
            }
        };

        for id in self.started.iter().rev() {
            note(system.stop_receiving(*id));
        }
        if let Some((src, dst)) = self.bound {
            note(system.unbind(src, dst));
        }
        for id in self.created.iter().rev() {
            if !self.started.contains(id) {
                note(system.start_receiving(*id, -1));
                note(system.stop_receiving(*id));
            }
            note(system.destroy_channel(*id));
        }
        if let Some(pool_id) = self.pool_id {
            note(system.destroy_pool(pool_id));
        }
        warn!("Pipeline '{}' setup rolled back", name);
    }
}

/// Running pipeline; join it to collect the report and tear it down
pub struct PipelineHandle {
    system: MediaSystem,
    config: PipelineConfig,
    pool_id: PoolId,
    stop: StopSignal,
    producer: Option<JoinHandle<Result<ProducerReport>>>,
    consumer: Option<JoinHandle<Result<ConsumerReport>>>,
}

impl PipelineHandle {
    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// Request both workers to stop
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Wait for both workers, then stop, unbind and destroy what `spawn` created
    pub fn join(mut self) -> Result<PipelineReport> {
        let produced = join_worker(self.producer.take(), &self.config.name);
        // A producer that ended without end-of-stream leaves nothing to wait for
        if !matches!(&produced, Ok(report) if report.sent_eos) {
            self.stop.stop();
        }
        let consumed = join_worker(self.consumer.take(), &self.config.name);

        let torn_down = self.teardown();
        let produced = produced?;
        let consumed = consumed?;
        torn_down?;

        let report = PipelineReport {
            frames_sent: produced.frames_sent,
            frames_received: consumed.frames_received,
            bytes_written: consumed.bytes_written,
            reached_eos: consumed.reached_eos,
            send_retries: produced.retries,
            checksum_mismatches: consumed.checksum_mismatches,
        };
        info!(
            "Pipeline '{}' done: sent {}, received {}, {} bytes",
            self.config.name, report.frames_sent, report.frames_received, report.bytes_written
        );
        Ok(report)
    }

    fn teardown(&self) -> Result<()> {
        let system = &self.system;
        let input = self.config.input;
        let mut first_error = None;
        let mut note = |result: Result<()>| {
            if let Err(e) = result {
                warn!("Pipeline '{}' teardown: {}", self.config.name, e);
                first_error.get_or_insert(e);
            }
        };

        note(system.stop_receiving(input));
        if let Some((output, _)) = &self.config.output {
            note(system.stop_receiving(*output));
            note(system.unbind(input, *output));
            note(system.destroy_channel(*output));
        }
        note(system.destroy_channel(input));
        note(system.destroy_pool(self.pool_id));

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn join_worker<T>(handle: Option<JoinHandle<Result<T>>>, name: &str) -> Result<T> {
    match handle {
        Some(handle) => handle
            .join()
            .unwrap_or_else(|_| Err(FrameBindError::illegal_state(name, "Worker thread panicked"))),
        None => Err(FrameBindError::illegal_state(name, "Worker already joined")),
    }
}
