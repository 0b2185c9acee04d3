//! Byte sinks draining consumers

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use log::{debug, info};

use crate::error::{FrameBindError, Result};

/// Where a consumer puts delivered frame payloads
pub trait ByteSink: Send + 'static {
    /// Accept one frame's payload
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Final processing after end of stream
    fn finish(&mut self) -> Result<()>;
}

/// Appends payloads to a file
pub struct FileSink {
    writer: BufWriter<File>,
    path: PathBuf,
    bytes_written: u64,
    frames_written: u64,
}

impl FileSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)
            .map_err(|e| FrameBindError::from_io(e, &format!("creating {}", path.display())))?;

        info!("Writing frames to {}", path.display());
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            bytes_written: 0,
            frames_written: 0,
        })
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl ByteSink for FileSink {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.writer
            .write_all(data)
            .map_err(|e| FrameBindError::from_io(e, &format!("writing {}", self.path.display())))?;
        self.bytes_written += data.len() as u64;
        self.frames_written += 1;

        if self.frames_written % 100 == 0 {
            debug!("{}: {} frames, {} bytes", self.path.display(), self.frames_written, self.bytes_written);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| FrameBindError::from_io(e, &format!("flushing {}", self.path.display())))
    }
}

/// Discards payloads, counting them
#[derive(Debug, Default)]
pub struct NullSink {
    pub frames: u64,
    pub bytes: u64,
}

impl ByteSink for NullSink {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.frames += 1;
        self.bytes += data.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Records the CRC32 of every payload it receives
///
/// The log is shared, so it can be inspected after the sink has been moved
/// into a consumer thread.
#[derive(Debug, Clone, Default)]
pub struct ChecksumSink {
    checksums: Arc<Mutex<Vec<u32>>>,
    finished: Arc<Mutex<bool>>,
}

impl ChecksumSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checksums recorded so far, in delivery order
    pub fn checksums(&self) -> Vec<u32> {
        self.checksums.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_finished(&self) -> bool {
        *self.finished.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ByteSink for ChecksumSink {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.checksums
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(crc32fast::hash(data));
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        *self.finished.lock().unwrap_or_else(PoisonError::into_inner) = true;
        Ok(())
    }
}
