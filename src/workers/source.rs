//! Byte sources feeding producers

use std::{
    fs::File,
    io::{self, BufReader, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use log::info;

use crate::error::{FrameBindError, Result};

/// Where a producer gets frame payloads from
pub trait ByteSource: Send + 'static {
    /// Read up to `buf.len()` bytes; `Ok(0)` at end of input
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Restart from the beginning
    fn rewind(&mut self) -> io::Result<()>;
}

/// Read until `buf` is full or the source is exhausted
pub fn read_full(source: &mut dyn ByteSource, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Raw frames read from a file
pub struct FileSource {
    reader: BufReader<File>,
    path: PathBuf,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .map_err(|e| FrameBindError::from_io(e, &format!("opening {}", path.display())))?;

        info!("Reading frames from {}", path.display());
        Ok(Self {
            reader: BufReader::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.reader.seek(SeekFrom::Start(0)).map(|_| ())
    }
}

/// Generated test pattern, `frames` frames of `frame_size` bytes
///
/// Byte `i` of frame `n` is `n + i % 251`, so every frame differs from its
/// neighbours and a misrouted or torn frame is easy to spot.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    frame_size: usize,
    frames: Option<u64>,
    position: u64,
}

impl SyntheticSource {
    /// `frames = None` generates without end
    pub fn new(frame_size: usize, frames: Option<u64>) -> Self {
        Self {
            frame_size: frame_size.max(1),
            frames,
            position: 0,
        }
    }

    /// Expected content of byte `offset` in frame `index`
    pub fn pattern_byte(index: u64, offset: usize) -> u8 {
        (index as u8).wrapping_add((offset % 251) as u8)
    }

    fn total_len(&self) -> Option<u64> {
        self.frames.map(|f| f * self.frame_size as u64)
    }
}

impl ByteSource for SyntheticSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = match self.total_len() {
            Some(total) => (total - self.position).min(buf.len() as u64) as usize,
            None => buf.len(),
        };

        let frame_size = self.frame_size as u64;
        for (i, byte) in buf[..available].iter_mut().enumerate() {
            let pos = self.position + i as u64;
            *byte = Self::pattern_byte(pos / frame_size, (pos % frame_size) as usize);
        }
        self.position += available as u64;
        Ok(available)
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.position = 0;
        Ok(())
    }
}

/// In-memory source
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Vec<u8>,
    position: usize,
}

impl MemorySource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            position: 0,
        }
    }
}

impl ByteSource for MemorySource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.data[self.position..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        Ok(n)
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.position = 0;
        Ok(())
    }
}
