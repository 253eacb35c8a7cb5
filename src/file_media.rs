//! Byte sources and sinks for DMS extraction.
//!
//! [`FileMedia`] is the random-access input an archive is read from.
//! [`ByteSink`] receives the assembled disk image and [`ExtraTrackSink`] the
//! side payloads that are not part of it.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{DmsError, Result};

/// Interval for reading a byte range (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadInterval {
    pub start: u64,
    pub end: u64,
}

/// Random-access byte source.
pub trait FileMedia {
    fn length(&self) -> u64;

    /// Read exactly the bytes in `interval`.
    fn read_range(&self, interval: ReadInterval) -> Result<Vec<u8>>;

    /// Read `len` bytes at `offset`; an empty read is always allowed.
    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let end = offset
            .checked_add(len as u64 - 1)
            .filter(|&end| end < self.length())
            .ok_or(DmsError::InvalidOffset {
                offset,
                length: self.length(),
            })?;
        self.read_range(ReadInterval { start: offset, end })
    }
}

impl FileMedia for [u8] {
    fn length(&self) -> u64 {
        self.len() as u64
    }

    fn read_range(&self, interval: ReadInterval) -> Result<Vec<u8>> {
        let start = usize::try_from(interval.start).ok();
        let end = usize::try_from(interval.end).ok();
        match start.zip(end).and_then(|(start, end)| self.get(start..=end)) {
            Some(bytes) => Ok(bytes.to_vec()),
            None => Err(DmsError::InvalidOffset {
                offset: interval.start,
                length: self.len() as u64,
            }),
        }
    }
}

impl FileMedia for Vec<u8> {
    fn length(&self) -> u64 {
        self.as_slice().length()
    }

    fn read_range(&self, interval: ReadInterval) -> Result<Vec<u8>> {
        self.as_slice().read_range(interval)
    }
}

impl<T: FileMedia + ?Sized> FileMedia for &T {
    fn length(&self) -> u64 {
        (**self).length()
    }

    fn read_range(&self, interval: ReadInterval) -> Result<Vec<u8>> {
        (**self).read_range(interval)
    }
}

/// Local file implementation.
#[derive(Debug, Clone)]
pub struct LocalFileMedia {
    path: PathBuf,
    name: String,
    length: u64,
}

impl LocalFileMedia {
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self {
            path: path.to_path_buf(),
            name,
            length: metadata.len(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole file.
    #[cfg(feature = "async")]
    #[cfg_attr(docsrs, doc(cfg(feature = "async")))]
    pub async fn read_all_async(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&self.path).await?)
    }
}

impl FileMedia for LocalFileMedia {
    fn length(&self) -> u64 {
        self.length
    }

    fn read_range(&self, interval: ReadInterval) -> Result<Vec<u8>> {
        if interval.end < interval.start || interval.end >= self.length {
            return Err(DmsError::InvalidOffset {
                offset: interval.start,
                length: self.length,
            });
        }
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(interval.start))?;
        let len = (interval.end - interval.start + 1) as usize;
        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }
}

/// Sequential output for the assembled disk image.
pub trait ByteSink {
    fn append(&mut self, data: &[u8]) -> Result<()>;

    /// Cut the output back to `len` bytes.
    fn truncate(&mut self, len: u64) -> Result<()>;

    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ByteSink for Vec<u8> {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        self.extend_from_slice(data);
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> Result<()> {
        Vec::truncate(self, len as usize);
        Ok(())
    }

    fn len(&self) -> u64 {
        Vec::len(self) as u64
    }
}

/// Disk image written straight to a file.
#[derive(Debug)]
pub struct FileSink {
    file: File,
    len: u64,
}

impl FileSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            file: File::create(path)?,
            len: 0,
        })
    }
}

impl ByteSink for FileSink {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        self.file.write_all(data)?;
        self.len += data.len() as u64;
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        self.file.seek(SeekFrom::Start(len))?;
        self.len = len;
        Ok(())
    }

    fn len(&self) -> u64 {
        self.len
    }
}

/// A track outside the real range, or an earlier duplicate of a real one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraTrack {
    pub track_num: u16,
    /// `extratrack<N>.bin`
    pub name: String,
    pub data: Vec<u8>,
}

/// Destination for extra tracks.
pub trait ExtraTrackSink {
    fn write_extra(&mut self, track_num: u16, name: &str, data: &[u8]) -> Result<()>;
}

impl ExtraTrackSink for Vec<ExtraTrack> {
    fn write_extra(&mut self, track_num: u16, name: &str, data: &[u8]) -> Result<()> {
        self.push(ExtraTrack {
            track_num,
            name: name.to_string(),
            data: data.to_vec(),
        });
        Ok(())
    }
}

/// Writes each extra track as its own file in a directory.
#[derive(Debug, Clone)]
pub struct DirectoryExtras {
    dir: PathBuf,
}

impl DirectoryExtras {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ExtraTrackSink for DirectoryExtras {
    fn write_extra(&mut self, _track_num: u16, name: &str, data: &[u8]) -> Result<()> {
        std::fs::write(self.dir.join(name), data)?;
        Ok(())
    }
}
