//! Backing store for the emulated disk
//!
//! The image is a flat, block-addressed binary file with no header. Every
//! transfer is positioned at an absolute byte offset of `lba * BLOCK_SIZE`.

use crate::error::{DevResult, ScsiDevError};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fixed logical block size in bytes
pub const BLOCK_SIZE: usize = 512;

/// Failures reported by a [`BlockStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("seek to LBA {lba} failed: {source}")]
    Seek {
        lba: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("short read of {expected} bytes at LBA {lba}: {source}")]
    ShortRead {
        lba: u32,
        expected: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("short write of {expected} bytes at LBA {lba}: {source}")]
    ShortWrite {
        lba: u32,
        expected: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("flush failed: {0}")]
    Flush(#[source] std::io::Error),

    #[error("store is read-only")]
    ReadOnly,
}

/// Block storage behind the emulated disk
///
/// Implement this trait to back a [`HardDisk`](crate::HardDisk) with
/// something other than an image file.
pub trait BlockStore {
    /// Read exactly `buf.len()` bytes starting at block `lba`
    fn read_blocks(&mut self, lba: u32, buf: &mut [u8]) -> Result<(), StoreError>;

    /// Write all of `data` starting at block `lba`
    fn write_blocks(&mut self, lba: u32, data: &[u8]) -> Result<(), StoreError>;

    /// Whether writes are permitted
    fn is_writable(&self) -> bool;

    /// Addressable capacity in blocks, if known
    fn capacity_blocks(&self) -> Option<u64> {
        None
    }

    /// Flush pending writes to stable storage
    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

fn byte_offset(lba: u32) -> u64 {
    u64::from(lba) * BLOCK_SIZE as u64
}

/// Image file backing store
#[derive(Debug)]
pub struct FileImage {
    file: File,
    path: PathBuf,
    writable: bool,
}

impl FileImage {
    /// Open an image, preferring read-write and falling back to read-only
    pub fn open<P: AsRef<Path>>(path: P) -> DevResult<Self> {
        let path = path.as_ref();
        match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => {
                log::info!("Opened disk image {} read-write", path.display());
                Ok(FileImage {
                    file,
                    path: path.to_path_buf(),
                    writable: true,
                })
            }
            Err(e) => {
                log::warn!(
                    "Cannot open {} read-write ({}), falling back to read-only",
                    path.display(),
                    e
                );
                Self::open_read_only(path)
            }
        }
    }

    /// Open an image with writes disabled
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> DevResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| {
            log::error!("Cannot open disk image {}: {}", path.display(), source);
            ScsiDevError::DeviceUnavailable {
                path: path.to_path_buf(),
                source,
            }
        })?;
        log::info!("Opened disk image {} read-only", path.display());
        Ok(FileImage {
            file,
            path: path.to_path_buf(),
            writable: false,
        })
    }

    /// Path the image was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockStore for FileImage {
    fn read_blocks(&mut self, lba: u32, buf: &mut [u8]) -> Result<(), StoreError> {
        self.file
            .seek(SeekFrom::Start(byte_offset(lba)))
            .map_err(|source| StoreError::Seek { lba, source })?;
        self.file
            .read_exact(buf)
            .map_err(|source| StoreError::ShortRead {
                lba,
                expected: buf.len(),
                source,
            })
    }

    fn write_blocks(&mut self, lba: u32, data: &[u8]) -> Result<(), StoreError> {
        if !self.writable {
            return Err(StoreError::ReadOnly);
        }
        self.file
            .seek(SeekFrom::Start(byte_offset(lba)))
            .map_err(|source| StoreError::Seek { lba, source })?;
        self.file
            .write_all(data)
            .map_err(|source| StoreError::ShortWrite {
                lba,
                expected: data.len(),
                source,
            })
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn capacity_blocks(&self) -> Option<u64> {
        let len = self.file.metadata().ok()?.len();
        Some(len / BLOCK_SIZE as u64)
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.file.sync_data().map_err(StoreError::Flush)
    }
}

/// In-memory backing store
#[derive(Debug, Clone)]
pub struct MemoryImage {
    data: Vec<u8>,
    writable: bool,
}

impl MemoryImage {
    /// Create a zero-filled image of `blocks` blocks
    pub fn new(blocks: usize) -> Self {
        MemoryImage {
            data: vec![0u8; blocks * BLOCK_SIZE],
            writable: true,
        }
    }

    /// Wrap existing image contents
    pub fn from_bytes(data: Vec<u8>) -> Self {
        MemoryImage {
            data,
            writable: true,
        }
    }

    /// Enable or disable writes
    pub fn with_writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    /// Raw image contents
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl BlockStore for MemoryImage {
    fn read_blocks(&mut self, lba: u32, buf: &mut [u8]) -> Result<(), StoreError> {
        let offset = byte_offset(lba) as usize;
        let end = offset + buf.len();
        if end > self.data.len() {
            return Err(StoreError::ShortRead {
                lba,
                expected: buf.len(),
                source: std::io::ErrorKind::UnexpectedEof.into(),
            });
        }
        buf.copy_from_slice(&self.data[offset..end]);
        Ok(())
    }

    fn write_blocks(&mut self, lba: u32, data: &[u8]) -> Result<(), StoreError> {
        if !self.writable {
            return Err(StoreError::ReadOnly);
        }
        let offset = byte_offset(lba) as usize;
        let end = offset + data.len();
        if end > self.data.len() {
            return Err(StoreError::ShortWrite {
                lba,
                expected: data.len(),
                source: std::io::ErrorKind::WriteZero.into(),
            });
        }
        self.data[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn capacity_blocks(&self) -> Option<u64> {
        Some((self.data.len() / BLOCK_SIZE) as u64)
    }
}
