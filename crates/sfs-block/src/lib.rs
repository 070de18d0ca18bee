#![forbid(unsafe_code)]
//! Byte-addressed device layer.
//!
//! A SpelunkFS volume reads from a [`ByteDevice`]: a random-access byte
//! source with pread semantics. Every read names its absolute offset, so no
//! shared seek position exists and components cannot corrupt each other's
//! cursors.

use sfs_error::{Result, SfsError};
use sfs_types::ByteOffset;
use std::fs::File;
use std::io::ErrorKind;
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::Arc;
use tracing::trace;

/// Byte-addressed device for fixed-offset reads (pread semantics).
pub trait ByteDevice {
    /// Total length in bytes.
    fn len_bytes(&self) -> u64;

    /// Read exactly `buf.len()` bytes from `offset` into `buf`.
    fn read_exact_at(&self, offset: ByteOffset, buf: &mut [u8]) -> Result<()>;
}

/// File-backed byte device using Linux `pread` style I/O.
///
/// `std::os::unix::fs::FileExt` does not require a shared seek position, so
/// one handle can back every component of an open volume.
#[derive(Debug, Clone)]
pub struct FileByteDevice {
    file: Arc<File>,
    len: u64,
}

impl FileByteDevice {
    /// Open an image file read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let len = file.metadata()?.len();
        trace!(target: "sfs::block", path = %path.as_ref().display(), len, "opened image");
        Ok(Self {
            file: Arc::new(file),
            len,
        })
    }
}

impl ByteDevice for FileByteDevice {
    fn len_bytes(&self) -> u64 {
        self.len
    }

    fn read_exact_at(&self, offset: ByteOffset, buf: &mut [u8]) -> Result<()> {
        let len = u64::try_from(buf.len()).map_err(|_| SfsError::ShortRead {
            context: "read length overflows u64",
        })?;
        let end = offset.checked_add(len).ok_or(SfsError::ShortRead {
            context: "read range overflows u64",
        })?;
        if end.0 > self.len {
            return Err(SfsError::ShortRead {
                context: "read past end of image",
            });
        }

        self.file
            .read_exact_at(buf, offset.0)
            .map_err(|err| match err.kind() {
                ErrorKind::UnexpectedEof => SfsError::ShortRead {
                    context: "device returned fewer bytes than requested",
                },
                _ => SfsError::Io(err),
            })
    }
}

/// In-memory byte device over an owned buffer.
///
/// Used by tests and by callers that already hold the whole image.
#[derive(Debug, Clone)]
pub struct MemByteDevice {
    bytes: Arc<Vec<u8>>,
}

impl MemByteDevice {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(bytes),
        }
    }
}

impl ByteDevice for MemByteDevice {
    fn len_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_exact_at(&self, offset: ByteOffset, buf: &mut [u8]) -> Result<()> {
        let start = usize::try_from(offset.0).map_err(|_| SfsError::ShortRead {
            context: "offset exceeds addressable range",
        })?;
        let end = start.checked_add(buf.len()).ok_or(SfsError::ShortRead {
            context: "read range overflows usize",
        })?;
        let slice = self.bytes.get(start..end).ok_or(SfsError::ShortRead {
            context: "read past end of image",
        })?;
        buf.copy_from_slice(slice);
        Ok(())
    }
}
