#![forbid(unsafe_code)]
//! Error types for SpelunkFS.
//!
//! Defines `SfsError` and a `Result<T>` alias used throughout the workspace.
//! Every error is terminal for the operation that produced it; end-of-stream
//! is signalled by `Ok(None)` / `Ok(0)` sentinels, never by an error.

use sfs_types::ParseError;
use thiserror::Error;

/// Unified error type for all SpelunkFS operations.
#[derive(Debug, Error)]
pub enum SfsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not an ext4 filesystem (bad superblock magic)")]
    NotExt4,

    #[error("unsupported filesystem feature: {0}")]
    UnsupportedFeature(&'static str),

    #[error("short read: {context}")]
    ShortRead { context: &'static str },

    #[error("extent node magic-bytes not correct: {actual:#06x}")]
    BadExtentMagic { actual: u16 },

    #[error("no extent covers logical block {logical_block}")]
    ExtentNotFound { logical_block: u64 },

    #[error("directory entries overran the inode size: consumed {consumed} of {size}")]
    MisalignedDirectory { consumed: u64, size: u64 },

    #[error("journal descriptor tag list has no last-tag sentinel")]
    UnterminatedDescriptor,

    #[error("journal block type {0} not handled")]
    UnknownJournalBlockType(u32),

    #[error("invalid file type code {code} for inode {inode}")]
    InvalidFileType { code: u8, inode: u32 },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Result alias using `SfsError`.
pub type Result<T> = std::result::Result<T, SfsError>;
