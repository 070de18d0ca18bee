#![forbid(unsafe_code)]
//! Volume navigation for SpelunkFS.
//!
//! Ties the byte device and the on-disk decoders together into a read-only
//! view of one ext4 filesystem:
//!
//! - **volume**: [`Volume`] — superblock parse, feature validation, and the
//!   block group descriptor table, all loaded once at open.
//! - **inode**: [`Inode`] — an inode handle borrowing the volume.
//! - **reader**: [`ExtentNavigator`] and [`InodeReader`] — logical-offset
//!   reads through the extent tree and a sequential stream over them.
//! - **dir**: [`DirectoryBrowser`], [`DirectoryWalk`], and path resolution.
//!
//! Everything borrows the [`Volume`] for the lifetime of one open-filesystem
//! operation; decoded records are transient values copied out of the device.

pub mod dir;
pub mod inode;
pub mod reader;
pub mod volume;

pub use dir::{typed_file_type, DirectoryBrowser, DirectoryWalk};
pub use inode::Inode;
pub use reader::{ExtentNavigator, InodeReader};
pub use volume::Volume;
