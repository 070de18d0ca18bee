#![forbid(unsafe_code)]
//! Byte-level decoders for the ext4 on-disk format.
//!
//! Every decoder here is a pure function from a byte slice to a record
//! struct; nothing in this crate performs I/O. All multi-byte fields are
//! little-endian. Decoders validate structure (magic numbers, bounds,
//! counts) but never checksums.

pub mod dir;
pub mod extent;
pub mod group;
pub mod inode;
pub mod superblock;

pub use dir::{DirEntry, FileType, FILE_TYPE_NAMES};
pub use extent::{
    parse_extent_node, ExtentHeader, ExtentIndex, ExtentLeaf, ExtentNode, ExtentTail,
    EXTENT_ENTRY_SIZE, EXTENT_HEADER_SIZE, EXTENT_MAGIC, EXTENT_TAIL_SIZE,
};
pub use group::{GroupDescriptor, GROUP_DESCRIPTOR_SIZE};
pub use inode::{InodeRecord, INODE_RECORD_SIZE};
pub use superblock::{
    SuperblockRecord, FEATURE_COMPAT_NAMES, FEATURE_INCOMPAT_NAMES, FEATURE_RO_COMPAT_NAMES,
};
