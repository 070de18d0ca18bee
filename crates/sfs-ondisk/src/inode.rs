//! The fixed 160-byte ext4 inode record.
//!
//! The on-disk stride between inodes is `s_inode_size` (typically 256);
//! the extra bytes past 160 are reserved space this reader never touches.
//! Seeking by `inode_size` keeps subsequent inodes aligned.

use serde::{Deserialize, Serialize};
use sfs_types::{read_fixed, read_le_u16, read_le_u32, ParseError};

/// `serde` only derives array (de)serialization up to length 32; the 60-byte
/// `i_block` payload needs a manual tuple-based impl to round-trip.
mod block_payload_serde {
    use serde::de::{SeqAccess, Visitor};
    use serde::ser::SerializeTuple;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &[u8; 60], serializer: S) -> Result<S::Ok, S::Error> {
        let mut tup = serializer.serialize_tuple(60)?;
        for byte in value {
            tup.serialize_element(byte)?;
        }
        tup.end()
    }

    struct ArrayVisitor;

    impl<'de> Visitor<'de> for ArrayVisitor {
        type Value = [u8; 60];

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("an array of 60 bytes")
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut out = [0_u8; 60];
            for (i, slot) in out.iter_mut().enumerate() {
                *slot = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::invalid_length(i, &self))?;
            }
            Ok(out)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 60], D::Error> {
        deserializer.deserialize_tuple(60, ArrayVisitor)
    }
}

/// Decoded size of the fixed inode record.
pub const INODE_RECORD_SIZE: usize = 160;

// Inode flags (i_flags).
pub const INODE_FLAG_EXTENTS: u32 = 0x0008_0000;
pub const INODE_FLAG_HUGE_FILE: u32 = 0x0004_0000;
pub const INODE_FLAG_INLINE_DATA: u32 = 0x1000_0000;

// File mode type bits (i_mode & 0xF000).
pub const MODE_TYPE_MASK: u16 = 0xF000;
pub const MODE_FIFO: u16 = 0x1000;
pub const MODE_CHARDEV: u16 = 0x2000;
pub const MODE_DIRECTORY: u16 = 0x4000;
pub const MODE_BLOCKDEV: u16 = 0x6000;
pub const MODE_REGULAR: u16 = 0x8000;
pub const MODE_SYMLINK: u16 = 0xA000;
pub const MODE_SOCKET: u16 = 0xC000;

/// A decoded inode record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InodeRecord {
    pub mode: u16,
    pub uid: u16,
    pub gid: u16,
    pub size: u64,
    pub links_count: u16,
    pub blocks_lo: u32,
    pub flags: u32,
    pub generation: u32,
    pub file_acl_lo: u32,

    // Timestamps, seconds since the epoch.
    pub atime: u32,
    pub ctime: u32,
    pub mtime: u32,
    pub dtime: u32,
    pub crtime: u32,

    // Sub-second timestamp extensions (nsec << 2 | epoch bits).
    pub atime_extra: u32,
    pub ctime_extra: u32,
    pub mtime_extra: u32,
    pub crtime_extra: u32,

    pub extra_isize: u16,
    pub checksum_hi: u16,
    pub version_hi: u32,
    pub projid: u32,

    /// The 60-byte `i_block` payload: extent tree root, inline symlink
    /// target, or legacy block map depending on the inode flags.
    #[serde(with = "block_payload_serde")]
    pub block_payload: [u8; 60],
}

impl InodeRecord {
    /// Decode the fixed 160-byte inode record.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < INODE_RECORD_SIZE {
            return Err(ParseError::InsufficientData {
                needed: INODE_RECORD_SIZE,
                offset: 0,
                actual: bytes.len(),
            });
        }

        let size_lo = read_le_u32(bytes, 0x04)?;
        let size_hi = read_le_u32(bytes, 0x6C)?;

        Ok(Self {
            mode: read_le_u16(bytes, 0x00)?,
            uid: read_le_u16(bytes, 0x02)?,
            gid: read_le_u16(bytes, 0x18)?,
            size: u64::from(size_lo) | (u64::from(size_hi) << 32),
            links_count: read_le_u16(bytes, 0x1A)?,
            blocks_lo: read_le_u32(bytes, 0x1C)?,
            flags: read_le_u32(bytes, 0x20)?,
            generation: read_le_u32(bytes, 0x64)?,
            file_acl_lo: read_le_u32(bytes, 0x68)?,

            atime: read_le_u32(bytes, 0x08)?,
            ctime: read_le_u32(bytes, 0x0C)?,
            mtime: read_le_u32(bytes, 0x10)?,
            dtime: read_le_u32(bytes, 0x14)?,
            crtime: read_le_u32(bytes, 0x90)?,

            atime_extra: read_le_u32(bytes, 0x8C)?,
            ctime_extra: read_le_u32(bytes, 0x84)?,
            mtime_extra: read_le_u32(bytes, 0x88)?,
            crtime_extra: read_le_u32(bytes, 0x94)?,

            extra_isize: read_le_u16(bytes, 0x80)?,
            checksum_hi: read_le_u16(bytes, 0x82)?,
            version_hi: read_le_u32(bytes, 0x98)?,
            projid: read_le_u32(bytes, 0x9C)?,

            block_payload: read_fixed::<60>(bytes, 0x28)?,
        })
    }

    #[must_use]
    pub fn has_flag(&self, mask: u32) -> bool {
        (self.flags & mask) != 0
    }

    /// Whether this inode maps its data through an extent tree.
    #[must_use]
    pub fn uses_extents(&self) -> bool {
        self.has_flag(INODE_FLAG_EXTENTS)
    }

    #[must_use]
    pub fn file_type_bits(&self) -> u16 {
        self.mode & MODE_TYPE_MASK
    }

    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.file_type_bits() == MODE_DIRECTORY
    }

    #[must_use]
    pub fn is_regular(&self) -> bool {
        self.file_type_bits() == MODE_REGULAR
    }

    #[must_use]
    pub fn is_symlink(&self) -> bool {
        self.file_type_bits() == MODE_SYMLINK
    }

    // Timestamp accessors, seconds since the epoch.

    #[must_use]
    pub fn access_time(&self) -> i64 {
        i64::from(self.atime)
    }

    #[must_use]
    pub fn inode_change_time(&self) -> i64 {
        i64::from(self.ctime)
    }

    #[must_use]
    pub fn modification_time(&self) -> i64 {
        i64::from(self.mtime)
    }

    #[must_use]
    pub fn deletion_time(&self) -> i64 {
        i64::from(self.dtime)
    }

    #[must_use]
    pub fn file_creation_time(&self) -> i64 {
        i64::from(self.crtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_inode() -> Vec<u8> {
        let mut raw = vec![0_u8; INODE_RECORD_SIZE];
        raw[0x00..0x02].copy_from_slice(&(MODE_REGULAR | 0o644).to_le_bytes());
        raw[0x04..0x08].copy_from_slice(&7168_u32.to_le_bytes()); // size_lo
        raw[0x08..0x0C].copy_from_slice(&1_536_390_000_u32.to_le_bytes()); // atime
        raw[0x0C..0x10].copy_from_slice(&1_536_379_725_u32.to_le_bytes()); // ctime
        raw[0x1A..0x1C].copy_from_slice(&1_u16.to_le_bytes()); // links
        raw[0x20..0x24].copy_from_slice(&INODE_FLAG_EXTENTS.to_le_bytes());
        raw[0x28] = 0x0A; // extent magic in the payload
        raw[0x29] = 0xF3;
        raw
    }

    #[test]
    fn parse_regular_file_inode() {
        let inode = InodeRecord::parse(&make_inode()).unwrap();
        assert!(inode.is_regular());
        assert!(!inode.is_directory());
        assert_eq!(inode.size, 7168);
        assert_eq!(inode.links_count, 1);
        assert!(inode.uses_extents());
        assert_eq!(inode.inode_change_time(), 1_536_379_725);
        assert_eq!(inode.block_payload[0], 0x0A);
        assert_eq!(inode.block_payload[1], 0xF3);
    }

    #[test]
    fn size_assembles_high_half_unconditionally() {
        let mut raw = make_inode();
        raw[0x6C..0x70].copy_from_slice(&2_u32.to_le_bytes()); // size_high
        let inode = InodeRecord::parse(&raw).unwrap();
        assert_eq!(inode.size, (2_u64 << 32) | 7168);
    }

    #[test]
    fn short_record_rejected() {
        assert!(matches!(
            InodeRecord::parse(&[0_u8; 128]),
            Err(ParseError::InsufficientData { .. })
        ));
    }

    #[test]
    fn mode_type_dispatch() {
        let mut raw = make_inode();
        raw[0x00..0x02].copy_from_slice(&(MODE_DIRECTORY | 0o755).to_le_bytes());
        let inode = InodeRecord::parse(&raw).unwrap();
        assert!(inode.is_directory());

        raw[0x00..0x02].copy_from_slice(&(MODE_SYMLINK | 0o777).to_le_bytes());
        let inode = InodeRecord::parse(&raw).unwrap();
        assert!(inode.is_symlink());
    }
}
