//! Block group descriptors: 64-byte records starting at the block after
//! the superblock, one per block group.

use serde::{Deserialize, Serialize};
use sfs_types::{lo_hi_u64, read_le_u16, read_le_u32, BlockNumber, ParseError};

/// On-disk size of one group descriptor.
///
/// The declared layout is the 64-bit one; on 32-bit filesystems the high
/// halves are present on disk as zeros and ignored at assembly time.
pub const GROUP_DESCRIPTOR_SIZE: usize = 64;

// Group descriptor flags (bg_flags).
pub const BG_INODE_UNINIT: u16 = 0x0001;
pub const BG_BLOCK_UNINIT: u16 = 0x0002;
pub const BG_INODE_ZEROED: u16 = 0x0004;

/// A decoded block group descriptor.
///
/// The lo/hi halves are stored raw; use the accessor methods to assemble
/// 64-bit block numbers according to the superblock's 64-bit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDescriptor {
    pub block_bitmap_lo: u32,
    pub inode_bitmap_lo: u32,
    pub inode_table_lo: u32,
    pub free_blocks_count_lo: u16,
    pub free_inodes_count_lo: u16,
    pub used_dirs_count_lo: u16,
    pub flags: u16,
    pub exclude_bitmap_lo: u32,
    pub block_bitmap_csum_lo: u16,
    pub inode_bitmap_csum_lo: u16,
    pub itable_unused_lo: u16,
    pub checksum: u16,
    pub block_bitmap_hi: u32,
    pub inode_bitmap_hi: u32,
    pub inode_table_hi: u32,
    pub free_blocks_count_hi: u16,
    pub free_inodes_count_hi: u16,
    pub used_dirs_count_hi: u16,
    pub itable_unused_hi: u16,
    pub exclude_bitmap_hi: u32,
    pub block_bitmap_csum_hi: u16,
    pub inode_bitmap_csum_hi: u16,
}

impl GroupDescriptor {
    /// Decode one 64-byte descriptor.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < GROUP_DESCRIPTOR_SIZE {
            return Err(ParseError::InsufficientData {
                needed: GROUP_DESCRIPTOR_SIZE,
                offset: 0,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            block_bitmap_lo: read_le_u32(bytes, 0x00)?,
            inode_bitmap_lo: read_le_u32(bytes, 0x04)?,
            inode_table_lo: read_le_u32(bytes, 0x08)?,
            free_blocks_count_lo: read_le_u16(bytes, 0x0C)?,
            free_inodes_count_lo: read_le_u16(bytes, 0x0E)?,
            used_dirs_count_lo: read_le_u16(bytes, 0x10)?,
            flags: read_le_u16(bytes, 0x12)?,
            exclude_bitmap_lo: read_le_u32(bytes, 0x14)?,
            block_bitmap_csum_lo: read_le_u16(bytes, 0x18)?,
            inode_bitmap_csum_lo: read_le_u16(bytes, 0x1A)?,
            itable_unused_lo: read_le_u16(bytes, 0x1C)?,
            checksum: read_le_u16(bytes, 0x1E)?,
            block_bitmap_hi: read_le_u32(bytes, 0x20)?,
            inode_bitmap_hi: read_le_u32(bytes, 0x24)?,
            inode_table_hi: read_le_u32(bytes, 0x28)?,
            free_blocks_count_hi: read_le_u16(bytes, 0x2C)?,
            free_inodes_count_hi: read_le_u16(bytes, 0x2E)?,
            used_dirs_count_hi: read_le_u16(bytes, 0x30)?,
            itable_unused_hi: read_le_u16(bytes, 0x32)?,
            exclude_bitmap_hi: read_le_u32(bytes, 0x34)?,
            block_bitmap_csum_hi: read_le_u16(bytes, 0x38)?,
            inode_bitmap_csum_hi: read_le_u16(bytes, 0x3A)?,
        })
    }

    /// First block of this group's inode table.
    #[must_use]
    pub fn inode_table_block(&self, is_64bit: bool) -> BlockNumber {
        BlockNumber(lo_hi_u64(self.inode_table_lo, self.inode_table_hi, is_64bit))
    }

    /// Block holding this group's inode bitmap.
    #[must_use]
    pub fn inode_bitmap_block(&self, is_64bit: bool) -> BlockNumber {
        BlockNumber(lo_hi_u64(self.inode_bitmap_lo, self.inode_bitmap_hi, is_64bit))
    }

    /// Block holding this group's block bitmap.
    #[must_use]
    pub fn block_bitmap_block(&self, is_64bit: bool) -> BlockNumber {
        BlockNumber(lo_hi_u64(self.block_bitmap_lo, self.block_bitmap_hi, is_64bit))
    }

    #[must_use]
    pub fn free_blocks_count(&self, is_64bit: bool) -> u32 {
        if is_64bit {
            u32::from(self.free_blocks_count_lo) | (u32::from(self.free_blocks_count_hi) << 16)
        } else {
            u32::from(self.free_blocks_count_lo)
        }
    }

    #[must_use]
    pub fn free_inodes_count(&self, is_64bit: bool) -> u32 {
        if is_64bit {
            u32::from(self.free_inodes_count_lo) | (u32::from(self.free_inodes_count_hi) << 16)
        } else {
            u32::from(self.free_inodes_count_lo)
        }
    }

    #[must_use]
    pub fn inode_table_uninitialized(&self) -> bool {
        (self.flags & BG_INODE_UNINIT) != 0
    }

    #[must_use]
    pub fn block_bitmap_uninitialized(&self) -> bool {
        (self.flags & BG_BLOCK_UNINIT) != 0
    }

    #[must_use]
    pub fn inode_table_zeroed(&self) -> bool {
        (self.flags & BG_INODE_ZEROED) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_desc() -> Vec<u8> {
        let mut d = vec![0_u8; GROUP_DESCRIPTOR_SIZE];
        d[0x00..0x04].copy_from_slice(&8_u32.to_le_bytes()); // block bitmap
        d[0x04..0x08].copy_from_slice(&24_u32.to_le_bytes()); // inode bitmap
        d[0x08..0x0C].copy_from_slice(&40_u32.to_le_bytes()); // inode table
        d[0x0C..0x0E].copy_from_slice(&933_u16.to_le_bytes()); // free blocks
        d[0x1E..0x20].copy_from_slice(&0xEEDA_u16.to_le_bytes()); // checksum
        d[0x28..0x2C].copy_from_slice(&7_u32.to_le_bytes()); // inode table hi
        d
    }

    #[test]
    fn parse_and_assemble_32bit() {
        let desc = GroupDescriptor::parse(&make_desc()).unwrap();
        assert_eq!(desc.inode_table_block(false), BlockNumber(40));
        assert_eq!(desc.inode_bitmap_block(false), BlockNumber(24));
        assert_eq!(desc.block_bitmap_block(false), BlockNumber(8));
        assert_eq!(desc.free_blocks_count(false), 933);
        assert_eq!(desc.checksum, 0xEEDA);
    }

    #[test]
    fn high_halves_only_count_in_64bit_mode() {
        let desc = GroupDescriptor::parse(&make_desc()).unwrap();
        assert_eq!(desc.inode_table_block(false), BlockNumber(40));
        assert_eq!(desc.inode_table_block(true), BlockNumber((7_u64 << 32) | 40));
    }

    #[test]
    fn short_buffer_rejected() {
        assert!(matches!(
            GroupDescriptor::parse(&[0_u8; 32]),
            Err(ParseError::InsufficientData { .. })
        ));
    }

    #[test]
    fn flag_predicates() {
        let mut raw = make_desc();
        raw[0x12..0x14].copy_from_slice(&(BG_INODE_UNINIT | BG_INODE_ZEROED).to_le_bytes());
        let desc = GroupDescriptor::parse(&raw).unwrap();
        assert!(desc.inode_table_uninitialized());
        assert!(!desc.block_bitmap_uninitialized());
        assert!(desc.inode_table_zeroed());
    }
}
