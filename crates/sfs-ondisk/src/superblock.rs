//! The ext4 superblock: a fixed 1024-byte record at absolute offset 1024.

use serde::{Deserialize, Serialize};
use sfs_types::{
    block_size_from_log, ensure_slice, inode_index_in_group, inode_to_group, read_fixed,
    read_le_u16, read_le_u32, trim_nul_padded, GroupNumber, InodeNumber, ParseError,
    EXT4_SUPERBLOCK_SIZE, EXT4_SUPER_MAGIC,
};

// Incompatible feature flags (s_feature_incompat).
pub const INCOMPAT_COMPRESSION: u32 = 0x0001;
pub const INCOMPAT_FILETYPE: u32 = 0x0002;
pub const INCOMPAT_RECOVER: u32 = 0x0004;
pub const INCOMPAT_JOURNAL_DEV: u32 = 0x0008;
pub const INCOMPAT_META_BG: u32 = 0x0010;
pub const INCOMPAT_EXTENTS: u32 = 0x0040;
pub const INCOMPAT_64BIT: u32 = 0x0080;
pub const INCOMPAT_MMP: u32 = 0x0100;
pub const INCOMPAT_FLEX_BG: u32 = 0x0200;
pub const INCOMPAT_EA_INODE: u32 = 0x0400;
pub const INCOMPAT_DIRDATA: u32 = 0x1000;
pub const INCOMPAT_CSUM_SEED: u32 = 0x2000;
pub const INCOMPAT_LARGEDIR: u32 = 0x4000;
pub const INCOMPAT_INLINE_DATA: u32 = 0x8000;
pub const INCOMPAT_ENCRYPT: u32 = 0x10000;

// Compatible feature flags (s_feature_compat).
pub const COMPAT_DIR_PREALLOC: u32 = 0x0001;
pub const COMPAT_IMAGIC_INODES: u32 = 0x0002;
pub const COMPAT_HAS_JOURNAL: u32 = 0x0004;
pub const COMPAT_EXT_ATTR: u32 = 0x0008;
pub const COMPAT_RESIZE_INODE: u32 = 0x0010;
pub const COMPAT_DIR_INDEX: u32 = 0x0020;
pub const COMPAT_SPARSE_SUPER2: u32 = 0x0200;

// Read-only compatible feature flags (s_feature_ro_compat).
pub const RO_COMPAT_SPARSE_SUPER: u32 = 0x0001;
pub const RO_COMPAT_LARGE_FILE: u32 = 0x0002;
pub const RO_COMPAT_HUGE_FILE: u32 = 0x0008;
pub const RO_COMPAT_GDT_CSUM: u32 = 0x0010;
pub const RO_COMPAT_DIR_NLINK: u32 = 0x0020;
pub const RO_COMPAT_EXTRA_ISIZE: u32 = 0x0040;
pub const RO_COMPAT_QUOTA: u32 = 0x0100;
pub const RO_COMPAT_BIGALLOC: u32 = 0x0200;
pub const RO_COMPAT_METADATA_CSUM: u32 = 0x0400;
pub const RO_COMPAT_PROJECT: u32 = 0x2000;

/// Ordered (name, bit) table of compatible features, for display.
pub const FEATURE_COMPAT_NAMES: &[(&str, u32)] = &[
    ("dir_prealloc", COMPAT_DIR_PREALLOC),
    ("imagic_inodes", COMPAT_IMAGIC_INODES),
    ("has_journal", COMPAT_HAS_JOURNAL),
    ("ext_attr", COMPAT_EXT_ATTR),
    ("resize_inode", COMPAT_RESIZE_INODE),
    ("dir_index", COMPAT_DIR_INDEX),
    ("sparse_super2", COMPAT_SPARSE_SUPER2),
];

/// Ordered (name, bit) table of read-only compatible features, for display.
pub const FEATURE_RO_COMPAT_NAMES: &[(&str, u32)] = &[
    ("sparse_super", RO_COMPAT_SPARSE_SUPER),
    ("large_file", RO_COMPAT_LARGE_FILE),
    ("huge_file", RO_COMPAT_HUGE_FILE),
    ("gdt_csum", RO_COMPAT_GDT_CSUM),
    ("dir_nlink", RO_COMPAT_DIR_NLINK),
    ("extra_isize", RO_COMPAT_EXTRA_ISIZE),
    ("quota", RO_COMPAT_QUOTA),
    ("bigalloc", RO_COMPAT_BIGALLOC),
    ("metadata_csum", RO_COMPAT_METADATA_CSUM),
    ("project", RO_COMPAT_PROJECT),
];

/// Ordered (name, bit) table of incompatible features, for display.
pub const FEATURE_INCOMPAT_NAMES: &[(&str, u32)] = &[
    ("compression", INCOMPAT_COMPRESSION),
    ("filetype", INCOMPAT_FILETYPE),
    ("recover", INCOMPAT_RECOVER),
    ("journal_dev", INCOMPAT_JOURNAL_DEV),
    ("meta_bg", INCOMPAT_META_BG),
    ("extents", INCOMPAT_EXTENTS),
    ("64bit", INCOMPAT_64BIT),
    ("mmp", INCOMPAT_MMP),
    ("flex_bg", INCOMPAT_FLEX_BG),
    ("ea_inode", INCOMPAT_EA_INODE),
    ("dir_data", INCOMPAT_DIRDATA),
    ("csum_seed", INCOMPAT_CSUM_SEED),
    ("large_dir", INCOMPAT_LARGEDIR),
    ("inline_data", INCOMPAT_INLINE_DATA),
    ("encrypt", INCOMPAT_ENCRYPT),
];

/// Incompat features this reader refuses to open.
const INCOMPAT_REJECTED: &[(&str, u32)] = &[
    ("compression", INCOMPAT_COMPRESSION),
    ("meta_bg", INCOMPAT_META_BG),
    ("journal_dev", INCOMPAT_JOURNAL_DEV),
    ("dir_data", INCOMPAT_DIRDATA),
    ("large_dir", INCOMPAT_LARGEDIR),
    ("inline_data", INCOMPAT_INLINE_DATA),
    ("encrypt", INCOMPAT_ENCRYPT),
];

/// Incompat features that must be present for this reader to work.
const INCOMPAT_REQUIRED: &[(&str, u32)] = &[
    ("flex_bg", INCOMPAT_FLEX_BG),
    ("filetype", INCOMPAT_FILETYPE),
    ("extents", INCOMPAT_EXTENTS),
];

// Filesystem state flags (s_state).
pub const STATE_CLEANLY_UNMOUNTED: u16 = 0x0001;
pub const STATE_ERRORS_DETECTED: u16 = 0x0002;
pub const STATE_ORPHANS_BEING_RECOVERED: u16 = 0x0004;

/// A decoded ext4 superblock.
///
/// `blocks_count` and the free-counts are already assembled from their
/// lo/hi halves, honoring the 64-bit incompat flag. `block_size` is
/// derived from `s_log_block_size`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperblockRecord {
    // ── Geometry ─────────────────────────────────────────────────────────
    pub inodes_count: u32,
    pub blocks_count: u64,
    pub reserved_blocks_count: u64,
    pub free_blocks_count: u64,
    pub free_inodes_count: u32,
    pub first_data_block: u32,
    pub log_block_size: u32,
    pub block_size: u32,
    pub blocks_per_group: u32,
    pub inodes_per_group: u32,
    pub inode_size: u16,
    pub first_ino: u32,
    pub desc_size: u16,

    // ── Identity ─────────────────────────────────────────────────────────
    pub magic: u16,
    pub uuid: [u8; 16],
    pub volume_name: String,
    pub last_mounted: String,

    // ── Revision & OS ────────────────────────────────────────────────────
    pub rev_level: u32,
    pub minor_rev_level: u16,
    pub creator_os: u32,

    // ── Features ─────────────────────────────────────────────────────────
    pub feature_compat: u32,
    pub feature_incompat: u32,
    pub feature_ro_compat: u32,
    pub default_mount_opts: u32,

    // ── State ────────────────────────────────────────────────────────────
    pub state: u16,
    pub errors: u16,
    pub mnt_count: u16,
    pub max_mnt_count: u16,

    // ── Timestamps (seconds since the epoch) ─────────────────────────────
    pub mtime: u32,
    pub wtime: u32,
    pub lastcheck: u32,
    pub mkfs_time: u32,

    // ── Journal ──────────────────────────────────────────────────────────
    pub journal_inum: u32,
    pub journal_dev: u32,
    pub journal_uuid: [u8; 16],

    // ── Directory hashing / flex groups ──────────────────────────────────
    pub hash_seed: [u32; 4],
    pub def_hash_version: u8,
    pub log_groups_per_flex: u8,

    // ── Checksums (parsed, never verified) ───────────────────────────────
    pub checksum_type: u8,
    pub checksum_seed: u32,
    pub checksum: u32,
}

impl SuperblockRecord {
    /// Decode a superblock from its 1024-byte on-disk region.
    pub fn parse(region: &[u8]) -> Result<Self, ParseError> {
        if region.len() < EXT4_SUPERBLOCK_SIZE {
            return Err(ParseError::InsufficientData {
                needed: EXT4_SUPERBLOCK_SIZE,
                offset: 0,
                actual: region.len(),
            });
        }

        let magic = read_le_u16(region, 0x38)?;
        if magic != EXT4_SUPER_MAGIC {
            return Err(ParseError::InvalidMagic {
                expected: u64::from(EXT4_SUPER_MAGIC),
                actual: u64::from(magic),
            });
        }

        let log_block_size = read_le_u32(region, 0x18)?;
        let Some(block_size) = block_size_from_log(log_block_size) else {
            return Err(ParseError::InvalidField {
                field: "s_log_block_size",
                reason: "invalid shift",
            });
        };
        if !matches!(block_size, 1024 | 2048 | 4096) {
            return Err(ParseError::InvalidField {
                field: "s_log_block_size",
                reason: "unsupported block size",
            });
        }

        let feature_incompat = read_le_u32(region, 0x60)?;
        let is_64bit = (feature_incompat & INCOMPAT_64BIT) != 0;

        let blocks_lo = read_le_u32(region, 0x04)?;
        let blocks_hi = read_le_u32(region, 0x150)?;
        let r_blocks_lo = read_le_u32(region, 0x08)?;
        let r_blocks_hi = read_le_u32(region, 0x154)?;
        let free_blocks_lo = read_le_u32(region, 0x0C)?;
        let free_blocks_hi = read_le_u32(region, 0x158)?;

        let def_hash_version = ensure_slice(region, 0xFC, 1)?[0];
        let log_groups_per_flex = ensure_slice(region, 0x174, 1)?[0];
        let checksum_type = ensure_slice(region, 0x175, 1)?[0];

        Ok(Self {
            inodes_count: read_le_u32(region, 0x00)?,
            blocks_count: sfs_types::lo_hi_u64(blocks_lo, blocks_hi, is_64bit),
            reserved_blocks_count: sfs_types::lo_hi_u64(r_blocks_lo, r_blocks_hi, is_64bit),
            free_blocks_count: sfs_types::lo_hi_u64(free_blocks_lo, free_blocks_hi, is_64bit),
            free_inodes_count: read_le_u32(region, 0x10)?,
            first_data_block: read_le_u32(region, 0x14)?,
            log_block_size,
            block_size,
            blocks_per_group: read_le_u32(region, 0x20)?,
            inodes_per_group: read_le_u32(region, 0x28)?,
            inode_size: read_le_u16(region, 0x58)?,
            first_ino: read_le_u32(region, 0x54)?,
            desc_size: read_le_u16(region, 0xFE)?,

            magic,
            uuid: read_fixed::<16>(region, 0x68)?,
            volume_name: trim_nul_padded(&read_fixed::<16>(region, 0x78)?),
            last_mounted: trim_nul_padded(&read_fixed::<64>(region, 0x88)?),

            rev_level: read_le_u32(region, 0x4C)?,
            minor_rev_level: read_le_u16(region, 0x3E)?,
            creator_os: read_le_u32(region, 0x48)?,

            feature_compat: read_le_u32(region, 0x5C)?,
            feature_incompat,
            feature_ro_compat: read_le_u32(region, 0x64)?,
            default_mount_opts: read_le_u32(region, 0x100)?,

            state: read_le_u16(region, 0x3A)?,
            errors: read_le_u16(region, 0x3C)?,
            mnt_count: read_le_u16(region, 0x34)?,
            max_mnt_count: read_le_u16(region, 0x36)?,

            mtime: read_le_u32(region, 0x2C)?,
            wtime: read_le_u32(region, 0x30)?,
            lastcheck: read_le_u32(region, 0x40)?,
            mkfs_time: read_le_u32(region, 0x108)?,

            journal_inum: read_le_u32(region, 0xE0)?,
            journal_dev: read_le_u32(region, 0xE4)?,
            journal_uuid: read_fixed::<16>(region, 0xD0)?,

            hash_seed: [
                read_le_u32(region, 0xEC)?,
                read_le_u32(region, 0xF0)?,
                read_le_u32(region, 0xF4)?,
                read_le_u32(region, 0xF8)?,
            ],
            def_hash_version,
            log_groups_per_flex,

            checksum_type,
            checksum_seed: read_le_u32(region, 0x270)?,
            checksum: read_le_u32(region, 0x3FC)?,
        })
    }

    #[must_use]
    pub fn has_compat(&self, mask: u32) -> bool {
        (self.feature_compat & mask) != 0
    }

    #[must_use]
    pub fn has_incompat(&self, mask: u32) -> bool {
        (self.feature_incompat & mask) != 0
    }

    #[must_use]
    pub fn has_ro_compat(&self, mask: u32) -> bool {
        (self.feature_ro_compat & mask) != 0
    }

    #[must_use]
    pub fn is_64bit(&self) -> bool {
        self.has_incompat(INCOMPAT_64BIT)
    }

    #[must_use]
    pub fn has_journal(&self) -> bool {
        self.has_compat(COMPAT_HAS_JOURNAL)
    }

    /// First incompat flag set that this reader cannot handle, by name.
    #[must_use]
    pub fn first_rejected_incompat(&self) -> Option<&'static str> {
        INCOMPAT_REJECTED
            .iter()
            .find(|(_, bit)| self.has_incompat(*bit))
            .map(|(name, _)| *name)
    }

    /// First required incompat flag that is missing, by name.
    #[must_use]
    pub fn first_missing_incompat(&self) -> Option<&'static str> {
        INCOMPAT_REQUIRED
            .iter()
            .find(|(_, bit)| !self.has_incompat(*bit))
            .map(|(name, _)| *name)
    }

    /// Total block count divided into groups, with a floor of one group.
    #[must_use]
    pub fn block_group_count(&self) -> u64 {
        if self.blocks_per_group == 0 {
            return 1;
        }
        let groups = self.blocks_count / u64::from(self.blocks_per_group);
        groups.max(1)
    }

    /// Block group holding the given absolute inode number.
    #[must_use]
    pub fn group_of_inode(&self, ino: InodeNumber) -> GroupNumber {
        inode_to_group(ino, self.inodes_per_group)
    }

    /// Index of the given inode within its group's inode table.
    #[must_use]
    pub fn index_of_inode(&self, ino: InodeNumber) -> u32 {
        inode_index_in_group(ino, self.inodes_per_group)
    }

    /// Byte offset of the block group descriptor table.
    ///
    /// Descriptors begin at the block following the superblock:
    /// `(s_first_data_block + 1) * block_size`.
    #[must_use]
    pub fn group_table_offset(&self) -> u64 {
        (u64::from(self.first_data_block) + 1) * u64::from(self.block_size)
    }

    #[must_use]
    pub fn cleanly_unmounted(&self) -> bool {
        (self.state & STATE_CLEANLY_UNMOUNTED) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal valid superblock region.
    fn make_sb() -> Vec<u8> {
        let mut sb = vec![0_u8; EXT4_SUPERBLOCK_SIZE];
        sb[0x38..0x3A].copy_from_slice(&EXT4_SUPER_MAGIC.to_le_bytes());
        sb[0x00..0x04].copy_from_slice(&128_u32.to_le_bytes()); // inodes_count
        sb[0x04..0x08].copy_from_slice(&1024_u32.to_le_bytes()); // blocks_count_lo
        sb[0x14..0x18].copy_from_slice(&1_u32.to_le_bytes()); // first_data_block
        sb[0x18..0x1C].copy_from_slice(&0_u32.to_le_bytes()); // log_block_size -> 1024
        sb[0x20..0x24].copy_from_slice(&8192_u32.to_le_bytes()); // blocks_per_group
        sb[0x28..0x2C].copy_from_slice(&128_u32.to_le_bytes()); // inodes_per_group
        sb[0x58..0x5A].copy_from_slice(&256_u16.to_le_bytes()); // inode_size
        let incompat = INCOMPAT_FILETYPE | INCOMPAT_EXTENTS | INCOMPAT_FLEX_BG;
        sb[0x60..0x64].copy_from_slice(&incompat.to_le_bytes());
        sb[0x78..0x81].copy_from_slice(b"tinyimage");
        sb[0x108..0x10C].copy_from_slice(&1_536_385_726_u32.to_le_bytes()); // mkfs_time
        sb
    }

    #[test]
    fn parse_minimal_superblock() {
        let sb = SuperblockRecord::parse(&make_sb()).unwrap();
        assert_eq!(sb.inodes_count, 128);
        assert_eq!(sb.blocks_count, 1024);
        assert_eq!(sb.log_block_size, 0);
        assert_eq!(sb.block_size, 1024);
        assert_eq!(sb.volume_name, "tinyimage");
        assert_eq!(sb.mkfs_time, 1_536_385_726);
        assert!(!sb.is_64bit());
    }

    #[test]
    fn bad_magic_is_invalid_magic() {
        let mut region = make_sb();
        region[0x38] = 0x00;
        assert!(matches!(
            SuperblockRecord::parse(&region),
            Err(ParseError::InvalidMagic { .. })
        ));
    }

    #[test]
    fn short_region_is_insufficient_data() {
        let region = vec![0_u8; 512];
        assert!(matches!(
            SuperblockRecord::parse(&region),
            Err(ParseError::InsufficientData { .. })
        ));
    }

    #[test]
    fn rejects_oversized_block_shift() {
        let mut region = make_sb();
        region[0x18..0x1C].copy_from_slice(&3_u32.to_le_bytes()); // 8K
        assert!(matches!(
            SuperblockRecord::parse(&region),
            Err(ParseError::InvalidField {
                field: "s_log_block_size",
                ..
            })
        ));
    }

    #[test]
    fn feature_screening() {
        let sb = SuperblockRecord::parse(&make_sb()).unwrap();
        assert_eq!(sb.first_rejected_incompat(), None);
        assert_eq!(sb.first_missing_incompat(), None);

        let mut region = make_sb();
        let incompat = INCOMPAT_FILETYPE | INCOMPAT_EXTENTS | INCOMPAT_FLEX_BG | INCOMPAT_ENCRYPT;
        region[0x60..0x64].copy_from_slice(&incompat.to_le_bytes());
        let sb = SuperblockRecord::parse(&region).unwrap();
        assert_eq!(sb.first_rejected_incompat(), Some("encrypt"));

        let mut region = make_sb();
        let incompat = INCOMPAT_FILETYPE | INCOMPAT_EXTENTS;
        region[0x60..0x64].copy_from_slice(&incompat.to_le_bytes());
        let sb = SuperblockRecord::parse(&region).unwrap();
        assert_eq!(sb.first_missing_incompat(), Some("flex_bg"));
    }

    #[test]
    fn permitted_features_are_not_rejected() {
        let mut region = make_sb();
        let incompat = INCOMPAT_FILETYPE
            | INCOMPAT_EXTENTS
            | INCOMPAT_FLEX_BG
            | INCOMPAT_RECOVER
            | INCOMPAT_MMP
            | INCOMPAT_EA_INODE
            | INCOMPAT_CSUM_SEED;
        region[0x60..0x64].copy_from_slice(&incompat.to_le_bytes());
        let sb = SuperblockRecord::parse(&region).unwrap();
        assert_eq!(sb.first_rejected_incompat(), None);
        assert_eq!(sb.first_missing_incompat(), None);
    }

    #[test]
    fn sixty_four_bit_assembly() {
        let mut region = make_sb();
        let incompat = INCOMPAT_FILETYPE | INCOMPAT_EXTENTS | INCOMPAT_FLEX_BG | INCOMPAT_64BIT;
        region[0x60..0x64].copy_from_slice(&incompat.to_le_bytes());
        region[0x150..0x154].copy_from_slice(&1_u32.to_le_bytes()); // blocks_count_hi

        let sb = SuperblockRecord::parse(&region).unwrap();
        assert!(sb.is_64bit());
        assert_eq!(sb.blocks_count, (1_u64 << 32) | 1024);

        // Without the 64-bit flag the high half is ignored.
        let mut region32 = make_sb();
        region32[0x150..0x154].copy_from_slice(&1_u32.to_le_bytes());
        let sb32 = SuperblockRecord::parse(&region32).unwrap();
        assert_eq!(sb32.blocks_count, 1024);
    }

    #[test]
    fn group_arithmetic() {
        let sb = SuperblockRecord::parse(&make_sb()).unwrap();
        // 1024 blocks / 8192 per group truncates to 0, floored at 1.
        assert_eq!(sb.block_group_count(), 1);
        assert_eq!(sb.group_of_inode(InodeNumber(1)), GroupNumber(0));
        assert_eq!(sb.index_of_inode(InodeNumber(12)), 11);
        // Descriptors live in the block after the superblock.
        assert_eq!(sb.group_table_offset(), 2048);
    }
}
