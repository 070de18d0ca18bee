//! An open ext4 volume: superblock, feature screen, and group table.

use crate::dir::DirectoryWalk;
use crate::inode::Inode;
use sfs_block::ByteDevice;
use sfs_error::{Result, SfsError};
use sfs_ondisk::{GroupDescriptor, InodeRecord, SuperblockRecord, GROUP_DESCRIPTOR_SIZE};
use sfs_types::{
    BlockNumber, ByteOffset, GroupNumber, InodeNumber, ParseError, EXT4_SUPERBLOCK_OFFSET,
    EXT4_SUPERBLOCK_SIZE,
};
use tracing::debug;

/// A read-only view of one ext4 filesystem.
///
/// Owns the device handle; every downstream component ([`Inode`],
/// [`crate::InodeReader`], [`DirectoryWalk`], …) borrows it. The superblock
/// and the descriptor table are parsed once at open and never change.
#[derive(Debug)]
pub struct Volume<D: ByteDevice> {
    dev: D,
    sb: SuperblockRecord,
    groups: Vec<GroupDescriptor>,
}

impl<D: ByteDevice> Volume<D> {
    /// Open a volume: parse the superblock at offset 1024, screen feature
    /// flags, and load the block group descriptor table.
    pub fn open(dev: D) -> Result<Self> {
        let mut region = vec![0_u8; EXT4_SUPERBLOCK_SIZE];
        dev.read_exact_at(ByteOffset(EXT4_SUPERBLOCK_OFFSET), &mut region)?;

        let sb = match SuperblockRecord::parse(&region) {
            Ok(sb) => sb,
            Err(ParseError::InvalidMagic { .. }) => return Err(SfsError::NotExt4),
            Err(err) => return Err(err.into()),
        };

        if let Some(name) = sb.first_rejected_incompat() {
            return Err(SfsError::UnsupportedFeature(name));
        }
        if let Some(name) = sb.first_missing_incompat() {
            return Err(SfsError::UnsupportedFeature(name));
        }

        let groups = read_group_table(&dev, &sb)?;
        debug!(
            target: "sfs::volume",
            volume = %sb.volume_name,
            block_size = sb.block_size,
            blocks = sb.blocks_count,
            inodes = sb.inodes_count,
            groups = groups.len(),
            "opened volume"
        );

        Ok(Self { dev, sb, groups })
    }

    #[must_use]
    pub fn superblock(&self) -> &SuperblockRecord {
        &self.sb
    }

    #[must_use]
    pub fn device(&self) -> &D {
        &self.dev
    }

    #[must_use]
    pub fn block_size(&self) -> u32 {
        self.sb.block_size
    }

    #[must_use]
    pub fn is_64bit(&self) -> bool {
        self.sb.is_64bit()
    }

    /// All block group descriptors, in group order.
    #[must_use]
    pub fn groups(&self) -> &[GroupDescriptor] {
        &self.groups
    }

    /// Descriptor for one block group.
    pub fn group(&self, group: GroupNumber) -> Result<&GroupDescriptor> {
        self.groups
            .get(group.0 as usize)
            .ok_or(SfsError::Parse(ParseError::InvalidField {
                field: "group_number",
                reason: "block group index out of range",
            }))
    }

    /// Descriptor for the group holding an absolute inode number.
    pub fn group_for_inode(&self, ino: InodeNumber) -> Result<&GroupDescriptor> {
        self.group(self.sb.group_of_inode(ino))
    }

    /// Read `len` bytes from the start of a physical block.
    ///
    /// Physical block `n` begins at byte `n * block_size`; `len` must not
    /// exceed one block.
    pub fn read_physical_block(&self, block: BlockNumber, len: u32) -> Result<Vec<u8>> {
        if len > self.sb.block_size {
            return Err(SfsError::Parse(ParseError::InvalidField {
                field: "read_len",
                reason: "cannot read more bytes than one block",
            }));
        }
        let offset = block
            .0
            .checked_mul(u64::from(self.sb.block_size))
            .ok_or(SfsError::Parse(ParseError::InvalidField {
                field: "block_offset",
                reason: "overflow computing block byte offset",
            }))?;
        let mut buf = vec![0_u8; len as usize];
        self.dev.read_exact_at(ByteOffset(offset), &mut buf)?;
        Ok(buf)
    }

    /// Resolve and decode an inode by its 1-based absolute number.
    pub fn inode(&self, ino: InodeNumber) -> Result<Inode<'_, D>> {
        if ino.0 == 0 {
            return Err(SfsError::Parse(ParseError::InvalidField {
                field: "inode_number",
                reason: "inode 0 does not exist",
            }));
        }

        let group = self.sb.group_of_inode(ino);
        let desc = self.group(group)?;
        let index = self.sb.index_of_inode(ino);

        let table_byte = desc
            .inode_table_block(self.is_64bit())
            .0
            .checked_mul(u64::from(self.sb.block_size))
            .ok_or(SfsError::Parse(ParseError::InvalidField {
                field: "bg_inode_table",
                reason: "overflow computing inode table offset",
            }))?;
        let offset = table_byte + u64::from(index) * u64::from(self.sb.inode_size);

        let mut raw = vec![0_u8; sfs_ondisk::INODE_RECORD_SIZE];
        self.dev
            .read_exact_at(ByteOffset(offset), &mut raw)
            .map_err(|err| match err {
                SfsError::ShortRead { .. } => SfsError::ShortRead {
                    context: "inode record",
                },
                other => other,
            })?;

        let record = InodeRecord::parse(&raw)?;
        Ok(Inode::new(self, ino, group, record))
    }

    /// The root directory inode.
    pub fn root(&self) -> Result<Inode<'_, D>> {
        self.inode(InodeNumber::ROOT)
    }

    /// The journal inode named by `s_journal_inum`.
    pub fn journal_inode(&self) -> Result<Inode<'_, D>> {
        if !self.sb.has_journal() || self.sb.journal_inum == 0 {
            return Err(SfsError::Parse(ParseError::InvalidField {
                field: "s_journal_inum",
                reason: "filesystem has no internal journal",
            }));
        }
        self.inode(InodeNumber(self.sb.journal_inum))
    }

    /// Depth-first walk of the directory tree rooted at `ino`.
    pub fn walk(&self, ino: InodeNumber) -> Result<DirectoryWalk<'_, D>> {
        DirectoryWalk::new(self, ino)
    }

    /// Resolve an absolute path (`/a/b/c`) to its inode.
    pub fn resolve_path(&self, path: &str) -> Result<Inode<'_, D>> {
        if !path.starts_with('/') {
            return Err(SfsError::Parse(ParseError::InvalidField {
                field: "path",
                reason: "path must be absolute",
            }));
        }

        let mut current = self.root()?;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            if !current.record().is_directory() {
                return Err(SfsError::Parse(ParseError::InvalidField {
                    field: "path",
                    reason: "component is not a directory",
                }));
            }

            let mut browser = current.browse();
            let mut found = None;
            while let Some(entry) = browser.next_entry()? {
                if entry.name == component.as_bytes() {
                    found = Some(entry);
                    break;
                }
            }
            let entry = found.ok_or(SfsError::Parse(ParseError::InvalidField {
                field: "path",
                reason: "component not found",
            }))?;
            current = self.inode(InodeNumber(entry.inode))?;
        }

        Ok(current)
    }
}

/// Read the descriptor table that starts at the block after the superblock.
fn read_group_table<D: ByteDevice>(
    dev: &D,
    sb: &SuperblockRecord,
) -> Result<Vec<GroupDescriptor>> {
    let count = usize::try_from(sb.block_group_count()).map_err(|_| {
        SfsError::Parse(ParseError::IntegerConversion {
            field: "block_group_count",
        })
    })?;

    let mut raw = vec![0_u8; count * GROUP_DESCRIPTOR_SIZE];
    dev.read_exact_at(ByteOffset(sb.group_table_offset()), &mut raw)
        .map_err(|err| match err {
            SfsError::ShortRead { .. } => SfsError::ShortRead {
                context: "block group descriptor table",
            },
            other => other,
        })?;

    let mut groups = Vec::with_capacity(count);
    for chunk in raw.chunks_exact(GROUP_DESCRIPTOR_SIZE) {
        groups.push(GroupDescriptor::parse(chunk)?);
    }
    Ok(groups)
}
