//! Inode handles.

use crate::dir::DirectoryBrowser;
use crate::reader::{ExtentNavigator, InodeReader};
use crate::volume::Volume;
use sfs_block::ByteDevice;
use sfs_ondisk::InodeRecord;
use sfs_types::{GroupNumber, InodeNumber};

/// One decoded inode, borrowing the volume it came from.
///
/// The back-references look cyclic (inode → group → superblock → device)
/// but each level only borrows the one above; the handle is a plain value
/// that can be dropped at any time.
pub struct Inode<'v, D: ByteDevice> {
    vol: &'v Volume<D>,
    number: InodeNumber,
    group: GroupNumber,
    record: InodeRecord,
}

impl<'v, D: ByteDevice> Inode<'v, D> {
    pub(crate) fn new(
        vol: &'v Volume<D>,
        number: InodeNumber,
        group: GroupNumber,
        record: InodeRecord,
    ) -> Self {
        Self {
            vol,
            number,
            group,
            record,
        }
    }

    #[must_use]
    pub fn volume(&self) -> &'v Volume<D> {
        self.vol
    }

    #[must_use]
    pub fn number(&self) -> InodeNumber {
        self.number
    }

    /// The block group this inode belongs to.
    #[must_use]
    pub fn group(&self) -> GroupNumber {
        self.group
    }

    /// The full decoded record.
    #[must_use]
    pub fn record(&self) -> &InodeRecord {
        &self.record
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.record.size
    }

    #[must_use]
    pub fn mode(&self) -> u16 {
        self.record.mode
    }

    #[must_use]
    pub fn flags(&self) -> u32 {
        self.record.flags
    }

    #[must_use]
    pub fn uses_extents(&self) -> bool {
        self.record.uses_extents()
    }

    /// The 60-byte `i_block` payload.
    #[must_use]
    pub fn block_payload(&self) -> &[u8; 60] {
        &self.record.block_payload
    }

    #[must_use]
    pub fn access_time(&self) -> i64 {
        self.record.access_time()
    }

    #[must_use]
    pub fn inode_change_time(&self) -> i64 {
        self.record.inode_change_time()
    }

    #[must_use]
    pub fn modification_time(&self) -> i64 {
        self.record.modification_time()
    }

    #[must_use]
    pub fn deletion_time(&self) -> i64 {
        self.record.deletion_time()
    }

    #[must_use]
    pub fn file_creation_time(&self) -> i64 {
        self.record.file_creation_time()
    }

    /// An extent navigator over this inode's data.
    #[must_use]
    pub fn navigator(&self) -> ExtentNavigator<'v, D> {
        ExtentNavigator::new(self.vol, self.record.clone())
    }

    /// A sequential byte stream over this inode's data.
    #[must_use]
    pub fn reader(&self) -> InodeReader<'v, D> {
        InodeReader::new(self.navigator())
    }

    /// A directory-entry iterator over this inode's data.
    #[must_use]
    pub fn browse(&self) -> DirectoryBrowser<'v, D> {
        DirectoryBrowser::new(self)
    }
}
