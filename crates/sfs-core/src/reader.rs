//! Logical-offset reads through the extent tree, and the sequential
//! stream built on top of them.

use crate::volume::Volume;
use sfs_block::ByteDevice;
use sfs_error::{Result, SfsError};
use sfs_ondisk::{
    parse_extent_node, ExtentHeader, ExtentNode, InodeRecord, EXTENT_ENTRY_SIZE,
    EXTENT_HEADER_SIZE, EXTENT_TAIL_SIZE,
};
use sfs_types::{BlockNumber, ParseError};

/// Deepest extent tree this reader will follow (the kernel's own limit).
const MAX_EXTENT_DEPTH: u16 = 5;

/// Maps a logical byte offset within an inode to the data bytes stored
/// there, walking the extent tree rooted in the inode's `i_block`.
pub struct ExtentNavigator<'v, D: ByteDevice> {
    vol: &'v Volume<D>,
    record: InodeRecord,
}

impl<'v, D: ByteDevice> ExtentNavigator<'v, D> {
    pub(crate) fn new(vol: &'v Volume<D>, record: InodeRecord) -> Self {
        Self { vol, record }
    }

    /// Total data size of the inode, in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.record.size
    }

    /// Read the inode's data from `offset` to the end of the physical block
    /// containing it, capped at the inode size.
    ///
    /// `offset` must be strictly less than the inode size; callers stop
    /// before `offset == size`.
    pub fn read_at(&self, offset: u64) -> Result<Vec<u8>> {
        let size = self.record.size;
        if offset >= size {
            return Err(SfsError::Parse(ParseError::InvalidField {
                field: "offset",
                reason: "read at or past end of inode data",
            }));
        }

        // Without the extents flag the 60-byte payload IS the file data
        // (fast symlinks and the like).
        if !self.record.uses_extents() {
            let payload = &self.record.block_payload;
            if size > payload.len() as u64 {
                return Err(SfsError::Parse(ParseError::InvalidField {
                    field: "i_block",
                    reason: "inode data exceeds inline payload but extents flag is clear",
                }));
            }
            #[allow(clippy::cast_possible_truncation)] // size <= 60 here
            return Ok(payload[offset as usize..size as usize].to_vec());
        }

        let block_size = u64::from(self.vol.block_size());
        let logical_block = offset / block_size;
        let offset_in_block = offset % block_size;

        let physical =
            self.resolve(&self.record.block_payload, logical_block, false, MAX_EXTENT_DEPTH)?;

        let raw = self
            .vol
            .read_physical_block(BlockNumber(physical), self.vol.block_size())?;

        // If the inode's data stops mid-block, take just that amount.
        let take = (size - offset).min(block_size - offset_in_block);
        #[allow(clippy::cast_possible_truncation)] // both bounded by block_size
        let (start, len) = (offset_in_block as usize, take as usize);
        Ok(raw[start..start + len].to_vec())
    }

    /// Descend one extent node, returning the physical block that backs
    /// `logical_block`.
    ///
    /// `has_tail_checksum` is false only for the root node inside the
    /// inode's `i_block`, which the inode checksum already covers.
    fn resolve(
        &self,
        node_bytes: &[u8],
        logical_block: u64,
        has_tail_checksum: bool,
        depth_budget: u16,
    ) -> Result<u64> {
        let (header, node, _tail) = match parse_extent_node(node_bytes, has_tail_checksum) {
            Ok(parsed) => parsed,
            Err(ParseError::InvalidMagic { actual, .. }) => {
                #[allow(clippy::cast_possible_truncation)] // magic field is 16-bit
                return Err(SfsError::BadExtentMagic {
                    actual: actual as u16,
                });
            }
            Err(err) => return Err(err.into()),
        };

        if header.depth > depth_budget {
            return Err(SfsError::Parse(ParseError::InvalidField {
                field: "eh_depth",
                reason: "extent tree deeper than the format allows",
            }));
        }

        match node {
            ExtentNode::Leaf(leaves) => {
                // First leaf whose covered range ends beyond the target;
                // a miss means the tree is sparse or corrupt.
                let hit = leaves
                    .iter()
                    .find(|leaf| {
                        u64::from(leaf.first_logical) + u64::from(leaf.block_count())
                            > logical_block
                    })
                    .filter(|leaf| leaf.covers(logical_block))
                    .ok_or(SfsError::ExtentNotFound { logical_block })?;

                Ok(hit.start_physical + (logical_block - u64::from(hit.first_logical)))
            }
            ExtentNode::Index(indexes) => {
                // Index keys are non-decreasing; descend into the last
                // entry at or below the target.
                let hit = indexes
                    .iter()
                    .take_while(|idx| u64::from(idx.covered_logical) <= logical_block)
                    .last()
                    .ok_or(SfsError::ExtentNotFound { logical_block })?;

                // Peek the child's header to size the full node read:
                // header + entries + checksum tail.
                let head = self.vol.read_physical_block(
                    hit.child_block(),
                    EXTENT_HEADER_SIZE as u32,
                )?;
                let child_header = match ExtentHeader::parse(&head) {
                    Ok(header) => header,
                    Err(ParseError::InvalidMagic { actual, .. }) => {
                        #[allow(clippy::cast_possible_truncation)]
                        return Err(SfsError::BadExtentMagic {
                            actual: actual as u16,
                        });
                    }
                    Err(err) => return Err(err.into()),
                };

                let child_len = EXTENT_HEADER_SIZE
                    + EXTENT_ENTRY_SIZE * usize::from(child_header.entries)
                    + EXTENT_TAIL_SIZE;
                let child_bytes = self.vol.read_physical_block(
                    hit.child_block(),
                    u32::try_from(child_len).map_err(|_| {
                        SfsError::Parse(ParseError::IntegerConversion {
                            field: "extent_node_len",
                        })
                    })?,
                )?;

                self.resolve(&child_bytes, logical_block, true, depth_budget - 1)
            }
        }
    }
}

/// A sequential byte stream over one inode's data.
///
/// Reads are short: each call returns at most the remainder of the cached
/// tail slice from the last navigator read. Callers loop.
pub struct InodeReader<'v, D: ByteDevice> {
    nav: ExtentNavigator<'v, D>,
    /// Bytes fetched from the navigator so far (cursor into the inode).
    fetched: u64,
    size: u64,
    cache: Vec<u8>,
    cache_pos: usize,
}

impl<'v, D: ByteDevice> InodeReader<'v, D> {
    #[must_use]
    pub fn new(nav: ExtentNavigator<'v, D>) -> Self {
        let size = nav.size();
        Self {
            nav,
            fetched: 0,
            size,
            cache: Vec::new(),
            cache_pos: 0,
        }
    }

    /// Total size of the underlying inode data.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The stream position: bytes delivered or skipped so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.fetched - (self.cache.len() - self.cache_pos) as u64
    }

    /// Fill `buf` with up to `buf.len()` bytes; returns 0 at end of data.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.cache_pos >= self.cache.len() {
            if self.fetched >= self.size {
                return Ok(0);
            }
            let data = self.nav.read_at(self.fetched)?;
            self.fetched += data.len() as u64;
            self.cache = data;
            self.cache_pos = 0;
        }

        let take = buf.len().min(self.cache.len() - self.cache_pos);
        buf[..take].copy_from_slice(&self.cache[self.cache_pos..self.cache_pos + take]);
        self.cache_pos += take;
        Ok(take)
    }

    /// Advance the stream by `count` bytes without copying data.
    pub fn skip(&mut self, count: u64) {
        let new_position = self.position().saturating_add(count);
        self.fetched = new_position;
        self.cache.clear();
        self.cache_pos = 0;
    }

    /// Read exactly `buf.len()` bytes, failing with `ShortRead` if the
    /// stream ends first.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(SfsError::ShortRead {
                    context: "inode data ended mid-record",
                });
            }
            filled += n;
        }
        Ok(())
    }

    /// Read the remainder of the stream into one buffer.
    pub fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut chunk = [0_u8; 4096];
        loop {
            let n = self.read(&mut chunk)?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&chunk[..n]);
        }
    }
}

/// `std::io::Read` adapter so byte-stream consumers (the journal parser,
/// `io::copy`) can drive an inode reader directly.
impl<D: ByteDevice> std::io::Read for InodeReader<'_, D> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        InodeReader::read(self, buf).map_err(std::io::Error::other)
    }
}
