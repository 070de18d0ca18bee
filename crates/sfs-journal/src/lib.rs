#![forbid(unsafe_code)]
//! JBD2 journal stream parsing.
//!
//! The journal lives inside the filesystem as an ordinary inode; its data
//! stream is a v2 journal superblock followed by descriptor, commit, and
//! revoke blocks. All journal fields are big-endian, unlike the rest of
//! ext4.
//!
//! [`JournalStream`] is generic over `std::io::Read`, so it can be driven
//! by a volume's inode reader or by an in-memory buffer.

use serde::{Deserialize, Serialize};
use sfs_error::{Result, SfsError};
use sfs_types::{read_be_u16, read_be_u32, read_be_u64, read_fixed, ParseError};
use std::fmt;
use std::io::Read;

pub const JOURNAL_MAGIC: u32 = 0xC03B_3998;
pub const JOURNAL_HEADER_SIZE: usize = 12;

/// On-disk size of the journal superblock record.
const JOURNAL_SUPERBLOCK_SIZE: usize = 1024;

// Journal block types.
pub const BLOCK_TYPE_DESCRIPTOR: u32 = 1;
pub const BLOCK_TYPE_COMMIT: u32 = 2;
pub const BLOCK_TYPE_SUPERBLOCK_V1: u32 = 3;
pub const BLOCK_TYPE_SUPERBLOCK_V2: u32 = 4;
pub const BLOCK_TYPE_REVOKE: u32 = 5;

// Journal superblock compat features.
pub const JOURNAL_COMPAT_CHECKSUM: u32 = 0x1;

// Journal superblock incompat features.
pub const JOURNAL_INCOMPAT_REVOKE: u32 = 0x01;
pub const JOURNAL_INCOMPAT_64BIT: u32 = 0x02;
pub const JOURNAL_INCOMPAT_ASYNC_COMMIT: u32 = 0x04;
pub const JOURNAL_INCOMPAT_CSUM_V2: u32 = 0x08;
pub const JOURNAL_INCOMPAT_CSUM_V3: u32 = 0x10;

/// Ordered (name, bit) table of journal compat features, for display.
pub const JOURNAL_COMPAT_NAMES: &[(&str, u32)] = &[("checksum", JOURNAL_COMPAT_CHECKSUM)];

/// Ordered (name, bit) table of journal incompat features, for display.
pub const JOURNAL_INCOMPAT_NAMES: &[(&str, u32)] = &[
    ("revoke", JOURNAL_INCOMPAT_REVOKE),
    ("64bit", JOURNAL_INCOMPAT_64BIT),
    ("async_commit", JOURNAL_INCOMPAT_ASYNC_COMMIT),
    ("csum_v2", JOURNAL_INCOMPAT_CSUM_V2),
    ("csum_v3", JOURNAL_INCOMPAT_CSUM_V3),
];

/// Incompat features this reader refuses to stream.
const JOURNAL_INCOMPAT_REJECTED: &[(&str, u32)] = JOURNAL_INCOMPAT_NAMES;

// Descriptor tag flags.
pub const TAG_FLAG_ESCAPED: u16 = 0x1;
pub const TAG_FLAG_SAME_UUID: u16 = 0x2;
pub const TAG_FLAG_DELETED: u16 = 0x4;
pub const TAG_FLAG_LAST: u16 = 0x8;

// Commit block checksum type codes.
pub const CHECKSUM_TYPE_CRC32: u8 = 1;
pub const CHECKSUM_TYPE_MD5: u8 = 2;
pub const CHECKSUM_TYPE_SHA1: u8 = 3;
pub const CHECKSUM_TYPE_CRC32C: u8 = 4;

/// The 12-byte header at the start of every journal block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalHeader {
    pub magic: u32,
    pub block_type: u32,
    pub sequence: u32,
}

impl JournalHeader {
    pub fn parse(bytes: &[u8]) -> std::result::Result<Self, ParseError> {
        Ok(Self {
            magic: read_be_u32(bytes, 0)?,
            block_type: read_be_u32(bytes, 4)?,
            sequence: read_be_u32(bytes, 8)?,
        })
    }
}

impl fmt::Display for JournalHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "JournalHeader<magic=[{:08x}] type=({}) seq=({})>",
            self.magic, self.block_type, self.sequence
        )
    }
}

/// The decoded v2 journal superblock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalSuperblock {
    pub header: JournalHeader,
    pub block_size: u32,
    pub max_len: u32,
    pub first: u32,
    pub sequence: u32,
    pub start: u32,
    pub errno: u32,
    pub feature_compat: u32,
    pub feature_incompat: u32,
    pub feature_ro_compat: u32,
    pub uuid: [u8; 16],
    pub nr_users: u32,
    pub dyn_super: u32,
    pub max_transaction: u32,
    pub max_trans_data: u32,
    pub checksum_type: u8,
    pub checksum: u32,
}

impl JournalSuperblock {
    /// Decode and validate the journal superblock.
    ///
    /// Requires the v2 record (block type 4) and rejects every incompat
    /// feature this reader does not handle. Note the asymmetry: 64-bit
    /// filesystems are fine, 64-bit journals are not.
    pub fn parse(region: &[u8]) -> Result<Self> {
        if region.len() < JOURNAL_SUPERBLOCK_SIZE {
            return Err(SfsError::Parse(ParseError::InsufficientData {
                needed: JOURNAL_SUPERBLOCK_SIZE,
                offset: 0,
                actual: region.len(),
            }));
        }

        let header = JournalHeader::parse(region).map_err(SfsError::Parse)?;
        if header.magic != JOURNAL_MAGIC {
            return Err(SfsError::Parse(ParseError::InvalidMagic {
                expected: u64::from(JOURNAL_MAGIC),
                actual: u64::from(header.magic),
            }));
        }
        if header.block_type != BLOCK_TYPE_SUPERBLOCK_V2 {
            return Err(SfsError::Parse(ParseError::InvalidField {
                field: "h_blocktype",
                reason: "only journal superblock v2 is supported",
            }));
        }

        let sb = Self {
            header,
            block_size: read_be_u32(region, 0x0C).map_err(SfsError::Parse)?,
            max_len: read_be_u32(region, 0x10).map_err(SfsError::Parse)?,
            first: read_be_u32(region, 0x14).map_err(SfsError::Parse)?,
            sequence: read_be_u32(region, 0x18).map_err(SfsError::Parse)?,
            start: read_be_u32(region, 0x1C).map_err(SfsError::Parse)?,
            errno: read_be_u32(region, 0x20).map_err(SfsError::Parse)?,
            feature_compat: read_be_u32(region, 0x24).map_err(SfsError::Parse)?,
            feature_incompat: read_be_u32(region, 0x28).map_err(SfsError::Parse)?,
            feature_ro_compat: read_be_u32(region, 0x2C).map_err(SfsError::Parse)?,
            uuid: read_fixed::<16>(region, 0x30).map_err(SfsError::Parse)?,
            nr_users: read_be_u32(region, 0x40).map_err(SfsError::Parse)?,
            dyn_super: read_be_u32(region, 0x44).map_err(SfsError::Parse)?,
            max_transaction: read_be_u32(region, 0x48).map_err(SfsError::Parse)?,
            max_trans_data: read_be_u32(region, 0x4C).map_err(SfsError::Parse)?,
            checksum_type: region[0x50],
            checksum: read_be_u32(region, 0xFC).map_err(SfsError::Parse)?,
        };

        if let Some(&(name, _)) = JOURNAL_INCOMPAT_REJECTED
            .iter()
            .find(|(_, bit)| sb.has_incompat(*bit))
        {
            return Err(SfsError::UnsupportedFeature(name));
        }

        Ok(sb)
    }

    #[must_use]
    pub fn has_compat(&self, mask: u32) -> bool {
        (self.feature_compat & mask) != 0
    }

    #[must_use]
    pub fn has_incompat(&self, mask: u32) -> bool {
        (self.feature_incompat & mask) != 0
    }
}

/// One tag in a descriptor block: a filesystem block the transaction wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorTag {
    pub target_block: u32,
    pub checksum: u16,
    pub flags: u16,
    /// Present unless the tag carries the same-UUID-as-previous flag.
    pub uuid: Option<[u8; 16]>,
}

impl DescriptorTag {
    #[must_use]
    pub fn is_last(&self) -> bool {
        (self.flags & TAG_FLAG_LAST) != 0
    }

    #[must_use]
    pub fn is_escaped(&self) -> bool {
        (self.flags & TAG_FLAG_ESCAPED) != 0
    }

    #[must_use]
    pub fn same_uuid_as_previous(&self) -> bool {
        (self.flags & TAG_FLAG_SAME_UUID) != 0
    }
}

impl fmt::Display for DescriptorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tag<block=({}) flags=({:#x})>",
            self.target_block, self.flags
        )
    }
}

/// A descriptor block: the tag list plus the transaction's data payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorBlock {
    pub header: JournalHeader,
    pub tags: Vec<DescriptorTag>,
    pub payload: Vec<u8>,
}

impl fmt::Display for DescriptorBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DescriptorBlock<seq=({}) tags=({}) payload=({})>",
            self.header.sequence,
            self.tags.len(),
            self.payload.len()
        )
    }
}

/// A commit block terminating one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitBlock {
    pub header: JournalHeader,
    pub checksum_type: u8,
    pub checksum_size: u8,
    pub checksum: [u32; 8],
    pub commit_sec: u64,
    pub commit_nsec: u32,
}

impl CommitBlock {
    /// Commit timestamp as (seconds since the epoch, nanoseconds).
    #[must_use]
    pub fn commit_time(&self) -> (i64, u32) {
        #[allow(clippy::cast_possible_wrap)] // on-disk u64 seconds, epoch range
        (self.commit_sec as i64, self.commit_nsec)
    }
}

impl fmt::Display for CommitBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sec, nsec) = self.commit_time();
        write!(
            f,
            "CommitBlock<seq=({}) time=({sec}.{nsec:09})>",
            self.header.sequence
        )
    }
}

/// A revocation record: blocks recovery must not replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeBlock {
    pub header: JournalHeader,
    /// Total bytes used by the record, including the 16-byte header.
    pub count: u32,
    pub revoked_blocks: Vec<u32>,
}

impl fmt::Display for RevokeBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RevokeBlock<seq=({}) revoked=({})>",
            self.header.sequence,
            self.revoked_blocks.len()
        )
    }
}

/// One journal block, tagged by the header's block type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalBlock {
    Descriptor(DescriptorBlock),
    Commit(CommitBlock),
    Revoke(RevokeBlock),
}

impl JournalBlock {
    #[must_use]
    pub fn header(&self) -> &JournalHeader {
        match self {
            Self::Descriptor(block) => &block.header,
            Self::Commit(block) => &block.header,
            Self::Revoke(block) => &block.header,
        }
    }
}

impl fmt::Display for JournalBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Descriptor(block) => block.fmt(f),
            Self::Commit(block) => block.fmt(f),
            Self::Revoke(block) => block.fmt(f),
        }
    }
}

/// A one-shot forward iterator over the journal's blocks.
///
/// Construction consumes the journal superblock from the reader; each
/// [`next_block`](Self::next_block) consumes one journal block (plus the
/// data payload after a descriptor). The journal has no terminator block
/// type: the stream ends at `s_maxlen` or at the first block without the
/// journal magic, whichever comes first.
pub struct JournalStream<R: Read> {
    reader: R,
    sb: JournalSuperblock,
    current_block: u32,
}

impl<R: Read> JournalStream<R> {
    /// Read and validate the journal superblock, positioning the stream at
    /// the first journal block.
    pub fn new(mut reader: R) -> Result<Self> {
        let mut region = vec![0_u8; JOURNAL_SUPERBLOCK_SIZE];
        read_exact(&mut reader, &mut region, "journal superblock")?;
        let sb = JournalSuperblock::parse(&region)?;

        // The superblock record is 1024 bytes; skip to the end of its
        // block when the journal uses larger blocks.
        if sb.block_size as usize > JOURNAL_SUPERBLOCK_SIZE {
            let mut rest = vec![0_u8; sb.block_size as usize - JOURNAL_SUPERBLOCK_SIZE];
            read_exact(&mut reader, &mut rest, "journal superblock padding")?;
        }

        Ok(Self {
            reader,
            sb,
            current_block: 0,
        })
    }

    #[must_use]
    pub fn superblock(&self) -> &JournalSuperblock {
        &self.sb
    }

    /// The next journal block, `None` at the end of the journal.
    pub fn next_block(&mut self) -> Result<Option<JournalBlock>> {
        if self.current_block >= self.sb.max_len {
            return Ok(None);
        }

        let block_size = self.sb.block_size as usize;
        if block_size < JOURNAL_HEADER_SIZE + 4 {
            return Err(SfsError::Parse(ParseError::InvalidField {
                field: "s_blocksize",
                reason: "journal block size too small",
            }));
        }

        let mut block = vec![0_u8; block_size];
        read_exact(&mut self.reader, &mut block, "journal block")?;
        self.current_block += 1;

        let header = JournalHeader::parse(&block).map_err(SfsError::Parse)?;
        if header.magic != JOURNAL_MAGIC {
            // No terminator block type exists; trailing blocks may simply
            // be uninitialized. The first bad magic ends the stream.
            return Ok(None);
        }

        let body = &block[JOURNAL_HEADER_SIZE..];
        match header.block_type {
            BLOCK_TYPE_DESCRIPTOR => {
                let tags = parse_descriptor_tags(body)?;
                let mut payload = vec![0_u8; block_size];
                read_exact(&mut self.reader, &mut payload, "transaction payload")?;
                Ok(Some(JournalBlock::Descriptor(DescriptorBlock {
                    header,
                    tags,
                    payload,
                })))
            }
            BLOCK_TYPE_COMMIT => {
                let mut checksum = [0_u32; 8];
                for (idx, slot) in checksum.iter_mut().enumerate() {
                    *slot = read_be_u32(body, 4 + idx * 4).map_err(SfsError::Parse)?;
                }
                Ok(Some(JournalBlock::Commit(CommitBlock {
                    header,
                    checksum_type: body[0],
                    checksum_size: body[1],
                    checksum,
                    commit_sec: read_be_u64(body, 0x24).map_err(SfsError::Parse)?,
                    commit_nsec: read_be_u32(body, 0x2C).map_err(SfsError::Parse)?,
                })))
            }
            BLOCK_TYPE_REVOKE => {
                let count = read_be_u32(body, 0).map_err(SfsError::Parse)?;
                let entry_bytes = count.saturating_sub(16);
                let entry_count = (entry_bytes / 4) as usize;
                let mut revoked_blocks = Vec::with_capacity(entry_count);
                for idx in 0..entry_count {
                    revoked_blocks
                        .push(read_be_u32(body, 4 + idx * 4).map_err(SfsError::Parse)?);
                }
                Ok(Some(JournalBlock::Revoke(RevokeBlock {
                    header,
                    count,
                    revoked_blocks,
                })))
            }
            other => Err(SfsError::UnknownJournalBlockType(other)),
        }
    }
}

/// Decode the tag list of a descriptor block.
///
/// Tags are 8 bytes, followed by a 16-byte UUID unless the same-UUID flag
/// is set. The list must end with a last-tag sentinel before the block
/// runs out.
fn parse_descriptor_tags(body: &[u8]) -> Result<Vec<DescriptorTag>> {
    let mut tags = Vec::new();
    let mut cursor = 0_usize;

    while cursor + 8 <= body.len() {
        let target_block = read_be_u32(body, cursor).map_err(SfsError::Parse)?;
        let checksum = read_be_u16(body, cursor + 4).map_err(SfsError::Parse)?;
        let flags = read_be_u16(body, cursor + 6).map_err(SfsError::Parse)?;
        cursor += 8;

        let uuid = if (flags & TAG_FLAG_SAME_UUID) == 0 {
            if cursor + 16 > body.len() {
                return Err(SfsError::UnterminatedDescriptor);
            }
            let uuid = read_fixed::<16>(body, cursor).map_err(SfsError::Parse)?;
            cursor += 16;
            Some(uuid)
        } else {
            None
        };

        let tag = DescriptorTag {
            target_block,
            checksum,
            flags,
            uuid,
        };
        let last = tag.is_last();
        tags.push(tag);
        if last {
            return Ok(tags);
        }
    }

    Err(SfsError::UnterminatedDescriptor)
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8], context: &'static str) -> Result<()> {
    reader.read_exact(buf).map_err(|err| match err.kind() {
        std::io::ErrorKind::UnexpectedEof => SfsError::ShortRead { context },
        _ => SfsError::Io(err),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const BLOCK_SIZE: usize = 1024;

    fn push_header(buf: &mut Vec<u8>, block_type: u32, sequence: u32) {
        buf.extend_from_slice(&JOURNAL_MAGIC.to_be_bytes());
        buf.extend_from_slice(&block_type.to_be_bytes());
        buf.extend_from_slice(&sequence.to_be_bytes());
    }

    fn make_superblock(max_len: u32, incompat: u32) -> Vec<u8> {
        let mut sb = vec![0_u8; BLOCK_SIZE];
        let mut head = Vec::new();
        push_header(&mut head, BLOCK_TYPE_SUPERBLOCK_V2, 0);
        sb[..12].copy_from_slice(&head);
        sb[0x0C..0x10].copy_from_slice(&(BLOCK_SIZE as u32).to_be_bytes());
        sb[0x10..0x14].copy_from_slice(&max_len.to_be_bytes());
        sb[0x14..0x18].copy_from_slice(&1_u32.to_be_bytes()); // first
        sb[0x18..0x1C].copy_from_slice(&1_u32.to_be_bytes()); // sequence
        sb[0x28..0x2C].copy_from_slice(&incompat.to_be_bytes());
        sb[0x30..0x40].copy_from_slice(&[0xAB; 16]); // uuid
        sb
    }

    /// Descriptor block: `targets` as tags, the first carrying a UUID and
    /// the rest flagged same-UUID, last tag flagged as such.
    fn make_descriptor(sequence: u32, targets: &[u32]) -> Vec<u8> {
        let mut block = Vec::with_capacity(BLOCK_SIZE);
        push_header(&mut block, BLOCK_TYPE_DESCRIPTOR, sequence);
        for (idx, target) in targets.iter().enumerate() {
            let mut flags = 0_u16;
            if idx > 0 {
                flags |= TAG_FLAG_SAME_UUID;
            }
            if idx == targets.len() - 1 {
                flags |= TAG_FLAG_LAST;
            }
            block.extend_from_slice(&target.to_be_bytes());
            block.extend_from_slice(&0_u16.to_be_bytes()); // checksum
            block.extend_from_slice(&flags.to_be_bytes());
            if idx == 0 {
                block.extend_from_slice(&[0xAB; 16]); // uuid
            }
        }
        block.resize(BLOCK_SIZE, 0);
        block
    }

    fn make_commit(sequence: u32, sec: u64, nsec: u32) -> Vec<u8> {
        let mut block = Vec::with_capacity(BLOCK_SIZE);
        push_header(&mut block, BLOCK_TYPE_COMMIT, sequence);
        block.push(CHECKSUM_TYPE_CRC32C);
        block.push(4); // checksum size
        block.extend_from_slice(&[0, 0]); // padding
        block.extend_from_slice(&[0; 32]); // checksum slots
        block.extend_from_slice(&sec.to_be_bytes());
        block.extend_from_slice(&nsec.to_be_bytes());
        block.resize(BLOCK_SIZE, 0);
        block
    }

    fn make_revoke(sequence: u32, revoked: &[u32]) -> Vec<u8> {
        let mut block = Vec::with_capacity(BLOCK_SIZE);
        push_header(&mut block, BLOCK_TYPE_REVOKE, sequence);
        let count = 16 + 4 * revoked.len() as u32;
        block.extend_from_slice(&count.to_be_bytes());
        for target in revoked {
            block.extend_from_slice(&target.to_be_bytes());
        }
        block.resize(BLOCK_SIZE, 0);
        block
    }

    #[test]
    fn superblock_parses_and_screens_features() {
        let sb = JournalSuperblock::parse(&make_superblock(128, 0)).unwrap();
        assert_eq!(sb.block_size, 1024);
        assert_eq!(sb.max_len, 128);
        assert_eq!(sb.sequence, 1);
        assert_eq!(sb.uuid, [0xAB; 16]);

        let err = JournalSuperblock::parse(&make_superblock(128, JOURNAL_INCOMPAT_REVOKE))
            .unwrap_err();
        assert!(matches!(err, SfsError::UnsupportedFeature("revoke")));

        let err = JournalSuperblock::parse(&make_superblock(128, JOURNAL_INCOMPAT_64BIT))
            .unwrap_err();
        assert!(matches!(err, SfsError::UnsupportedFeature("64bit")));
    }

    #[test]
    fn superblock_requires_v2() {
        let mut region = make_superblock(128, 0);
        region[4..8].copy_from_slice(&BLOCK_TYPE_SUPERBLOCK_V1.to_be_bytes());
        assert!(JournalSuperblock::parse(&region).is_err());
    }

    #[test]
    fn stream_yields_descriptor_commit_then_eof() {
        let mut journal = make_superblock(64, 0);
        journal.extend_from_slice(&make_descriptor(1, &[74]));
        journal.extend_from_slice(&vec![0x11_u8; BLOCK_SIZE]); // payload
        journal.extend_from_slice(&make_commit(1, 1_537_241_676, 588_000_000));
        journal.extend_from_slice(&vec![0_u8; BLOCK_SIZE]); // uninitialized tail

        let mut stream = JournalStream::new(Cursor::new(journal)).unwrap();

        let Some(JournalBlock::Descriptor(desc)) = stream.next_block().unwrap() else {
            panic!("expected descriptor block");
        };
        assert_eq!(desc.header.sequence, 1);
        assert_eq!(desc.tags.len(), 1);
        assert_eq!(desc.tags[0].target_block, 74);
        assert!(desc.tags[0].is_last());
        assert_eq!(desc.tags[0].uuid, Some([0xAB; 16]));
        assert_eq!(desc.payload, vec![0x11_u8; BLOCK_SIZE]);

        let Some(JournalBlock::Commit(commit)) = stream.next_block().unwrap() else {
            panic!("expected commit block");
        };
        assert_eq!(commit.commit_time(), (1_537_241_676, 588_000_000));
        assert_eq!(commit.checksum_type, CHECKSUM_TYPE_CRC32C);

        // The zeroed block has no magic: end of journal.
        assert!(stream.next_block().unwrap().is_none());
    }

    #[test]
    fn multi_tag_descriptor_reads_one_payload_block() {
        let targets = [58, 2, 75, 74, 44, 43];
        let mut journal = make_superblock(64, 0);
        journal.extend_from_slice(&make_descriptor(2, &targets));
        // Six data blocks follow on disk; the stream consumes only the
        // first as the descriptor's payload and then runs into raw file
        // data with no journal magic.
        for fill in 1..=6_u8 {
            journal.extend_from_slice(&vec![fill; BLOCK_SIZE]);
        }

        let mut stream = JournalStream::new(Cursor::new(journal)).unwrap();
        let Some(JournalBlock::Descriptor(desc)) = stream.next_block().unwrap() else {
            panic!("expected descriptor block");
        };
        let got: Vec<u32> = desc.tags.iter().map(|t| t.target_block).collect();
        assert_eq!(got, targets);
        assert!(desc.tags[0].uuid.is_some());
        assert!(desc.tags[1].uuid.is_none());
        assert!(desc.tags[5].is_last());
        assert_eq!(desc.payload, vec![1_u8; BLOCK_SIZE]);

        assert!(stream.next_block().unwrap().is_none());
    }

    #[test]
    fn unterminated_descriptor_fails() {
        let mut journal = make_superblock(64, 0);
        let mut block = Vec::new();
        push_header(&mut block, BLOCK_TYPE_DESCRIPTOR, 3);
        // One tag, UUID present, no last flag; the rest of the block is
        // zeros, which keep decoding as unterminated tags.
        block.extend_from_slice(&99_u32.to_be_bytes());
        block.extend_from_slice(&0_u16.to_be_bytes());
        block.extend_from_slice(&0_u16.to_be_bytes());
        block.extend_from_slice(&[0xAB; 16]);
        block.resize(BLOCK_SIZE, 0);
        journal.extend_from_slice(&block);

        let mut stream = JournalStream::new(Cursor::new(journal)).unwrap();
        assert!(matches!(
            stream.next_block().unwrap_err(),
            SfsError::UnterminatedDescriptor
        ));
    }

    #[test]
    fn revoke_block_lists_targets() {
        let mut journal = make_superblock(64, 0);
        journal.extend_from_slice(&make_revoke(4, &[120, 121, 300]));

        let mut stream = JournalStream::new(Cursor::new(journal)).unwrap();
        let Some(JournalBlock::Revoke(revoke)) = stream.next_block().unwrap() else {
            panic!("expected revoke block");
        };
        assert_eq!(revoke.count, 28);
        assert_eq!(revoke.revoked_blocks, [120, 121, 300]);
    }

    #[test]
    fn nested_superblock_is_unknown_block_type() {
        let mut journal = make_superblock(64, 0);
        let mut block = Vec::new();
        push_header(&mut block, BLOCK_TYPE_SUPERBLOCK_V1, 9);
        block.resize(BLOCK_SIZE, 0);
        journal.extend_from_slice(&block);

        let mut stream = JournalStream::new(Cursor::new(journal)).unwrap();
        assert!(matches!(
            stream.next_block().unwrap_err(),
            SfsError::UnknownJournalBlockType(3)
        ));
    }

    #[test]
    fn stream_stops_at_max_len() {
        let mut journal = make_superblock(1, 0);
        journal.extend_from_slice(&make_commit(1, 0, 0));
        journal.extend_from_slice(&make_commit(2, 0, 0));

        let mut stream = JournalStream::new(Cursor::new(journal)).unwrap();
        assert!(stream.next_block().unwrap().is_some());
        // max_len reached: no further reads even though data remains.
        assert!(stream.next_block().unwrap().is_none());
        assert!(stream.next_block().unwrap().is_none());
    }

    #[test]
    fn truncated_journal_block_is_short_read() {
        let mut journal = make_superblock(64, 0);
        journal.extend_from_slice(&[0_u8; 100]); // partial block

        let mut stream = JournalStream::new(Cursor::new(journal)).unwrap();
        assert!(matches!(
            stream.next_block().unwrap_err(),
            SfsError::ShortRead { .. }
        ));
    }
}
