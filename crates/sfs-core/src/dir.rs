//! Directory-entry iteration and the recursive directory walk.

use crate::inode::Inode;
use crate::reader::InodeReader;
use crate::volume::Volume;
use sfs_block::ByteDevice;
use sfs_error::{Result, SfsError};
use sfs_ondisk::{DirEntry, FileType};
use sfs_types::{InodeNumber, ParseError};

/// The typed file type of an entry.
///
/// Unlike [`DirEntry::file_type`], a code outside the known set (such as
/// the 0xDE checksum-tail sentinel) is an error here, not a `None`.
pub fn typed_file_type(entry: &DirEntry) -> Result<FileType> {
    entry.file_type().ok_or(SfsError::InvalidFileType {
        code: entry.file_type_code,
        inode: entry.inode,
    })
}

/// A one-shot forward iterator over the entries of one directory inode.
///
/// Yields every on-disk entry, including `.`, `..`, and (when present) the
/// checksum tail, which decodes like a normal entry with inode 0. Callers
/// needing a restart re-open from the inode.
pub struct DirectoryBrowser<'v, D: ByteDevice> {
    reader: InodeReader<'v, D>,
    size: u64,
    consumed: u64,
}

impl<'v, D: ByteDevice> DirectoryBrowser<'v, D> {
    #[must_use]
    pub fn new(inode: &Inode<'v, D>) -> Self {
        Self {
            reader: inode.reader(),
            size: inode.size(),
            consumed: 0,
        }
    }

    /// Decode the next directory entry, `None` once the inode's data is
    /// fully consumed.
    ///
    /// The entry stream must consume the inode size exactly; a record that
    /// runs past it is `MisalignedDirectory`.
    pub fn next_entry(&mut self) -> Result<Option<DirEntry>> {
        if self.consumed >= self.size {
            return Ok(None);
        }

        let mut head = [0_u8; 6];
        self.reader.read_exact(&mut head)?;
        let inode = u32::from_le_bytes([head[0], head[1], head[2], head[3]]);
        let rec_len = u16::from_le_bytes([head[4], head[5]]);

        // The fixed header alone is 8 bytes (inode, rec_len, name_len, type).
        if rec_len < 8 {
            return Err(SfsError::Parse(ParseError::InvalidField {
                field: "de_rec_len",
                reason: "directory entry rec_len < 8",
            }));
        }

        let mut body = vec![0_u8; usize::from(rec_len) - 6];
        self.reader.read_exact(&mut body)?;

        let name_len = body[0];
        let file_type_code = body[1];
        let name_end = 2 + usize::from(name_len);
        if name_end > body.len() {
            return Err(SfsError::Parse(ParseError::InvalidField {
                field: "de_name_len",
                reason: "name extends past rec_len",
            }));
        }
        let name = body[2..name_end].to_vec();

        self.consumed += u64::from(rec_len);
        if self.consumed > self.size {
            return Err(SfsError::MisalignedDirectory {
                consumed: self.consumed,
                size: self.size,
            });
        }

        Ok(Some(DirEntry {
            inode,
            rec_len,
            name_len,
            file_type_code,
            name,
        }))
    }
}

/// Depth-first pre-order traversal of the directory tree under one inode.
///
/// Yields `(path, entry)` pairs with paths relative to the walk root;
/// `.`/`..` and deleted entries are skipped. Each reachable directory is
/// opened at most once per link to it.
pub struct DirectoryWalk<'v, D: ByteDevice> {
    vol: &'v Volume<D>,
    stack: Vec<(String, DirectoryBrowser<'v, D>)>,
}

impl<'v, D: ByteDevice> DirectoryWalk<'v, D> {
    pub(crate) fn new(vol: &'v Volume<D>, root: InodeNumber) -> Result<Self> {
        let inode = vol.inode(root)?;
        if !inode.record().is_directory() {
            return Err(SfsError::Parse(ParseError::InvalidField {
                field: "inode_number",
                reason: "walk root is not a directory",
            }));
        }
        Ok(Self {
            vol,
            stack: vec![(String::new(), inode.browse())],
        })
    }

    /// The next `(path, entry)` pair, `None` once the tree is exhausted.
    pub fn next_entry(&mut self) -> Result<Option<(String, DirEntry)>> {
        loop {
            let (entry, dir_path) = {
                let Some((path, browser)) = self.stack.last_mut() else {
                    return Ok(None);
                };
                match browser.next_entry()? {
                    Some(entry) => (entry, path.clone()),
                    None => {
                        self.stack.pop();
                        continue;
                    }
                }
            };

            // Deleted entries and the checksum tail carry inode 0.
            if entry.inode == 0 || entry.is_dot() || entry.is_dotdot() {
                continue;
            }

            let full_path = if dir_path.is_empty() {
                entry.name_str()
            } else {
                format!("{dir_path}/{}", entry.name_str())
            };

            if entry.is_directory() {
                let child = self.vol.inode(InodeNumber(entry.inode))?;
                self.stack.push((full_path.clone(), child.browse()));
            }

            return Ok(Some((full_path, entry)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(file_type_code: u8) -> DirEntry {
        DirEntry {
            inode: 12,
            rec_len: 24,
            name_len: 13,
            file_type_code,
            name: b"thejungle.txt".to_vec(),
        }
    }

    #[test]
    fn typed_file_type_accepts_known_codes() {
        assert_eq!(typed_file_type(&entry(1)).unwrap(), FileType::Regular);
        assert_eq!(typed_file_type(&entry(7)).unwrap(), FileType::Symlink);
    }

    #[test]
    fn typed_file_type_rejects_unknown_codes() {
        let err = typed_file_type(&entry(0xDE)).unwrap_err();
        assert!(matches!(
            err,
            SfsError::InvalidFileType {
                code: 0xDE,
                inode: 12
            }
        ));
    }
}
