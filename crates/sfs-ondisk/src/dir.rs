//! Directory entry records (`ext4_dir_entry_2`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// File type codes carried in directory entries (INCOMPAT_FILETYPE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum FileType {
    Unknown = 0,
    Regular = 1,
    Directory = 2,
    CharacterDevice = 3,
    BlockDevice = 4,
    Fifo = 5,
    Socket = 6,
    Symlink = 7,
}

/// Ordered (code, name) table of file types, for display.
pub const FILE_TYPE_NAMES: &[(u8, &str)] = &[
    (0, "unknown"),
    (1, "regular"),
    (2, "directory"),
    (3, "character device"),
    (4, "block device"),
    (5, "fifo"),
    (6, "socket"),
    (7, "symbolic link"),
];

impl FileType {
    /// Decode a raw file type code, `None` for codes outside the known set
    /// (including the 0xDE checksum-tail sentinel).
    #[must_use]
    pub fn from_raw(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            1 => Some(Self::Regular),
            2 => Some(Self::Directory),
            3 => Some(Self::CharacterDevice),
            4 => Some(Self::BlockDevice),
            5 => Some(Self::Fifo),
            6 => Some(Self::Socket),
            7 => Some(Self::Symlink),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Regular => "regular",
            Self::Directory => "directory",
            Self::CharacterDevice => "character device",
            Self::BlockDevice => "block device",
            Self::Fifo => "fifo",
            Self::Socket => "socket",
            Self::Symlink => "symbolic link",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One decoded directory entry.
///
/// The raw type code is kept as stored; a checksum tail
/// (`ext4_dir_entry_tail`) decodes as a normal entry with inode 0 and type
/// code 0xDE and is surfaced to the caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub inode: u32,
    pub rec_len: u16,
    pub name_len: u8,
    pub file_type_code: u8,
    pub name: Vec<u8>,
}

impl DirEntry {
    /// The entry's type, if the code is in the known set.
    #[must_use]
    pub fn file_type(&self) -> Option<FileType> {
        FileType::from_raw(self.file_type_code)
    }

    /// The name as a UTF-8 string (lossy).
    #[must_use]
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    #[must_use]
    pub fn is_dot(&self) -> bool {
        self.name == b"."
    }

    #[must_use]
    pub fn is_dotdot(&self) -> bool {
        self.name == b".."
    }

    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.file_type_code == FileType::Directory as u8
    }

    #[must_use]
    pub fn is_regular(&self) -> bool {
        self.file_type_code == FileType::Regular as u8
    }

    #[must_use]
    pub fn is_symlink(&self) -> bool {
        self.file_type_code == FileType::Symlink as u8
    }
}

impl fmt::Display for DirEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let type_name = self
            .file_type()
            .map_or("invalid", FileType::name);
        write!(
            f,
            "DirEntry<name=[{}] inode=({}) type=[{}]-({})>",
            self.name_str(),
            self.inode,
            type_name,
            self.file_type_code
        )
    }
}
