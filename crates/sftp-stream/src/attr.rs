//! File metadata records.
//!
//! [`RemoteAttr`] is whatever the remote client hands back: every field
//! optional, permission bits under the protocol's own `permissions` name.
//! [`NormalizedStat`] is the canonical record the adapter returns to its
//! caller, with the permission bits renamed to `mode`.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;
const S_IFREG: u32 = 0o100000;
const S_IFLNK: u32 = 0o120000;

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
}

impl FileType {
    /// Derive the type from the S_IFMT bits of a permissions word.
    pub fn from_mode(mode: u32) -> Option<FileType> {
        match mode & S_IFMT {
            S_IFDIR => Some(FileType::Directory),
            S_IFREG => Some(FileType::File),
            S_IFLNK => Some(FileType::Symlink),
            _ => None,
        }
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    /// Returns true if this is a symbolic link.
    pub fn is_symlink(&self) -> bool {
        matches!(self, FileType::Symlink)
    }
}

/// Raw attributes as returned by the remote protocol client.
///
/// SFTP marks every field optional on the wire, so absence here means the
/// server did not send it, not that the adapter dropped it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteAttr {
    pub size: Option<u64>,
    /// Permission bits including the S_IFMT file-type bits, under the
    /// protocol's field name. Renamed to `mode` during normalization.
    pub permissions: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub atime: Option<SystemTime>,
    pub mtime: Option<SystemTime>,
}

impl RemoteAttr {
    /// File type derived from the permission bits, if the server sent any.
    pub fn file_type(&self) -> Option<FileType> {
        self.permissions.and_then(FileType::from_mode)
    }

    /// Returns true if the permission bits mark a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self.file_type(), Some(FileType::Directory))
    }
}

/// Canonical file-metadata record with host-expected field names.
///
/// The permission bits live under `mode` — the remote client reports them
/// as `permissions`, and the rename happens exactly once, here. A path
/// with no remote metadata normalizes to [`NormalizedStat::empty`], never
/// to an absent value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedStat {
    /// Size in bytes.
    pub size: u64,
    /// Permission bits (the remote `permissions` field).
    pub mode: u32,
    /// Owner id.
    pub uid: u32,
    /// Group id.
    pub gid: u32,
    /// Last access time.
    pub atime: Option<SystemTime>,
    /// Last modification time.
    pub mtime: Option<SystemTime>,
}

impl NormalizedStat {
    /// The explicit "no metadata" record.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True for the "no metadata" record.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// File type derived from `mode`, if the type bits are present.
    pub fn file_type(&self) -> Option<FileType> {
        FileType::from_mode(self.mode)
    }

    /// Normalize an optional raw result: absent becomes the empty record.
    pub fn from_remote(attr: Option<RemoteAttr>) -> Self {
        attr.map(Into::into).unwrap_or_else(Self::empty)
    }
}

impl From<RemoteAttr> for NormalizedStat {
    fn from(attr: RemoteAttr) -> Self {
        Self {
            size: attr.size.unwrap_or(0),
            mode: attr.permissions.unwrap_or(0),
            uid: attr.uid.unwrap_or(0),
            gid: attr.gid.unwrap_or(0),
            atime: attr.atime,
            mtime: attr.mtime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_from_mode() {
        assert_eq!(FileType::from_mode(0o100644), Some(FileType::File));
        assert_eq!(FileType::from_mode(0o040755), Some(FileType::Directory));
        assert_eq!(FileType::from_mode(0o120777), Some(FileType::Symlink));
        assert_eq!(FileType::from_mode(0o644), None);
    }

    #[test]
    fn test_permissions_renamed_to_mode() {
        let raw = RemoteAttr {
            size: Some(42),
            permissions: Some(0o100600),
            uid: Some(1000),
            gid: Some(100),
            ..Default::default()
        };
        let stat = NormalizedStat::from(raw);
        assert_eq!(stat.mode, 0o100600);
        assert_eq!(stat.size, 42);
        assert_eq!(stat.uid, 1000);
        assert_eq!(stat.gid, 100);
    }

    #[test]
    fn test_absent_attrs_normalize_to_empty_record() {
        let stat = NormalizedStat::from_remote(None);
        assert!(stat.is_empty());
        assert_eq!(stat.size, 0);
    }
}
