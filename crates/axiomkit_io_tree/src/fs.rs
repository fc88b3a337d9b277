//! Filesystem collaborator contract consumed by the traversal engine.
//!
//! Everything the walker, the visitors and the comparisons need from a
//! storage backend goes through [`FileSystem`]. Paths handed to one
//! implementation are never compared by identity with paths of another.

use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Entry type as reported by a [`FileSystem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumEntryKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link (only reported when the link itself is inspected).
    Symlink,
    /// FIFO, socket, device node and the like.
    Other,
}

/// Stable identity of an entry within one provider (e.g. device + inode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileKey {
    /// Device or volume identifier.
    pub device: u64,
    /// Node identifier within the device.
    pub node: u64,
}

/// Basic attributes of one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecEntryAttributes {
    /// Entry type.
    pub kind: EnumEntryKind,
    /// Size in bytes (link text length for symlinks).
    pub len: u64,
    /// Write protection flag.
    pub if_read_only: bool,
    /// Last modification time when the provider tracks one.
    pub modified: Option<SystemTime>,
    /// Identity used for link-cycle detection; `None` falls back to the
    /// canonical path.
    pub file_key: Option<FileKey>,
}

impl SpecEntryAttributes {
    /// Directory, or a link resolved to one.
    pub fn is_dir(&self) -> bool {
        self.kind == EnumEntryKind::Directory
    }

    /// Regular file, or a link resolved to one.
    pub fn is_file(&self) -> bool {
        self.kind == EnumEntryKind::File
    }

    /// Unresolved symbolic link.
    pub fn is_symlink(&self) -> bool {
        self.kind == EnumEntryKind::Symlink
    }

    /// Device, pipe, socket or another special entry.
    pub fn is_other(&self) -> bool {
        self.kind == EnumEntryKind::Other
    }
}

/// Storage backend operations used by the engine.
///
/// Implementations must report a missing entry with
/// [`io::ErrorKind::NotFound`], a denied removal with
/// [`io::ErrorKind::PermissionDenied`], and an existing target of
/// [`FileSystem::create_file`] without `if_replace` with
/// [`io::ErrorKind::AlreadyExists`].
pub trait FileSystem {
    /// Identity of the storage behind this provider. Two providers with the
    /// same id resolve equal paths to the same entries.
    fn provider_id(&self) -> u64;

    /// Names of the immediate children of a directory, in no particular order.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<OsString>>;

    /// Attributes with symbolic links resolved.
    fn metadata(&self, path: &Path) -> io::Result<SpecEntryAttributes>;

    /// Attributes of the entry itself (links are not resolved).
    fn symlink_metadata(&self, path: &Path) -> io::Result<SpecEntryAttributes>;

    /// Absolute path with every link and `.`/`..` component resolved.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    /// Open a file for streaming reads.
    fn open_read<'a>(&'a self, path: &Path) -> io::Result<Box<dyn Read + 'a>>;

    /// Create (or truncate when `if_replace`) a file for writing.
    fn create_file<'a>(&'a self, path: &Path, if_replace: bool) -> io::Result<Box<dyn Write + 'a>>;

    /// Create one directory; the parent must exist.
    fn create_dir(&self, path: &Path) -> io::Result<()>;

    /// Remove a file or a symbolic link (never its target).
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Remove an empty directory.
    fn remove_dir(&self, path: &Path) -> io::Result<()>;

    /// Toggle write protection.
    fn set_readonly(&self, path: &Path, if_read_only: bool) -> io::Result<()>;

    /// Set the modification time.
    fn set_modified(&self, path: &Path, modified: SystemTime) -> io::Result<()>;

    /// Literal target of a symbolic link.
    fn read_link(&self, path: &Path) -> io::Result<PathBuf>;

    /// Create a symbolic link at `link` pointing to `target`.
    fn symlink(&self, target: &Path, link: &Path, if_target_is_dir: bool) -> io::Result<()>;

    /// Create a directory and any missing ancestors.
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        match self.metadata(path) {
            Ok(attrs) if attrs.is_dir() => return Ok(()),
            Ok(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("Not a directory: {}", path.display()),
                ));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        if let Some(path_parent) = path.parent()
            && !path_parent.as_os_str().is_empty()
        {
            self.create_dir_all(path_parent)?;
        }
        match self.create_dir(path) {
            Err(e)
                if e.kind() == io::ErrorKind::AlreadyExists
                    && self.metadata(path).is_ok_and(|attrs| attrs.is_dir()) =>
            {
                Ok(())
            }
            res => res,
        }
    }

    /// Copy one file within this provider; returns the number of bytes copied.
    ///
    /// The default streams through [`FileSystem::open_read`] and
    /// [`FileSystem::create_file`].
    fn copy_file(
        &self,
        path_file_src: &Path,
        path_file_dst: &Path,
        if_replace: bool,
        if_copy_attributes: bool,
    ) -> io::Result<u64> {
        let n_bytes = stream_copy(self, path_file_src, self, path_file_dst, if_replace)?;
        if if_copy_attributes {
            let attrs_src = self.metadata(path_file_src)?;
            apply_attributes(self, path_file_dst, &attrs_src)?;
        }
        Ok(n_bytes)
    }

    /// `Ok(false)` for a missing entry; links are resolved.
    fn try_exists(&self, path: &Path) -> io::Result<bool> {
        match self.metadata(path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Copy the bytes of one file into a newly created (or truncated) target.
/// The target gets the permissions of a fresh file.
pub(crate) fn stream_copy<S, D>(
    fs_src: &S,
    path_file_src: &Path,
    fs_dst: &D,
    path_file_dst: &Path,
    if_replace: bool,
) -> io::Result<u64>
where
    S: FileSystem + ?Sized,
    D: FileSystem + ?Sized,
{
    let mut reader = fs_src.open_read(path_file_src)?;
    let mut writer = fs_dst.create_file(path_file_dst, if_replace)?;
    let n_bytes = io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    Ok(n_bytes)
}

/// Both providers expose the same storage.
pub(crate) fn is_same_provider(fs_a: &dyn FileSystem, fs_b: &dyn FileSystem) -> bool {
    fs_a.provider_id() == fs_b.provider_id()
}

/// Carry modification time and read-only state over to `path_dst`.
pub(crate) fn apply_attributes<F: FileSystem + ?Sized>(
    fs_dst: &F,
    path_dst: &Path,
    attrs_src: &SpecEntryAttributes,
) -> io::Result<()> {
    if let Some(modified) = attrs_src.modified {
        fs_dst.set_modified(path_dst, modified)?;
    }
    if attrs_src.if_read_only {
        fs_dst.set_readonly(path_dst, true)?;
    }
    Ok(())
}
