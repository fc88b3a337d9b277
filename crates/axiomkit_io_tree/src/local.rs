//! [`FileSystem`] backed by the host filesystem.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::fs::{EnumEntryKind, FileKey, FileSystem, SpecEntryAttributes, stream_copy};

const N_PROVIDER_HOST: u64 = 0;

/// The host filesystem via `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    /// Handle to the host filesystem.
    pub fn new() -> Self {
        Self
    }
}

fn derive_attributes(meta: &fs::Metadata) -> SpecEntryAttributes {
    let cfg_file_type = meta.file_type();
    let kind = if cfg_file_type.is_symlink() {
        EnumEntryKind::Symlink
    } else if cfg_file_type.is_dir() {
        EnumEntryKind::Directory
    } else if cfg_file_type.is_file() {
        EnumEntryKind::File
    } else {
        EnumEntryKind::Other
    };

    SpecEntryAttributes {
        kind,
        len: meta.len(),
        if_read_only: meta.permissions().readonly(),
        modified: meta.modified().ok(),
        file_key: derive_file_key(meta),
    }
}

#[cfg(unix)]
fn derive_file_key(meta: &fs::Metadata) -> Option<FileKey> {
    use std::os::unix::fs::MetadataExt;
    Some(FileKey {
        device: meta.dev(),
        node: meta.ino(),
    })
}

#[cfg(not(unix))]
fn derive_file_key(_meta: &fs::Metadata) -> Option<FileKey> {
    None
}

impl FileSystem for LocalFs {
    fn provider_id(&self) -> u64 {
        N_PROVIDER_HOST
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<OsString>> {
        let mut l_names = Vec::new();
        for entry in fs::read_dir(path)? {
            l_names.push(entry?.file_name());
        }
        Ok(l_names)
    }

    fn metadata(&self, path: &Path) -> io::Result<SpecEntryAttributes> {
        fs::metadata(path).map(|meta| derive_attributes(&meta))
    }

    fn symlink_metadata(&self, path: &Path) -> io::Result<SpecEntryAttributes> {
        fs::symlink_metadata(path).map(|meta| derive_attributes(&meta))
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }

    fn open_read<'a>(&'a self, path: &Path) -> io::Result<Box<dyn Read + 'a>> {
        Ok(Box::new(io::BufReader::new(fs::File::open(path)?)))
    }

    fn create_file<'a>(&'a self, path: &Path, if_replace: bool) -> io::Result<Box<dyn Write + 'a>> {
        let mut cfg_open = fs::OpenOptions::new();
        cfg_open.write(true);
        if if_replace {
            cfg_open.create(true).truncate(true);
        } else {
            cfg_open.create_new(true);
        }
        Ok(Box::new(io::BufWriter::new(cfg_open.open(path)?)))
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }

    fn set_readonly(&self, path: &Path, if_read_only: bool) -> io::Result<()> {
        let mut permissions = fs::metadata(path)?.permissions();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let n_mode = permissions.mode();
            let n_mode_new = if if_read_only {
                n_mode & !0o222
            } else {
                n_mode | 0o200
            };
            permissions.set_mode(n_mode_new);
        }
        #[cfg(not(unix))]
        {
            permissions.set_readonly(if_read_only);
        }
        fs::set_permissions(path, permissions)
    }

    fn set_modified(&self, path: &Path, modified: SystemTime) -> io::Result<()> {
        filetime::set_file_mtime(path, filetime::FileTime::from_system_time(modified))
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        fs::read_link(path)
    }

    fn symlink(&self, target: &Path, link: &Path, if_target_is_dir: bool) -> io::Result<()> {
        #[cfg(unix)]
        {
            let _ = if_target_is_dir;
            std::os::unix::fs::symlink(target, link)
        }
        #[cfg(windows)]
        {
            use std::os::windows::fs::{symlink_dir, symlink_file};
            if if_target_is_dir {
                symlink_dir(target, link)
            } else {
                symlink_file(target, link)
            }
        }
        #[cfg(not(any(unix, windows)))]
        {
            let _ = (target, link, if_target_is_dir);
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "Symbolic links are unsupported on this platform",
            ))
        }
    }

    fn copy_file(
        &self,
        path_file_src: &Path,
        path_file_dst: &Path,
        if_replace: bool,
        if_copy_attributes: bool,
    ) -> io::Result<u64> {
        if !if_replace && fs::symlink_metadata(path_file_dst).is_ok() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("Destination exists: {}", path_file_dst.display()),
            ));
        }
        if !if_copy_attributes {
            // `fs::copy` would carry the source permissions over.
            return stream_copy(self, path_file_src, self, path_file_dst, if_replace);
        }
        let n_bytes = fs::copy(path_file_src, path_file_dst)?;
        apply_metadata(self, path_file_src, path_file_dst)?;
        Ok(n_bytes)
    }
}

fn apply_metadata(
    fs_local: &LocalFs,
    path_file_src: &Path,
    path_file_dst: &Path,
) -> io::Result<()> {
    use filetime::{FileTime, set_file_times};

    let stat_src = fs::metadata(path_file_src)?;
    // `fs::copy` already applied the source mode; a read-only target would
    // refuse the extended attributes.
    fs_local.set_readonly(path_file_dst, false)?;

    let file_time_access = FileTime::from_last_access_time(&stat_src);
    let file_time_modify = FileTime::from_last_modification_time(&stat_src);
    set_file_times(path_file_dst, file_time_access, file_time_modify)?;

    #[cfg(target_os = "linux")]
    copy_xattrs_linux(path_file_src, path_file_dst);

    fs::set_permissions(path_file_dst, stat_src.permissions())?;
    Ok(())
}

#[cfg(target_os = "linux")]
fn copy_xattrs_linux(path_file_src: &Path, path_file_dst: &Path) {
    let iter_xattr_names = match xattr::list(path_file_src) {
        Ok(v) => v,
        Err(_) => return,
    };

    for name in iter_xattr_names {
        let Some(raw_value) = xattr::get(path_file_src, &name).ok().flatten() else {
            continue;
        };
        if let Err(e) = xattr::set(path_file_dst, &name, &raw_value) {
            tracing::debug!(
                path = %path_file_dst.display(),
                error = %e,
                "extended attribute not copied"
            );
        }
    }
}
