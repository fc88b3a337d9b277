use std::collections::HashSet;
use std::ffi::OsString;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};

use crate::fs::{FileSystem, SpecEntryAttributes};
use crate::spec::{SpecDeleteOptions, TreeError};

////////////////////////////////////////////////////////////////////////////////
// #region PathUtilities

/// Map a path under `path_dir_src` to the same relative location under
/// `path_dir_dst`.
///
/// # Examples
/// ```ignore
/// use std::path::Path;
/// let path_dst = derive_destination_path(
///     Path::new("/source/dir/sub/file.txt"),
///     Path::new("/source/dir"),
///     Path::new("/destination/dir"),
/// );
/// assert_eq!(path_dst, Path::new("/destination/dir/sub/file.txt"));
/// ```
pub(crate) fn derive_destination_path(
    path_src: &Path,
    path_dir_src: &Path,
    path_dir_dst: &Path,
) -> PathBuf {
    match path_src.strip_prefix(path_dir_src) {
        Ok(path_rel) if path_rel.as_os_str().is_empty() => path_dir_dst.to_path_buf(),
        Ok(path_rel) => path_dir_dst.join(path_rel),
        Err(_) => path_dir_dst.join(path_src.file_name().unwrap_or_default()),
    }
}

fn _normalize_path(fs: &dyn FileSystem, path: &Path) -> PathBuf {
    if let Ok(resolved) = fs.canonicalize(path) {
        return resolved;
    }
    // Target not created yet: resolve the nearest existing ancestor.
    if let (Some(path_parent), Some(name)) = (path.parent(), path.file_name())
        && !path_parent.as_os_str().is_empty()
    {
        return _normalize_path(fs, path_parent).join(name);
    }
    path.to_path_buf()
}

/// `src` contains `dst` or vice versa, both resolved through `fs`.
pub(crate) fn is_overlap(fs: &dyn FileSystem, src: &Path, dst: &Path) -> bool {
    let src_resolved = _normalize_path(fs, src);
    let dst_resolved = _normalize_path(fs, dst);
    dst_resolved.starts_with(&src_resolved) || src_resolved.starts_with(&dst_resolved)
}

/// Last path segment is listed in `set_names_skip`.
pub(crate) fn is_name_skipped(set_names_skip: &HashSet<OsString>, path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| set_names_skip.contains(name))
}

/// Hash a skip-list independently of set iteration order.
pub(crate) fn hash_names_skip<H: Hasher>(set_names_skip: &HashSet<OsString>, state: &mut H) {
    let mut l_names: Vec<&OsString> = set_names_skip.iter().collect();
    l_names.sort_unstable();
    l_names.hash(state);
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Removal

fn _remove_once(fs: &dyn FileSystem, path: &Path, attrs: &SpecEntryAttributes) -> io::Result<()> {
    let res = if attrs.is_dir() {
        fs.remove_dir(path)
    } else {
        fs.remove_file(path)
    };
    match res {
        // Removed by another actor since it was inspected.
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::trace!(path = %path.display(), "already removed");
            Ok(())
        }
        res => res,
    }
}

/// Remove one file, link or empty directory.
///
/// With `if_override_read_only`, a denied removal clears the write
/// protection of the entry and of its parent directory, then retries once.
/// The parent's protection is restored afterwards. An entry that vanished
/// before it could be removed counts as removed.
pub(crate) fn remove_entry(
    fs: &dyn FileSystem,
    path: &Path,
    attrs: &SpecEntryAttributes,
    spec_delete: &SpecDeleteOptions,
) -> Result<(), TreeError> {
    let err_first = match _remove_once(fs, path, attrs) {
        Ok(()) => {
            tracing::trace!(path = %path.display(), "removed");
            return Ok(());
        }
        Err(e) => e,
    };
    if err_first.kind() != io::ErrorKind::PermissionDenied || !spec_delete.if_override_read_only {
        return Err(TreeError::io(path, err_first));
    }

    tracing::debug!(path = %path.display(), "removal denied; clearing read-only and retrying");
    if !attrs.is_symlink() {
        match fs.set_readonly(path, false) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::trace!(path = %path.display(), "already removed");
                return Ok(());
            }
            Err(e) => return Err(TreeError::io(path, e)),
        }
    }
    let path_parent_locked = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .filter(|p| fs.metadata(p).is_ok_and(|attrs_parent| attrs_parent.if_read_only));
    if let Some(path_parent) = path_parent_locked {
        fs.set_readonly(path_parent, false)
            .map_err(|e| TreeError::io(path_parent, e))?;
    }

    let res_retry = _remove_once(fs, path, attrs);

    if let Some(path_parent) = path_parent_locked
        && let Err(e) = fs.set_readonly(path_parent, true)
    {
        tracing::warn!(
            path = %path_parent.display(),
            error = %e,
            "failed to restore read-only protection"
        );
    }
    res_retry.map_err(|e| TreeError::io(path, e))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
