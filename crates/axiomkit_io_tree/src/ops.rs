//! Directory operations on whole trees.
//!
//! Every operation exists for the host filesystem and, with an `_in` (or
//! `_between`) suffix, for any [`FileSystem`]. Each one builds the matching
//! visitor, drives one walk and returns the resulting [`PathCounters`].

use std::io;
use std::path::{Path, PathBuf};

use num_bigint::BigUint;

use crate::equality;
use crate::fs::{FileSystem, SpecEntryAttributes};
use crate::local::LocalFs;
use crate::report::PathCounters;
use crate::spec::{SpecCopyOptions, SpecDeleteOptions, SpecWalkOptions, TreeError};
use crate::util::{is_overlap, remove_entry};
use crate::visitor::{CleaningVisitor, CopyingVisitor, CountingVisitor, DeletingVisitor};
use crate::walk::{PathVisitor, read_attributes, walk_file_tree};

pub use crate::walk::walk_file_tree as visit_file_tree;

static FS_LOCAL: LocalFs = LocalFs;

fn map_lookup_error(path: &Path, e: io::Error) -> TreeError {
    if e.kind() == io::ErrorKind::NotFound {
        TreeError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        TreeError::io(path, e)
    }
}

fn require_entry(fs: &dyn FileSystem, path: &Path) -> Result<SpecEntryAttributes, TreeError> {
    fs.symlink_metadata(path)
        .map_err(|e| map_lookup_error(path, e))
}

fn require_directory(fs: &dyn FileSystem, path: &Path) -> Result<SpecEntryAttributes, TreeError> {
    let attrs = fs.metadata(path).map_err(|e| map_lookup_error(path, e))?;
    if !attrs.is_dir() {
        return Err(TreeError::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    Ok(attrs)
}

////////////////////////////////////////////////////////////////////////////////
// #region Counting

/// Count directories, files and bytes below `path` with 64-bit counters.
pub fn count_directory(path: &Path) -> Result<PathCounters, TreeError> {
    count_directory_in(&FS_LOCAL, path)
}

/// [`count_directory`] on any provider.
pub fn count_directory_in(fs: &dyn FileSystem, path: &Path) -> Result<PathCounters, TreeError> {
    count_directory_with(
        fs,
        path,
        &SpecWalkOptions::default(),
        CountingVisitor::with_long_counters(),
    )
}

/// Like [`count_directory`], with arbitrary-precision counters.
pub fn count_directory_as_big_integer(path: &Path) -> Result<PathCounters, TreeError> {
    count_directory_as_big_integer_in(&FS_LOCAL, path)
}

/// [`count_directory_as_big_integer`] on any provider.
pub fn count_directory_as_big_integer_in(
    fs: &dyn FileSystem,
    path: &Path,
) -> Result<PathCounters, TreeError> {
    count_directory_with(
        fs,
        path,
        &SpecWalkOptions::default(),
        CountingVisitor::with_big_integer_counters(),
    )
}

/// Count with a caller-configured visitor (counters and filters).
pub fn count_directory_with(
    fs: &dyn FileSystem,
    path: &Path,
    spec_walk: &SpecWalkOptions,
    mut counting: CountingVisitor<'_>,
) -> Result<PathCounters, TreeError> {
    require_entry(fs, path)?;
    walk_file_tree(fs, path, spec_walk, &mut counting)?;
    tracing::debug!(root = %path.display(), counters = %counting, "counted");
    Ok(counting.into_path_counters())
}

/// Total size in bytes of a file, or of every file below a directory.
pub fn size_of(path: &Path) -> Result<u64, TreeError> {
    size_of_in(&FS_LOCAL, path)
}

/// [`size_of`] on any provider.
pub fn size_of_in(fs: &dyn FileSystem, path: &Path) -> Result<u64, TreeError> {
    let attrs = fs.metadata(path).map_err(|e| map_lookup_error(path, e))?;
    if !attrs.is_dir() {
        return Ok(attrs.len);
    }
    let path_counters = count_directory_in(fs, path)?;
    // Long counters saturate instead of overflowing.
    Ok(path_counters.byte_counter().get_long().unwrap_or(u64::MAX))
}

/// Like [`size_of`], without an upper bound.
pub fn size_of_as_big_integer(path: &Path) -> Result<BigUint, TreeError> {
    size_of_as_big_integer_in(&FS_LOCAL, path)
}

/// [`size_of_as_big_integer`] on any provider.
pub fn size_of_as_big_integer_in(fs: &dyn FileSystem, path: &Path) -> Result<BigUint, TreeError> {
    let attrs = fs.metadata(path).map_err(|e| map_lookup_error(path, e))?;
    if !attrs.is_dir() {
        return Ok(BigUint::from(attrs.len));
    }
    let path_counters = count_directory_as_big_integer_in(fs, path)?;
    Ok(path_counters.byte_counter().get_big_integer())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Deleting

/// Delete a file, a link or a whole directory tree.
pub fn delete(path: &Path, spec_delete: &SpecDeleteOptions) -> Result<PathCounters, TreeError> {
    delete_in(&FS_LOCAL, path, spec_delete)
}

/// [`delete`] on any provider.
pub fn delete_in(
    fs: &dyn FileSystem,
    path: &Path,
    spec_delete: &SpecDeleteOptions,
) -> Result<PathCounters, TreeError> {
    if require_entry(fs, path)?.is_dir() {
        delete_directory_in(fs, path, spec_delete)
    } else {
        delete_file_in(fs, path, spec_delete)
    }
}

/// Delete a directory and everything below it.
pub fn delete_directory(
    path: &Path,
    spec_delete: &SpecDeleteOptions,
) -> Result<PathCounters, TreeError> {
    delete_directory_in(&FS_LOCAL, path, spec_delete)
}

/// [`delete_directory`] on any provider.
pub fn delete_directory_in(
    fs: &dyn FileSystem,
    path: &Path,
    spec_delete: &SpecDeleteOptions,
) -> Result<PathCounters, TreeError> {
    let visitor = DeletingVisitor::new(fs, CountingVisitor::with_long_counters(), *spec_delete);
    delete_directory_with(path, visitor)
}

/// Delete with a caller-configured visitor (skip-list, filters, counters).
pub fn delete_directory_with(
    path: &Path,
    mut visitor: DeletingVisitor<'_>,
) -> Result<PathCounters, TreeError> {
    let fs = visitor.fs();
    if !require_entry(fs, path)?.is_dir() {
        return Err(TreeError::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    tracing::debug!(root = %path.display(), "deleting directory");
    walk_file_tree(fs, path, &SpecWalkOptions::default(), &mut visitor)?;
    tracing::debug!(root = %path.display(), counters = %visitor.counting(), "deleted");
    Ok(visitor.into_path_counters())
}

/// Delete one file or link. Directories are refused.
pub fn delete_file(
    path: &Path,
    spec_delete: &SpecDeleteOptions,
) -> Result<PathCounters, TreeError> {
    delete_file_in(&FS_LOCAL, path, spec_delete)
}

/// [`delete_file`] on any provider.
pub fn delete_file_in(
    fs: &dyn FileSystem,
    path: &Path,
    spec_delete: &SpecDeleteOptions,
) -> Result<PathCounters, TreeError> {
    let attrs = require_entry(fs, path)?;
    if attrs.is_dir() {
        return Err(TreeError::IsADirectory {
            path: path.to_path_buf(),
        });
    }
    let mut path_counters = PathCounters::long();
    path_counters.file_counter_mut().increment();
    path_counters.byte_counter_mut().add(attrs.len);
    remove_entry(fs, path, &attrs, spec_delete)?;
    tracing::debug!(path = %path.display(), "deleted file");
    Ok(path_counters)
}

/// Delete every file below `path`, keeping all directories.
pub fn clean_directory(
    path: &Path,
    spec_delete: &SpecDeleteOptions,
) -> Result<PathCounters, TreeError> {
    clean_directory_in(&FS_LOCAL, path, spec_delete)
}

/// [`clean_directory`] on any provider.
pub fn clean_directory_in(
    fs: &dyn FileSystem,
    path: &Path,
    spec_delete: &SpecDeleteOptions,
) -> Result<PathCounters, TreeError> {
    let visitor = CleaningVisitor::new(fs, CountingVisitor::with_long_counters(), *spec_delete);
    clean_directory_with(path, visitor)
}

/// Clean with a caller-configured visitor (skip-list, filters, counters).
pub fn clean_directory_with(
    path: &Path,
    mut visitor: CleaningVisitor<'_>,
) -> Result<PathCounters, TreeError> {
    let fs = visitor.fs();
    if !require_entry(fs, path)?.is_dir() {
        return Err(TreeError::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    walk_file_tree(fs, path, &SpecWalkOptions::default(), &mut visitor)?;
    tracing::debug!(root = %path.display(), counters = %visitor.counting(), "cleaned");
    Ok(visitor.into_path_counters())
}

/// Toggle write protection of a single entry.
pub fn set_read_only(path: &Path, if_read_only: bool) -> Result<(), TreeError> {
    set_read_only_in(&FS_LOCAL, path, if_read_only)
}

/// [`set_read_only`] on any provider.
pub fn set_read_only_in(
    fs: &dyn FileSystem,
    path: &Path,
    if_read_only: bool,
) -> Result<(), TreeError> {
    fs.set_readonly(path, if_read_only)
        .map_err(|e| map_lookup_error(path, e))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Copying

/// Copy the tree below `path_dir_src` to `path_dir_dst`.
pub fn copy_directory(
    path_dir_src: &Path,
    path_dir_dst: &Path,
    spec_cp_options: SpecCopyOptions,
) -> Result<PathCounters, TreeError> {
    copy_directory_between(&FS_LOCAL, path_dir_src, &FS_LOCAL, path_dir_dst, spec_cp_options)
}

/// Copy a tree from one provider to another (or within one).
pub fn copy_directory_between(
    fs_src: &dyn FileSystem,
    path_dir_src: &Path,
    fs_dst: &dyn FileSystem,
    path_dir_dst: &Path,
    spec_cp_options: SpecCopyOptions,
) -> Result<PathCounters, TreeError> {
    let visitor = CopyingVisitor::new(
        CountingVisitor::with_long_counters(),
        fs_src,
        path_dir_src,
        fs_dst,
        path_dir_dst,
        spec_cp_options,
    );
    copy_directory_with(visitor)
}

/// Copy with a caller-configured visitor (filters, counters).
///
/// Within one provider, overlapping roots are rejected with
/// [`TreeError::SourceDestinationOverlap`].
pub fn copy_directory_with(mut visitor: CopyingVisitor<'_>) -> Result<PathCounters, TreeError> {
    let fs_src = visitor.source_fs();
    let path_dir_src = visitor.source_directory().to_path_buf();
    let path_dir_dst = visitor.target_directory().to_path_buf();
    require_directory(fs_src, &path_dir_src)?;
    if visitor.is_same_provider() && is_overlap(fs_src, &path_dir_src, &path_dir_dst) {
        return Err(TreeError::SourceDestinationOverlap {
            path_src: path_dir_src,
            path_dst: path_dir_dst,
        });
    }

    tracing::debug!(
        src = %path_dir_src.display(),
        dst = %path_dir_dst.display(),
        "copying directory"
    );
    let spec_walk = visitor.copy_options().to_walk_options();
    walk_file_tree(fs_src, &path_dir_src, &spec_walk, &mut visitor)?;
    tracing::debug!(src = %path_dir_src.display(), counters = %visitor.counting(), "copied");
    Ok(visitor.into_path_counters())
}

/// Copy one file into `path_dir_dst`, keeping its name; returns the new path,
/// or `None` when the copy options skip the entry.
pub fn copy_file_to_directory(
    path_file_src: &Path,
    path_dir_dst: &Path,
    spec_cp_options: SpecCopyOptions,
) -> Result<Option<PathBuf>, TreeError> {
    copy_file_to_directory_between(
        &FS_LOCAL,
        path_file_src,
        &FS_LOCAL,
        path_dir_dst,
        spec_cp_options,
    )
}

/// [`copy_file_to_directory`] between any two providers.
pub fn copy_file_to_directory_between(
    fs_src: &dyn FileSystem,
    path_file_src: &Path,
    fs_dst: &dyn FileSystem,
    path_dir_dst: &Path,
    spec_cp_options: SpecCopyOptions,
) -> Result<Option<PathBuf>, TreeError> {
    let b_follow = spec_cp_options.to_walk_options().if_follow_links;
    let attrs = read_attributes(fs_src, path_file_src, b_follow)
        .map_err(|e| map_lookup_error(path_file_src, e))?;
    if attrs.is_dir() {
        return Err(TreeError::IsADirectory {
            path: path_file_src.to_path_buf(),
        });
    }
    if path_file_src.file_name().is_none() {
        return Err(TreeError::NotFound {
            path: path_file_src.to_path_buf(),
        });
    }
    let path_dir_src = path_file_src.parent().unwrap_or(Path::new(""));

    let mut visitor = CopyingVisitor::new(
        CountingVisitor::with_long_counters(),
        fs_src,
        path_dir_src,
        fs_dst,
        path_dir_dst,
        spec_cp_options,
    );
    visitor.copy_counted(path_file_src, &attrs)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Inspection

/// Empty directory, or zero-length file.
pub fn is_empty(path: &Path) -> Result<bool, TreeError> {
    is_empty_in(&FS_LOCAL, path)
}

/// [`is_empty`] on any provider.
pub fn is_empty_in(fs: &dyn FileSystem, path: &Path) -> Result<bool, TreeError> {
    let attrs = fs.metadata(path).map_err(|e| map_lookup_error(path, e))?;
    if attrs.is_dir() {
        is_empty_directory_in(fs, path)
    } else {
        Ok(attrs.len == 0)
    }
}

/// Directory without entries; anything else is an error.
pub fn is_empty_directory(path: &Path) -> Result<bool, TreeError> {
    is_empty_directory_in(&FS_LOCAL, path)
}

/// [`is_empty_directory`] on any provider.
pub fn is_empty_directory_in(fs: &dyn FileSystem, path: &Path) -> Result<bool, TreeError> {
    require_directory(fs, path)?;
    let l_names = fs.read_dir(path).map_err(|e| TreeError::io(path, e))?;
    Ok(l_names.is_empty())
}

/// Zero-length file; a directory is refused.
pub fn is_empty_file(path: &Path) -> Result<bool, TreeError> {
    is_empty_file_in(&FS_LOCAL, path)
}

/// [`is_empty_file`] on any provider.
pub fn is_empty_file_in(fs: &dyn FileSystem, path: &Path) -> Result<bool, TreeError> {
    let attrs = fs.metadata(path).map_err(|e| map_lookup_error(path, e))?;
    if attrs.is_dir() {
        return Err(TreeError::IsADirectory {
            path: path.to_path_buf(),
        });
    }
    Ok(attrs.len == 0)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Equality

/// See [`equality::file_content_equals`].
pub fn file_content_equals(
    path_a: Option<&Path>,
    path_b: Option<&Path>,
) -> Result<bool, TreeError> {
    equality::file_content_equals(&FS_LOCAL, path_a, &FS_LOCAL, path_b)
}

/// See [`equality::directory_content_equals`].
pub fn directory_content_equals(
    path_a: Option<&Path>,
    path_b: Option<&Path>,
) -> Result<bool, TreeError> {
    equality::directory_content_equals(&FS_LOCAL, path_a, &FS_LOCAL, path_b)
}

/// See [`equality::directory_and_file_content_equals`].
pub fn directory_and_file_content_equals(
    path_a: Option<&Path>,
    path_b: Option<&Path>,
) -> Result<bool, TreeError> {
    equality::directory_and_file_content_equals(&FS_LOCAL, path_a, &FS_LOCAL, path_b)
}

/// Walk with any visitor on the host filesystem.
pub fn walk_local<V: PathVisitor + ?Sized>(
    path_start: &Path,
    spec_walk: &SpecWalkOptions,
    visitor: &mut V,
) -> Result<(), TreeError> {
    walk_file_tree(&FS_LOCAL, path_start, spec_walk, visitor).map(|_| ())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::path::Path;

    use num_bigint::BigUint;

    use super::{
        clean_directory_in, copy_directory_between, copy_file_to_directory_between,
        count_directory_as_big_integer_in, count_directory_in, delete_directory_in,
        delete_file_in, delete_in, is_empty_directory_in, is_empty_file_in, is_empty_in,
        set_read_only_in, size_of_as_big_integer_in, size_of_in,
    };
    use crate::fs::FileSystem;
    use crate::memory::MemoryFs;
    use crate::spec::{EnumCopySymlinkStrategy, SpecCopyOptions, SpecDeleteOptions, TreeError};

    fn sample_tree() -> MemoryFs {
        let fs_mem = MemoryFs::new();
        fs_mem.write(Path::new("/r/a/1.txt"), b"1").expect("write");
        fs_mem.write(Path::new("/r/b/2.txt"), b"2").expect("write");
        fs_mem
    }

    #[test]
    fn count_and_size() {
        let fs_mem = sample_tree();
        let path_counters = count_directory_in(&fs_mem, Path::new("/r")).expect("count");
        assert_eq!(path_counters.to_dict()["cnt_directories"], 3);
        assert_eq!(
            count_directory_as_big_integer_in(&fs_mem, Path::new("/r")).expect("count"),
            path_counters
        );
        assert_eq!(size_of_in(&fs_mem, Path::new("/r")).expect("size"), 2);
        assert_eq!(size_of_in(&fs_mem, Path::new("/r/a/1.txt")).expect("size"), 1);
        assert_eq!(
            size_of_as_big_integer_in(&fs_mem, Path::new("/r")).expect("size"),
            BigUint::from(2u32)
        );

        let err = count_directory_in(&fs_mem, Path::new("/missing")).expect_err("missing");
        assert!(matches!(err, TreeError::NotFound { .. }));
    }

    #[test]
    fn delete_dispatch_and_misuse() {
        let fs_mem = sample_tree();
        let spec_delete = SpecDeleteOptions::default();

        let err = delete_file_in(&fs_mem, Path::new("/r/a"), &spec_delete).expect_err("dir");
        assert!(matches!(err, TreeError::IsADirectory { .. }));
        let err = delete_file_in(&fs_mem, Path::new("/r/nope"), &spec_delete).expect_err("gone");
        assert!(matches!(err, TreeError::NotFound { .. }));
        let err =
            delete_directory_in(&fs_mem, Path::new("/r/a/1.txt"), &spec_delete).expect_err("file");
        assert!(matches!(err, TreeError::NotADirectory { .. }));

        let path_counters =
            delete_in(&fs_mem, Path::new("/r/a/1.txt"), &spec_delete).expect("file");
        assert_eq!(path_counters.file_counter().get_long(), Some(1));
        assert_eq!(path_counters.byte_counter().get_long(), Some(1));

        let path_counters = delete_in(&fs_mem, Path::new("/r"), &spec_delete).expect("tree");
        assert_eq!(path_counters.directory_counter().get_long(), Some(3));
        assert_eq!(path_counters.file_counter().get_long(), Some(1));
        assert!(!fs_mem.try_exists(Path::new("/r")).expect("exists"));
    }

    #[test]
    fn clean_keeps_root() {
        let fs_mem = sample_tree();
        clean_directory_in(&fs_mem, Path::new("/r"), &SpecDeleteOptions::default())
            .expect("clean");
        assert!(is_empty_directory_in(&fs_mem, Path::new("/r/a")).expect("empty"));
        assert!(!is_empty_in(&fs_mem, Path::new("/r")).expect("not empty"));
    }

    #[test]
    fn emptiness_checks() {
        let fs_mem = sample_tree();
        fs_mem.write(Path::new("/r/zero"), b"").expect("write");
        assert!(is_empty_file_in(&fs_mem, Path::new("/r/zero")).expect("empty"));
        assert!(!is_empty_file_in(&fs_mem, Path::new("/r/a/1.txt")).expect("not empty"));
        let err = is_empty_file_in(&fs_mem, Path::new("/r")).expect_err("dir");
        assert!(matches!(err, TreeError::IsADirectory { .. }));
        let err = is_empty_directory_in(&fs_mem, Path::new("/r/zero")).expect_err("file");
        assert!(matches!(err, TreeError::NotADirectory { .. }));
    }

    #[test]
    fn set_read_only_toggles_and_reports_missing() {
        let fs_mem = sample_tree();
        let path_file = Path::new("/r/a/1.txt");
        set_read_only_in(&fs_mem, path_file, true).expect("ro");
        assert!(fs_mem.metadata(path_file).expect("meta").if_read_only);
        set_read_only_in(&fs_mem, path_file, false).expect("rw");
        assert!(!fs_mem.metadata(path_file).expect("meta").if_read_only);

        let err = set_read_only_in(&fs_mem, Path::new("/r/nope"), true).expect_err("missing");
        assert!(matches!(err, TreeError::NotFound { .. }));
    }

    #[test]
    fn copy_rejects_overlap_within_one_provider() {
        let fs_mem = sample_tree();
        let err = copy_directory_between(
            &fs_mem,
            Path::new("/r"),
            &fs_mem,
            Path::new("/r/a/inner"),
            SpecCopyOptions::default(),
        )
        .expect_err("overlap");
        assert!(matches!(err, TreeError::SourceDestinationOverlap { .. }));

        // Same paths on another provider do not overlap.
        let fs_other = MemoryFs::new();
        copy_directory_between(
            &fs_mem,
            Path::new("/r"),
            &fs_other,
            Path::new("/r/a/inner"),
            SpecCopyOptions::default(),
        )
        .expect("copy");
        assert_eq!(
            fs_other.read(Path::new("/r/a/inner/b/2.txt")).expect("read"),
            b"2"
        );
    }

    #[test]
    fn copy_single_file_into_directory() {
        let fs_mem = sample_tree();
        let path_new = copy_file_to_directory_between(
            &fs_mem,
            Path::new("/r/a/1.txt"),
            &fs_mem,
            Path::new("/out"),
            SpecCopyOptions::default(),
        )
        .expect("copy")
        .expect("copied");
        assert_eq!(path_new, Path::new("/out/1.txt"));
        assert_eq!(fs_mem.read(&path_new).expect("read"), b"1");
    }

    #[test]
    fn copy_single_file_reports_skipped_entries() {
        let fs_mem = sample_tree();
        fs_mem
            .symlink(Path::new("/r/a/1.txt"), Path::new("/r/link"), false)
            .expect("symlink");
        fs_mem
            .symlink(Path::new("/r/none"), Path::new("/r/dangling"), false)
            .expect("symlink");

        let spec_skip_links = SpecCopyOptions {
            rule_symlink: EnumCopySymlinkStrategy::SkipSymlinks,
            ..SpecCopyOptions::default()
        };
        let path_new = copy_file_to_directory_between(
            &fs_mem,
            Path::new("/r/link"),
            &fs_mem,
            Path::new("/out"),
            spec_skip_links,
        )
        .expect("copy");
        assert_eq!(path_new, None);
        assert!(!fs_mem.try_exists(Path::new("/out/link")).expect("exists"));

        let spec_skip_broken = SpecCopyOptions {
            if_skip_broken_symlinks: true,
            ..SpecCopyOptions::default()
        };
        let path_new = copy_file_to_directory_between(
            &fs_mem,
            Path::new("/r/dangling"),
            &fs_mem,
            Path::new("/out"),
            spec_skip_broken,
        )
        .expect("copy");
        assert_eq!(path_new, None);
    }
}
