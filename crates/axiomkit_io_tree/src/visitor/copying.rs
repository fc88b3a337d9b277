use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::CountingVisitor;
use crate::fs::{FileSystem, SpecEntryAttributes, apply_attributes, is_same_provider};
use crate::report::PathCounters;
use crate::spec::{
    EnumCopyFileConflictStrategy, EnumCopySymlinkStrategy, EnumVisitResult, SpecCopyOptions,
    TreeError,
};
use crate::util::derive_destination_path;
use crate::walk::PathVisitor;

/// Counts a source tree and recreates it under a target root.
///
/// Source and target may live on different [`FileSystem`] providers. Walk
/// the source with [`SpecCopyOptions::to_walk_options`].
pub struct CopyingVisitor<'a> {
    counting: CountingVisitor<'a>,
    fs_src: &'a dyn FileSystem,
    fs_dst: &'a dyn FileSystem,
    path_dir_src: PathBuf,
    path_dir_dst: PathBuf,
    spec_cp_options: SpecCopyOptions,
}

impl<'a> CopyingVisitor<'a> {
    /// Copy from `path_dir_src` on `fs_src` to `path_dir_dst` on `fs_dst`.
    pub fn new(
        counting: CountingVisitor<'a>,
        fs_src: &'a dyn FileSystem,
        path_dir_src: impl Into<PathBuf>,
        fs_dst: &'a dyn FileSystem,
        path_dir_dst: impl Into<PathBuf>,
        spec_cp_options: SpecCopyOptions,
    ) -> Self {
        Self {
            counting,
            fs_src,
            fs_dst,
            path_dir_src: path_dir_src.into(),
            path_dir_dst: path_dir_dst.into(),
            spec_cp_options,
        }
    }

    /// The wrapped counting visitor.
    pub fn counting(&self) -> &CountingVisitor<'a> {
        &self.counting
    }

    /// Counts of the source entries copied.
    pub fn path_counters(&self) -> &PathCounters {
        self.counting.path_counters()
    }

    /// Consume the visitor, keeping its counts.
    pub fn into_path_counters(self) -> PathCounters {
        self.counting.into_path_counters()
    }

    /// Root of the source tree.
    pub fn source_directory(&self) -> &Path {
        &self.path_dir_src
    }

    /// Root the source tree is recreated under.
    pub fn target_directory(&self) -> &Path {
        &self.path_dir_dst
    }

    /// Options this copy runs with.
    pub fn copy_options(&self) -> &SpecCopyOptions {
        &self.spec_cp_options
    }

    pub(crate) fn source_fs(&self) -> &'a dyn FileSystem {
        self.fs_src
    }

    /// Source and target expose the same storage.
    pub(crate) fn is_same_provider(&self) -> bool {
        is_same_provider(self.fs_src, self.fs_dst)
    }

    fn derive_target(&self, path_src: &Path) -> PathBuf {
        derive_destination_path(path_src, &self.path_dir_src, &self.path_dir_dst)
    }

    fn ensure_parent(&self, path_dst: &Path) -> Result<(), TreeError> {
        match path_dst.parent() {
            Some(path_parent) if !path_parent.as_os_str().is_empty() => self
                .fs_dst
                .create_dir_all(path_parent)
                .map_err(|e| TreeError::io(path_parent, e)),
            _ => Ok(()),
        }
    }

    /// Apply the conflict rule; `Ok(None)` keeps the existing target,
    /// `Ok(Some(b_replace))` proceeds with the copy.
    fn resolve_conflict(&self, path_dst: &Path) -> Result<Option<bool>, TreeError> {
        let attrs_dst = match self.fs_dst.symlink_metadata(path_dst) {
            Ok(v) => v,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Some(false)),
            Err(e) => return Err(TreeError::io(path_dst, e)),
        };
        match self.spec_cp_options.rule_conflict_file {
            EnumCopyFileConflictStrategy::Error => Err(TreeError::DestinationExists {
                path: path_dst.to_path_buf(),
            }),
            EnumCopyFileConflictStrategy::Skip => {
                tracing::trace!(path = %path_dst.display(), "target exists; kept");
                Ok(None)
            }
            EnumCopyFileConflictStrategy::Overwrite => {
                if attrs_dst.is_dir() {
                    return Err(TreeError::IsADirectory {
                        path: path_dst.to_path_buf(),
                    });
                }
                if attrs_dst.is_symlink() {
                    // Replace the link, not the file it points to.
                    self.fs_dst
                        .remove_file(path_dst)
                        .map_err(|e| TreeError::io(path_dst, e))?;
                    return Ok(Some(false));
                }
                Ok(Some(true))
            }
        }
    }

    fn copy_regular_file(
        &self,
        path_src: &Path,
        path_dst: &Path,
        attrs_src: &SpecEntryAttributes,
        b_replace: bool,
    ) -> Result<(), TreeError> {
        let b_copy_attributes = self.spec_cp_options.if_copy_attributes;
        if self.is_same_provider() {
            self.fs_src
                .copy_file(path_src, path_dst, b_replace, b_copy_attributes)
                .map_err(|e| TreeError::io(path_src, e))?;
            return Ok(());
        }

        {
            let mut reader = self
                .fs_src
                .open_read(path_src)
                .map_err(|e| TreeError::io(path_src, e))?;
            let mut writer = self
                .fs_dst
                .create_file(path_dst, b_replace)
                .map_err(|e| TreeError::io(path_dst, e))?;
            io::copy(&mut reader, &mut writer).map_err(|e| TreeError::io(path_dst, e))?;
            writer.flush().map_err(|e| TreeError::io(path_dst, e))?;
        }
        if b_copy_attributes {
            apply_attributes(self.fs_dst, path_dst, attrs_src)
                .map_err(|e| TreeError::io(path_dst, e))?;
        }
        Ok(())
    }

    fn copy_symlink(&self, path_src: &Path, path_dst: &Path) -> Result<(), TreeError> {
        let path_target = self
            .fs_src
            .read_link(path_src)
            .map_err(|e| TreeError::io(path_src, e))?;
        let b_target_is_dir = self
            .fs_src
            .metadata(path_src)
            .is_ok_and(|attrs| attrs.is_dir());
        self.fs_dst
            .symlink(&path_target, path_dst, b_target_is_dir)
            .map_err(|e| TreeError::io(path_dst, e))
    }

    /// Copy one non-directory entry. `Ok(false)` means the entry is ignored
    /// and must not be counted.
    fn copy_entry(&self, path_src: &Path, attrs: &SpecEntryAttributes) -> Result<bool, TreeError> {
        let path_dst = self.derive_target(path_src);

        if attrs.is_symlink() {
            match self.spec_cp_options.rule_symlink {
                EnumCopySymlinkStrategy::SkipSymlinks => {
                    tracing::trace!(path = %path_src.display(), "symlink skipped");
                    return Ok(false);
                }
                // Links reach this point under `Dereference` only when dangling.
                EnumCopySymlinkStrategy::Dereference => {
                    if self.spec_cp_options.if_skip_broken_symlinks {
                        tracing::debug!(path = %path_src.display(), "broken symlink skipped");
                        return Ok(false);
                    }
                    return Err(TreeError::BrokenSymlink {
                        path: path_src.to_path_buf(),
                    });
                }
                EnumCopySymlinkStrategy::CopySymlinks => {
                    self.ensure_parent(&path_dst)?;
                    if self.resolve_conflict(&path_dst)?.is_some() {
                        self.copy_symlink(path_src, &path_dst)?;
                        tracing::trace!(
                            src = %path_src.display(),
                            dst = %path_dst.display(),
                            "symlink copied"
                        );
                    }
                    return Ok(true);
                }
            }
        }

        if attrs.is_other() {
            tracing::warn!(path = %path_src.display(), "special file not copied");
            return Ok(true);
        }

        self.ensure_parent(&path_dst)?;
        if let Some(b_replace) = self.resolve_conflict(&path_dst)? {
            self.copy_regular_file(path_src, &path_dst, attrs, b_replace)?;
            tracing::trace!(src = %path_src.display(), dst = %path_dst.display(), "file copied");
        }
        Ok(true)
    }
}

impl CopyingVisitor<'_> {
    /// Copy and count one accepted non-directory entry; returns its target
    /// path, or `None` when the entry was filtered out or skipped.
    pub(crate) fn copy_counted(
        &mut self,
        file: &Path,
        attrs: &SpecEntryAttributes,
    ) -> Result<Option<PathBuf>, TreeError> {
        if !self.counting.accept_file(file, attrs) || !self.copy_entry(file, attrs)? {
            return Ok(None);
        }
        self.counting.visit_file(file, attrs)?;
        Ok(Some(self.derive_target(file)))
    }
}

impl PathVisitor for CopyingVisitor<'_> {
    fn pre_visit_directory(
        &mut self,
        dir: &Path,
        attrs: &SpecEntryAttributes,
    ) -> Result<EnumVisitResult, TreeError> {
        if self.counting.accept_dir(dir, attrs) {
            let path_dst = self.derive_target(dir);
            self.fs_dst
                .create_dir_all(&path_dst)
                .map_err(|e| TreeError::io(&path_dst, e))?;
        }
        self.counting.pre_visit_directory(dir, attrs)
    }

    fn visit_file(
        &mut self,
        file: &Path,
        attrs: &SpecEntryAttributes,
    ) -> Result<EnumVisitResult, TreeError> {
        self.copy_counted(file, attrs)?;
        Ok(EnumVisitResult::Continue)
    }

    fn visit_file_failed(
        &mut self,
        path: &Path,
        error: TreeError,
    ) -> Result<EnumVisitResult, TreeError> {
        self.counting.visit_file_failed(path, error)
    }
}

impl PartialEq for CopyingVisitor<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.counting == other.counting
            && self.path_dir_src == other.path_dir_src
            && self.path_dir_dst == other.path_dir_dst
            && self.spec_cp_options == other.spec_cp_options
    }
}

impl Eq for CopyingVisitor<'_> {}

impl Hash for CopyingVisitor<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.counting.hash(state);
        self.path_dir_src.hash(state);
        self.path_dir_dst.hash(state);
        self.spec_cp_options.hash(state);
    }
}

impl fmt::Debug for CopyingVisitor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopyingVisitor")
            .field("counting", &self.counting)
            .field("path_dir_src", &self.path_dir_src)
            .field("path_dir_dst", &self.path_dir_dst)
            .field("spec_cp_options", &self.spec_cp_options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    use std::path::Path;

    use super::CopyingVisitor;
    use crate::fs::FileSystem;
    use crate::memory::MemoryFs;
    use crate::spec::{
        EnumCopyFileConflictStrategy, EnumCopySymlinkStrategy, SpecCopyOptions, TreeError,
    };
    use crate::visitor::CountingVisitor;
    use crate::walk::walk_file_tree;

    fn sample_tree() -> MemoryFs {
        let fs_mem = MemoryFs::new();
        fs_mem.write(Path::new("/src/a/1.txt"), b"1").expect("write");
        fs_mem.write(Path::new("/src/b/2.txt"), b"22").expect("write");
        fs_mem.create_dir_all(Path::new("/src/empty")).expect("mkdir");
        fs_mem
    }

    #[test]
    fn copies_structure_and_bytes_across_providers() {
        let fs_src = sample_tree();
        let fs_dst = MemoryFs::new();
        let spec_cp_options = SpecCopyOptions::default();
        let mut visitor = CopyingVisitor::new(
            CountingVisitor::default(),
            &fs_src,
            "/src",
            &fs_dst,
            "/dst",
            spec_cp_options,
        );
        walk_file_tree(
            &fs_src,
            Path::new("/src"),
            &spec_cp_options.to_walk_options(),
            &mut visitor,
        )
        .expect("copy");

        assert_eq!(fs_dst.read(Path::new("/dst/a/1.txt")).expect("read"), b"1");
        assert_eq!(fs_dst.read(Path::new("/dst/b/2.txt")).expect("read"), b"22");
        assert!(fs_dst.metadata(Path::new("/dst/empty")).expect("meta").is_dir());

        let path_counters = visitor.path_counters();
        assert_eq!(path_counters.directory_counter().get_long(), Some(4));
        assert_eq!(path_counters.file_counter().get_long(), Some(2));
        assert_eq!(path_counters.byte_counter().get_long(), Some(3));
    }

    #[test]
    fn conflict_rules() {
        let fs_src = sample_tree();
        let fs_dst = MemoryFs::new();
        fs_dst.write(Path::new("/dst/a/1.txt"), b"old").expect("write");

        let run = |rule_conflict_file| {
            let spec_cp_options = SpecCopyOptions {
                rule_conflict_file,
                ..SpecCopyOptions::default()
            };
            let mut visitor = CopyingVisitor::new(
                CountingVisitor::default(),
                &fs_src,
                "/src",
                &fs_dst,
                "/dst",
                spec_cp_options,
            );
            walk_file_tree(
                &fs_src,
                Path::new("/src"),
                &spec_cp_options.to_walk_options(),
                &mut visitor,
            )
            .map(|_| visitor.into_path_counters())
        };

        let err = run(EnumCopyFileConflictStrategy::Error).expect_err("exists");
        assert!(matches!(err, TreeError::DestinationExists { .. }));

        let path_counters = run(EnumCopyFileConflictStrategy::Skip).expect("skip");
        assert_eq!(path_counters.file_counter().get_long(), Some(2));
        assert_eq!(fs_dst.read(Path::new("/dst/a/1.txt")).expect("read"), b"old");

        run(EnumCopyFileConflictStrategy::Overwrite).expect("overwrite");
        assert_eq!(fs_dst.read(Path::new("/dst/a/1.txt")).expect("read"), b"1");
    }

    #[test]
    fn symlink_strategies() {
        let fs_src = sample_tree();
        fs_src
            .symlink(Path::new("/src/a/1.txt"), Path::new("/src/link.txt"), false)
            .expect("symlink");

        let run = |rule_symlink| {
            let fs_dst = MemoryFs::new();
            let spec_cp_options = SpecCopyOptions {
                rule_symlink,
                ..SpecCopyOptions::default()
            };
            let mut visitor = CopyingVisitor::new(
                CountingVisitor::default(),
                &fs_src,
                "/src",
                &fs_dst,
                "/dst",
                spec_cp_options,
            );
            walk_file_tree(
                &fs_src,
                Path::new("/src"),
                &spec_cp_options.to_walk_options(),
                &mut visitor,
            )
            .expect("copy");
            let n_files = visitor.into_path_counters().file_counter().get_long();
            (fs_dst, n_files)
        };

        let (fs_dst, n_files) = run(EnumCopySymlinkStrategy::Dereference);
        assert_eq!(n_files, Some(3));
        let attrs = fs_dst.symlink_metadata(Path::new("/dst/link.txt")).expect("meta");
        assert!(attrs.is_file());

        let (fs_dst, n_files) = run(EnumCopySymlinkStrategy::CopySymlinks);
        assert_eq!(n_files, Some(3));
        assert_eq!(
            fs_dst.read_link(Path::new("/dst/link.txt")).expect("link"),
            Path::new("/src/a/1.txt")
        );

        let (fs_dst, n_files) = run(EnumCopySymlinkStrategy::SkipSymlinks);
        assert_eq!(n_files, Some(2));
        assert!(!fs_dst.try_exists(Path::new("/dst/link.txt")).expect("exists"));
    }

    #[test]
    fn broken_symlink_fails_unless_skipped() {
        let fs_src = sample_tree();
        fs_src
            .symlink(Path::new("/src/missing"), Path::new("/src/dangling"), false)
            .expect("symlink");
        let fs_dst = MemoryFs::new();

        let spec_cp_options = SpecCopyOptions::default();
        let mut visitor = CopyingVisitor::new(
            CountingVisitor::default(),
            &fs_src,
            "/src",
            &fs_dst,
            "/dst",
            spec_cp_options,
        );
        let err = walk_file_tree(
            &fs_src,
            Path::new("/src"),
            &spec_cp_options.to_walk_options(),
            &mut visitor,
        )
        .expect_err("broken");
        assert!(matches!(err, TreeError::BrokenSymlink { .. }));

        let spec_cp_options = SpecCopyOptions {
            if_skip_broken_symlinks: true,
            rule_conflict_file: EnumCopyFileConflictStrategy::Overwrite,
            ..SpecCopyOptions::default()
        };
        let mut visitor = CopyingVisitor::new(
            CountingVisitor::default(),
            &fs_src,
            "/src",
            &fs_dst,
            "/dst",
            spec_cp_options,
        );
        walk_file_tree(
            &fs_src,
            Path::new("/src"),
            &spec_cp_options.to_walk_options(),
            &mut visitor,
        )
        .expect("skipped");
        assert_eq!(visitor.path_counters().file_counter().get_long(), Some(2));
        assert!(
            fs_dst
                .symlink_metadata(Path::new("/dst/dangling"))
                .is_err()
        );
    }

    #[test]
    fn copy_attributes_carries_mtime_and_read_only() {
        let fs_src = sample_tree();
        let time_modified = std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000);
        fs_src
            .set_modified(Path::new("/src/a/1.txt"), time_modified)
            .expect("mtime");
        fs_src
            .set_readonly(Path::new("/src/a/1.txt"), true)
            .expect("ro");
        let fs_dst = MemoryFs::new();

        let spec_cp_options = SpecCopyOptions {
            if_copy_attributes: true,
            ..SpecCopyOptions::default()
        };
        let mut visitor = CopyingVisitor::new(
            CountingVisitor::default(),
            &fs_src,
            "/src",
            &fs_dst,
            "/dst",
            spec_cp_options,
        );
        walk_file_tree(
            &fs_src,
            Path::new("/src"),
            &spec_cp_options.to_walk_options(),
            &mut visitor,
        )
        .expect("copy");

        let attrs = fs_dst.metadata(Path::new("/dst/a/1.txt")).expect("meta");
        assert_eq!(attrs.modified, Some(time_modified));
        assert!(attrs.if_read_only);
    }

    fn hash_of(visitor: &CopyingVisitor<'_>) -> u64 {
        let mut hasher = DefaultHasher::new();
        visitor.hash(&mut hasher);
        hasher.finish()
    }

    fn visitor_between<'a>(
        fs_src: &'a MemoryFs,
        fs_dst: &'a MemoryFs,
        path_dst: &str,
        spec_cp_options: SpecCopyOptions,
    ) -> CopyingVisitor<'a> {
        CopyingVisitor::new(
            CountingVisitor::default(),
            fs_src,
            "/src",
            fs_dst,
            path_dst,
            spec_cp_options,
        )
    }

    #[test]
    fn equality_and_hash_cover_roots_and_options() {
        let fs_src = sample_tree();
        let fs_dst = MemoryFs::new();
        let spec_cp_options = SpecCopyOptions::default();
        let build = |path_dst: &str, spec: SpecCopyOptions| {
            visitor_between(&fs_src, &fs_dst, path_dst, spec)
        };

        let visitor_a = build("/dst", spec_cp_options);
        let visitor_b = build("/dst", spec_cp_options);
        assert_eq!(visitor_a, visitor_b);
        assert_eq!(hash_of(&visitor_a), hash_of(&visitor_b));

        assert_ne!(visitor_a, build("/other", spec_cp_options));
        let spec_overwrite = SpecCopyOptions {
            rule_conflict_file: EnumCopyFileConflictStrategy::Overwrite,
            ..spec_cp_options
        };
        assert_ne!(visitor_a, build("/dst", spec_overwrite));
    }
}
