use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;

use crate::filter::{AcceptAll, PathFilter};
use crate::fs::SpecEntryAttributes;
use crate::report::PathCounters;
use crate::spec::{EnumVisitResult, TreeError};
use crate::walk::PathVisitor;

/// Counts directories, files and bytes of a walk.
///
/// Filters gate what is counted but never prune descent. Entries that fail
/// to be visited (other than link cycles) are counted as empty directories.
pub struct CountingVisitor<'a> {
    path_counters: PathCounters,
    filter_dirs: Box<dyn PathFilter + 'a>,
    filter_files: Box<dyn PathFilter + 'a>,
}

impl<'a> CountingVisitor<'a> {
    /// Count into `path_counters`, accepting every entry.
    pub fn new(path_counters: PathCounters) -> Self {
        Self {
            path_counters,
            filter_dirs: Box::new(AcceptAll),
            filter_files: Box::new(AcceptAll),
        }
    }

    /// Accept everything, with 64-bit counters.
    pub fn with_long_counters() -> Self {
        Self::new(PathCounters::long())
    }

    /// Accept everything, with arbitrary-precision counters.
    pub fn with_big_integer_counters() -> Self {
        Self::new(PathCounters::big_integer())
    }

    /// Replace the directory filter.
    pub fn with_dir_filter(mut self, filter_dirs: impl PathFilter + 'a) -> Self {
        self.filter_dirs = Box::new(filter_dirs);
        self
    }

    /// Replace the file filter.
    pub fn with_file_filter(mut self, filter_files: impl PathFilter + 'a) -> Self {
        self.filter_files = Box::new(filter_files);
        self
    }

    /// Counts accumulated so far.
    pub fn path_counters(&self) -> &PathCounters {
        &self.path_counters
    }

    /// Mutable access to the accumulated counts.
    pub fn path_counters_mut(&mut self) -> &mut PathCounters {
        &mut self.path_counters
    }

    /// Consume the visitor, keeping its counts.
    pub fn into_path_counters(self) -> PathCounters {
        self.path_counters
    }

    /// Whether the directory filter admits `dir`.
    pub fn accept_dir(&self, dir: &Path, attrs: &SpecEntryAttributes) -> bool {
        self.filter_dirs.accept(dir, attrs)
    }

    /// Whether the file filter admits `file`.
    pub fn accept_file(&self, file: &Path, attrs: &SpecEntryAttributes) -> bool {
        self.filter_files.accept(file, attrs)
    }

    /// Record one failed visit as an empty, inaccessible directory.
    fn count_failed(&mut self, path: &Path, error: &TreeError) {
        tracing::warn!(
            path = %path.display(),
            error = %error,
            "entry not accessible; counted as empty directory"
        );
        self.path_counters.directory_counter_mut().increment();
    }
}

impl Default for CountingVisitor<'_> {
    fn default() -> Self {
        Self::with_long_counters()
    }
}

impl PathVisitor for CountingVisitor<'_> {
    fn pre_visit_directory(
        &mut self,
        dir: &Path,
        attrs: &SpecEntryAttributes,
    ) -> Result<EnumVisitResult, TreeError> {
        if self.accept_dir(dir, attrs) {
            self.path_counters.directory_counter_mut().increment();
        }
        Ok(EnumVisitResult::Continue)
    }

    fn visit_file(
        &mut self,
        file: &Path,
        attrs: &SpecEntryAttributes,
    ) -> Result<EnumVisitResult, TreeError> {
        if self.accept_file(file, attrs) {
            self.path_counters.file_counter_mut().increment();
            self.path_counters.byte_counter_mut().add(attrs.len);
        }
        Ok(EnumVisitResult::Continue)
    }

    fn visit_file_failed(
        &mut self,
        path: &Path,
        error: TreeError,
    ) -> Result<EnumVisitResult, TreeError> {
        if error.is_symlink_cycle() {
            return Err(error);
        }
        self.count_failed(path, &error);
        Ok(EnumVisitResult::Continue)
    }
}

impl PartialEq for CountingVisitor<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.path_counters == other.path_counters
    }
}

impl Eq for CountingVisitor<'_> {}

impl Hash for CountingVisitor<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path_counters.hash(state);
    }
}

impl fmt::Debug for CountingVisitor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountingVisitor")
            .field("path_counters", &self.path_counters)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for CountingVisitor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.path_counters, f)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::CountingVisitor;
    use crate::filter::KindFilter;
    use crate::fs::{EnumEntryKind, FileSystem, SpecEntryAttributes};
    use crate::memory::MemoryFs;
    use crate::spec::SpecWalkOptions;
    use crate::walk::walk_file_tree;

    fn sample_tree() -> MemoryFs {
        let fs_mem = MemoryFs::new();
        fs_mem.write(Path::new("/r/a/1.txt"), b"1").expect("write");
        fs_mem.write(Path::new("/r/b/2.txt"), b"2").expect("write");
        fs_mem
    }

    #[test]
    fn counts_three_dirs_two_files_two_bytes() {
        let fs_mem = sample_tree();
        let mut visitor = CountingVisitor::with_long_counters();
        walk_file_tree(&fs_mem, Path::new("/r"), &SpecWalkOptions::default(), &mut visitor)
            .expect("walk");

        let path_counters = visitor.path_counters();
        assert_eq!(path_counters.directory_counter().get_long(), Some(3));
        assert_eq!(path_counters.file_counter().get_long(), Some(2));
        assert_eq!(path_counters.byte_counter().get_long(), Some(2));
    }

    #[test]
    fn long_and_big_integer_visitors_compare_equal() {
        let fs_mem = sample_tree();
        let spec_walk = SpecWalkOptions::default();
        let mut visitor_long = CountingVisitor::with_long_counters();
        let mut visitor_big = CountingVisitor::with_big_integer_counters();
        walk_file_tree(&fs_mem, Path::new("/r"), &spec_walk, &mut visitor_long).expect("walk");
        walk_file_tree(&fs_mem, Path::new("/r"), &spec_walk, &mut visitor_big).expect("walk");
        assert_eq!(visitor_long, visitor_big);
        assert_ne!(visitor_long, CountingVisitor::default());
    }

    #[test]
    fn filters_gate_counting_but_not_descent() {
        let fs_mem = sample_tree();
        fs_mem.write(Path::new("/r/a/skip.log"), b"xyz").expect("write");

        let mut visitor = CountingVisitor::with_long_counters()
            .with_dir_filter(|dir: &Path, _: &SpecEntryAttributes| dir != Path::new("/r/a"))
            .with_file_filter(|file: &Path, _: &SpecEntryAttributes| {
                file.extension().is_some_and(|ext| ext == "txt")
            });
        walk_file_tree(&fs_mem, Path::new("/r"), &SpecWalkOptions::default(), &mut visitor)
            .expect("walk");

        let path_counters = visitor.path_counters();
        assert_eq!(path_counters.directory_counter().get_long(), Some(2));
        // /r/a/1.txt is still reached below the rejected directory.
        assert_eq!(path_counters.file_counter().get_long(), Some(2));
        assert_eq!(path_counters.byte_counter().get_long(), Some(2));
    }

    #[test]
    fn kind_filter_excludes_links() {
        let fs_mem = sample_tree();
        fs_mem
            .symlink(Path::new("/r/a/1.txt"), Path::new("/r/link"), false)
            .expect("symlink");

        let mut visitor =
            CountingVisitor::with_long_counters().with_file_filter(KindFilter(EnumEntryKind::File));
        walk_file_tree(&fs_mem, Path::new("/r"), &SpecWalkOptions::default(), &mut visitor)
            .expect("walk");
        assert_eq!(visitor.path_counters().file_counter().get_long(), Some(2));
    }

    #[test]
    fn link_cycle_is_fatal_when_following() {
        let fs_mem = sample_tree();
        fs_mem
            .symlink(Path::new("/r"), Path::new("/r/b/loop"), true)
            .expect("symlink");

        let mut visitor = CountingVisitor::default();
        let spec_walk = SpecWalkOptions {
            if_follow_links: true,
            ..SpecWalkOptions::default()
        };
        let err = walk_file_tree(&fs_mem, Path::new("/r"), &spec_walk, &mut visitor)
            .expect_err("cycle");
        assert!(err.is_symlink_cycle());
    }

    #[test]
    fn missing_root_counts_as_one_directory() {
        let fs_mem = MemoryFs::new();
        let mut visitor = CountingVisitor::default();
        walk_file_tree(
            &fs_mem,
            Path::new("/gone"),
            &SpecWalkOptions::default(),
            &mut visitor,
        )
        .expect("tolerated");
        assert_eq!(visitor.path_counters().directory_counter().get_long(), Some(1));
        assert_eq!(visitor.path_counters().file_counter().get_long(), Some(0));
    }
}
