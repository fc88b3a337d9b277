use std::collections::HashSet;
use std::ffi::OsString;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;

use super::CountingVisitor;
use crate::fs::{FileSystem, SpecEntryAttributes};
use crate::report::PathCounters;
use crate::spec::{EnumVisitResult, SpecDeleteOptions, TreeError};
use crate::util::{hash_names_skip, is_name_skipped, remove_entry};
use crate::walk::PathVisitor;

/// Counts a tree and deletes its files, leaving every directory in place.
pub struct CleaningVisitor<'a> {
    counting: CountingVisitor<'a>,
    fs: &'a dyn FileSystem,
    spec_delete: SpecDeleteOptions,
    set_names_skip: HashSet<OsString>,
}

impl<'a> CleaningVisitor<'a> {
    /// Clean through `fs`, counting with `counting`.
    pub fn new(
        fs: &'a dyn FileSystem,
        counting: CountingVisitor<'a>,
        spec_delete: SpecDeleteOptions,
    ) -> Self {
        Self {
            counting,
            fs,
            spec_delete,
            set_names_skip: HashSet::new(),
        }
    }

    /// Keep entries whose last path segment is one of `names`.
    pub fn with_skip_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.set_names_skip.extend(names.into_iter().map(Into::into));
        self
    }

    pub(crate) fn fs(&self) -> &'a dyn FileSystem {
        self.fs
    }

    /// The wrapped counting visitor.
    pub fn counting(&self) -> &CountingVisitor<'a> {
        &self.counting
    }

    /// Counts accumulated so far.
    pub fn path_counters(&self) -> &PathCounters {
        self.counting.path_counters()
    }

    /// Consume the visitor, keeping its counts.
    pub fn into_path_counters(self) -> PathCounters {
        self.counting.into_path_counters()
    }
}

impl PathVisitor for CleaningVisitor<'_> {
    fn pre_visit_directory(
        &mut self,
        dir: &Path,
        attrs: &SpecEntryAttributes,
    ) -> Result<EnumVisitResult, TreeError> {
        self.counting.pre_visit_directory(dir, attrs)?;
        if is_name_skipped(&self.set_names_skip, dir) {
            return Ok(EnumVisitResult::SkipSubtree);
        }
        Ok(EnumVisitResult::Continue)
    }

    fn visit_file(
        &mut self,
        file: &Path,
        attrs: &SpecEntryAttributes,
    ) -> Result<EnumVisitResult, TreeError> {
        self.counting.visit_file(file, attrs)?;
        if !is_name_skipped(&self.set_names_skip, file) && self.counting.accept_file(file, attrs) {
            remove_entry(self.fs, file, attrs, &self.spec_delete)?;
        }
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

impl PartialEq for CleaningVisitor<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.counting == other.counting
            && self.spec_delete == other.spec_delete
            && self.set_names_skip == other.set_names_skip
    }
}

impl Eq for CleaningVisitor<'_> {}

impl Hash for CleaningVisitor<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.counting.hash(state);
        self.spec_delete.hash(state);
        hash_names_skip(&self.set_names_skip, state);
    }
}

impl fmt::Debug for CleaningVisitor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleaningVisitor")
            .field("counting", &self.counting)
            .field("spec_delete", &self.spec_delete)
            .field("set_names_skip", &self.set_names_skip)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    use std::path::Path;

    use super::CleaningVisitor;
    use crate::fs::FileSystem;
    use crate::memory::MemoryFs;
    use crate::spec::{SpecDeleteOptions, SpecWalkOptions};
    use crate::visitor::CountingVisitor;
    use crate::walk::{PathVisitor, walk_file_tree};

    #[test]
    fn file_removed_by_another_actor_is_still_counted() {
        let fs_mem = MemoryFs::new();
        let path_file = Path::new("/r/1.txt");
        fs_mem.write(path_file, b"abc").expect("write");
        let attrs = fs_mem.symlink_metadata(path_file).expect("meta");
        fs_mem.remove_file(path_file).expect("remove");

        let mut visitor = CleaningVisitor::new(
            &fs_mem,
            CountingVisitor::default(),
            SpecDeleteOptions::default(),
        );
        visitor.visit_file(path_file, &attrs).expect("tolerated");
        assert_eq!(visitor.path_counters().file_counter().get_long(), Some(1));
        assert_eq!(visitor.path_counters().byte_counter().get_long(), Some(3));
    }

    #[test]
    fn removes_files_and_keeps_directories() {
        let fs_mem = MemoryFs::new();
        fs_mem.write(Path::new("/r/a/1.txt"), b"1").expect("write");
        fs_mem.write(Path::new("/r/b/2.txt"), b"2").expect("write");
        fs_mem.write(Path::new("/r/b/keep.cfg"), b"cfg").expect("write");

        let mut visitor = CleaningVisitor::new(
            &fs_mem,
            CountingVisitor::default(),
            SpecDeleteOptions::default(),
        )
        .with_skip_names(["keep.cfg"]);
        walk_file_tree(&fs_mem, Path::new("/r"), &SpecWalkOptions::default(), &mut visitor)
            .expect("walk");

        assert!(fs_mem.read_dir(Path::new("/r/a")).expect("list").is_empty());
        assert_eq!(fs_mem.read_dir(Path::new("/r/b")).expect("list"), vec!["keep.cfg"]);

        let path_counters = visitor.path_counters();
        assert_eq!(path_counters.directory_counter().get_long(), Some(3));
        assert_eq!(path_counters.file_counter().get_long(), Some(3));
        assert_eq!(path_counters.byte_counter().get_long(), Some(5));
    }

    fn hash_of(visitor: &CleaningVisitor<'_>) -> u64 {
        let mut hasher = DefaultHasher::new();
        visitor.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn equal_visitors_hash_equal_regardless_of_skip_order() {
        let fs_mem = MemoryFs::new();
        let spec_delete = SpecDeleteOptions::default();
        let visitor_ab = CleaningVisitor::new(&fs_mem, CountingVisitor::default(), spec_delete)
            .with_skip_names(["a", "b", "c", "d"]);
        let visitor_ba = CleaningVisitor::new(&fs_mem, CountingVisitor::default(), spec_delete)
            .with_skip_names(["d", "c", "b", "a"]);
        assert_eq!(visitor_ab, visitor_ba);
        assert_eq!(hash_of(&visitor_ab), hash_of(&visitor_ba));

        let visitor_override = CleaningVisitor::new(
            &fs_mem,
            CountingVisitor::default(),
            SpecDeleteOptions { if_override_read_only: true },
        )
        .with_skip_names(["a", "b", "c", "d"]);
        assert_ne!(visitor_ab, visitor_override);
    }
}
