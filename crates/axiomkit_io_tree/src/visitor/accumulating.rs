use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use super::CountingVisitor;
use crate::fs::SpecEntryAttributes;
use crate::report::PathCounters;
use crate::spec::{EnumVisitResult, TreeError};
use crate::walk::PathVisitor;

/// Counts a walk and records the directories and files it counted, in
/// visit order.
pub struct AccumulatingVisitor<'a> {
    counting: CountingVisitor<'a>,
    l_dirs: Vec<PathBuf>,
    l_files: Vec<PathBuf>,
}

fn relativize(l_paths: &[PathBuf], path_parent: &Path, if_sort: bool) -> Vec<PathBuf> {
    let mut l_rel: Vec<PathBuf> = l_paths
        .iter()
        .map(|path| match path.strip_prefix(path_parent) {
            Ok(path_rel) => path_rel.to_path_buf(),
            Err(_) => path.clone(),
        })
        .collect();
    if if_sort {
        l_rel.sort();
    }
    l_rel
}

impl<'a> AccumulatingVisitor<'a> {
    /// Record what `counting` admits, starting with empty lists.
    pub fn new(counting: CountingVisitor<'a>) -> Self {
        Self {
            counting,
            l_dirs: Vec::new(),
            l_files: Vec::new(),
        }
    }

    /// The wrapped counting visitor.
    pub fn counting(&self) -> &CountingVisitor<'a> {
        &self.counting
    }

    /// Counts accumulated so far.
    pub fn path_counters(&self) -> &PathCounters {
        self.counting.path_counters()
    }

    /// Counted directories in visit order.
    pub fn directories(&self) -> &[PathBuf] {
        &self.l_dirs
    }

    /// Counted files in visit order.
    pub fn files(&self) -> &[PathBuf] {
        &self.l_files
    }

    /// Directories relative to `path_parent`; paths outside it are kept as is.
    pub fn relativize_directories(&self, path_parent: &Path, if_sort: bool) -> Vec<PathBuf> {
        relativize(&self.l_dirs, path_parent, if_sort)
    }

    /// Files relative to `path_parent`; paths outside it are kept as is.
    pub fn relativize_files(&self, path_parent: &Path, if_sort: bool) -> Vec<PathBuf> {
        relativize(&self.l_files, path_parent, if_sort)
    }
}

impl PathVisitor for AccumulatingVisitor<'_> {
    fn pre_visit_directory(
        &mut self,
        dir: &Path,
        attrs: &SpecEntryAttributes,
    ) -> Result<EnumVisitResult, TreeError> {
        if self.counting.accept_dir(dir, attrs) {
            self.l_dirs.push(dir.to_path_buf());
        }
        self.counting.pre_visit_directory(dir, attrs)
    }

    fn visit_file(
        &mut self,
        file: &Path,
        attrs: &SpecEntryAttributes,
    ) -> Result<EnumVisitResult, TreeError> {
        if self.counting.accept_file(file, attrs) {
            self.l_files.push(file.to_path_buf());
        }
        self.counting.visit_file(file, attrs)
    }

    fn visit_file_failed(
        &mut self,
        path: &Path,
        error: TreeError,
    ) -> Result<EnumVisitResult, TreeError> {
        let enum_result = self.counting.visit_file_failed(path, error)?;
        self.l_dirs.push(path.to_path_buf());
        Ok(enum_result)
    }
}

impl PartialEq for AccumulatingVisitor<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.counting == other.counting
            && self.l_dirs == other.l_dirs
            && self.l_files == other.l_files
    }
}

impl Eq for AccumulatingVisitor<'_> {}

impl Hash for AccumulatingVisitor<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.counting.hash(state);
        self.l_dirs.hash(state);
        self.l_files.hash(state);
    }
}

impl fmt::Debug for AccumulatingVisitor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccumulatingVisitor")
            .field("counting", &self.counting)
            .field("l_dirs", &self.l_dirs)
            .field("l_files", &self.l_files)
            .finish()
    }
}
