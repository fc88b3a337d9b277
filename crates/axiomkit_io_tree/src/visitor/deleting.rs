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

/// Counts and deletes a tree bottom-up.
///
/// Skip-listed names, and entries rejected by the counting filters, are kept
/// together with every ancestor directory that still contains them.
pub struct DeletingVisitor<'a> {
    counting: CountingVisitor<'a>,
    fs: &'a dyn FileSystem,
    spec_delete: SpecDeleteOptions,
    set_names_skip: HashSet<OsString>,
    // One flag per open directory: something beneath it was kept.
    l_stack_retained: Vec<bool>,
}

impl<'a> DeletingVisitor<'a> {
    /// Delete through `fs`, counting with `counting`.
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
            l_stack_retained: Vec::new(),
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

    fn mark_parent_retained(&mut self) {
        if let Some(b_retained) = self.l_stack_retained.last_mut() {
            *b_retained = true;
        }
    }
}

impl PathVisitor for DeletingVisitor<'_> {
    fn pre_visit_directory(
        &mut self,
        dir: &Path,
        attrs: &SpecEntryAttributes,
    ) -> Result<EnumVisitResult, TreeError> {
        self.counting.pre_visit_directory(dir, attrs)?;
        if is_name_skipped(&self.set_names_skip, dir) {
            tracing::trace!(path = %dir.display(), "skip-listed directory kept");
            self.mark_parent_retained();
            return Ok(EnumVisitResult::SkipSubtree);
        }
        self.l_stack_retained
            .push(!self.counting.accept_dir(dir, attrs));
        Ok(EnumVisitResult::Continue)
    }

    fn visit_file(
        &mut self,
        file: &Path,
        attrs: &SpecEntryAttributes,
    ) -> Result<EnumVisitResult, TreeError> {
        self.counting.visit_file(file, attrs)?;
        if is_name_skipped(&self.set_names_skip, file) || !self.counting.accept_file(file, attrs) {
            tracing::trace!(path = %file.display(), "file kept");
            self.mark_parent_retained();
            return Ok(EnumVisitResult::Continue);
        }
        remove_entry(self.fs, file, attrs, &self.spec_delete)?;
        Ok(EnumVisitResult::Continue)
    }

    fn visit_file_failed(
        &mut self,
        path: &Path,
        error: TreeError,
    ) -> Result<EnumVisitResult, TreeError> {
        // A vanished entry leaves nothing behind; anything else stays.
        if error.io_kind() != Some(std::io::ErrorKind::NotFound) {
            self.mark_parent_retained();
        }
        self.counting.visit_file_failed(path, error)
    }

    fn post_visit_directory(&mut self, dir: &Path) -> Result<EnumVisitResult, TreeError> {
        self.counting.post_visit_directory(dir)?;
        let b_retained = self.l_stack_retained.pop().unwrap_or(false);
        if b_retained {
            tracing::warn!(path = %dir.display(), "directory kept: not empty after deletion");
            self.mark_parent_retained();
            return Ok(EnumVisitResult::Continue);
        }
        let attrs = match self.fs.symlink_metadata(dir) {
            Ok(v) => v,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::trace!(path = %dir.display(), "directory already removed");
                return Ok(EnumVisitResult::Continue);
            }
            Err(e) => return Err(TreeError::io(dir, e)),
        };
        remove_entry(self.fs, dir, &attrs, &self.spec_delete)?;
        Ok(EnumVisitResult::Continue)
    }
}

impl PartialEq for DeletingVisitor<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.counting == other.counting
            && self.spec_delete == other.spec_delete
            && self.set_names_skip == other.set_names_skip
    }
}

impl Eq for DeletingVisitor<'_> {}

impl Hash for DeletingVisitor<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.counting.hash(state);
        self.spec_delete.hash(state);
        hash_names_skip(&self.set_names_skip, state);
    }
}

impl fmt::Debug for DeletingVisitor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeletingVisitor")
            .field("counting", &self.counting)
            .field("spec_delete", &self.spec_delete)
            .field("set_names_skip", &self.set_names_skip)
            .finish_non_exhaustive()
    }
}
