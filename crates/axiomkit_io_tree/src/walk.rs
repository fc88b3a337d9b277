//! Post-order depth-first tree walk driving a [`PathVisitor`].

use std::path::{Path, PathBuf};

use crate::fs::{FileKey, FileSystem, SpecEntryAttributes};
use crate::spec::{EnumVisitResult, SpecWalkOptions, TreeError};

/// Hooks invoked by [`walk_file_tree`], once per entry.
///
/// An `Err` from any hook aborts the walk and is handed back to the caller.
pub trait PathVisitor {
    /// Called for a directory before its children.
    fn pre_visit_directory(
        &mut self,
        _dir: &Path,
        _attrs: &SpecEntryAttributes,
    ) -> Result<EnumVisitResult, TreeError> {
        Ok(EnumVisitResult::Continue)
    }

    /// Called for every non-directory entry, and for directories at the depth limit.
    fn visit_file(
        &mut self,
        file: &Path,
        attrs: &SpecEntryAttributes,
    ) -> Result<EnumVisitResult, TreeError>;

    /// Called when an entry could not be inspected or opened, or closes a
    /// link cycle. Fails by default.
    fn visit_file_failed(
        &mut self,
        _path: &Path,
        error: TreeError,
    ) -> Result<EnumVisitResult, TreeError> {
        Err(error)
    }

    /// Called for a directory after all of its children.
    fn post_visit_directory(&mut self, _dir: &Path) -> Result<EnumVisitResult, TreeError> {
        Ok(EnumVisitResult::Continue)
    }
}

impl<V: PathVisitor + ?Sized> PathVisitor for &mut V {
    fn pre_visit_directory(
        &mut self,
        dir: &Path,
        attrs: &SpecEntryAttributes,
    ) -> Result<EnumVisitResult, TreeError> {
        (**self).pre_visit_directory(dir, attrs)
    }

    fn visit_file(
        &mut self,
        file: &Path,
        attrs: &SpecEntryAttributes,
    ) -> Result<EnumVisitResult, TreeError> {
        (**self).visit_file(file, attrs)
    }

    fn visit_file_failed(
        &mut self,
        path: &Path,
        error: TreeError,
    ) -> Result<EnumVisitResult, TreeError> {
        (**self).visit_file_failed(path, error)
    }

    fn post_visit_directory(&mut self, dir: &Path) -> Result<EnumVisitResult, TreeError> {
        (**self).post_visit_directory(dir)
    }
}

/// Identity of a directory on the active descent path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TypeDirIdentity {
    Key(FileKey),
    Canonical(PathBuf),
}

struct SpecWalkContext<'a, V: ?Sized> {
    fs: &'a dyn FileSystem,
    spec_walk: SpecWalkOptions,
    visitor: &'a mut V,
    l_stack_dirs: Vec<TypeDirIdentity>,
}

/// Walk the tree rooted at `path_start`, calling `visitor` for every entry.
///
/// Children are visited in name order. With `if_follow_links`, linked
/// directories are descended into and a link leading back to a directory on
/// the current descent path is reported to
/// [`PathVisitor::visit_file_failed`] as [`TreeError::SymlinkCycle`].
pub fn walk_file_tree<V>(
    fs: &dyn FileSystem,
    path_start: &Path,
    spec_walk: &SpecWalkOptions,
    visitor: &mut V,
) -> Result<EnumVisitResult, TreeError>
where
    V: PathVisitor + ?Sized,
{
    tracing::debug!(
        root = %path_start.display(),
        follow_links = spec_walk.if_follow_links,
        "walking file tree"
    );
    let mut spec_walk_ctx = SpecWalkContext {
        fs,
        spec_walk: *spec_walk,
        visitor,
        l_stack_dirs: Vec::new(),
    };
    walk_entry(&mut spec_walk_ctx, path_start, 0)
}

/// Entry attributes; with `if_follow_links`, a dangling link reports itself.
pub(crate) fn read_attributes(
    fs: &dyn FileSystem,
    path: &Path,
    if_follow_links: bool,
) -> std::io::Result<SpecEntryAttributes> {
    if !if_follow_links {
        return fs.symlink_metadata(path);
    }
    match fs.metadata(path) {
        Ok(attrs) => Ok(attrs),
        // Dangling link: report the link itself.
        Err(e) => match fs.symlink_metadata(path) {
            Ok(attrs) if attrs.is_symlink() => Ok(attrs),
            _ => Err(e),
        },
    }
}

fn derive_identity(
    fs: &dyn FileSystem,
    path: &Path,
    attrs: &SpecEntryAttributes,
) -> std::io::Result<TypeDirIdentity> {
    match attrs.file_key {
        Some(file_key) => Ok(TypeDirIdentity::Key(file_key)),
        None => fs.canonicalize(path).map(TypeDirIdentity::Canonical),
    }
}

fn walk_entry<V>(
    spec_walk_ctx: &mut SpecWalkContext<'_, V>,
    path: &Path,
    n_depth: usize,
) -> Result<EnumVisitResult, TreeError>
where
    V: PathVisitor + ?Sized,
{
    let fs = spec_walk_ctx.fs;
    let b_follow = spec_walk_ctx.spec_walk.if_follow_links;

    let attrs = match read_attributes(fs, path, b_follow) {
        Ok(v) => v,
        Err(e) => {
            return spec_walk_ctx
                .visitor
                .visit_file_failed(path, TreeError::io(path, e));
        }
    };

    if !attrs.is_dir() || n_depth >= spec_walk_ctx.spec_walk.depth_max {
        tracing::trace!(path = %path.display(), kind = ?attrs.kind, "visit file");
        return spec_walk_ctx.visitor.visit_file(path, &attrs);
    }

    let identity = if b_follow {
        let identity = match derive_identity(fs, path, &attrs) {
            Ok(v) => v,
            Err(e) => {
                return spec_walk_ctx
                    .visitor
                    .visit_file_failed(path, TreeError::io(path, e));
            }
        };
        if spec_walk_ctx.l_stack_dirs.contains(&identity) {
            return spec_walk_ctx.visitor.visit_file_failed(
                path,
                TreeError::SymlinkCycle {
                    path: path.to_path_buf(),
                },
            );
        }
        Some(identity)
    } else {
        None
    };

    let mut l_names = match fs.read_dir(path) {
        Ok(v) => v,
        Err(e) => {
            return spec_walk_ctx
                .visitor
                .visit_file_failed(path, TreeError::io(path, e));
        }
    };
    l_names.sort();

    tracing::trace!(path = %path.display(), n_children = l_names.len(), "enter directory");
    match spec_walk_ctx.visitor.pre_visit_directory(path, &attrs)? {
        EnumVisitResult::Continue => {}
        enum_result => return Ok(enum_result),
    }

    if let Some(identity) = identity {
        spec_walk_ctx.l_stack_dirs.push(identity);
    }
    let mut enum_result_children = EnumVisitResult::Continue;
    for name in l_names {
        let path_child = path.join(&name);
        match walk_entry(spec_walk_ctx, &path_child, n_depth + 1) {
            Ok(EnumVisitResult::Terminate) => {
                enum_result_children = EnumVisitResult::Terminate;
                break;
            }
            Ok(EnumVisitResult::SkipSiblings) => break,
            Ok(_) => {}
            Err(e) => {
                if b_follow {
                    spec_walk_ctx.l_stack_dirs.pop();
                }
                return Err(e);
            }
        }
    }
    if b_follow {
        spec_walk_ctx.l_stack_dirs.pop();
    }
    if enum_result_children == EnumVisitResult::Terminate {
        return Ok(EnumVisitResult::Terminate);
    }

    tracing::trace!(path = %path.display(), "exit directory");
    spec_walk_ctx.visitor.post_visit_directory(path)
}
