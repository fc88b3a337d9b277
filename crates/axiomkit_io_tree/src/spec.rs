//! Traversal specification models and top-level error types.

use std::io;
use std::path::{Path, PathBuf};

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Hook result steering [`crate::walk::walk_file_tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumVisitResult {
    /// Keep walking.
    Continue,
    /// Do not descend into the current directory (no post-visit hook either).
    SkipSubtree,
    /// Skip the remaining siblings of the current entry.
    SkipSiblings,
    /// Stop the whole walk.
    Terminate,
}

/// Symlink handling policy for tree copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumCopySymlinkStrategy {
    /// Follow the link and copy the target bytes/entries.
    Dereference,
    /// Create a symbolic link at destination (do not copy target bytes).
    CopySymlinks,
    /// Ignore symlink entries.
    SkipSymlinks,
}

/// Existing destination file conflict policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumCopyFileConflictStrategy {
    /// Keep destination file and skip current source file.
    Skip,
    /// Replace destination file with source file.
    Overwrite,
    /// Fail with [`TreeError::DestinationExists`].
    Error,
}

/// Pattern matching mode for include/exclude lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumPatternMode {
    /// Shell-like wildcards (`*`, `?`, character classes).
    Glob,
    /// Regular expression pattern.
    Regex,
    /// Substring match.
    Literal,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Options

/// Input options for [`crate::walk::walk_file_tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecWalkOptions {
    /// Resolve symbolic links and descend into linked directories.
    pub if_follow_links: bool,
    /// Deepest level whose directories are still opened (root is `0`).
    pub depth_max: usize,
}

impl Default for SpecWalkOptions {
    fn default() -> Self {
        Self {
            if_follow_links: false,
            depth_max: usize::MAX,
        }
    }
}

/// Input options for delete/clean operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SpecDeleteOptions {
    /// Clear read-only protection and retry once when removal is denied.
    pub if_override_read_only: bool,
}

/// Input options for tree copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpecCopyOptions {
    /// Symlink handling behavior.
    pub rule_symlink: EnumCopySymlinkStrategy,
    /// Conflict behavior for destination files.
    pub rule_conflict_file: EnumCopyFileConflictStrategy,
    /// Preserve modification time and read-only state on copied files.
    pub if_copy_attributes: bool,
    /// Skip dangling links instead of failing (only with `Dereference`).
    pub if_skip_broken_symlinks: bool,
}

impl Default for SpecCopyOptions {
    fn default() -> Self {
        Self {
            rule_symlink: EnumCopySymlinkStrategy::Dereference,
            rule_conflict_file: EnumCopyFileConflictStrategy::Error,
            if_copy_attributes: false,
            if_skip_broken_symlinks: false,
        }
    }
}

impl SpecCopyOptions {
    /// Walk options matching this copy configuration.
    pub fn to_walk_options(&self) -> SpecWalkOptions {
        SpecWalkOptions {
            if_follow_links: self.rule_symlink == EnumCopySymlinkStrategy::Dereference,
            ..SpecWalkOptions::default()
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Failure of a traversal, delete, copy or comparison.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// Underlying filesystem call failed.
    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        /// Path the failing call was made for.
        path: PathBuf,
        /// Original error.
        #[source]
        source: io::Error,
    },
    /// A followed link leads back to a directory on the current descent path.
    #[error("Symbolic link cycle detected: {}", path.display())]
    SymlinkCycle {
        /// Link (or directory) closing the cycle.
        path: PathBuf,
    },
    /// Entry does not exist.
    #[error("No such file or directory: {}", path.display())]
    NotFound {
        /// Missing path.
        path: PathBuf,
    },
    /// A directory was expected.
    #[error("Not a directory: {}", path.display())]
    NotADirectory {
        /// Offending path.
        path: PathBuf,
    },
    /// A non-directory was expected.
    #[error("Is a directory: {}", path.display())]
    IsADirectory {
        /// Offending path.
        path: PathBuf,
    },
    /// Copy target already exists and the conflict rule forbids replacing it.
    #[error("Destination exists: {}", path.display())]
    DestinationExists {
        /// Existing target path.
        path: PathBuf,
    },
    /// Link target is missing while links are dereferenced.
    #[error("Broken symlink: {}", path.display())]
    BrokenSymlink {
        /// Dangling link.
        path: PathBuf,
    },
    /// Source and destination overlap (`src` contains `dst` or vice versa).
    #[error(
        "Source and destination directories overlap: {} <-> {}",
        path_src.display(),
        path_dst.display()
    )]
    SourceDestinationOverlap {
        /// Normalized source directory.
        path_src: PathBuf,
        /// Normalized destination directory.
        path_dst: PathBuf,
    },
    /// Invalid include/exclude pattern.
    #[error("{0}")]
    InvalidPattern(String),
}

impl TreeError {
    /// Wrap an [`io::Error`] raised for `path`.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Path the error refers to, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Io { path, .. }
            | Self::SymlinkCycle { path }
            | Self::NotFound { path }
            | Self::NotADirectory { path }
            | Self::IsADirectory { path }
            | Self::DestinationExists { path }
            | Self::BrokenSymlink { path } => Some(path),
            Self::SourceDestinationOverlap { path_src, .. } => Some(path_src),
            Self::InvalidPattern(_) => None,
        }
    }

    /// True for the fatal link-cycle condition.
    pub fn is_symlink_cycle(&self) -> bool {
        matches!(self, Self::SymlinkCycle { .. })
    }

    /// Kind of the wrapped I/O error, if this is one.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Io { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
