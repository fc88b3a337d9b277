//! Inclusion predicates gating what a visitor counts and acts upon.

use std::path::Path;

use globset::{Glob, GlobMatcher};
use regex::Regex;

use crate::fs::{EnumEntryKind, SpecEntryAttributes};
use crate::spec::{EnumPatternMode, TreeError};

/// Boolean predicate over a path and its attributes.
pub trait PathFilter {
    /// `true` when the entry should be counted and acted upon.
    fn accept(&self, path: &Path, attrs: &SpecEntryAttributes) -> bool;
}

impl<F> PathFilter for F
where
    F: Fn(&Path, &SpecEntryAttributes) -> bool,
{
    fn accept(&self, path: &Path, attrs: &SpecEntryAttributes) -> bool {
        self(path, attrs)
    }
}

/// Accepts every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl PathFilter for AcceptAll {
    fn accept(&self, _path: &Path, _attrs: &SpecEntryAttributes) -> bool {
        true
    }
}

/// Accepts entries of one kind only (e.g. regular files).
#[derive(Debug, Clone, Copy)]
pub struct KindFilter(pub EnumEntryKind);

impl PathFilter for KindFilter {
    fn accept(&self, _path: &Path, attrs: &SpecEntryAttributes) -> bool {
        attrs.kind == self.0
    }
}

/// Rejects entries whose name starts with a dot.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotHidden;

impl PathFilter for NotHidden {
    fn accept(&self, path: &Path, _attrs: &SpecEntryAttributes) -> bool {
        !path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with('.'))
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region PatternMatching

#[derive(Debug, Clone)]
enum TypePatternSeq {
    Literal(Vec<String>),
    Glob(Vec<GlobMatcher>),
    Regex(Vec<Regex>),
}

impl TypePatternSeq {
    fn compile(
        patterns: Option<&[String]>,
        rule_pattern: EnumPatternMode,
    ) -> Result<Option<Self>, TreeError> {
        let Some(patterns) = patterns else {
            return Ok(None);
        };
        if patterns.is_empty() {
            return Ok(None);
        }

        match rule_pattern {
            EnumPatternMode::Literal => Ok(Some(Self::Literal(patterns.to_vec()))),
            EnumPatternMode::Glob => {
                let mut l_glob = Vec::with_capacity(patterns.len());
                for pattern in patterns {
                    let matcher = Glob::new(pattern)
                        .map_err(|e| {
                            TreeError::InvalidPattern(format!(
                                "Invalid pattern in include/exclude: {e}"
                            ))
                        })?
                        .compile_matcher();
                    l_glob.push(matcher);
                }
                Ok(Some(Self::Glob(l_glob)))
            }
            EnumPatternMode::Regex => {
                let mut l_regex = Vec::with_capacity(patterns.len());
                for pattern in patterns {
                    let regex = Regex::new(pattern).map_err(|e| {
                        TreeError::InvalidPattern(format!(
                            "Invalid pattern in include/exclude: {e}"
                        ))
                    })?;
                    l_regex.push(regex);
                }
                Ok(Some(Self::Regex(l_regex)))
            }
        }
    }

    fn is_matching(&self, value: &str) -> bool {
        match self {
            Self::Literal(v) => v.iter().any(|p| value.contains(p.as_str())),
            Self::Glob(v) => v.iter().any(|p| p.is_match(value)),
            Self::Regex(v) => v.iter().any(|p| p.is_match(value)),
        }
    }
}

/// Include/exclude pattern lists matched against the entry base name.
///
/// An entry is accepted when it matches the include list (or there is none)
/// and does not match the exclude list.
#[derive(Debug, Clone)]
pub struct PatternFilter {
    patterns_include: Option<TypePatternSeq>,
    patterns_exclude: Option<TypePatternSeq>,
}

impl PatternFilter {
    /// Compile both lists with one pattern mode.
    pub fn new(
        patterns_include: Option<&[String]>,
        patterns_exclude: Option<&[String]>,
        rule_pattern: EnumPatternMode,
    ) -> Result<Self, TreeError> {
        Ok(Self {
            patterns_include: TypePatternSeq::compile(patterns_include, rule_pattern)?,
            patterns_exclude: TypePatternSeq::compile(patterns_exclude, rule_pattern)?,
        })
    }

    /// Whether a bare name passes both lists.
    pub fn accept_name(&self, name: &str) -> bool {
        let b_included = self
            .patterns_include
            .as_ref()
            .is_none_or(|patterns| patterns.is_matching(name));
        let b_excluded = self
            .patterns_exclude
            .as_ref()
            .is_some_and(|patterns| patterns.is_matching(name));
        b_included && !b_excluded
    }
}

impl PathFilter for PatternFilter {
    fn accept(&self, path: &Path, _attrs: &SpecEntryAttributes) -> bool {
        match path.file_name() {
            Some(name) => self.accept_name(&name.to_string_lossy()),
            None => true,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
