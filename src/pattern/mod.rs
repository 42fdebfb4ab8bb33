//! Pattern compilation and anchor extraction
//!
//! A pattern is split into an anchor (the directory where scanning starts) and a
//! remainder. The matcher is compiled from the rejoined full path, so candidates
//! are always tested as `anchor/.../name`, never as a bare name.

mod set;

pub use set::PatternSet;

use crate::error::{Result, ScanError};
use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;
use std::fmt;

/// Separator used for every path the scanner builds or emits
pub const SEPARATOR: char = '/';

/// Kind of rule a pattern was registered as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// `*` and `?` within one segment
    Wildcard,
    /// Wildcard syntax plus `**`, classes and alternations
    Glob,
    /// Regular expression applied verbatim
    Regex,
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternKind::Wildcard => write!(f, "wildcard"),
            PatternKind::Glob => write!(f, "glob"),
            PatternKind::Regex => write!(f, "regex"),
        }
    }
}

#[derive(Clone)]
enum Matcher {
    Glob(GlobMatcher),
    Regex(Regex),
}

/// A compiled pattern together with the directory it is anchored at
#[derive(Clone)]
pub struct Pattern {
    source: String,
    anchor: String,
    kind: PatternKind,
    matcher: Matcher,
}

impl Pattern {
    /// Compile a wildcard pattern such as `"*.dll"` or `"folder/*.dll"`
    pub fn wildcard(pattern: &str) -> Result<Self> {
        let (anchor, full) = anchored(pattern)?;
        let regex = Regex::new(&wildcard_to_regex(&full)).map_err(|e| ScanError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            source: pattern.to_string(),
            anchor,
            kind: PatternKind::Wildcard,
            matcher: Matcher::Regex(regex),
        })
    }

    /// Compile a glob pattern such as `"**/*.txt"`
    pub fn glob(pattern: &str) -> Result<Self> {
        let (anchor, full) = anchored(pattern)?;
        let glob = GlobBuilder::new(&full)
            .literal_separator(true)
            .build()
            .map_err(|e| ScanError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            source: pattern.to_string(),
            anchor,
            kind: PatternKind::Glob,
            matcher: Matcher::Glob(glob.compile_matcher()),
        })
    }

    /// Compile a regular expression that applies from `anchor` downwards
    pub fn regex(anchor: &str, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| ScanError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            source: pattern.to_string(),
            anchor: anchor.to_string(),
            kind: PatternKind::Regex,
            matcher: Matcher::Regex(regex),
        })
    }

    /// Pattern text as registered
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Directory scanning starts from
    pub fn anchor(&self) -> &str {
        &self.anchor
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    /// Test a full candidate path
    pub fn is_match(&self, path: &str) -> bool {
        match &self.matcher {
            Matcher::Glob(glob) => glob.is_match(path),
            Matcher::Regex(regex) => regex.is_match(path),
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("source", &self.source)
            .field("anchor", &self.anchor)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Split a wildcard or glob pattern into `(anchor, remainder)`.
///
/// The split happens at the last separator before the first `*` or `?`. With no
/// wildcard at all the last separator in the string is used. No separator gives
/// the root anchor `""`; a leading separator gives `"/"`.
pub fn split_anchor(pattern: &str) -> (&str, &str) {
    let search_end = pattern.find(['*', '?']).unwrap_or(pattern.len());

    match pattern[..search_end].rfind(SEPARATOR) {
        None => ("", pattern),
        Some(0) => ("/", &pattern[1..]),
        Some(ix) => (&pattern[..ix], &pattern[ix + 1..]),
    }
}

/// Join a directory and an entry name with exactly one separator
pub fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else if dir.ends_with(SEPARATOR) {
        format!("{dir}{name}")
    } else {
        format!("{dir}{SEPARATOR}{name}")
    }
}

fn anchored(pattern: &str) -> Result<(String, String)> {
    let (anchor, rest) = split_anchor(pattern);
    if rest.is_empty() {
        return Err(ScanError::EmptyPattern {
            pattern: pattern.to_string(),
        });
    }
    Ok((anchor.to_string(), join_path(anchor, rest)))
}

fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');
    let mut buf = [0u8; 4];
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            _ => out.push_str(&regex::escape(ch.encode_utf8(&mut buf))),
        }
    }
    out.push('$');
    out
}
