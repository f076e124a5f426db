//! Resource paths.
//!
//! A resource path names a node of the synchronized tree relative to its
//! root. It always starts with `/`; a trailing `/` marks a directory,
//! anything else is a content (file) path.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SyncError};

/// Identifier of a node in the synchronized tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourcePath(String);

impl ResourcePath {
    /// The tree root, `/`.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Parse and validate a resource path.
    ///
    /// Rejects empty strings, paths not rooted at `/`, empty segments
    /// (`//`) and the `.` / `..` segments.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| SyncError::InvalidPath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("empty path"));
        }
        if !raw.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }
        if raw == "/" {
            return Ok(Self::root());
        }

        let inner = raw[1..].strip_suffix('/').unwrap_or(&raw[1..]);
        for segment in inner.split('/') {
            match segment {
                "" => return Err(invalid("empty segment")),
                "." | ".." => return Err(invalid("relative segment")),
                _ => {}
            }
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A trailing `/` marks a directory path.
    pub fn is_dir(&self) -> bool {
        self.0.ends_with('/')
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Directory containing this path; `None` for the root.
    pub fn parent(&self) -> Option<ResourcePath> {
        if self.is_root() {
            return None;
        }
        let trimmed = self.0.trim_end_matches('/');
        trimmed
            .rfind('/')
            .map(|idx| ResourcePath(trimmed[..=idx].to_string()))
    }

    /// True when `self` is a direct child of the directory `dir`.
    pub fn is_child_of(&self, dir: &ResourcePath) -> bool {
        self.parent().as_ref() == Some(dir)
    }

    /// Non-empty path segments, root first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Directory path for the child named `name` of this directory.
    pub fn child_dir(&self, name: &str) -> Result<ResourcePath> {
        Self::parse(&format!("{}{}/", self.0, name))
    }

    /// Content path for the child named `name` of this directory.
    pub fn child_content(&self, name: &str) -> Result<ResourcePath> {
        Self::parse(&format!("{}{}", self.0, name))
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ResourcePath {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for ResourcePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
