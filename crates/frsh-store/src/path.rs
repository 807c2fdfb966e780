//! Validated addresses into the tree.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StoreError};

/// Characters that may not appear inside a path segment.
const FORBIDDEN: &[char] = &['.', '#', '$', '[', ']', '/'];

/// A `/`-separated address of a node in the tree.
///
/// The empty path addresses the root of the tree. Every segment is
/// validated on construction, so a `TreePath` is always addressable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreePath {
    segments: Vec<String>,
}

impl TreePath {
    /// The root of the tree.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a `/`-separated path. Leading, trailing and repeated slashes are ignored.
    pub fn parse(path: &str) -> Result<Self> {
        let mut segments = Vec::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            validate_segment(segment).map_err(|reason| StoreError::InvalidPath {
                path: path.to_string(),
                reason,
            })?;
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Append one segment, returning the child path.
    pub fn child(&self, segment: &str) -> Result<Self> {
        validate_segment(segment).map_err(|reason| StoreError::InvalidPath {
            path: format!("{}/{}", self, segment),
            reason,
        })?;
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    /// Append every segment of `other`.
    pub fn join(&self, other: &TreePath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// The path segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment, or `None` for the root.
    pub fn key(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// True if `self` equals `other` or is one of its ancestors.
    pub fn is_ancestor_of(&self, other: &TreePath) -> bool {
        self.segments.len() <= other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }
}

/// Check that `segment` can be used as a single key in the tree.
pub fn validate_segment(segment: &str) -> std::result::Result<(), String> {
    if segment.is_empty() {
        return Err("empty segment".to_string());
    }
    if let Some(c) = segment
        .chars()
        .find(|c| FORBIDDEN.contains(c) || c.is_ascii_control())
    {
        return Err(format!("segment '{}' contains forbidden character {:?}", segment, c));
    }
    Ok(())
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

impl FromStr for TreePath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
