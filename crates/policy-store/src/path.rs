//! Dotted parameter names
//!
//! Provides [`PolicyPath`] for hierarchical addressing of parameters within a
//! [`Policy`](crate::Policy).

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;


/// Dotted name addressing a parameter, possibly through nested policies
///
/// # Examples
/// - `"doall"` → a top-level parameter
/// - `"Dictionary.definition.standalone"` → `standalone` inside `definition`
///   inside `Dictionary`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PolicyPath(Vec<String>);

impl PolicyPath {
    /// Create path from a single segment
    #[inline]
    #[must_use]
    pub fn single(segment: impl Into<String>) -> Self {
        Self(vec![segment.into()])
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a parsed path; provided for API symmetry with `len`
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First segment
    #[inline]
    #[must_use]
    pub fn first(&self) -> &str {
        &self.0[0]
    }

    /// Final segment, the name looked up inside the innermost policy
    #[inline]
    #[must_use]
    pub fn last(&self) -> &str {
        &self.0[self.0.len() - 1]
    }

    /// Split into the final segment and the policy segments leading to it
    #[inline]
    #[must_use]
    pub fn split_last(&self) -> (&str, &[String]) {
        let end = self.0.len() - 1;
        (&self.0[end], &self.0[..end])
    }

    /// Parent path (`None` for a top-level name)
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.len() <= 1 {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// The dotted prefix made of the first `depth` segments
    #[must_use]
    pub fn prefix(&self, depth: usize) -> String {
        self.0[..depth.min(self.0.len())].join(".")
    }

    /// Append a segment, returning new path
    ///
    /// # Errors
    /// Returns error if the segment is empty or contains reserved characters
    pub fn child(&self, segment: &str) -> Result<Self, PathError> {
        validate_segment(segment)?;
        let mut new = self.clone();
        new.0.push(segment.to_string());
        Ok(new)
    }

    /// Iterator over segments from outermost to innermost
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Segments are identifiers: an ASCII letter or `_`, then ASCII
/// alphanumerics, `_` or `-`
fn validate_segment(segment: &str) -> Result<(), PathError> {
    let mut chars = segment.chars();
    let Some(first) = chars.next() else {
        return Err(PathError::EmptySegment);
    };
    let identifier = (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if identifier {
        Ok(())
    } else {
        Err(PathError::InvalidSegment(segment.to_string()))
    }
}

impl Display for PolicyPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl FromStr for PolicyPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }

        let segments: Vec<String> = s
            .split('.')
            .map(|seg| validate_segment(seg).map(|()| seg.to_string()))
            .collect::<Result<_, _>>()?;

        Ok(Self(segments))
    }
}

impl TryFrom<&str> for PolicyPath {
    type Error = PathError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Errors related to dotted names
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// The name was empty
    #[error("parameter name is empty")]
    Empty,

    /// Empty segment in path
    #[error("name contains empty segment")]
    EmptySegment,

    /// Invalid segment characters
    #[error("invalid name segment: '{0}'")]
    InvalidSegment(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_single() {
        let path = PolicyPath::single("only");
        assert_eq!(path.segments(), &["only"]);
        assert_eq!(path.first(), "only");
        assert_eq!(path.last(), "only");
    }

    #[test]
    fn path_parent() {
        let path: PolicyPath = "a.b.c".parse().unwrap();
        let parent = path.parent().unwrap();
        assert_eq!(parent.segments(), &["a", "b"]);
        assert!(PolicyPath::single("a").parent().is_none());
    }

    #[test]
    fn path_split_last() {
        let path: PolicyPath = "Dictionary.definition.standalone".parse().unwrap();
        let (last, parents) = path.split_last();
        assert_eq!(last, "standalone");
        assert_eq!(parents, &["Dictionary", "definition"]);
    }

    #[test]
    fn path_prefix() {
        let path: PolicyPath = "a.b.c".parse().unwrap();
        assert_eq!(path.prefix(1), "a");
        assert_eq!(path.prefix(2), "a.b");
        assert_eq!(path.prefix(9), "a.b.c");
    }

    #[test]
    fn path_child() {
        let parent = PolicyPath::single("parent");
        let child = parent.child("child").unwrap();
        assert_eq!(child.to_string(), "parent.child");
        assert!(parent.child("a.b").is_err());
    }

    #[test]
    fn path_from_str_valid() {
        let path: PolicyPath = "a.b_c.d-1".parse().unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.iter().collect::<Vec<_>>(), vec!["a", "b_c", "d-1"]);
        assert!("_private.X9".parse::<PolicyPath>().is_ok());
    }

    #[test]
    fn path_from_str_empty() {
        assert_eq!("".parse::<PolicyPath>(), Err(PathError::Empty));
    }

    #[test]
    fn path_from_str_empty_segment() {
        for name in ["a..b", ".a", "a."] {
            assert_eq!(name.parse::<PolicyPath>(), Err(PathError::EmptySegment), "{name}");
        }
    }

    #[test]
    fn path_from_str_invalid_chars() {
        for name in [
            "a b", "a.{", "x=y", "k:v", "q\"", "@file", "2mass", "-x", "x+y", "a/b", "élan", "a.9",
        ] {
            assert!(
                matches!(name.parse::<PolicyPath>(), Err(PathError::InvalidSegment(_))),
                "{name}"
            );
        }
    }

    #[test]
    fn path_display_roundtrip() {
        let path: PolicyPath = "x.y.z".parse().unwrap();
        assert_eq!(path.to_string(), "x.y.z");
    }
}
