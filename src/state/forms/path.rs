//! Dotted field paths

use crate::error::{FormError, Result};
use std::fmt;

/// One step of a field path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => f.write_str(key),
            Segment::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Location of a value inside the nested form values, e.g. `phNumbers.0.number`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Parse a dotted path. Purely numeric segments become list indices.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(FormError::InvalidPath(raw.to_string()));
        }

        let segments = raw
            .split('.')
            .map(|part| {
                if part.is_empty() {
                    return Err(FormError::InvalidPath(raw.to_string()));
                }
                Ok(match part.parse::<usize>() {
                    Ok(index) => Segment::Index(index),
                    Err(_) => Segment::Key(part.to_string()),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Path of the enclosing group or list, `None` at the top level
    pub fn parent(&self) -> Option<FieldPath> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn child(&self, segment: Segment) -> FieldPath {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    pub fn index(&self, index: usize) -> FieldPath {
        self.child(Segment::Index(index))
    }

    /// Append a (possibly dotted) relative path
    pub fn join(&self, relative: &FieldPath) -> FieldPath {
        let mut segments = self.segments.clone();
        segments.extend(relative.segments.iter().cloned());
        Self { segments }
    }

    /// True when `other` lies strictly below this path
    pub fn is_ancestor_of(&self, other: &FieldPath) -> bool {
        other.segments.len() > self.segments.len() && other.segments.starts_with(&self.segments)
    }

    /// True when the paths are equal or one contains the other
    pub fn overlaps(&self, other: &FieldPath) -> bool {
        self == other || self.is_ancestor_of(other) || other.is_ancestor_of(self)
    }

    /// For a path under `array`, the item index and the remainder after it
    pub fn split_under(&self, array: &FieldPath) -> Option<(usize, Vec<Segment>)> {
        if !array.is_ancestor_of(self) {
            return None;
        }
        match &self.segments[array.len()] {
            Segment::Index(index) => {
                Some((*index, self.segments[array.len() + 1..].to_vec()))
            }
            Segment::Key(_) => None,
        }
    }

    /// Rebuild a path under `array` from an item index and a remainder
    pub fn under(array: &FieldPath, index: usize, rest: &[Segment]) -> FieldPath {
        let mut segments = array.segments.clone();
        segments.push(Segment::Index(index));
        segments.extend(rest.iter().cloned());
        Self { segments }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for FieldPath {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> FieldPath {
        FieldPath::parse(raw).unwrap()
    }

    #[test]
    fn test_parse_nested_with_index() {
        let p = path("phNumbers.0.number");
        assert_eq!(
            p.segments(),
            &[
                Segment::Key("phNumbers".to_string()),
                Segment::Index(0),
                Segment::Key("number".to_string()),
            ]
        );
        assert_eq!(p.to_string(), "phNumbers.0.number");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(matches!(
            FieldPath::parse(""),
            Err(FormError::InvalidPath(_))
        ));
        assert!(matches!(
            FieldPath::parse("social..twitter"),
            Err(FormError::InvalidPath(_))
        ));
        assert!(FieldPath::parse("social.").is_err());
    }

    #[test]
    fn test_parent_and_child() {
        let p = path("social.twitter");
        assert_eq!(p.parent(), Some(path("social")));
        assert_eq!(path("social").parent(), None);
        assert_eq!(path("phNumbers").index(2), path("phNumbers.2"));
    }

    #[test]
    fn test_ancestry() {
        assert!(path("social").is_ancestor_of(&path("social.twitter")));
        assert!(!path("social.twitter").is_ancestor_of(&path("social")));
        assert!(!path("social").is_ancestor_of(&path("social")));
        assert!(!path("soc").is_ancestor_of(&path("social.twitter")));
        assert!(path("social.twitter").overlaps(&path("social")));
        assert!(!path("social.twitter").overlaps(&path("social.facebook")));
    }

    #[test]
    fn test_split_under_and_rebuild() {
        let array = path("phNumbers");
        let (index, rest) = path("phNumbers.3.number").split_under(&array).unwrap();
        assert_eq!(index, 3);
        assert_eq!(FieldPath::under(&array, 1, &rest), path("phNumbers.1.number"));
        assert!(path("phoneNumbers.0").split_under(&array).is_none());
    }
}
