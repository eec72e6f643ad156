//! Flat key paths — slash-separated addresses of leaves in a nested map.
//!
//! A [`FlatKeyPath`] is an ordered list of segments, each either a field
//! name or a decimal array index, displayed as `seg1/seg2/.../segN`. The
//! empty list is the root. Paths serialize as their canonical string, not
//! as a list — a stable, human-readable wire format that doubles as the
//! map key of a flat encoding.

use crate::error::PathParseError;
use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::ser::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// One step in a flat key path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    /// A field name.
    Key(String),
    /// A position in an array, decimal without zero padding.
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(k) => write!(f, "{k}"),
            Self::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Segment {
    fn from(s: &str) -> Self {
        Self::Key(s.to_owned())
    }
}

impl From<usize> for Segment {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

/// An ordered list of segments addressing a leaf in a nested map.
///
/// Equality and ordering compare the segment vector, so a `BTreeMap` keyed
/// by paths iterates deterministically. Displayed as the canonical
/// slash-joined string; the root displays as the empty string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FlatKeyPath(Vec<Segment>);

impl FlatKeyPath {
    /// The root path (no segments).
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a path from segments.
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The segments, in order.
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// A new path with `segment` appended.
    pub fn child(&self, segment: impl Into<Segment>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// Append a segment in place.
    pub fn push(&mut self, segment: impl Into<Segment>) {
        self.0.push(segment.into());
    }
}

impl fmt::Display for FlatKeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for FlatKeyPath {
    type Err = PathParseError;

    /// Parse the canonical grammar `segment (/ segment)*` where a segment
    /// matches `[A-Za-z0-9]+`. An all-digit segment with no leading zero
    /// parses as an array index; every other segment is a field name. The
    /// empty string parses as the root.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for part in s.split('/') {
            if part.is_empty() {
                return Err(PathParseError::EmptySegment(s.to_owned()));
            }
            if let Some(bad) = part.chars().find(|c| !c.is_ascii_alphanumeric()) {
                return Err(PathParseError::InvalidCharacter(s.to_owned(), bad));
            }
            segments.push(parse_segment(part));
        }
        Ok(Self(segments))
    }
}

fn parse_segment(part: &str) -> Segment {
    let all_digits = part.bytes().all(|b| b.is_ascii_digit());
    let zero_padded = part.len() > 1 && part.starts_with('0');
    if all_digits && !zero_padded {
        match part.parse::<usize>() {
            Ok(i) => Segment::Index(i),
            // Out-of-range indices stay field names.
            Err(_) => Segment::Key(part.to_owned()),
        }
    } else {
        Segment::Key(part.to_owned())
    }
}

impl Serialize for FlatKeyPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FlatKeyPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PathVisitor;

        impl Visitor<'_> for PathVisitor {
            type Value = FlatKeyPath;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a slash-separated flat key path")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(PathVisitor)
    }
}
