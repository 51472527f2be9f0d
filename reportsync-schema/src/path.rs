//! Typed field paths.
//!
//! Syntax: segments separated by `.`. A canonical non-negative integer
//! segment (`0`, `12`, not `012`) is an [`Segment::Index`]; a segment ending
//! in `[]` is a key followed by [`Segment::AllElements`]; everything else is
//! a [`Segment::Key`].
//!
//! | Path               | Segments                                   |
//! |--------------------|--------------------------------------------|
//! | `patient.name`     | `Key(patient)`, `Key(name)`                |
//! | `tumors.0.site`    | `Key(tumors)`, `Index(0)`, `Key(site)`     |
//! | `tumors[]`         | `Key(tumors)`, `AllElements`               |
//! | `tumors[].name`    | `Key(tumors)`, `AllElements`, `Key(name)`  |

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::SchemaError;

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
    /// The whole sequence at this position.
    AllElements,
}

/// Outcome of resolving a path against a record.
///
/// `Absent` is distinct from a present `null` or empty string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<'a> {
    Absent,
    Present(&'a Value),
}

impl<'a> Resolved<'a> {
    pub fn value(self) -> Option<&'a Value> {
        match self {
            Resolved::Absent => None,
            Resolved::Present(v) => Some(v),
        }
    }

    pub fn is_absent(self) -> bool {
        matches!(self, Resolved::Absent)
    }

    /// Absent or `null`.
    pub fn is_missing(self) -> bool {
        matches!(self, Resolved::Absent | Resolved::Present(Value::Null))
    }

    /// Absent, `null` or the empty string. `0` and `false` are values.
    pub fn is_blank(self) -> bool {
        match self {
            Resolved::Absent | Resolved::Present(Value::Null) => true,
            Resolved::Present(Value::String(s)) => s.is_empty(),
            Resolved::Present(_) => false,
        }
    }
}

/// A dotted path parsed once and resolved many times.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, SchemaError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SchemaError::EmptyPath);
        }
        let mut segments = Vec::new();
        for part in raw.split('.') {
            if let Some(name) = part.strip_suffix("[]") {
                if name.is_empty() {
                    return Err(SchemaError::DanglingArrayMarker {
                        path: raw.to_string(),
                    });
                }
                segments.push(Segment::Key(name.to_string()));
                segments.push(Segment::AllElements);
            } else if part.is_empty() {
                return Err(SchemaError::EmptySegment {
                    path: raw.to_string(),
                });
            } else {
                segments.push(parse_segment(part));
            }
        }
        Ok(FieldPath {
            raw: raw.to_string(),
            segments,
        })
    }

    pub(crate) fn from_segments(segments: Vec<Segment>) -> Self {
        let raw = render(&segments);
        FieldPath { raw, segments }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// True when the last segment is `[]`, i.e. the path asserts a sequence.
    pub fn addresses_sequence(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::AllElements))
    }

    /// Walk `root` segment by segment. Never panics, never mutates.
    ///
    /// - a `null` context before a remaining segment is `Absent`
    /// - sequences accept only `Index` and a terminal `AllElements`
    /// - mappings accept `Key`; an `Index` is looked up by its decimal key
    /// - scalars accept nothing
    pub fn resolve<'a>(&self, root: &'a Value) -> Resolved<'a> {
        let mut current = root;
        let last = self.segments.len().saturating_sub(1);
        for (pos, segment) in self.segments.iter().enumerate() {
            let next = match (segment, current) {
                (_, Value::Null) => None,
                (Segment::AllElements, Value::Array(_)) => {
                    if pos == last {
                        return Resolved::Present(current);
                    }
                    None
                }
                (Segment::Index(i), Value::Array(items)) => items.get(*i),
                (Segment::Key(key), Value::Object(map)) => map.get(key),
                (Segment::Index(i), Value::Object(map)) => map.get(&i.to_string()),
                _ => None,
            };
            match next {
                Some(value) => current = value,
                None => return Resolved::Absent,
            }
        }
        Resolved::Present(current)
    }
}

fn parse_segment(part: &str) -> Segment {
    let canonical = part.chars().all(|c| c.is_ascii_digit()) && (part == "0" || !part.starts_with('0'));
    if canonical {
        if let Ok(i) = part.parse::<usize>() {
            return Segment::Index(i);
        }
    }
    Segment::Key(part.to_string())
}

fn render(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::AllElements => out.push_str("[]"),
            Segment::Key(k) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(k);
            }
            Segment::Index(i) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(&i.to_string());
            }
        }
    }
    out
}

impl FromStr for FieldPath {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldPath::parse(s)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
