//! # Document Paths
//!
//! A `DocumentPath` addresses one value inside a configuration document. It
//! is the key of every validation error, override record and pending-restart
//! record, and the argument of custom actions.
//!
//! ## Text Form
//!
//! - Properties are dotted: `Server.Port`.
//! - Array items use brackets: `list[0].name`.
//! - Map entries always use a quoted bracket: `items['a b']`.
//! - A property whose name holds a reserved character is written like a map
//!   entry: `Paths['C:\\Data']`.
//! - Inside quotes `\` and `'` are escaped with a backslash.
//! - The root document is the empty string.
//!
//! Parsing accepts the same grammar. A quoted segment parses to
//! [`PathSegment::Key`]; resolvers treat `Key` and `Property` alike when
//! looking names up, so the text form round-trips.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PathParseError;

/// Characters that force a property name into the quoted bracket form.
const RESERVED: &[char] = &[
    '.', '[', ']', '(', ')', '{', '}', '"', '/', '\\', '\'', ' ', '\t', '\r', '\n', '\u{8}',
    '\u{c}',
];

/// One step of a document path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    /// A declared object property.
    Property(String),
    /// An array position.
    Index(usize),
    /// A map entry, or a quoted property name.
    Key(String),
}

impl PathSegment {
    /// The name carried by a `Property` or `Key` segment.
    pub fn name(&self) -> Option<&str> {
        match self {
            PathSegment::Property(name) | PathSegment::Key(name) => Some(name),
            PathSegment::Index(_) => None,
        }
    }
}

/// A location inside a JSON document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentPath {
    segments: Vec<PathSegment>,
}

impl DocumentPath {
    /// The empty path addressing the whole document.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from segments.
    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Parse the text form.
    pub fn parse(text: &str) -> Result<Self, PathParseError> {
        Parser::new(text).parse()
    }

    /// This path extended with a property.
    pub fn property(&self, name: impl Into<String>) -> Self {
        self.child(PathSegment::Property(name.into()))
    }

    /// This path extended with an array index.
    pub fn index(&self, index: usize) -> Self {
        self.child(PathSegment::Index(index))
    }

    /// This path extended with a map key.
    pub fn key(&self, key: impl Into<String>) -> Self {
        self.child(PathSegment::Key(key.into()))
    }

    /// This path extended with an arbitrary segment.
    pub fn child(&self, segment: PathSegment) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(segment);
        Self { segments }
    }

    /// The path without its last segment. The root is its own parent.
    pub fn parent(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    // ─── Document access ──────────────────────────────────────────────

    /// The value at this path, if present.
    pub fn lookup<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        let mut current = document;
        for segment in &self.segments {
            current = match (segment, current) {
                (PathSegment::Index(i), Value::Array(items)) => items.get(*i)?,
                (PathSegment::Property(name) | PathSegment::Key(name), Value::Object(map)) => {
                    map.get(name)?
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// Set the value at this path, creating missing intermediate objects.
    ///
    /// Returns `false` when an intermediate value has the wrong shape or an
    /// index is out of range.
    pub fn assign(&self, document: &mut Value, value: Value) -> bool {
        let Some((last, parents)) = self.segments.split_last() else {
            *document = value;
            return true;
        };
        let mut current = document;
        for segment in parents {
            current = match segment {
                PathSegment::Index(i) => match current {
                    Value::Array(items) => match items.get_mut(*i) {
                        Some(item) => item,
                        None => return false,
                    },
                    _ => return false,
                },
                PathSegment::Property(name) | PathSegment::Key(name) => {
                    if current.is_null() {
                        *current = Value::Object(Map::new());
                    }
                    match current {
                        Value::Object(map) => map
                            .entry(name.clone())
                            .or_insert_with(|| Value::Object(Map::new())),
                        _ => return false,
                    }
                }
            };
        }
        match (last, current) {
            (PathSegment::Index(i), Value::Array(items)) => match items.get_mut(*i) {
                Some(slot) => {
                    *slot = value;
                    true
                }
                None => false,
            },
            (PathSegment::Property(name) | PathSegment::Key(name), Value::Object(map)) => {
                map.insert(name.clone(), value);
                true
            }
            _ => false,
        }
    }

    /// Remove the value at this path, returning it.
    pub fn remove(&self, document: &mut Value) -> Option<Value> {
        let (last, parents) = self.segments.split_last()?;
        let mut current = document;
        for segment in parents {
            current = match (segment, current) {
                (PathSegment::Index(i), Value::Array(items)) => items.get_mut(*i)?,
                (PathSegment::Property(name) | PathSegment::Key(name), Value::Object(map)) => {
                    map.get_mut(name)?
                }
                _ => return None,
            };
        }
        match (last, current) {
            (PathSegment::Index(i), Value::Array(items)) if *i < items.len() => {
                Some(items.remove(*i))
            }
            (PathSegment::Property(name) | PathSegment::Key(name), Value::Object(map)) => {
                map.shift_remove(name)
            }
            _ => None,
        }
    }
}

fn needs_quoting(name: &str) -> bool {
    name.is_empty() || name.contains(RESERVED)
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    f.write_str("['")?;
    for c in text.chars() {
        if c == '\'' || c == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{c}")?;
    }
    f.write_str("']")
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Property(name) if !needs_quoting(name) => {
                    if position > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                PathSegment::Property(name) | PathSegment::Key(name) => write_quoted(f, name)?,
                PathSegment::Index(i) => write!(f, "[{i}]")?,
            }
        }
        Ok(())
    }
}

impl FromStr for DocumentPath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DocumentPath {
    type Error = PathParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DocumentPath> for String {
    fn from(path: DocumentPath) -> Self {
        path.to_string()
    }
}

// ─── Parser ──────────────────────────────────────────────────────────

struct Parser<'a> {
    text: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    segments: Vec<PathSegment>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.char_indices().peekable(),
            segments: Vec::new(),
        }
    }

    fn error(&self, offset: usize, reason: &'static str) -> PathParseError {
        PathParseError::new(self.text, offset, reason)
    }

    fn parse(mut self) -> Result<DocumentPath, PathParseError> {
        if self.chars.peek().is_none() {
            return Ok(DocumentPath::root());
        }
        if !matches!(self.chars.peek(), Some((_, '['))) {
            self.name(0)?;
        }
        while let Some((offset, c)) = self.chars.next() {
            match c {
                '.' => self.name(offset + 1)?,
                '[' => self.bracket(offset)?,
                _ => return Err(self.error(offset, "expected '.' or '['")),
            }
        }
        Ok(DocumentPath::from_segments(self.segments))
    }

    fn name(&mut self, start: usize) -> Result<(), PathParseError> {
        let mut name = String::new();
        while let Some(&(offset, c)) = self.chars.peek() {
            if c == '.' || c == '[' {
                break;
            }
            if RESERVED.contains(&c) {
                return Err(self.error(offset, "reserved character in unquoted name"));
            }
            name.push(c);
            self.chars.next();
        }
        if name.is_empty() {
            return Err(self.error(start, "empty property name"));
        }
        self.segments.push(PathSegment::Property(name));
        Ok(())
    }

    fn bracket(&mut self, open: usize) -> Result<(), PathParseError> {
        match self.chars.next() {
            Some((_, '\'')) => {
                let mut key = String::new();
                loop {
                    match self.chars.next() {
                        Some((_, '\\')) => match self.chars.next() {
                            Some((_, c)) => key.push(c),
                            None => return Err(self.error(self.text.len(), "dangling escape")),
                        },
                        Some((_, '\'')) => break,
                        Some((_, c)) => key.push(c),
                        None => return Err(self.error(self.text.len(), "unterminated quote")),
                    }
                }
                self.close()?;
                self.segments.push(PathSegment::Key(key));
                Ok(())
            }
            Some((offset, c)) if c.is_ascii_digit() => {
                let mut digits = String::from(c);
                while let Some(&(_, d)) = self.chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    digits.push(d);
                    self.chars.next();
                }
                let index = digits
                    .parse::<usize>()
                    .map_err(|_| self.error(offset, "index out of range"))?;
                self.close()?;
                self.segments.push(PathSegment::Index(index));
                Ok(())
            }
            _ => Err(self.error(open + 1, "expected index or quoted key")),
        }
    }

    fn close(&mut self) -> Result<(), PathParseError> {
        match self.chars.next() {
            Some((_, ']')) => Ok(()),
            Some((offset, _)) => Err(self.error(offset, "expected ']'")),
            None => Err(self.error(self.text.len(), "expected ']'")),
        }
    }
}
