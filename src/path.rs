//! Dot-path addressing over [`Value`] trees.
//!
//! A [`FieldPath`] is a `.`-separated list of segments. Segments made only of
//! digits (without a leading zero) are indices; everything else is a key.
//! [`get`], [`set`] and [`has`] never fail on missing paths and never mutate
//! the tree they are given: [`set`] copies the ancestors along the path and
//! shares every other subtree with the input.

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
    sync::Arc,
};

use smallvec::SmallVec;

use crate::{
    error::PathError,
    value::{Key, List, Map, Value},
};

/// Indices further than this past the end of a list are stored as map keys
/// instead of padding the list.
const MAX_INDEX_GAP: usize = 1 << 16;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(Key),
    Index(usize),
}

impl Segment {
    fn parse(s: &str) -> Segment {
        let canonical = s.bytes().all(|b| b.is_ascii_digit()) && (s == "0" || !s.starts_with('0'));
        match s.parse::<usize>() {
            Ok(index) if canonical => Segment::Index(index),
            _ => Segment::Key(s.into()),
        }
    }

    /// The map key this segment addresses.
    pub fn to_key(&self) -> Key {
        match self {
            Segment::Key(key) => key.clone(),
            Segment::Index(index) => index.to_string().into(),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => f.write_str(key),
            Segment::Index(index) => write!(f, "{index}"),
        }
    }
}

/// A parsed field path such as `address.0.city`.
///
/// Equality, ordering and hashing go through the path text, so two paths are
/// the same field exactly when they are spelled the same.
#[derive(Clone)]
pub struct FieldPath {
    raw: Arc<str>,
    segments: SmallVec<[Segment; 4]>,
}

impl FieldPath {
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        let segments = path
            .split('.')
            .map(|segment| {
                if segment.is_empty() {
                    Err(PathError::EmptySegment(path.to_string()))
                } else {
                    Ok(Segment::parse(segment))
                }
            })
            .collect::<Result<SmallVec<_>, _>>()?;
        Ok(Self {
            raw: path.into(),
            segments,
        })
    }

    /// Parse a path that may use bracket indexing (`a[0].b`, `a["key"]`),
    /// as schema validators report them, into dot notation.
    pub fn parse_bracketed(path: &str) -> Result<Self, PathError> {
        let mut dotted = String::with_capacity(path.len());
        let mut chars = path.chars();
        while let Some(c) = chars.next() {
            match c {
                '[' => {
                    let mut inner = String::new();
                    loop {
                        match chars.next() {
                            Some(']') => break,
                            Some(c) => inner.push(c),
                            None => return Err(PathError::UnbalancedBracket(path.to_string())),
                        }
                    }
                    dotted.push('.');
                    dotted.push_str(strip_quotes(inner.trim()));
                }
                ']' => return Err(PathError::UnbalancedBracket(path.to_string())),
                c => dotted.push(c),
            }
        }
        let dotted = dotted.strip_prefix('.').unwrap_or(&dotted);
        Self::parse(dotted)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether `self` is `prefix` or lies below it.
    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// Whether one path addresses a subtree of the other.
    pub fn overlaps(&self, other: &FieldPath) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }
}

fn strip_quotes(s: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}

impl PartialEq for FieldPath {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for FieldPath {}

impl Hash for FieldPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl PartialOrd for FieldPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FieldPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl fmt::Debug for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldPath({:?})", &*self.raw)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl AsRef<str> for FieldPath {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for FieldPath {
    type Error = PathError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl TryFrom<&FieldPath> for FieldPath {
    type Error = PathError;

    fn try_from(path: &FieldPath) -> Result<Self, Self::Error> {
        Ok(path.clone())
    }
}

/// The value at `path`, or `None` when any segment is absent.
pub fn get<'a>(tree: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    path.segments
        .iter()
        .try_fold(tree, |node, segment| match (node, segment) {
            (Value::Map(map), Segment::Key(key)) => map.get(&**key),
            (Value::Map(map), Segment::Index(_)) => map.get(&*segment.to_key()),
            (Value::List(list), Segment::Index(index)) => list.get(*index),
            _ => None,
        })
}

/// Whether `path` is present, including when it holds [`Value::Undefined`].
pub fn has(tree: &Value, path: &FieldPath) -> bool {
    get(tree, path).is_some()
}

/// A copy of `tree` with `value` stored at `path`.
///
/// Missing containers along the path are created: a list when the segment is
/// an index, a map otherwise. Whatever currently sits at `path` is replaced
/// wholesale, subtrees included.
pub fn set(tree: &Value, path: &FieldPath, value: Value) -> Value {
    set_in(Some(tree), &path.segments, value)
}

fn set_in(node: Option<&Value>, segments: &[Segment], value: Value) -> Value {
    let Some((segment, rest)) = segments.split_first() else {
        return value;
    };

    match (node, segment) {
        (Some(Value::Map(map)), segment) => {
            let key = segment.to_key();
            let child = set_in(map.get(&*key), rest, value);
            let mut map = map.clone();
            map.insert(key, child);
            Value::Map(map)
        }
        (Some(Value::List(list)), Segment::Index(index))
            if *index <= list.len() + MAX_INDEX_GAP =>
        {
            let child = set_in(list.get(*index), rest, value);
            let mut list = list.clone();
            if *index < list.len() {
                list.set(*index, child);
            } else {
                while list.len() < *index {
                    list.push_back(Value::Undefined);
                }
                list.push_back(child);
            }
            Value::List(list)
        }
        (Some(Value::List(list)), segment) => {
            let mut map: Map = list
                .iter()
                .enumerate()
                .map(|(i, v)| (Key::from(i.to_string()), v.clone()))
                .collect();
            let key = segment.to_key();
            let child = set_in(map.get(&*key), rest, value);
            map.insert(key, child);
            Value::Map(map)
        }
        (_, Segment::Index(index)) if *index <= MAX_INDEX_GAP => {
            let mut list = List::new();
            for _ in 0..*index {
                list.push_back(Value::Undefined);
            }
            list.push_back(set_in(None, rest, value));
            Value::List(list)
        }
        (_, segment) => {
            let mut map = Map::new();
            map.insert(segment.to_key(), set_in(None, rest, value));
            Value::Map(map)
        }
    }
}
