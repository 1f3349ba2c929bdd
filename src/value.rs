//! The dynamic value stored in the form trees.
//!
//! `values`, `errors` and `touched` are all [`Value`] trees. Containers are
//! persistent [`imbl`] collections, so cloning a tree is cheap and every path
//! update shares the subtrees it does not touch with the tree it came from.

use std::{fmt, path::PathBuf, sync::Arc};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned};

use crate::{error::FormError, path::FieldPath};

pub type Key = Arc<str>;
pub type Map = imbl::OrdMap<Key, Value>;
pub type List = imbl::Vector<Value>;

/// The files picked in a file input, passed through as the host reported them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FileList(Arc<[PathBuf]>);

impl FileList {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self(paths.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.0.iter()
    }
}

impl From<Vec<PathBuf>> for FileList {
    fn from(paths: Vec<PathBuf>) -> Self {
        Self(paths.into())
    }
}

/// A node of a form tree.
///
/// `Undefined` is a storable value: a key holding `Undefined` is present, which
/// is different from the key being absent. Registering a field with no initial
/// value relies on this.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Text(Arc<str>),
    Files(FileList),
    List(List),
    Map(Map),
}

impl Value {
    /// An empty mapping.
    pub fn map() -> Self {
        Value::Map(Map::new())
    }

    /// An empty sequence.
    pub fn list() -> Self {
        Value::List(List::new())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// `Undefined` or `Null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Truthiness as a checkbox sees it.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !s.is_empty(),
            Value::Files(_) | Value::List(_) | Value::Map(_) => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_files(&self) -> Option<&FileList> {
        match self {
            Value::Files(files) => Some(files),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    /// Whether both values are the same allocation.
    ///
    /// Containers compare their persistent roots, text compares its buffer and
    /// the remaining scalars fall back to equality.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b),
            (Value::List(a), Value::List(b)) => a.ptr_eq(b),
            (Value::Text(a), Value::Text(b)) => Arc::ptr_eq(a, b),
            (Value::Files(a), Value::Files(b)) => Arc::ptr_eq(&a.0, &b.0),
            (a, b) => a == b,
        }
    }

    /// Look up a dot path. Malformed and absent paths both give `None`.
    ///
    /// ```rust
    /// use floem_form::Value;
    /// use serde_json::json;
    ///
    /// let tree = Value::from(json!({ "address": [{ "city": "Oslo" }] }));
    /// assert_eq!(tree.lookup("address.0.city"), Some(&Value::from("Oslo")));
    /// assert_eq!(tree.lookup("address.1.city"), None);
    /// ```
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let path = FieldPath::parse(path).ok()?;
        crate::path::get(self, &path)
    }

    /// The text an input element shows for this value.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined | Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Text(s) => s.to_string(),
            Value::Files(_) | Value::List(_) | Value::Map(_) => String::new(),
        }
    }

    /// Convert to JSON. `Undefined` map entries are dropped; elsewhere
    /// `Undefined` becomes `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Undefined | Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::Text(s) => Json::String(s.to_string()),
            Value::Files(files) => Json::Array(
                files
                    .iter()
                    .map(|p| Json::String(p.to_string_lossy().into_owned()))
                    .collect(),
            ),
            Value::List(list) => Json::Array(list.iter().map(Value::to_json).collect()),
            Value::Map(map) => Json::Object(
                map.iter()
                    .filter(|(_, v)| !v.is_undefined())
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Build a tree from any serializable host type.
    pub fn from_serialize<T: Serialize>(data: &T) -> Result<Value, FormError> {
        Ok(serde_json::to_value(data)?.into())
    }

    /// Read the tree back into a typed host value.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T, FormError> {
        Ok(serde_json::from_value(self.to_json())?)
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < (1u64 << 53) as f64 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            _ => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
            Json::String(s) => Value::Text(s.into()),
            Json::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            Json::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (Key::from(k), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s.into())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n.into())
    }
}

impl From<FileList> for Value {
    fn from(files: FileList) -> Self {
        Value::Files(files)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Undefined)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::{SerializeMap, SerializeSeq};
        match self {
            Value::Undefined | Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < (1u64 << 53) as f64 => {
                serializer.serialize_i64(*n as i64)
            }
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Files(files) => serializer.collect_seq(files.iter()),
            Value::List(list) => {
                let mut seq = serializer.serialize_seq(Some(list.len()))?;
                for item in list.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut out = serializer.serialize_map(None)?;
                for (k, v) in map.iter().filter(|(_, v)| !v.is_undefined()) {
                    out.serialize_entry(&**k, v)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}
