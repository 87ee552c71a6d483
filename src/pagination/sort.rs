//! Sort specifications for keyset pagination.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One component of a sort key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyValue {
    #[serde(rename = "i")]
    Int(i64),
    #[serde(rename = "s")]
    Text(String),
    #[serde(rename = "t")]
    Time(DateTime<Utc>),
}

impl KeyValue {
    pub fn kind(&self) -> KeyKind {
        match self {
            KeyValue::Int(_) => KeyKind::Int,
            KeyValue::Text(_) => KeyKind::Text,
            KeyValue::Time(_) => KeyKind::Time,
        }
    }
}

impl From<i64> for KeyValue {
    fn from(v: i64) -> Self {
        KeyValue::Int(v)
    }
}

impl From<&str> for KeyValue {
    fn from(v: &str) -> Self {
        KeyValue::Text(v.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(v: String) -> Self {
        KeyValue::Text(v)
    }
}

impl From<DateTime<Utc>> for KeyValue {
    fn from(v: DateTime<Utc>) -> Self {
        KeyValue::Time(v)
    }
}

/// A full sort key, one value per column.
pub type SortKey = Vec<KeyValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Int,
    Text,
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// A sort column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: KeyKind,
    pub direction: Direction,
}

impl Column {
    pub const fn new(name: &'static str, kind: KeyKind, direction: Direction) -> Self {
        Self {
            name,
            kind,
            direction,
        }
    }
}

/// A named total order over sort keys.
///
/// The last column must be unique per item (usually the ID) so that no two
/// distinct items ever compare equal.
pub trait SortOrder: Send + Sync {
    /// Identifier baked into cursors. Must differ between every order
    /// whose cursors could be confused with each other.
    fn id(&self) -> &'static str;

    fn columns(&self) -> &'static [Column];

    /// Compare two keys column by column, honouring each direction.
    fn compare(&self, a: &[KeyValue], b: &[KeyValue]) -> Ordering {
        for ((column, x), y) in self.columns().iter().zip(a).zip(b) {
            let ord = match column.direction {
                Direction::Asc => x.cmp(y),
                Direction::Desc => y.cmp(x),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.len().cmp(&b.len())
    }

    /// Whether `key` has one value of the right kind per column.
    fn accepts(&self, key: &[KeyValue]) -> bool {
        let columns = self.columns();
        key.len() == columns.len()
            && columns
                .iter()
                .zip(key)
                .all(|(column, value)| column.kind == value.kind())
    }
}

/// A sort order that knows how to extract keys from items of type `T`.
pub trait SortSpec<T>: SortOrder {
    fn key(&self, item: &T) -> SortKey;

    fn compare_items(&self, a: &T, b: &T) -> Ordering {
        self.compare(&self.key(a), &self.key(b))
    }
}
