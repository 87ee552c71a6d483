//! Built-in sort orders for the forum's list-shaped responses.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::sort::{Column, Direction, KeyKind, KeyValue, SortKey, SortOrder, SortSpec};
use crate::error::PacerError;

const ID_ASC: &[Column] = &[Column::new("id", KeyKind::Int, Direction::Asc)];

const NAME_ASC: &[Column] = &[
    Column::new("name", KeyKind::Text, Direction::Asc),
    Column::new("id", KeyKind::Int, Direction::Asc),
];

const CREATED_DESC: &[Column] = &[
    Column::new("created_at", KeyKind::Time, Direction::Desc),
    Column::new("id", KeyKind::Int, Direction::Desc),
];

const UPDATED_DESC: &[Column] = &[
    Column::new("updated_at", KeyKind::Time, Direction::Desc),
    Column::new("id", KeyKind::Int, Direction::Desc),
];

const SIZE_DESC: &[Column] = &[
    Column::new("num_items", KeyKind::Int, Direction::Desc),
    Column::new("id", KeyKind::Int, Direction::Desc),
];

/// An entry in a user's list.
pub trait ListItemRecord {
    fn id(&self) -> i64;
    fn created_at(&self) -> DateTime<Utc>;
    fn updated_at(&self) -> DateTime<Utc>;
}

/// A user's list.
pub trait ListRecord {
    fn id(&self) -> i64;
    fn name(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
    fn updated_at(&self) -> DateTime<Utc>;
    fn num_items(&self) -> i64;
}

/// A notification in a user's inbox.
pub trait NotificationRecord {
    fn id(&self) -> i64;
    fn created_at(&self) -> DateTime<Utc>;
}

/// Orders for the items of one list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListItemsSort {
    /// Insertion order
    #[default]
    Default,
    /// Newest first
    Created,
    /// Most recently updated first
    Updated,
}

impl ListItemsSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListItemsSort::Default => "default",
            ListItemsSort::Created => "created",
            ListItemsSort::Updated => "updated",
        }
    }
}

impl FromStr for ListItemsSort {
    type Err = PacerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(ListItemsSort::Default),
            "created" => Ok(ListItemsSort::Created),
            "updated" => Ok(ListItemsSort::Updated),
            other => Err(PacerError::InvalidSortSpec(other.to_string())),
        }
    }
}

impl fmt::Display for ListItemsSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SortOrder for ListItemsSort {
    fn id(&self) -> &'static str {
        match self {
            ListItemsSort::Default => "list_items.default",
            ListItemsSort::Created => "list_items.created",
            ListItemsSort::Updated => "list_items.updated",
        }
    }

    fn columns(&self) -> &'static [Column] {
        match self {
            ListItemsSort::Default => ID_ASC,
            ListItemsSort::Created => CREATED_DESC,
            ListItemsSort::Updated => UPDATED_DESC,
        }
    }
}

impl<T: ListItemRecord> SortSpec<T> for ListItemsSort {
    fn key(&self, item: &T) -> SortKey {
        let id = KeyValue::Int(item.id());
        match self {
            ListItemsSort::Default => vec![id],
            ListItemsSort::Created => vec![item.created_at().into(), id],
            ListItemsSort::Updated => vec![item.updated_at().into(), id],
        }
    }
}

/// Orders for a user's lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListsSort {
    /// Alphabetical
    Name,
    /// Newest first
    Created,
    /// Most recently updated first
    #[default]
    Updated,
    /// Largest first
    Size,
}

impl ListsSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListsSort::Name => "name",
            ListsSort::Created => "created",
            ListsSort::Updated => "updated",
            ListsSort::Size => "size",
        }
    }
}

impl FromStr for ListsSort {
    type Err = PacerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(ListsSort::Name),
            "created" => Ok(ListsSort::Created),
            "updated" | "default" => Ok(ListsSort::Updated),
            "size" => Ok(ListsSort::Size),
            other => Err(PacerError::InvalidSortSpec(other.to_string())),
        }
    }
}

impl fmt::Display for ListsSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SortOrder for ListsSort {
    fn id(&self) -> &'static str {
        match self {
            ListsSort::Name => "lists.name",
            ListsSort::Created => "lists.created",
            ListsSort::Updated => "lists.updated",
            ListsSort::Size => "lists.size",
        }
    }

    fn columns(&self) -> &'static [Column] {
        match self {
            ListsSort::Name => NAME_ASC,
            ListsSort::Created => CREATED_DESC,
            ListsSort::Updated => UPDATED_DESC,
            ListsSort::Size => SIZE_DESC,
        }
    }
}

impl<T: ListRecord> SortSpec<T> for ListsSort {
    fn key(&self, item: &T) -> SortKey {
        let id = KeyValue::Int(item.id());
        match self {
            ListsSort::Name => vec![item.name().into(), id],
            ListsSort::Created => vec![item.created_at().into(), id],
            ListsSort::Updated => vec![item.updated_at().into(), id],
            ListsSort::Size => vec![KeyValue::Int(item.num_items()), id],
        }
    }
}

/// Notifications are always newest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NotificationsSort {
    #[default]
    Default,
}

impl FromStr for NotificationsSort {
    type Err = PacerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" | "created" => Ok(NotificationsSort::Default),
            other => Err(PacerError::InvalidSortSpec(other.to_string())),
        }
    }
}

impl SortOrder for NotificationsSort {
    fn id(&self) -> &'static str {
        "notifications.created"
    }

    fn columns(&self) -> &'static [Column] {
        CREATED_DESC
    }
}

impl<T: NotificationRecord> SortSpec<T> for NotificationsSort {
    fn key(&self, item: &T) -> SortKey {
        vec![item.created_at().into(), KeyValue::Int(item.id())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::cmp::Ordering;

    struct Entry {
        id: i64,
        created: i64,
        updated: i64,
    }

    impl ListItemRecord for Entry {
        fn id(&self) -> i64 {
            self.id
        }

        fn created_at(&self) -> DateTime<Utc> {
            Utc.timestamp_opt(self.created, 0).unwrap()
        }

        fn updated_at(&self) -> DateTime<Utc> {
            Utc.timestamp_opt(self.updated, 0).unwrap()
        }
    }

    #[test]
    fn test_parse_sort_identifiers() {
        assert_eq!("created".parse::<ListItemsSort>().unwrap(), ListItemsSort::Created);
        assert_eq!("size".parse::<ListsSort>().unwrap(), ListsSort::Size);
        assert_eq!("default".parse::<ListsSort>().unwrap(), ListsSort::Updated);
        assert!(matches!(
            "hot".parse::<ListItemsSort>(),
            Err(PacerError::InvalidSortSpec(s)) if s == "hot"
        ));
        assert!("size".parse::<ListItemsSort>().is_err());
    }

    #[test]
    fn test_display_round_trips_parse() {
        for sort in [ListItemsSort::Default, ListItemsSort::Created, ListItemsSort::Updated] {
            assert_eq!(sort.to_string().parse::<ListItemsSort>().unwrap(), sort);
        }
    }

    #[test]
    fn test_ids_are_distinct_across_list_types() {
        assert_ne!(
            SortOrder::id(&ListItemsSort::Created),
            SortOrder::id(&ListsSort::Created)
        );
        assert_ne!(
            SortOrder::id(&ListsSort::Created),
            SortOrder::id(&NotificationsSort::Default)
        );
    }

    #[test]
    fn test_created_ties_broken_by_id() {
        let a = Entry { id: 1, created: 100, updated: 100 };
        let b = Entry { id: 2, created: 100, updated: 50 };

        assert_eq!(ListItemsSort::Created.compare_items(&b, &a), Ordering::Less);
        assert_eq!(ListItemsSort::Updated.compare_items(&a, &b), Ordering::Less);
        assert_eq!(ListItemsSort::Default.compare_items(&a, &b), Ordering::Less);
    }

    #[test]
    fn test_keys_match_columns() {
        let entry = Entry { id: 7, created: 1, updated: 2 };
        for sort in [ListItemsSort::Default, ListItemsSort::Created, ListItemsSort::Updated] {
            assert!(sort.accepts(&sort.key(&entry)));
        }
    }
}
