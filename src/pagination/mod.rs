//! Cursor-based keyset pagination.

mod cursor;
mod paginator;
mod sort;
mod sorts;
mod source;

pub use cursor::{CursorCodec, MAX_CURSOR_LEN};
pub use paginator::{Page, PageQuery, Paginator};
pub use sort::{Column, Direction, KeyKind, KeyValue, SortKey, SortOrder, SortSpec};
pub use sorts::{
    ListItemRecord, ListItemsSort, ListRecord, ListsSort, NotificationRecord, NotificationsSort,
};
pub use source::{PageSource, VecSource};
