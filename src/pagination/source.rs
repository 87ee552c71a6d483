//! Ordered item sources for the paginator.

use std::cmp::Ordering;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::sort::{KeyValue, SortSpec};
use crate::error::Result;

/// Something that can list items of type `T` in the order of `S`.
///
/// Implementations are read-only: a fetch may be abandoned at any point
/// without side effects. Backend failures are reported as
/// `StoreUnavailable`.
#[async_trait]
pub trait PageSource<T, S>: Send + Sync
where
    T: Send,
    S: SortSpec<T>,
{
    /// Return up to `limit` items ordered by `sort`, starting strictly after
    /// `after` when given.
    async fn fetch(&self, sort: &S, after: Option<&[KeyValue]>, limit: usize) -> Result<Vec<T>>;
}

/// An in-memory source that can be mutated between fetches.
pub struct VecSource<T> {
    items: RwLock<Vec<T>>,
}

impl<T> VecSource<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }

    pub fn insert(&self, item: T) {
        self.items.write().push(item);
    }

    /// Remove every item matching `predicate`, returning how many went.
    pub fn remove_where<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let mut items = self.items.write();
        let before = items.len();
        items.retain(|item| !predicate(item));
        before - items.len()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl<T> Default for VecSource<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl<T, S> PageSource<T, S> for VecSource<T>
where
    T: Clone + Send + Sync,
    S: SortSpec<T>,
{
    async fn fetch(&self, sort: &S, after: Option<&[KeyValue]>, limit: usize) -> Result<Vec<T>> {
        let mut page: Vec<T> = {
            let items = self.items.read();
            items
                .iter()
                .filter(|item| match after {
                    Some(after) => sort.compare(&sort.key(item), after) == Ordering::Greater,
                    None => true,
                })
                .cloned()
                .collect()
        };

        page.sort_by(|a, b| sort.compare_items(a, b));
        page.truncate(limit);
        Ok(page)
    }
}
