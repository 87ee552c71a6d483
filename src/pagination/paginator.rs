//! Keyset paginator.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::cursor::CursorCodec;
use super::sort::SortSpec;
use super::source::PageSource;
use crate::config::PaginationConfig;
use crate::error::{PacerError, Result};

/// One page of results.
///
/// `next` is absent once the sequence is exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next: None,
        }
    }

    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }

    /// Convert the items, keeping the cursor.
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next: self.next,
        }
    }
}

/// Query-string parameters of a list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub next: Option<String>,
    pub sort: Option<String>,
}

/// Produces pages from ordered sources.
///
/// Stateless between calls: the position lives in the cursor handed to
/// the client.
#[derive(Debug, Clone)]
pub struct Paginator {
    codec: CursorCodec,
    default_limit: usize,
    max_limit: usize,
}

impl Paginator {
    pub fn new(codec: CursorCodec, default_limit: usize, max_limit: usize) -> Result<Self> {
        if default_limit == 0 || default_limit > max_limit {
            return Err(PacerError::Config(format!(
                "invalid page limits: default {} max {}",
                default_limit, max_limit
            )));
        }

        Ok(Self {
            codec,
            default_limit,
            max_limit,
        })
    }

    pub fn from_config(config: &PaginationConfig) -> Result<Self> {
        let codec = match &config.cursor_secret {
            Some(secret) => CursorCodec::signed(secret.as_bytes())?,
            None => CursorCodec::unsigned(),
        };
        Self::new(codec, config.default_limit, config.max_limit)
    }

    pub fn codec(&self) -> &CursorCodec {
        &self.codec
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    pub fn max_limit(&self) -> usize {
        self.max_limit
    }

    /// Validate a requested page size, applying the default and clamping
    /// to the maximum.
    pub fn resolve_limit(&self, requested: Option<i64>) -> Result<usize> {
        match requested {
            None => Ok(self.default_limit),
            Some(limit) if limit <= 0 => Err(PacerError::InvalidLimit(limit)),
            Some(limit) => Ok(usize::try_from(limit)
                .unwrap_or(usize::MAX)
                .min(self.max_limit)),
        }
    }

    /// Fetch the page of `source` that follows `cursor` in `sort` order.
    pub async fn page<T, S, P>(
        &self,
        source: &P,
        sort: &S,
        limit: i64,
        cursor: Option<&str>,
    ) -> Result<Page<T>>
    where
        T: Send,
        S: SortSpec<T>,
        P: PageSource<T, S> + ?Sized,
    {
        let limit = self.resolve_limit(Some(limit))?;

        let after = match cursor {
            Some(token) => Some(self.codec.decode(token, sort)?),
            None => None,
        };

        trace!(sort = sort.id(), limit, resumed = after.is_some(), "Fetching page");

        // One extra item tells us whether another page exists.
        let mut items = source.fetch(sort, after.as_deref(), limit + 1).await?;

        if items.len() <= limit {
            debug!(sort = sort.id(), count = items.len(), "Served last page");
            return Ok(Page { items, next: None });
        }

        items.truncate(limit);
        let next = match items.last() {
            Some(last) => Some(self.codec.encode(sort, &sort.key(last))?),
            None => None,
        };

        debug!(sort = sort.id(), count = items.len(), "Served page");
        Ok(Page { items, next })
    }

    /// Serve a list endpoint query: resolves the sort identifier, the page
    /// size and the cursor, then fetches the page.
    pub async fn page_query<T, S, P>(&self, source: &P, query: &PageQuery) -> Result<Page<T>>
    where
        T: Send,
        S: SortSpec<T> + FromStr<Err = PacerError> + Default,
        P: PageSource<T, S> + ?Sized,
    {
        let sort = match query.sort.as_deref() {
            None | Some("") => S::default(),
            Some(id) => id.parse::<S>()?,
        };
        let limit = self.resolve_limit(query.limit)?;
        let cursor = query.next.as_deref().filter(|next| !next.is_empty());

        self.page(source, &sort, limit as i64, cursor).await
    }
}

impl Default for Paginator {
    fn default() -> Self {
        let config = PaginationConfig::default();
        Self {
            codec: CursorCodec::unsigned(),
            default_limit: config.default_limit,
            max_limit: config.max_limit,
        }
    }
}
