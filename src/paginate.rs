//! Cursor-based pagination.
//!
//! Every Notion list/query endpoint answers with a [`PageResponse`]. The
//! [`Paginator`] turns such an endpoint into a lazy stream of batches: a page
//! is only requested once the previous batch has been consumed, and dropping
//! the stream stops further requests.

use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use tracing::{debug, warn};

/// One page of a paginated endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResponse<T> {
    pub results: Vec<T>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

/// A restartable pager over an endpoint `fetch(cursor) -> PageResponse<T>`.
pub struct Paginator<F> {
    fetch: F,
    start_cursor: Option<String>,
}

struct PagerState {
    /// `None` once the stream is exhausted.
    next: Option<Option<String>>,
    consumed: HashSet<String>,
}

impl<F> Paginator<F> {
    pub fn new(fetch: F) -> Self {
        Paginator {
            fetch,
            start_cursor: None,
        }
    }

    /// Start from a caller-supplied cursor instead of the first page.
    pub fn starting_at(mut self, cursor: impl Into<String>) -> Self {
        self.start_cursor = Some(cursor.into());
        self
    }
}

impl<F, Fut, T, E> Paginator<F>
where
    F: Fn(Option<String>) -> Fut,
    Fut: Future<Output = Result<PageResponse<T>, E>>,
{
    /// Stream the endpoint's batches in cursor order, starting over from the
    /// start cursor on every call.
    ///
    /// Ends after the first error, which is yielded unchanged.
    pub fn batches(&self) -> impl Stream<Item = Result<Vec<T>, E>> + '_ {
        let initial = PagerState {
            next: Some(self.start_cursor.clone()),
            consumed: HashSet::new(),
        };

        stream::unfold(initial, move |mut state| async move {
            let cursor = state.next.take()?;
            if let Some(cursor) = &cursor {
                state.consumed.insert(cursor.clone());
            }

            match (self.fetch)(cursor).await {
                Ok(page) => {
                    state.next = advance(&page, &state.consumed);
                    Some((Ok(page.results), state))
                }
                Err(e) => Some((Err(e), state)),
            }
        })
    }
}

fn advance<T>(page: &PageResponse<T>, consumed: &HashSet<String>) -> Option<Option<String>> {
    if !page.has_more {
        return None;
    }

    match page.next_cursor.as_deref() {
        None | Some("") => {
            debug!("has_more set without a next cursor, ending pagination");
            None
        }
        Some(cursor) if consumed.contains(cursor) => {
            warn!(cursor, "next cursor was already consumed, ending pagination");
            None
        }
        Some(cursor) => Some(Some(cursor.to_string())),
    }
}
