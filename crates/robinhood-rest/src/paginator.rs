//! Cursor pagination over list endpoints
//!
//! A [`Paginator`] drives a caller-supplied page fetcher. The fetcher gets
//! the `cursor` value taken from the stored `next`/`previous` URL; nothing
//! else of those URLs is reused.

use std::collections::HashSet;
use std::future::Future;

use futures::future::BoxFuture;
use robinhood_types::{extract_cursor, PageResponse};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::error::{RestError, RestResult};

/// Future returned by a page fetcher
pub type PageFuture<T> = BoxFuture<'static, RestResult<PageResponse<T>>>;

type FetchFn<T> = Box<dyn Fn(Option<String>, CancellationToken) -> PageFuture<T> + Send + Sync>;

/// Walks a cursor-paginated listing page by page
///
/// A new paginator has not fetched anything yet: `has_next()` is true and
/// the first `next()` fetches with no cursor. After that, `has_next()` and
/// `has_previous()` report whether the last page carried a non-empty
/// `next`/`previous` URL. Failed fetches leave the position unchanged, so
/// the same call can simply be repeated.
pub struct Paginator<T> {
    fetch: FetchFn<T>,
    next_url: Option<String>,
    previous_url: Option<String>,
    started: bool,
}

impl<T: Send + 'static> Paginator<T> {
    /// Create a paginator positioned before the first page
    ///
    /// `fetch` receives the cursor (`None` for the first page) and a
    /// cancellation token to forward to the request.
    pub fn new<F, Fut>(fetch: F) -> Self
    where
        F: Fn(Option<String>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RestResult<PageResponse<T>>> + Send + 'static,
    {
        Self {
            fetch: Box::new(move |cursor, cancel| Box::pin(fetch(cursor, cancel))),
            next_url: None,
            previous_url: None,
            started: false,
        }
    }

    /// Continue a listing from previously stored page URLs
    pub fn resume<F, Fut>(fetch: F, next_url: Option<String>, previous_url: Option<String>) -> Self
    where
        F: Fn(Option<String>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RestResult<PageResponse<T>>> + Send + 'static,
    {
        let mut paginator = Self::new(fetch);
        paginator.started = true;
        paginator.next_url = next_url.filter(|u| !u.is_empty());
        paginator.previous_url = previous_url.filter(|u| !u.is_empty());
        paginator
    }

    /// Whether another page can be fetched forwards
    pub fn has_next(&self) -> bool {
        !self.started || self.next_url.is_some()
    }

    /// Whether a page can be fetched backwards
    pub fn has_previous(&self) -> bool {
        self.previous_url.is_some()
    }

    /// URL of the following page, as last reported by the server
    pub fn next_url(&self) -> Option<&str> {
        self.next_url.as_deref()
    }

    /// URL of the preceding page, as last reported by the server
    pub fn previous_url(&self) -> Option<&str> {
        self.previous_url.as_deref()
    }

    /// Fetch the following page
    ///
    /// Returns an empty page without fetching when there is none.
    #[instrument(skip_all, level = "debug")]
    pub async fn next(&mut self, cancel: &CancellationToken) -> RestResult<Vec<T>> {
        match self.next_cursor() {
            Some(cursor) => self.fetch_page(cursor, cancel).await,
            None => Ok(Vec::new()),
        }
    }

    /// Cursor the next fetch would use; `None` when there is no next page
    fn next_cursor(&self) -> Option<Option<String>> {
        if !self.started {
            return Some(None);
        }
        self.next_url.as_deref().map(extract_cursor)
    }

    /// Fetch the preceding page
    ///
    /// Returns an empty page without fetching when there is none.
    #[instrument(skip_all, level = "debug")]
    pub async fn previous(&mut self, cancel: &CancellationToken) -> RestResult<Vec<T>> {
        let Some(url) = self.previous_url.as_deref() else {
            return Ok(Vec::new());
        };
        let cursor = extract_cursor(url);
        self.fetch_page(cursor, cancel).await
    }

    /// Fetch every remaining page and concatenate the results in order
    ///
    /// Fails with [`RestError::CursorCycle`] before re-requesting a page
    /// already fetched by this call. A `next` URL without a cursor points
    /// back at the first page.
    #[instrument(skip_all, level = "debug")]
    pub async fn get_all_pages(&mut self, cancel: &CancellationToken) -> RestResult<Vec<T>> {
        let mut results = Vec::new();
        let mut visited: HashSet<Option<String>> = HashSet::new();
        let mut pages = 0usize;

        while let Some(cursor) = self.next_cursor() {
            if !visited.insert(cursor.clone()) {
                return Err(RestError::CursorCycle {
                    cursor: cursor.unwrap_or_else(|| "(first page)".to_string()),
                });
            }

            results.extend(self.fetch_page(cursor, cancel).await?);
            pages += 1;
        }

        debug!(pages, items = results.len(), "Fetched all pages");
        Ok(results)
    }

    async fn fetch_page(
        &mut self,
        cursor: Option<String>,
        cancel: &CancellationToken,
    ) -> RestResult<Vec<T>> {
        debug!(cursor = cursor.as_deref().unwrap_or(""), "Fetching page");
        let page = (self.fetch)(cursor, cancel.clone()).await?;

        self.started = true;
        self.next_url = page.next_url().map(str::to_string);
        self.previous_url = page.previous_url().map(str::to_string);
        Ok(page.results)
    }
}

impl<T> std::fmt::Debug for Paginator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paginator")
            .field("next_url", &self.next_url)
            .field("previous_url", &self.previous_url)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}
