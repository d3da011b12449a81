//! Lazy paged reads.
//!
//! A batch read is a finite stream of pages: page `n + 1` is only requested
//! after page `n` came back full, and the stream ends after the first short
//! page. Calling [`pages`] again restarts from the first page.

use std::future::Future;

use futures_util::stream::{self, Stream, TryStreamExt};

use fulfillment_core::PageRequest;

use crate::error::StoreError;

/// Stream pages produced by `fetch`, starting at `first`.
pub fn pages<T, F, Fut>(first: PageRequest, fetch: F) -> impl Stream<Item = Result<Vec<T>, StoreError>>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Vec<T>, StoreError>>,
{
    stream::try_unfold((Some(first), fetch), |(next, mut fetch)| async move {
        let Some(request) = next else {
            return Ok(None);
        };
        let page = fetch(request).await?;
        tracing::debug!(page = request.page, rows = page.len(), "fetched page");
        let following = (!request.is_last(page.len())).then(|| request.next());
        Ok(Some((page, (following, fetch))))
    })
}

/// Drain every page into one vector, preserving store order.
pub async fn collect_all<T, F, Fut>(first: PageRequest, fetch: F) -> Result<Vec<T>, StoreError>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Vec<T>, StoreError>>,
{
    pages(first, fetch).try_concat().await
}
