//! Lazy record stream over successive pages.

use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::{Stream, stream};
use tracing::debug;

use super::{PageRequest, PageSource};
use crate::error::FetchError;

struct StreamState<S, T> {
    source: Arc<S>,
    resource: String,
    page_size: u32,
    next_page: u32,
    total_pages: Option<u32>,
    buffered: VecDeque<T>,
}

/// Yields records one at a time, fetching the next page only when the
/// buffered one is exhausted.
pub(super) fn record_stream<S, T>(
    source: Arc<S>,
    resource: String,
    page_size: u32,
) -> impl Stream<Item = Result<T, FetchError>> + Send + 'static
where
    S: PageSource<T> + 'static,
    T: Send + 'static,
{
    let state = StreamState {
        source,
        resource,
        page_size,
        next_page: 1,
        total_pages: None,
        buffered: VecDeque::new(),
    };

    stream::try_unfold(state, |mut state| async move {
        loop {
            if let Some(record) = state.buffered.pop_front() {
                return Ok(Some((record, state)));
            }
            if state
                .total_pages
                .is_some_and(|total| state.next_page > total)
            {
                return Ok(None);
            }
            if state.page_size == 0 {
                return Err(FetchError::InvalidPageSize {
                    value: state.page_size,
                    reason: "must be at least 1",
                });
            }

            let request =
                PageRequest::new(state.resource.as_str(), state.next_page, state.page_size);
            let response = state.source.fetch_page(&request).await?;
            let total = *state
                .total_pages
                .get_or_insert(response.total_pages.max(1));
            debug!(
                page = state.next_page,
                total_pages = total,
                records = response.records.len(),
                "streamed page"
            );
            state.next_page += 1;
            state.buffered.extend(response.records);
        }
    })
}
