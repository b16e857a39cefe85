//! Page-delimited record retrieval.
//!
//! A [`Paginator`] drives any [`PageSource`] (the authenticated API client,
//! or a test fake) through a resource split into fixed-size pages. Page 1 is
//! always fetched first because it is the only source of the total page
//! count; the remaining pages are then fetched sequentially, through a
//! bounded worker pool, or lazily as a stream.
//!
//! # Ordering
//!
//! Pages are 1-based and contiguous. `fetch_all` returns records in
//! ascending page order whatever order parallel workers finish in;
//! `stream_pages` never reads ahead of the page being consumed.
//!
//! # Known limitation
//!
//! If the dataset changes during enumeration, later pages reflect the state
//! at the time they were fetched. The page count discovered on page 1 is not
//! re-checked.
//!
//! # Example
//!
//! ```no_run
//! use intra42::{ApiClient, FetchStrategy, Paginator, Record, Session, SessionConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Session::builder()
//!     .config(SessionConfig::default())
//!     .base_url("https://api.intra.42.fr")
//!     .build()?;
//! let api = ApiClient::authenticate(session, "uid", "secret").await?;
//! let paginator = Paginator::new(api);
//! let projects: Vec<Record> = paginator
//!     .fetch_all("/v2/cursus/21/projects", 100, FetchStrategy::parallel())
//!     .await?;
//! println!("{} projects", projects.len());
//! # Ok(())
//! # }
//! ```

mod pool;
mod stream;

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::Stream;
use tracing::{debug, info, instrument};

use crate::error::FetchError;

pub use pool::{WorkerPoolConfig, default_max_workers};

/// Default number of records requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// One page fetch: resource path, 1-based page number, page size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    resource: String,
    page: u32,
    page_size: u32,
}

impl PageRequest {
    pub(crate) fn new(resource: impl Into<String>, page: u32, page_size: u32) -> Self {
        debug_assert!(page >= 1 && page_size >= 1);
        Self {
            resource: resource.into(),
            page,
            page_size,
        }
    }

    /// Resource path, e.g. `/v2/cursus/21/projects`.
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// 1-based page number.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Records per page.
    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }
}

/// Records of one page plus the total page count the server reported.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResponse<T> {
    /// Records in server order.
    pub records: Vec<T>,
    /// Total number of pages for the resource at fetch time.
    pub total_pages: u32,
    /// Index of this page.
    pub page: u32,
}

/// Anything that can serve one page of a resource.
///
/// Implementations must report the total page count on every page; the
/// paginator reads it from page 1 only.
#[async_trait]
pub trait PageSource<T>: Send + Sync {
    /// Fetches one page.
    ///
    /// # Errors
    ///
    /// `Auth` on credential rejection, a transient variant on server or
    /// network failure, `Decode` when the body does not match the schema.
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse<T>, FetchError>;
}

/// How `fetch_all` retrieves pages `2..=N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// One page at a time, in index order.
    Sequential,
    /// Through a bounded worker pool.
    Parallel(WorkerPoolConfig),
}

impl FetchStrategy {
    /// Parallel with the default worker count.
    #[must_use]
    pub fn parallel() -> Self {
        Self::Parallel(WorkerPoolConfig::default())
    }
}

impl Default for FetchStrategy {
    fn default() -> Self {
        Self::parallel()
    }
}

/// Enumerates paginated resources through a [`PageSource`].
#[derive(Debug)]
pub struct Paginator<S> {
    source: Arc<S>,
}

impl<S> Clone for Paginator<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<S> Paginator<S> {
    /// Wraps a page source.
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    /// Wraps an already shared page source.
    #[must_use]
    pub fn from_shared(source: Arc<S>) -> Self {
        Self { source }
    }

    /// Returns the wrapped source.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetches a single page.
    ///
    /// # Errors
    ///
    /// [`FetchError::InvalidPageSize`] for a zero page size, otherwise
    /// whatever the source returns. Page 0 is treated as page 1.
    pub async fn fetch_page<T>(
        &self,
        resource: &str,
        page: u32,
        page_size: u32,
    ) -> Result<PageResponse<T>, FetchError>
    where
        S: PageSource<T>,
    {
        validate_page_size(page_size)?;
        let request = PageRequest::new(resource, page.max(1), page_size);
        self.source.fetch_page(&request).await
    }

    /// Fetches every record of `resource`, in page order.
    ///
    /// Page 1 is fetched first to learn the page count `N`; pages `2..=N`
    /// follow according to `strategy`. A failed page fails the whole call:
    /// in parallel mode, in-flight fetches are allowed to finish, no further
    /// pages are started, and no partial list is returned. Nothing is retried.
    ///
    /// # Errors
    ///
    /// [`FetchError::InvalidPageSize`] / [`FetchError::InvalidWorkers`] for
    /// invalid arguments, or the first error any page fetch produced.
    #[instrument(skip(self, strategy))]
    pub async fn fetch_all<T>(
        &self,
        resource: &str,
        page_size: u32,
        strategy: FetchStrategy,
    ) -> Result<Vec<T>, FetchError>
    where
        S: PageSource<T> + 'static,
        T: Send + 'static,
    {
        validate_page_size(page_size)?;
        if let FetchStrategy::Parallel(pool) = strategy {
            pool.validate()?;
        }

        let first = self
            .source
            .fetch_page(&PageRequest::new(resource, 1, page_size))
            .await?;
        let total_pages = first.total_pages.max(1);
        let mut records = first.records;
        debug!(total_pages, first_page_records = records.len(), "discovered page count");

        if total_pages == 1 {
            return Ok(records);
        }

        match strategy {
            FetchStrategy::Sequential => {
                info!(total_pages, "fetching pages sequentially");
                for page in 2..=total_pages {
                    let response = self
                        .source
                        .fetch_page(&PageRequest::new(resource, page, page_size))
                        .await?;
                    debug!(page, records = response.records.len(), "loaded page");
                    records.extend(response.records);
                }
            }
            FetchStrategy::Parallel(pool) => {
                info!(total_pages, workers = pool.max_workers(), "fetching pages in parallel");
                let pages = pool::fetch_remaining(
                    Arc::clone(&self.source),
                    resource,
                    page_size,
                    total_pages,
                    pool.max_workers(),
                )
                .await?;
                for page_records in pages.into_values() {
                    records.extend(page_records);
                }
            }
        }

        info!(total_records = records.len(), "all pages loaded");
        Ok(records)
    }

    /// Lazily yields every record of `resource`, one page buffered at a time.
    ///
    /// Page `k + 1` is requested only once page `k`'s records have all been
    /// taken. The stream ends after the page count discovered on page 1, or
    /// right after yielding the first error. It cannot be rewound; call
    /// again for a fresh stream.
    pub fn stream_pages<T>(
        &self,
        resource: &str,
        page_size: u32,
    ) -> impl Stream<Item = Result<T, FetchError>> + Send + 'static
    where
        S: PageSource<T> + 'static,
        T: Send + 'static,
    {
        stream::record_stream(Arc::clone(&self.source), resource.to_string(), page_size)
    }
}

fn validate_page_size(page_size: u32) -> Result<(), FetchError> {
    if page_size == 0 {
        return Err(FetchError::InvalidPageSize {
            value: page_size,
            reason: "must be at least 1",
        });
    }
    Ok(())
}
