//! Bounded worker pool for pages `2..=N`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::{PageRequest, PageSource};
use crate::error::FetchError;

/// Upper bound on the default worker count.
const MAX_DEFAULT_WORKERS: usize = 32;

/// CPU count assumed when the platform cannot report one.
const FALLBACK_CPU_COUNT: usize = 4;

/// Default worker count: `min(32, 2 × logical CPUs)`.
#[must_use]
pub fn default_max_workers() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(FALLBACK_CPU_COUNT);
    (cpus * 2).min(MAX_DEFAULT_WORKERS)
}

/// Parallel fetch settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    max_workers: usize,
}

impl WorkerPoolConfig {
    /// Creates a pool configuration with at most `max_workers` pages in flight.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidWorkers`] when `max_workers` is 0.
    pub fn new(max_workers: usize) -> Result<Self, FetchError> {
        let config = Self { max_workers };
        config.validate()?;
        Ok(config)
    }

    /// Maximum number of concurrent page fetches.
    #[must_use]
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub(super) fn validate(&self) -> Result<(), FetchError> {
        if self.max_workers == 0 {
            return Err(FetchError::InvalidWorkers {
                value: self.max_workers,
            });
        }
        Ok(())
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
        }
    }
}

/// Outcome of one worker: `None` when it was skipped after another page failed.
type PageOutcome<T> = Result<(u32, Option<Vec<T>>), FetchError>;

/// Fetches pages `2..=total_pages` with at most `max_workers` in flight.
///
/// Returns page bodies keyed by index. After the first failure no new page
/// is started; fetches already in flight run to completion and their
/// results are discarded.
pub(super) async fn fetch_remaining<S, T>(
    source: Arc<S>,
    resource: &str,
    page_size: u32,
    total_pages: u32,
    max_workers: usize,
) -> Result<BTreeMap<u32, Vec<T>>, FetchError>
where
    S: PageSource<T> + 'static,
    T: Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_workers));
    let failed = Arc::new(AtomicBool::new(false));
    let mut tasks: JoinSet<PageOutcome<T>> = JoinSet::new();

    for page in 2..=total_pages {
        // Blocks while `max_workers` pages are in flight
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|_| FetchError::Worker {
                reason: "worker pool closed".to_string(),
            })?;

        if failed.load(Ordering::SeqCst) {
            debug!(page, "not starting page after earlier failure");
            break;
        }

        let source = Arc::clone(&source);
        let failed = Arc::clone(&failed);
        let request = PageRequest::new(resource, page, page_size);

        tasks.spawn(async move {
            let _permit = permit;
            if failed.load(Ordering::SeqCst) {
                return Ok((page, None));
            }
            match source.fetch_page(&request).await {
                Ok(response) => {
                    debug!(page, records = response.records.len(), "loaded page");
                    Ok((page, Some(response.records)))
                }
                Err(error) => {
                    failed.store(true, Ordering::SeqCst);
                    warn!(page, error = %error, "page fetch failed");
                    Err(error)
                }
            }
        });
    }

    let mut pages = BTreeMap::new();
    let mut first_error = None;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok((page, Some(records)))) => {
                pages.insert(page, records);
            }
            Ok(Ok((_, None))) => {}
            Ok(Err(error)) => {
                first_error.get_or_insert(error);
            }
            Err(join_error) => {
                failed.store(true, Ordering::SeqCst);
                warn!(error = %join_error, "page worker panicked");
                first_error.get_or_insert(FetchError::Worker {
                    reason: join_error.to_string(),
                });
            }
        }
    }

    if let Some(error) = first_error {
        return Err(error);
    }
    Ok(pages)
}
