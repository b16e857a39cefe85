//! [`PageSource`] implementation for the REST API.
//!
//! The API pages with `page[number]` / `page[size]` query parameters and
//! reports the size of the collection in response headers. The total page
//! count is taken from `X-Total`, else from the `rel="last"` entry of the
//! `Link` header. When neither is present, a short page is taken to be the
//! last one.
//!
//! The server caps pages at [`MAX_PAGE_SIZE`] records without saying so in
//! the body, so larger requests are refused before any request is sent.

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{HeaderMap, LINK};
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use super::ApiClient;
use crate::error::FetchError;
use crate::paginate::{PageRequest, PageResponse, PageSource};

/// Query parameter carrying the 1-based page number.
pub const PAGE_NUMBER_PARAM: &str = "page[number]";

/// Query parameter carrying the page size.
pub const PAGE_SIZE_PARAM: &str = "page[size]";

/// Largest page the API serves.
pub const MAX_PAGE_SIZE: u32 = 100;

const TOTAL_HEADER: &str = "x-total";
const PER_PAGE_HEADER: &str = "x-per-page";

#[async_trait]
impl<T> PageSource<T> for ApiClient
where
    T: DeserializeOwned + Send + 'static,
{
    #[instrument(
        level = "debug",
        skip(self, request),
        fields(resource = request.resource(), page = request.page())
    )]
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse<T>, FetchError> {
        if request.page_size() > MAX_PAGE_SIZE {
            return Err(FetchError::InvalidPageSize {
                value: request.page_size(),
                reason: "the API serves at most 100 records per page",
            });
        }
        let query = [
            (PAGE_NUMBER_PARAM, request.page().to_string()),
            (PAGE_SIZE_PARAM, request.page_size().to_string()),
        ];
        let response = self.request(Method::GET, request.resource(), &query).await?;
        let url = response.url().to_string();
        let header_total = total_pages_from_headers(response.headers(), request.page_size());
        let body = response.bytes().await?;

        let records: Vec<T> = serde_json::from_slice(&body)
            .map_err(|e| FetchError::decode(&url, format!("expected an array of records: {e}")))?;

        let total_pages = match header_total {
            Some(total) => total,
            None if records.len() < request.page_size() as usize => request.page(),
            None => {
                return Err(FetchError::decode(
                    url,
                    "full page without X-Total or Link header; page count unknown",
                ));
            }
        };

        Ok(PageResponse {
            records,
            total_pages,
            page: request.page(),
        })
    }
}

/// Reads the total page count from `X-Total` or `Link: <...>; rel="last"`.
///
/// `X-Total` is divided by the page size the server reports in `X-Per-Page`,
/// falling back to the requested `page_size`. An empty collection
/// (`X-Total: 0`) still has one (empty) page.
#[must_use]
pub fn total_pages_from_headers(headers: &HeaderMap, page_size: u32) -> Option<u32> {
    let per_page = header_number(headers, PER_PAGE_HEADER)
        .filter(|&served| served > 0)
        .unwrap_or(u64::from(page_size.max(1)));
    let from_total = header_number(headers, TOTAL_HEADER).and_then(|total| {
        let pages = total.div_ceil(per_page).max(1);
        u32::try_from(pages).ok()
    });
    from_total.or_else(|| {
        headers
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(last_page_from_link)
    })
}

fn header_number(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

fn last_page_from_link(link: &str) -> Option<u32> {
    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        if !params.contains("rel=\"last\"") {
            return None;
        }
        let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        let url = Url::parse(target).ok()?;
        url.query_pairs()
            .find(|(name, _)| name == PAGE_NUMBER_PARAM || name == "page")
            .and_then(|(_, value)| value.parse::<u32>().ok())
    })
}
