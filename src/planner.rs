use async_trait::async_trait;

use crate::data_models::{FetchedPage, ResourcesInfo};
use crate::error::Result;

/// Results per API page.
pub const PAGE_SIZE: usize = 20;
/// Result count used when the caller asks for zero or fewer.
pub const DEFAULT_COUNT: usize = 20;

/// Something that can report the account quota and hand out result pages.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn resources_info(&self) -> Result<ResourcesInfo>;

    async fn fetch(&self, page: usize) -> Result<FetchedPage>;
}

/// Normalizes a requested result count: anything `<= 0` means 20.
pub fn normalize_count(num: i64) -> usize {
    if num <= 0 {
        DEFAULT_COUNT
    } else {
        usize::try_from(num).unwrap_or(usize::MAX)
    }
}

/// Pages needed to hold `count` results.
pub fn pages_for(count: u64) -> usize {
    usize::try_from(count.div_ceil(PAGE_SIZE as u64)).unwrap_or(usize::MAX)
}

/// `ceil(num / 20)`, with `num <= 0` treated as 20.
pub fn max_page_for(num: i64) -> usize {
    pages_for(normalize_count(num) as u64)
}

/// Outcome of quota planning: how many pages to fetch, and page 1 when the
/// account had any quota left.
#[derive(Debug)]
pub struct QuotaPlan {
    pub max_page: usize,
    pub first_page: Option<FetchedPage>,
}

/// Clamps `requested_max_page` by the remaining search quota and, once page 1
/// is known, by the total number of results the API reports.
///
/// Errors from the quota lookup and from page 1 are returned unchanged.
pub async fn plan<S>(source: &S, requested_max_page: usize) -> Result<QuotaPlan>
where
    S: PageSource + ?Sized,
{
    let info = source.resources_info().await?;
    let quota = u64::try_from(info.resources.search).unwrap_or(0);
    let mut allowed_pages = pages_for(quota);

    let mut first_page = None;
    if allowed_pages > 0 {
        let page = source.fetch(1).await?;
        allowed_pages = allowed_pages.min(pages_for(page.result.total));
        first_page = Some(page);
    } else {
        log::warn!("search quota exhausted for plan: {}", info.plan);
    }

    let max_page = requested_max_page.min(allowed_pages);
    log::info!(
        "planned {max_page} page(s): requested {requested_max_page}, quota {quota}, allowed {allowed_pages}"
    );
    Ok(QuotaPlan {
        max_page,
        first_page,
    })
}
