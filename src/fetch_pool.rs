use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::data_models::{Kind, Page, PageStatus, SearchResult};
use crate::error::{Error, Result};
use crate::planner::{self, PageSource};

/// Above this many pages the remaining pages are fetched concurrently.
pub const CONCURRENT_THRESHOLD: usize = 5;
pub const MAX_WORKERS: usize = 20;

struct PageReport {
    page: Page,
    result: Result<SearchResult>,
}

/// Fetches pages `2..=max_page` with a bounded pool of workers.
///
/// Workers claim page indices from a shared cursor. The first failed page
/// cancels the pool: no new pages are claimed, but pages already in flight
/// finish and are still collected. The error is returned only when no page
/// succeeded at all.
pub async fn fetch_concurrent<S>(
    source: Arc<S>,
    max_page: usize,
) -> Result<BTreeMap<usize, SearchResult>>
where
    S: PageSource + ?Sized + 'static,
{
    let mut pages = BTreeMap::new();
    if max_page < 2 {
        return Ok(pages);
    }

    let group_size = (max_page - 1).min(MAX_WORKERS);
    let cursor = Arc::new(AtomicUsize::new(2));
    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel::<PageReport>(max_page - 1);

    let mut workers = Vec::with_capacity(group_size);
    for worker in 0..group_size {
        let source = source.clone();
        let cursor = cursor.clone();
        let cancel = cancel.clone();
        let tx = tx.clone();
        workers.push(tokio::spawn(async move {
            loop {
                if cancel.is_cancelled() {
                    log::debug!("worker {worker} stopping: pool cancelled");
                    break;
                }
                let index = cursor.fetch_add(1, Ordering::SeqCst);
                if index > max_page {
                    break;
                }
                let mut page = Page::pending(index);
                log::debug!("worker {worker} claimed page {index}");
                let result = match source.fetch(index).await {
                    Ok(fetched) => {
                        page.status = fetched.status;
                        Ok(fetched.result)
                    }
                    Err(e) => {
                        page.status = PageStatus::Failed;
                        Err(e)
                    }
                };
                if tx.send(PageReport { page, result }).await.is_err() {
                    break;
                }
            }
        }));
    }
    drop(tx);

    let mut first_error = None;
    let mut cached = 0usize;
    let mut failed = 0usize;
    // The channel closes once every worker has exited.
    while let Some(report) = rx.recv().await {
        match report.result {
            Ok(result) => {
                if report.page.status == PageStatus::Cached {
                    cached += 1;
                }
                pages.insert(report.page.index, result);
            }
            Err(e) => {
                failed += 1;
                log::warn!("page {} failed: {e}", report.page.index);
                if first_error.is_none() {
                    cancel.cancel();
                    first_error = Some(e);
                }
            }
        }
    }

    for joined in futures::future::join_all(workers).await {
        if let Err(e) = joined {
            log::error!("fetch worker ended abnormally: {e}");
            if first_error.is_none() {
                first_error = Some(Error::Task(e.to_string()));
            }
        }
    }

    log::info!(
        "fetched {} page(s) concurrently ({cached} from cache, {failed} failed)",
        pages.len()
    );
    match first_error {
        Some(e) if pages.is_empty() => Err(e),
        _ => Ok(pages),
    }
}

/// Fetches pages `2..=max_page` one after another, stopping at the first
/// failure.
pub async fn fetch_sequential<S>(
    source: &S,
    max_page: usize,
) -> (BTreeMap<usize, SearchResult>, Option<Error>)
where
    S: PageSource + ?Sized,
{
    let mut pages = BTreeMap::new();
    for index in 2..=max_page {
        match source.fetch(index).await {
            Ok(fetched) => {
                pages.insert(index, fetched.result);
            }
            Err(e) => {
                log::warn!("page {index} failed, stopping: {e}");
                return (pages, Some(e));
            }
        }
    }
    (pages, None)
}

/// Plans against the account quota and fetches up to `max_page` pages,
/// keyed by page index.
///
/// Page failures after page 1 are tolerated as long as at least one page was
/// retrieved.
pub async fn multi_page_search<S>(
    source: Arc<S>,
    max_page: usize,
) -> Result<BTreeMap<usize, SearchResult>>
where
    S: PageSource + ?Sized + 'static,
{
    let plan = planner::plan(source.as_ref(), max_page.max(1)).await?;
    let mut results = BTreeMap::new();
    if let Some(first) = plan.first_page {
        results.insert(1, first.result);
    }

    if plan.max_page > CONCURRENT_THRESHOLD {
        match fetch_concurrent(source, plan.max_page).await {
            Ok(pages) => {
                for (index, page) in pages {
                    results.entry(index).or_insert(page);
                }
            }
            Err(e) if results.is_empty() => return Err(e),
            Err(e) => log::warn!("all concurrent pages failed, keeping page 1: {e}"),
        }
        return Ok(results);
    }

    let (pages, error) = fetch_sequential(source.as_ref(), plan.max_page).await;
    results.extend(pages);
    match error {
        Some(e) if results.is_empty() => Err(e),
        _ => Ok(results),
    }
}

/// [`multi_page_search`] followed by an in-order merge of the pages.
pub async fn multi_to_one_search<S>(
    source: Arc<S>,
    kind: Kind,
    max_page: usize,
) -> Result<SearchResult>
where
    S: PageSource + ?Sized + 'static,
{
    let pages = multi_page_search(source, max_page).await?;
    Ok(crate::merger::merge_pages(kind, &pages))
}
