//! Crawl orchestration: result pages → listing links → parsed records.

pub mod progress;

use crate::error::{CrawlError, FetchError};
use crate::extract::extract_listing;
use crate::models::{ListingLink, ListingRecord};
use crate::scrapers::kleinanzeigen::{build_page_url, parse_results_page, total_pages};
use crate::scrapers::traits::PageFetcher;
use crate::scrapers::types::CrawlOptions;
use chrono::Local;
use progress::{CrawlProgress, ProgressTracker};
use std::collections::HashSet;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Insertion-ordered set of listing links; the first occurrence of a URL wins
#[derive(Debug, Default)]
pub struct LinkSet {
    links: Vec<ListingLink>,
    seen: HashSet<String>,
}

impl LinkSet {
    pub fn insert(&mut self, link: ListingLink) -> bool {
        if !self.seen.insert(link.url.clone()) {
            return false;
        }
        self.links.push(link);
        true
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn into_vec(self) -> Vec<ListingLink> {
        self.links
    }
}

impl Extend<ListingLink> for LinkSet {
    fn extend<I: IntoIterator<Item = ListingLink>>(&mut self, iter: I) {
        for link in iter {
            self.insert(link);
        }
    }
}

/// Drop repeated URLs, keeping the first occurrence and the original order
pub fn dedup_links(links: Vec<ListingLink>) -> Vec<ListingLink> {
    let mut set = LinkSet::default();
    set.extend(links);
    set.into_vec()
}

/// Outcome of one crawl
#[derive(Debug, Default)]
pub struct CrawlReport {
    /// Parsed listings in discovery order
    pub records: Vec<ListingRecord>,
    /// Unique listing links found on the result pages
    pub links_found: usize,
    pub failures: Vec<FetchError>,
    /// Result pages (beyond the first) that could not be fetched
    pub failed_pages: Vec<u32>,
    /// Set when the crawl stopped early on request
    pub cancelled: bool,
}

impl CrawlReport {
    pub fn failure_count(&self) -> usize {
        self.failures.len() + self.failed_pages.len()
    }
}

/// Sequential crawler with randomized pauses between requests
pub struct Crawler<F: PageFetcher> {
    fetcher: F,
    options: CrawlOptions,
    progress: Option<UnboundedSender<CrawlProgress>>,
    cancel: CancellationToken,
}

impl<F: PageFetcher> Crawler<F> {
    pub fn new(fetcher: F, options: CrawlOptions) -> Self {
        Self {
            fetcher,
            options,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Send a progress event after every listing
    pub fn with_progress(mut self, sender: UnboundedSender<CrawlProgress>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Stop between requests once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Crawl every result page reachable from `origin` and parse each listing.
    ///
    /// Only a failure on the first result page is returned as an error; everything
    /// after that is recorded in the report and skipped.
    pub async fn crawl(&self, origin: &str) -> Result<CrawlReport, CrawlError> {
        info!(source = self.fetcher.source_name(), origin, "Starting crawl");

        let first_page = self
            .fetcher
            .fetch(origin)
            .await
            .map_err(CrawlError::FirstPage)?;

        let mut report = CrawlReport::default();
        let links = self.discover_links(origin, first_page, &mut report).await;
        report.links_found = links.len();

        if links.is_empty() {
            info!(origin, "No listings found");
            return Ok(report);
        }

        info!(count = links.len(), "Found listing links");

        let tracker = ProgressTracker::start(links.len());
        for (idx, link) in links.into_iter().enumerate() {
            if idx > 0 && !self.pause().await {
                report.cancelled = true;
                break;
            }
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            match self.fetch_listing(&link).await {
                Ok(record) => report.records.push(record),
                Err(e) => {
                    warn!(url = %link.url, error = %e, "Skipping listing");
                    report.failures.push(e);
                }
            }

            self.emit(tracker.at(idx + 1));
        }

        for record in &mut report.records {
            record.refresh_derived();
        }

        info!(
            records = report.records.len(),
            failures = report.failure_count(),
            cancelled = report.cancelled,
            "Crawl finished"
        );
        Ok(report)
    }

    async fn discover_links(
        &self,
        origin: &str,
        first_page: String,
        report: &mut CrawlReport,
    ) -> Vec<ListingLink> {
        let today = Local::now().date_naive();
        let pages = total_pages(&first_page);
        info!(pages, "Result pages found");

        let mut links = LinkSet::default();
        links.extend(parse_results_page(&first_page, origin, today));

        for page in 2..=pages {
            if !self.pause().await {
                report.cancelled = true;
                break;
            }

            let url = build_page_url(origin, page, &self.options.category_marker);
            match self.fetcher.fetch(&url).await {
                Ok(html) => {
                    let found = parse_results_page(&html, origin, today);
                    debug!(page, count = found.len(), "Parsed result page");
                    links.extend(found);
                }
                Err(e) => {
                    warn!(page, error = %e, "Failed to fetch result page");
                    report.failed_pages.push(page);
                }
            }
        }

        // Final pass over the merged pages
        dedup_links(links.into_vec())
    }

    async fn fetch_listing(&self, link: &ListingLink) -> Result<ListingRecord, FetchError> {
        let html = self.fetcher.fetch(&link.url).await?;
        let mut record = extract_listing(&html, &link.url);
        record.date_posted = link.date_posted;
        debug!(url = %link.url, price = ?record.price, area = ?record.area, "Parsed listing");
        Ok(record)
    }

    /// Sleep for a politeness delay; false when cancelled meanwhile
    async fn pause(&self) -> bool {
        let delay = self.options.politeness_delay();
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    fn emit(&self, progress: CrawlProgress) {
        if let Some(sender) = &self.progress {
            // The receiver may be gone; progress is best-effort
            let _ = sender.send(progress);
        }
    }
}
