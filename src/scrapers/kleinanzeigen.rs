use crate::error::FetchError;
use crate::models::ListingLink;
use crate::scrapers::traits::PageFetcher;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use reqwest::{Client, ClientBuilder};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Browser identification sent with every request
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Path prefix of listing detail pages
pub const LISTING_PATH: &str = "/s-anzeige/";

/// Upper bound on result pages crawled for one search
pub const MAX_RESULT_PAGES: u32 = 100;

static RE_PAGE_INDEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/seite:(\d+)").unwrap());
static RE_POSTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d{1,2}\.\d{1,2}\.\d{4})|\bheute\b|\bgestern\b").unwrap());

/// HTTP access to kleinanzeigen.de
pub struct KleinanzeigenClient {
    client: Client,
}

impl KleinanzeigenClient {
    /// Create a client with the default 30 second timeout
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = client_builder(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

fn client_builder(timeout: Duration) -> ClientBuilder {
    Client::builder().timeout(timeout).user_agent(USER_AGENT)
}

#[async_trait]
impl PageFetcher for KleinanzeigenClient {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        debug!("Fetching URL: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            warn!(url, status = %response.status(), "Request was not successful");
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let html = response.text().await.map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?;

        debug!("Downloaded {} bytes of HTML", html.len());
        Ok(html)
    }

    fn source_name(&self) -> &'static str {
        "Kleinanzeigen"
    }
}

/// Highest page index referenced by the pagination links, 1 when there are none.
/// Capped at [`MAX_RESULT_PAGES`].
pub fn total_pages(html: &str) -> u32 {
    let document = Html::parse_document(html);
    let anchor_selector = Selector::parse("a[href]").unwrap();

    let pages = document
        .select(&anchor_selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| RE_PAGE_INDEX.captures(href))
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .max()
        .unwrap_or(1)
        .max(1);

    if pages > MAX_RESULT_PAGES {
        warn!(pages, max = MAX_RESULT_PAGES, "Pagination links exceed the page limit, capping");
        return MAX_RESULT_PAGES;
    }
    pages
}

/// URL of result page `page`: `/seite:<page>` goes right before the category marker.
/// Without the marker the base URL is returned unchanged.
pub fn build_page_url(base: &str, page: u32, marker: &str) -> String {
    let Ok(mut url) = Url::parse(base) else {
        return base.to_string();
    };

    let path = url.path().to_string();
    let Some(idx) = path.find(marker) else {
        return base.to_string();
    };

    let paged = format!("{}/seite:{}{}", &path[..idx], page, &path[idx..]);
    url.set_path(&paged);
    url.to_string()
}

/// Resolve `href` against the origin and drop query and fragment.
/// Returns `None` unless it points at a listing detail page.
pub fn canonical_listing_url(origin: &Url, href: &str) -> Option<String> {
    let mut url = origin.join(href).ok()?;
    if !url.path().starts_with(LISTING_PATH) {
        return None;
    }
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}

/// Turn "Heute", "Gestern" or "13.10.2025" into a date
pub fn parse_relative_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let caps = RE_POSTED.captures(text)?;
    if let Some(date) = caps.get(1) {
        return NaiveDate::parse_from_str(date.as_str(), "%d.%m.%Y").ok();
    }

    if caps[0].eq_ignore_ascii_case("heute") {
        Some(today)
    } else {
        today.pred_opt()
    }
}

/// Extract listing links from a result page, in page order, without duplicates.
///
/// Links inside an `article.aditem` card also carry the card's posting date.
pub fn parse_results_page(html: &str, origin: &str, today: NaiveDate) -> Vec<ListingLink> {
    let Ok(origin) = Url::parse(origin) else {
        warn!(origin, "Cannot resolve links against an invalid origin URL");
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let card_selector = Selector::parse("article.aditem").unwrap();
    let link_selector = Selector::parse("a[href*='/s-anzeige/']").unwrap();

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for card in document.select(&card_selector) {
        let Some(url) = card
            .select(&link_selector)
            .filter_map(|a| a.value().attr("href"))
            .find_map(|href| canonical_listing_url(&origin, href))
        else {
            continue;
        };

        let date_posted = card
            .text()
            .find_map(|text| parse_relative_date(text, today));

        if seen.insert(url.clone()) {
            links.push(ListingLink { url, date_posted });
        }
    }

    // Listings rendered outside of cards
    for anchor in document.select(&link_selector) {
        let Some(url) = anchor
            .value()
            .attr("href")
            .and_then(|href| canonical_listing_url(&origin, href))
        else {
            continue;
        };

        if seen.insert(url.clone()) {
            links.push(ListingLink {
                url,
                date_posted: None,
            });
        }
    }

    debug!(count = links.len(), "Parsed result page");
    links
}
