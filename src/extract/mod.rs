//! Field extraction from a single listing page.

pub mod money;
pub mod strategies;

use crate::models::ListingRecord;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use strategies::first_match;

/// Host serving listing photos
pub const MEDIA_HOST: &str = "https://img.kleinanzeigen.de";

/// Containers tried, in order, for the listing's main text
const MAIN_SECTIONS: &[&str] = &["#viewad-main", "main", "article"];

/// Pre-digested listing markup the strategies work on
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    /// Text of the main section, one space between text nodes
    pub text: String,
    /// Label → value pairs from `<dl>` detail tables
    pub details: HashMap<String, String>,
    pub title: Option<String>,
    pub image_url: Option<String>,
}

impl ListingPage {
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);

        let main = MAIN_SECTIONS
            .iter()
            .filter_map(|css| Selector::parse(css).ok())
            .find_map(|selector| document.select(&selector).next())
            .unwrap_or_else(|| document.root_element());

        Self {
            text: joined_text(main),
            details: detail_table(&document),
            title: title(&document),
            image_url: image_url(&document),
        }
    }

    pub fn detail(&self, label: &str) -> Option<&str> {
        self.details.get(label).map(String::as_str)
    }
}

fn joined_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn detail_table(document: &Html) -> HashMap<String, String> {
    let dl_selector = Selector::parse("dl").unwrap();
    let dt_selector = Selector::parse("dt").unwrap();
    let dd_selector = Selector::parse("dd").unwrap();

    let mut details = HashMap::new();
    for dl in document.select(&dl_selector) {
        for (dt, dd) in dl.select(&dt_selector).zip(dl.select(&dd_selector)) {
            let label = joined_text(dt);
            if label.is_empty() {
                continue;
            }
            // A repeated label takes the later value
            details.insert(label, joined_text(dd));
        }
    }
    details
}

fn title(document: &Html) -> Option<String> {
    let h1_selector = Selector::parse("h1").unwrap();
    document
        .select(&h1_selector)
        .next()
        .map(joined_text)
        .filter(|title| !title.is_empty())
}

fn image_url(document: &Html) -> Option<String> {
    let img_selector = Selector::parse(&format!("img[src*='{MEDIA_HOST}']")).unwrap();
    document
        .select(&img_selector)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(str::to_string)
}

/// Turn listing markup into a record. Fields that cannot be recovered stay empty.
pub fn extract_listing(html: &str, url: &str) -> ListingRecord {
    let page = ListingPage::parse(html);
    let mut record = ListingRecord::new(url);

    if let Some(title) = page.title.clone() {
        record.title = title;
    }

    if let Some(quote) = first_match("price", strategies::PRICE, &page) {
        record.price = Some(quote.amount);
        record.negotiable = quote.negotiable;
    }

    record.area = first_match("area", strategies::AREA, &page);
    record.rooms = first_match("rooms", strategies::ROOMS, &page);
    record.year_built = first_match("year_built", strategies::YEAR_BUILT, &page);
    record.set_locality(first_match("locality", strategies::LOCALITY, &page));
    record.monthly_fee = first_match("monthly_fee", strategies::MONTHLY_FEE, &page);
    record.net_rent_equivalent = first_match("net_rent_equivalent", strategies::NET_RENT, &page);
    record.image_url = page.image_url;

    record.refresh_derived();
    record
}
