//! Ordered extraction strategies per listing field.
//!
//! Each field has a table of named strategies. They are tried in order and the first
//! one that yields a value wins; results are never merged across strategies.

use super::money::{parse_decimal, parse_price};
use super::ListingPage;
use chrono::{Datelike, Utc};
use regex::Regex;
use std::sync::LazyLock;
use tracing::trace;

/// German amount: `250.000`, `250 000`, `189.500,00`, `320` or `320,5`.
/// A group separator is either `.` or a (non-breaking) space, never a mix of both.
const AMOUNT: &str =
    r"(\d{1,3}(?:\.\d{3})+(?:,\d{1,2})?|\d{1,3}(?:[ \x{a0}]\d{3})+(?:,\d{1,2})?|\d+(?:,\d{1,2})?)";

static RE_LABELED_PRICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:Kaufpreis|Gesamtpreis|Preis)\b\s*:?\s*{AMOUNT}\s*(?:€|EUR)"
    ))
    .unwrap()
});
static RE_BARE_PRICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?:^|[^\d.,\s])\s*{AMOUNT}\s*(?:€|EUR)")).unwrap());
static RE_VB: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bVB\b").unwrap());
static RE_VB_ANY_CASE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bVB\b").unwrap());
static RE_FIVE_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{5}").unwrap());

static RE_AREA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,3}(?:\.\d{3})+(?:,\d{1,2})?|\d{1,5}(?:[.,]\d{1,2})?)\s?m(?:²|2\b)").unwrap()
});

static RE_ROOM_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2}(?:[.,]\d)?)").unwrap());
static RE_ROOMS_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2}(?:[.,]\d)?)\s*(?:Zimmer|Zi)\b").unwrap()
});
static RE_ROOMS_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:Zimmer|Zi)\s*[:\-]?\s*(\d{1,2}(?:[.,]\d)?)\b").unwrap()
});

static RE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{4})").unwrap());
static RE_YEAR_LABELED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[Bb]aujahr[:\s]+(\d{4})").unwrap());

static RE_LOCALITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{5}\s+[A-ZÄÖÜa-zäöüß\- ]+)\b").unwrap());

static RE_DETAIL_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d[\d.\s,]*)").unwrap());
static RE_HAUSGELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)Hausgeld[:\s]+{AMOUNT}\s*(?:€|EUR)")).unwrap()
});
static RE_KALTMIETE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)Kaltmiete[:\s]+{AMOUNT}\s*(?:€|EUR)")).unwrap()
});

/// Characters scanned after a price (or a bare `VB`) for a qualifying marker
const MARKER_WINDOW: usize = 20;

/// Oldest construction year we accept as plausible
const EARLIEST_YEAR: i32 = 1800;

/// A named extraction strategy for one field
pub struct Strategy<T> {
    pub name: &'static str,
    pub apply: fn(&ListingPage) -> Option<T>,
}

/// Run strategies in order and return the first value produced
pub fn first_match<T>(field: &str, strategies: &[Strategy<T>], page: &ListingPage) -> Option<T> {
    strategies.iter().find_map(|strategy| {
        let value = (strategy.apply)(page);
        if value.is_some() {
            trace!(field, strategy = strategy.name, "Field extracted");
        }
        value
    })
}

/// Extracted asking price
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuote {
    pub amount: f64,
    pub negotiable: bool,
}

pub const PRICE: &[Strategy<PriceQuote>] = &[
    Strategy { name: "labeled_price", apply: labeled_price },
    Strategy { name: "bare_price", apply: bare_price },
    Strategy { name: "price_on_request", apply: price_on_request },
];

pub const AREA: &[Strategy<f64>] = &[Strategy { name: "area_with_unit", apply: area_with_unit }];

pub const ROOMS: &[Strategy<f64>] = &[
    Strategy { name: "rooms_from_details", apply: rooms_from_details },
    Strategy { name: "rooms_before_label", apply: rooms_before_label },
    Strategy { name: "rooms_after_label", apply: rooms_after_label },
];

pub const YEAR_BUILT: &[Strategy<i32>] = &[
    Strategy { name: "year_from_details", apply: year_from_details },
    Strategy { name: "year_from_text", apply: year_from_text },
];

pub const LOCALITY: &[Strategy<String>] = &[Strategy { name: "postal_locality", apply: postal_locality }];

pub const MONTHLY_FEE: &[Strategy<f64>] = &[
    Strategy { name: "hausgeld_from_details", apply: hausgeld_from_details },
    Strategy { name: "hausgeld_from_text", apply: hausgeld_from_text },
];

pub const NET_RENT: &[Strategy<f64>] = &[
    Strategy { name: "kaltmiete_from_details", apply: kaltmiete_from_details },
    Strategy { name: "kaltmiete_from_text", apply: kaltmiete_from_text },
];

/// Up to `chars` characters of `text` starting at byte offset `start`
fn window_after(text: &str, start: usize, chars: usize) -> &str {
    let rest = &text[start..];
    let cut = rest
        .char_indices()
        .nth(chars)
        .map(|(idx, _)| idx)
        .unwrap_or(rest.len());
    &rest[..cut]
}

fn quote_from(regex: &Regex, text: &str) -> Option<PriceQuote> {
    let caps = regex.captures(text)?;
    let whole = caps.get(0)?;
    let amount = parse_price(&caps[1])?;
    let negotiable = RE_VB_ANY_CASE.is_match(window_after(text, whole.end(), MARKER_WINDOW));
    Some(PriceQuote { amount, negotiable })
}

/// "Kaufpreis 250.000 €", optionally followed by "VB"
pub fn labeled_price(page: &ListingPage) -> Option<PriceQuote> {
    quote_from(&RE_LABELED_PRICE, &page.text)
}

/// First amount carrying a currency marker, without a label
pub fn bare_price(page: &ListingPage) -> Option<PriceQuote> {
    quote_from(&RE_BARE_PRICE, &page.text)
}

/// A bare "VB" followed closely by a postal code means the price is on request.
///
/// The postal code is only a proxy for "VB sits in the price slot of the header";
/// a postal code near an unrelated VB mention also triggers it.
pub fn price_on_request(page: &ListingPage) -> Option<PriceQuote> {
    let marker = RE_VB.find(&page.text)?;
    let following = window_after(&page.text, marker.end(), MARKER_WINDOW);
    RE_FIVE_DIGITS.is_match(following).then_some(PriceQuote {
        amount: 0.0,
        negotiable: true,
    })
}

pub fn area_with_unit(page: &ListingPage) -> Option<f64> {
    let caps = RE_AREA.captures(&page.text)?;
    parse_decimal(&caps[1]).filter(|area| *area > 0.0)
}

fn room_count(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse().ok()
}

pub fn rooms_from_details(page: &ListingPage) -> Option<f64> {
    let value = page.detail("Zimmer")?;
    let caps = RE_ROOM_COUNT.captures(value)?;
    room_count(&caps[1])
}

/// "3 Zimmer", "2,5 Zi"
pub fn rooms_before_label(page: &ListingPage) -> Option<f64> {
    let caps = RE_ROOMS_SUFFIX.captures(&page.text)?;
    room_count(&caps[1])
}

/// "Zimmer: 3", "Zi - 2,5"
pub fn rooms_after_label(page: &ListingPage) -> Option<f64> {
    let caps = RE_ROOMS_PREFIX.captures(&page.text)?;
    room_count(&caps[1])
}

fn plausible_year(year: i32) -> Option<i32> {
    let latest = Utc::now().year() + 5;
    (EARLIEST_YEAR..=latest).contains(&year).then_some(year)
}

pub fn year_from_details(page: &ListingPage) -> Option<i32> {
    let value = page.detail("Baujahr")?;
    let caps = RE_YEAR.captures(value)?;
    caps[1].parse().ok().and_then(plausible_year)
}

pub fn year_from_text(page: &ListingPage) -> Option<i32> {
    let caps = RE_YEAR_LABELED.captures(&page.text)?;
    caps[1].parse().ok().and_then(plausible_year)
}

/// "27721 Ritterhude"
pub fn postal_locality(page: &ListingPage) -> Option<String> {
    let caps = RE_LOCALITY.captures(&page.text)?;
    let locality = caps[1].trim();
    (!locality.is_empty()).then(|| locality.to_string())
}

fn fee_from_details(page: &ListingPage, label: &str) -> Option<f64> {
    let value = page.detail(label)?;
    let caps = RE_DETAIL_AMOUNT.captures(value)?;
    parse_price(&caps[1])
}

fn fee_from_text(regex: &Regex, page: &ListingPage) -> Option<f64> {
    let caps = regex.captures(&page.text)?;
    parse_price(&caps[1])
}

pub fn hausgeld_from_details(page: &ListingPage) -> Option<f64> {
    fee_from_details(page, "Hausgeld")
}

pub fn hausgeld_from_text(page: &ListingPage) -> Option<f64> {
    fee_from_text(&RE_HAUSGELD, page)
}

pub fn kaltmiete_from_details(page: &ListingPage) -> Option<f64> {
    fee_from_details(page, "Kaltmiete")
}

pub fn kaltmiete_from_text(page: &ListingPage) -> Option<f64> {
    fee_from_text(&RE_KALTMIETE, page)
}
