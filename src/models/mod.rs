use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static RE_POSTAL_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{5})\b").unwrap());

/// A listing discovered on a search result page
#[derive(Debug, Clone, PartialEq)]
pub struct ListingLink {
    pub url: String,
    pub date_posted: Option<NaiveDate>,
}

/// One parsed listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingRecord {
    pub url: String,
    pub title: String,
    pub price: Option<f64>,
    pub negotiable: bool,
    pub area: Option<f64>,
    pub rooms: Option<f64>,
    pub year_built: Option<i32>,
    locality: Option<String>,
    pub monthly_fee: Option<f64>,
    pub net_rent_equivalent: Option<f64>,
    pub image_url: Option<String>,
    pub date_posted: Option<NaiveDate>,

    // Derived, rebuilt by `refresh_derived` after loading
    #[serde(skip)]
    postal_code: Option<String>,
    #[serde(skip)]
    price_per_area: Option<f64>,
}

impl ListingRecord {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: "Unknown".to_string(),
            price: None,
            negotiable: false,
            area: None,
            rooms: None,
            year_built: None,
            locality: None,
            monthly_fee: None,
            net_rent_equivalent: None,
            image_url: None,
            date_posted: None,
            postal_code: None,
            price_per_area: None,
        }
    }

    pub fn locality(&self) -> Option<&str> {
        self.locality.as_deref()
    }

    /// Replace the locality and re-derive the postal code from it
    pub fn set_locality(&mut self, locality: Option<String>) {
        self.postal_code = locality.as_deref().and_then(postal_code_of);
        self.locality = locality;
    }

    pub fn postal_code(&self) -> Option<&str> {
        self.postal_code.as_deref()
    }

    pub fn price_per_area(&self) -> Option<f64> {
        self.price_per_area
    }

    /// Recompute every derived field from its primary fields
    pub fn refresh_derived(&mut self) {
        self.postal_code = self.locality.as_deref().and_then(postal_code_of);
        self.price_per_area = price_per_area(self.price, self.area);
    }
}

/// `round(price / area, 2)` when both are known and the area is positive
pub fn price_per_area(price: Option<f64>, area: Option<f64>) -> Option<f64> {
    match (price, area) {
        (Some(price), Some(area)) if area > 0.0 => Some(round2(price / area)),
        _ => None,
    }
}

pub fn postal_code_of(locality: &str) -> Option<String> {
    RE_POSTAL_CODE
        .captures(locality)
        .map(|caps| caps[1].to_string())
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A listing joined with the reference prices for its postal code
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub listing: ListingRecord,
    pub postal_code: Option<String>,
    pub price_per_area: Option<f64>,
    pub avg_reference_price: Option<f64>,
    pub min_reference_price: Option<f64>,
    pub max_reference_price: Option<f64>,
    pub deal_score: Option<f64>,
}

/// A cached crawl result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub captured_at: DateTime<Utc>,
    pub records: Vec<ListingRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_per_area_requires_both_fields() {
        assert_eq!(price_per_area(Some(250_000.0), Some(70.0)), Some(3571.43));
        assert_eq!(price_per_area(None, Some(70.0)), None);
        assert_eq!(price_per_area(Some(250_000.0), None), None);
        assert_eq!(price_per_area(Some(250_000.0), Some(0.0)), None);
        assert_eq!(price_per_area(Some(0.0), Some(50.0)), Some(0.0));
    }

    #[test]
    fn test_set_locality_rederives_postal_code() {
        let mut record = ListingRecord::new("https://example.test/s-anzeige/1");
        record.set_locality(Some("27721 Ritterhude".to_string()));
        assert_eq!(record.postal_code(), Some("27721"));

        record.set_locality(Some("28195 Bremen Mitte".to_string()));
        assert_eq!(record.postal_code(), Some("28195"));

        record.set_locality(None);
        assert_eq!(record.postal_code(), None);
    }

    #[test]
    fn test_derived_fields_are_not_serialized() {
        let mut record = ListingRecord::new("https://example.test/s-anzeige/1");
        record.price = Some(100_000.0);
        record.area = Some(50.0);
        record.set_locality(Some("27721 Ritterhude".to_string()));
        record.refresh_derived();

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("price_per_area").is_none());
        assert!(json.get("postal_code").is_none());

        let mut restored: ListingRecord = serde_json::from_value(json).unwrap();
        assert_eq!(restored.price_per_area(), None);
        restored.refresh_derived();
        assert_eq!(restored, record);
    }
}
