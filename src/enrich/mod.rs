//! Joins listings with reference prices, then filters and ranks them.

pub mod reference;

use crate::models::{round2, EnrichedRecord, ListingRecord};
use reference::ReferenceTable;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// `round(price_per_area / avg_reference, 2)`; lower is a better deal
pub fn deal_score(price_per_area: Option<f64>, avg_reference: Option<f64>) -> Option<f64> {
    match (price_per_area, avg_reference) {
        (Some(ppa), Some(avg)) if avg > 0.0 => Some(round2(ppa / avg)),
        _ => None,
    }
}

/// Left join on postal code. Listings without a reference row keep empty reference fields.
pub fn enrich(records: &[ListingRecord], reference: &ReferenceTable) -> Vec<EnrichedRecord> {
    records
        .iter()
        .map(|record| {
            let mut listing = record.clone();
            listing.refresh_derived();

            let postal_code = listing.postal_code().map(str::to_string);
            let price_per_area = listing.price_per_area();
            let matched = postal_code.as_deref().and_then(|code| reference.get(code));

            let avg_reference_price = matched.and_then(|r| r.avg);
            EnrichedRecord {
                postal_code,
                price_per_area,
                avg_reference_price,
                min_reference_price: matched.and_then(|r| r.min),
                max_reference_price: matched.and_then(|r| r.max),
                deal_score: deal_score(price_per_area, avg_reference_price),
                listing,
            }
        })
        .collect()
}

/// Inclusive bounds for one filtered column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    /// Missing values stand in as the midpoint, so they are neither singled out
    /// nor dropped by extreme bounds
    pub fn admits(&self, value: Option<f64>) -> bool {
        let value = value.unwrap_or_else(|| self.midpoint());
        value >= self.min && value <= self.max
    }
}

/// Column filters; `None` disables a filter
#[derive(Debug, Clone, PartialEq)]
pub struct Filters {
    pub price: Option<Range>,
    pub price_per_area: Option<Range>,
    pub area: Option<Range>,
    pub rooms: Option<Range>,
    pub year_built: Option<Range>,
}

impl Filters {
    /// No filtering at all
    pub fn none() -> Self {
        Self {
            price: None,
            price_per_area: None,
            area: None,
            rooms: None,
            year_built: None,
        }
    }

    pub fn admits(&self, record: &EnrichedRecord) -> bool {
        let check = |range: &Option<Range>, value: Option<f64>| {
            range.map_or(true, |range| range.admits(value))
        };

        check(&self.price, record.listing.price)
            && check(&self.price_per_area, record.price_per_area)
            && check(&self.area, record.listing.area)
            && check(&self.rooms, record.listing.rooms)
            && check(&self.year_built, record.listing.year_built.map(f64::from))
    }
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            price: Some(Range::new(0.0, 2_000_000.0)),
            price_per_area: Some(Range::new(0.0, 50_000.0)),
            area: Some(Range::new(0.0, 500.0)),
            rooms: Some(Range::new(0.0, 20.0)),
            year_built: Some(Range::new(1900.0, 2100.0)),
        }
    }
}

pub fn apply_filters(records: Vec<EnrichedRecord>, filters: &Filters) -> Vec<EnrichedRecord> {
    let before = records.len();
    let kept: Vec<_> = records.into_iter().filter(|r| filters.admits(r)).collect();
    debug!(before, after = kept.len(), "Applied filters");
    kept
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    DealScore,
    Price,
    PricePerArea,
}

impl SortKey {
    fn value(&self, record: &EnrichedRecord) -> Option<f64> {
        match self {
            SortKey::DealScore => record.deal_score,
            SortKey::Price => record.listing.price,
            SortKey::PricePerArea => record.price_per_area,
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "deal" | "dealscore" => Ok(SortKey::DealScore),
            "price" => Ok(SortKey::Price),
            "ppa" | "priceperarea" | "sqm" => Ok(SortKey::PricePerArea),
            other => Err(format!("unknown sort key '{other}', expected deal, price or price-per-area")),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::DealScore => write!(f, "deal score"),
            SortKey::Price => write!(f, "price"),
            SortKey::PricePerArea => write!(f, "price per m²"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Stable sort by `key`; records without a value always come last
pub fn sort_records(records: &mut [EnrichedRecord], key: SortKey, order: SortOrder) {
    records.sort_by(|a, b| match (key.value(a), key.value(b)) {
        (Some(x), Some(y)) => match order {
            SortOrder::Ascending => x.total_cmp(&y),
            SortOrder::Descending => y.total_cmp(&x),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Join, filter and rank in one pass
pub struct EnrichmentStage<'a> {
    pub reference: &'a ReferenceTable,
    pub filters: Filters,
    pub sort_key: SortKey,
    pub order: SortOrder,
}

impl EnrichmentStage<'_> {
    pub fn run(&self, records: &[ListingRecord]) -> Vec<EnrichedRecord> {
        let mut enriched = apply_filters(enrich(records, self.reference), &self.filters);
        sort_records(&mut enriched, self.sort_key, self.order);
        enriched
    }
}

#[cfg(test)]
mod tests {
    use super::reference::ReferencePrice;
    use super::*;

    fn listing(id: u32, price: Option<f64>, area: Option<f64>, locality: Option<&str>) -> ListingRecord {
        let mut record = ListingRecord::new(format!("https://www.kleinanzeigen.de/s-anzeige/{id}"));
        record.price = price;
        record.area = area;
        record.set_locality(locality.map(str::to_string));
        record.refresh_derived();
        record
    }

    fn reference() -> ReferenceTable {
        ReferenceTable::from_rows([
            ReferencePrice {
                postal_code: "27721".to_string(),
                avg: Some(2500.0),
                min: Some(1800.0),
                max: Some(3400.0),
            },
            ReferencePrice {
                postal_code: "28195".to_string(),
                avg: Some(0.0),
                min: None,
                max: None,
            },
        ])
    }

    #[test]
    fn test_enrich_left_join() {
        let records = vec![
            listing(1, Some(200_000.0), Some(80.0), Some("27721 Ritterhude")),
            listing(2, Some(300_000.0), Some(60.0), Some("28195 Bremen")),
            listing(3, Some(150_000.0), Some(50.0), Some("99999 Nirgendwo")),
            listing(4, Some(150_000.0), Some(50.0), None),
        ];

        let enriched = enrich(&records, &reference());
        assert_eq!(enriched.len(), 4);

        assert_eq!(enriched[0].postal_code.as_deref(), Some("27721"));
        assert_eq!(enriched[0].price_per_area, Some(2500.0));
        assert_eq!(enriched[0].avg_reference_price, Some(2500.0));
        assert_eq!(enriched[0].min_reference_price, Some(1800.0));
        assert_eq!(enriched[0].max_reference_price, Some(3400.0));
        assert_eq!(enriched[0].deal_score, Some(1.0));

        // Zero average gives no score
        assert_eq!(enriched[1].avg_reference_price, Some(0.0));
        assert_eq!(enriched[1].deal_score, None);

        assert_eq!(enriched[2].avg_reference_price, None);
        assert_eq!(enriched[2].deal_score, None);
        assert_eq!(enriched[3].postal_code, None);
    }

    #[test]
    fn test_deal_score() {
        assert_eq!(deal_score(Some(2000.0), Some(2500.0)), Some(0.8));
        assert_eq!(deal_score(Some(3333.0), Some(3000.0)), Some(1.11));
        assert_eq!(deal_score(None, Some(2500.0)), None);
        assert_eq!(deal_score(Some(2000.0), None), None);
        assert_eq!(deal_score(Some(2000.0), Some(-1.0)), None);
    }

    #[test]
    fn test_missing_value_uses_midpoint() {
        let range = Range::new(50.0, 100.0);
        assert!(range.admits(None));
        assert!(range.admits(Some(50.0)));
        assert!(range.admits(Some(100.0)));
        assert!(!range.admits(Some(200.0)));
        assert!(!range.admits(Some(49.99)));
    }

    #[test]
    fn test_area_filter_keeps_unknown_area() {
        let records = vec![
            listing(1, Some(100_000.0), None, None),
            listing(2, Some(100_000.0), Some(200.0), None),
            listing(3, Some(100_000.0), Some(75.0), None),
        ];
        let filters = Filters {
            area: Some(Range::new(50.0, 100.0)),
            ..Filters::none()
        };

        let kept = apply_filters(enrich(&records, &ReferenceTable::default()), &filters);
        let urls: Vec<&str> = kept.iter().map(|r| r.listing.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.kleinanzeigen.de/s-anzeige/1",
                "https://www.kleinanzeigen.de/s-anzeige/3",
            ]
        );
    }

    #[test]
    fn test_unknown_values_pass_narrow_ranges() {
        let enriched = enrich(&[listing(1, None, None, None)], &ReferenceTable::default());

        let filters = Filters {
            year_built: Some(Range::new(1950.0, 1960.0)),
            price: Some(Range::new(0.0, 0.0)),
            ..Filters::none()
        };
        assert_eq!(apply_filters(enriched, &filters).len(), 1);
    }

    #[test]
    fn test_sort_puts_nulls_last_in_both_directions() {
        let records = vec![
            listing(1, Some(300_000.0), None, None),
            listing(2, Some(300_000.0), Some(100.0), None),
            listing(3, None, Some(50.0), None),
            listing(4, Some(100_000.0), Some(100.0), None),
            listing(5, Some(200_000.0), Some(50.0), None),
        ];
        let mut enriched = enrich(&records, &ReferenceTable::default());

        sort_records(&mut enriched, SortKey::PricePerArea, SortOrder::Ascending);
        let ppa: Vec<Option<f64>> = enriched.iter().map(|r| r.price_per_area).collect();
        assert_eq!(ppa, vec![Some(1000.0), Some(3000.0), Some(4000.0), None, None]);
        // Stable among nulls
        assert!(enriched[3].listing.url.ends_with("/1"));
        assert!(enriched[4].listing.url.ends_with("/3"));

        sort_records(&mut enriched, SortKey::PricePerArea, SortOrder::Descending);
        let ppa: Vec<Option<f64>> = enriched.iter().map(|r| r.price_per_area).collect();
        assert_eq!(ppa, vec![Some(4000.0), Some(3000.0), Some(1000.0), None, None]);

        sort_records(&mut enriched, SortKey::Price, SortOrder::Descending);
        let prices: Vec<Option<f64>> = enriched.iter().map(|r| r.listing.price).collect();
        assert_eq!(
            prices,
            vec![Some(300_000.0), Some(300_000.0), Some(200_000.0), Some(100_000.0), None]
        );
    }

    #[test]
    fn test_stage_ranks_best_deal_first() {
        let records = vec![
            listing(1, Some(250_000.0), Some(80.0), Some("27721 Ritterhude")),
            listing(2, Some(150_000.0), Some(75.0), Some("27721 Ritterhude")),
            listing(3, Some(99_000.0), Some(40.0), None),
            listing(4, Some(5_000_000.0), Some(100.0), Some("27721 Ritterhude")),
        ];
        let table = reference();
        let stage = EnrichmentStage {
            reference: &table,
            filters: Filters::default(),
            sort_key: SortKey::DealScore,
            order: SortOrder::Ascending,
        };

        let ranked = stage.run(&records);
        let ids: Vec<&str> = ranked.iter().map(|r| r.listing.url.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "https://www.kleinanzeigen.de/s-anzeige/2",
                "https://www.kleinanzeigen.de/s-anzeige/1",
                "https://www.kleinanzeigen.de/s-anzeige/3",
            ]
        );
        assert_eq!(ranked[0].deal_score, Some(0.8));
        assert_eq!(ranked[1].deal_score, Some(1.25));
    }

    #[test]
    fn test_sort_key_parsing() {
        assert_eq!("deal".parse::<SortKey>(), Ok(SortKey::DealScore));
        assert_eq!("price-per-area".parse::<SortKey>(), Ok(SortKey::PricePerArea));
        assert_eq!("PRICE".parse::<SortKey>(), Ok(SortKey::Price));
        assert!("rooms".parse::<SortKey>().is_err());
    }
}
