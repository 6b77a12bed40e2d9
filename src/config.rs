use crate::enrich::{Filters, Range, SortKey, SortOrder};
use crate::scrapers::types::{CrawlOptions, Radius};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// IMMOnitor - apartment listings ranked against local reference prices
#[derive(Parser, Debug)]
#[command(name = "immonitor")]
#[command(about = "Scrape apartment listings and rank them against local reference prices")]
#[command(version)]
pub struct Cli {
    /// Location slug as used in the search URL, e.g. `ritterhude/c196l9789`
    #[arg(value_name = "LOCATION")]
    pub location: String,

    /// Search radius in km (0, 5, 10, 20, 30 or 50)
    #[arg(short, long, default_value = "0")]
    pub radius: Radius,

    /// Ignore cached results and crawl again
    #[arg(long)]
    pub refresh: bool,

    /// Directory holding cached crawl results
    #[arg(long, env = "SCOUT_CACHE_DIR", default_value = "cache")]
    pub cache_dir: PathBuf,

    /// Age in hours after which cached results are crawled again
    #[arg(long, env = "SCOUT_MAX_AGE_HOURS", default_value_t = 24)]
    pub max_age_hours: u64,

    /// CSV with reference prices per postal code
    #[arg(long, env = "SCOUT_REFERENCE_CSV")]
    pub reference: Option<PathBuf>,

    #[arg(long, env = "SCOUT_DELAY_MIN_MS", default_value_t = 500)]
    pub delay_min_ms: u64,

    #[arg(long, env = "SCOUT_DELAY_MAX_MS", default_value_t = 1000)]
    pub delay_max_ms: u64,

    /// Per-request timeout in seconds
    #[arg(long, env = "SCOUT_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Sort by: deal, price or price-per-area
    #[arg(short, long, default_value = "deal")]
    pub sort: SortKey,

    /// Sort in descending order
    #[arg(long)]
    pub descending: bool,

    /// Disable all filters
    #[arg(long)]
    pub no_filters: bool,

    #[arg(long)]
    pub min_price: Option<f64>,
    #[arg(long)]
    pub max_price: Option<f64>,
    #[arg(long)]
    pub min_price_per_area: Option<f64>,
    #[arg(long)]
    pub max_price_per_area: Option<f64>,
    #[arg(long)]
    pub min_area: Option<f64>,
    #[arg(long)]
    pub max_area: Option<f64>,
    #[arg(long)]
    pub min_rooms: Option<f64>,
    #[arg(long)]
    pub max_rooms: Option<f64>,
    #[arg(long)]
    pub min_year: Option<i32>,
    #[arg(long)]
    pub max_year: Option<i32>,

    /// Write the ranked listings to this JSON file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Override the bounds of a default range with whatever the user gave
fn bounded(default: Option<Range>, min: Option<f64>, max: Option<f64>) -> Option<Range> {
    match (default, min, max) {
        (range, None, None) => range,
        (Some(range), min, max) => Some(Range::new(min.unwrap_or(range.min), max.unwrap_or(range.max))),
        (None, min, max) => Some(Range::new(min.unwrap_or(0.0), max.unwrap_or(f64::MAX))),
    }
}

impl Cli {
    pub fn crawl_options(&self) -> CrawlOptions {
        CrawlOptions {
            min_delay: Duration::from_millis(self.delay_min_ms),
            max_delay: Duration::from_millis(self.delay_max_ms.max(self.delay_min_ms)),
            ..CrawlOptions::default()
        }
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_hours * 60 * 60)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn sort_order(&self) -> SortOrder {
        if self.descending {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        }
    }

    pub fn filters(&self) -> Filters {
        let defaults = if self.no_filters {
            Filters::none()
        } else {
            Filters::default()
        };

        Filters {
            price: bounded(defaults.price, self.min_price, self.max_price),
            price_per_area: bounded(
                defaults.price_per_area,
                self.min_price_per_area,
                self.max_price_per_area,
            ),
            area: bounded(defaults.area, self.min_area, self.max_area),
            rooms: bounded(defaults.rooms, self.min_rooms, self.max_rooms),
            year_built: bounded(
                defaults.year_built,
                self.min_year.map(f64::from),
                self.max_year.map(f64::from),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["immonitor", "ritterhude/c196l9789"]);
        assert_eq!(cli.radius, Radius::WholePlace);
        assert_eq!(cli.sort, SortKey::DealScore);
        assert_eq!(cli.sort_order(), SortOrder::Ascending);
        assert_eq!(cli.max_age(), Duration::from_secs(24 * 3600));
        assert_eq!(cli.filters(), Filters::default());
    }

    #[test]
    fn test_filter_overrides() {
        let cli = Cli::parse_from([
            "immonitor",
            "bremen/c196l1",
            "--radius",
            "10",
            "--min-area",
            "50",
            "--max-year",
            "1990",
        ]);
        let filters = cli.filters();
        assert_eq!(cli.radius, Radius::Km10);
        assert_eq!(filters.area, Some(Range::new(50.0, 500.0)));
        assert_eq!(filters.year_built, Some(Range::new(1900.0, 1990.0)));
        assert_eq!(filters.price, Filters::default().price);
    }

    #[test]
    fn test_no_filters_keeps_explicit_bounds() {
        let cli = Cli::parse_from(["immonitor", "bremen/c196l1", "--no-filters", "--max-rooms", "3"]);
        let filters = cli.filters();
        assert_eq!(filters.price, None);
        assert_eq!(filters.rooms.map(|r| r.max), Some(3.0));
    }

    #[test]
    fn test_delay_bounds_are_ordered() {
        let cli = Cli::parse_from([
            "immonitor",
            "bremen/c196l1",
            "--delay-min-ms",
            "900",
            "--delay-max-ms",
            "100",
        ]);
        let options = cli.crawl_options();
        assert_eq!(options.min_delay, Duration::from_millis(900));
        assert_eq!(options.max_delay, Duration::from_millis(900));
    }
}
