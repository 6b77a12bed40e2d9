use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Site root used to build search URLs
pub const SITE_ROOT: &str = "https://www.kleinanzeigen.de";

/// Search category for apartments for sale
pub const SALE_CATEGORY_PATH: &str = "s-wohnung-kaufen";

/// Path segment that pagination segments are inserted in front of
pub const CATEGORY_MARKER: &str = "/c196l";

/// Search radius around the selected place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Radius {
    #[default]
    WholePlace,
    Km5,
    Km10,
    Km20,
    Km30,
    Km50,
}

impl Radius {
    pub const ALL: [Radius; 6] = [
        Radius::WholePlace,
        Radius::Km5,
        Radius::Km10,
        Radius::Km20,
        Radius::Km30,
        Radius::Km50,
    ];

    /// Suffix appended to the location slug in the search URL
    pub fn selector(&self) -> &'static str {
        match self {
            Radius::WholePlace => "",
            Radius::Km5 => "r5",
            Radius::Km10 => "r10",
            Radius::Km20 => "r20",
            Radius::Km30 => "r30",
            Radius::Km50 => "r50",
        }
    }
}

impl fmt::Display for Radius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Radius::WholePlace => write!(f, "whole place"),
            other => write!(f, "+{} km", &other.selector()[1..]),
        }
    }
}

impl FromStr for Radius {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let s = s.trim_end_matches("km").trim();
        Radius::ALL
            .into_iter()
            .find(|radius| radius.selector() == s || radius.selector().get(1..) == Some(s))
            .or_else(|| matches!(s, "" | "0" | "all" | "whole").then_some(Radius::WholePlace))
            .ok_or_else(|| format!("unknown radius '{s}', expected one of 0, 5, 10, 20, 30, 50"))
    }
}

/// Location and radius of one search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Site-specific location slug, e.g. `ritterhude/c196l9789`
    pub location: String,
    pub radius: Radius,
}

impl SearchQuery {
    pub fn new(location: impl Into<String>, radius: Radius) -> Self {
        Self {
            location: location.into().trim_matches('/').to_string(),
            radius,
        }
    }

    /// Search URL for the first result page
    pub fn origin_url(&self) -> String {
        format!(
            "{}/{}/{}{}",
            SITE_ROOT,
            SALE_CATEGORY_PATH,
            self.location,
            self.radius.selector()
        )
    }
}

/// Tuning for one crawl
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Shortest pause between two requests
    pub min_delay: Duration,
    /// Longest pause between two requests
    pub max_delay: Duration,
    pub category_marker: String,
}

impl CrawlOptions {
    /// Random pause in `[min_delay, max_delay]`
    pub fn politeness_delay(&self) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        rand::thread_rng().gen_range(self.min_delay..=self.max_delay)
    }
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(1000),
            category_marker: CATEGORY_MARKER.to_string(),
        }
    }
}
