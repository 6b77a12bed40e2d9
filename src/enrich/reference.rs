use crate::error::ReferenceDataError;
use serde::Deserialize;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use tracing::{info, warn};

/// Reference price-per-area statistics for one postal code
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ReferencePrice {
    #[serde(alias = "plz")]
    pub postal_code: String,
    #[serde(alias = "avg_offiziell")]
    pub avg: Option<f64>,
    #[serde(alias = "min_preis")]
    pub min: Option<f64>,
    #[serde(alias = "max_preis")]
    pub max: Option<f64>,
}

/// Reference prices keyed by postal code
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    by_postal_code: HashMap<String, ReferencePrice>,
}

/// Restore leading zeros lost by spreadsheet tools ("1067" → "01067")
fn normalize_postal_code(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.is_empty() && trimmed.len() < 5 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        format!("{trimmed:0>5}")
    } else {
        trimmed.to_string()
    }
}

impl ReferenceTable {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ReferenceDataError> {
        let path = path.as_ref();
        let reader = csv::Reader::from_path(path).map_err(|source| ReferenceDataError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_csv(reader)?;
        info!(path = %path.display(), postal_codes = table.len(), "Loaded reference prices");
        Ok(table)
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, ReferenceDataError> {
        Self::from_csv(csv::Reader::from_reader(reader))
    }

    fn from_csv<R: io::Read>(mut reader: csv::Reader<R>) -> Result<Self, ReferenceDataError> {
        let mut by_postal_code = HashMap::new();

        for (idx, row) in reader.deserialize::<ReferencePrice>().enumerate() {
            let mut price = row.map_err(|source| ReferenceDataError::Row {
                row: idx + 1,
                source,
            })?;
            price.postal_code = normalize_postal_code(&price.postal_code);

            if by_postal_code.contains_key(&price.postal_code) {
                warn!(postal_code = %price.postal_code, "Duplicate reference row, keeping the first");
                continue;
            }
            by_postal_code.insert(price.postal_code.clone(), price);
        }

        Ok(Self { by_postal_code })
    }

    pub fn from_rows(rows: impl IntoIterator<Item = ReferencePrice>) -> Self {
        let mut by_postal_code = HashMap::new();
        for row in rows {
            by_postal_code.entry(row.postal_code.clone()).or_insert(row);
        }
        Self { by_postal_code }
    }

    pub fn get(&self, postal_code: &str) -> Option<&ReferencePrice> {
        self.by_postal_code.get(postal_code)
    }

    pub fn len(&self) -> usize {
        self.by_postal_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_postal_code.is_empty()
    }
}
