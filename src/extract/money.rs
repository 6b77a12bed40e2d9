//! Number parsing for German-formatted listing values.

use regex::Regex;
use std::sync::LazyLock;

static RE_GROUPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(?:\.\d{3})+$").unwrap());

/// Parse a monetary amount such as `"189.500,00 €"` into `189500.0`.
///
/// Currency markers and whitespace are dropped, `.` is treated as a thousands
/// separator and `,` as the decimal separator.
pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .replace('€', "")
        .replace("EUR", "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    cleaned.replace('.', "").replace(',', ".").parse::<f64>().ok()
}

/// Parse a measurement that may use a decimal comma, a decimal point or `.` grouping.
///
/// `"70"`, `"70,5"`, `"70.5"` and `"1.200"` become 70, 70.5, 70.5 and 1200.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();

    if cleaned.is_empty() {
        return None;
    }

    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else if RE_GROUPED.is_match(&cleaned) {
        cleaned.replace('.', "")
    } else {
        cleaned
    };

    normalized.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_price_german_format() {
        assert_eq!(parse_price("189.500,00 €"), Some(189_500.0));
        assert_eq!(parse_price("250.000 €"), Some(250_000.0));
        assert_eq!(parse_price("1.250.000,50 EUR"), Some(1_250_000.5));
        assert_eq!(parse_price("320,75"), Some(320.75));
        assert_eq!(parse_price("99\u{a0}€"), Some(99.0));
    }

    #[test]
    fn test_parse_price_rejects_garbage() {
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price(" € "), None);
        assert_eq!(parse_price("VB"), None);
        assert_eq!(parse_price("1,2,3"), None);
    }

    #[test]
    fn test_parse_decimal_variants() {
        assert_eq!(parse_decimal("70"), Some(70.0));
        assert_eq!(parse_decimal("70,5"), Some(70.5));
        assert_eq!(parse_decimal("70.5"), Some(70.5));
        assert_eq!(parse_decimal("1.200"), Some(1200.0));
        assert_eq!(parse_decimal("1.200,25"), Some(1200.25));
        assert_eq!(parse_decimal("abc"), None);
    }
}
