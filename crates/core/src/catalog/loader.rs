//! Plain-text / CSV product id loader.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::{CatalogError, ParsedCatalog};

/// A bare numeric SKU.
static SKU_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4,20}$").expect("valid regex"));

/// A product page link, e.g. `https://item.jd.com/100012345678.html`.
static ITEM_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"item\.(?:m\.)?jd\.com/(?:product/)?(\d{4,20})\.html").expect("valid regex"));

/// Turns file content into an ordered id list.
pub trait ProductCatalogLoader: Send + Sync {
    fn parse(&self, name: &str, content: &str) -> Result<ParsedCatalog, CatalogError>;
}

/// Reads the first column of CSV, TSV or newline separated text.
///
/// Rows whose first column is neither a numeric SKU nor a product link are
/// skipped (headers, notes).
#[derive(Debug, Default, Clone)]
pub struct TextCatalogLoader;

impl TextCatalogLoader {
    pub fn new() -> Self {
        Self
    }

    fn extract_id(field: &str) -> Option<String> {
        let field = field.trim().trim_matches(|c| c == '"' || c == '\'').trim();
        if SKU_RE.is_match(field) {
            return Some(field.to_string());
        }
        ITEM_URL_RE
            .captures(field)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

impl ProductCatalogLoader for TextCatalogLoader {
    fn parse(&self, name: &str, content: &str) -> Result<ParsedCatalog, CatalogError> {
        let content = content.trim_start_matches('\u{feff}');
        let rows: Vec<&str> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        if rows.is_empty() {
            return Err(CatalogError::Empty(name.to_string()));
        }

        let mut seen = HashSet::new();
        let mut product_ids = Vec::new();
        let mut total_count = 0;

        for row in rows {
            let first = row.split([',', '\t', ';']).next().unwrap_or(row);
            if let Some(id) = Self::extract_id(first) {
                total_count += 1;
                if seen.insert(id.clone()) {
                    product_ids.push(id);
                }
            }
        }

        if product_ids.is_empty() {
            return Err(CatalogError::InvalidFormat(format!(
                "{}: no product ids found in first column",
                name
            )));
        }

        let unique_count = product_ids.len();
        Ok(ParsedCatalog {
            product_ids,
            total_count,
            unique_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_newline_list_preserves_order() {
        let parsed = TextCatalogLoader::new()
            .parse("a.txt", "300001\n100001\n200001\n")
            .unwrap();
        assert_eq!(parsed.product_ids, vec!["300001", "100001", "200001"]);
        assert_eq!(parsed.total_count, 3);
        assert_eq!(parsed.unique_count, 3);
    }

    #[test]
    fn test_parse_dedups_within_file() {
        let parsed = TextCatalogLoader::new()
            .parse("a.txt", "100001\n200001\n100001\n")
            .unwrap();
        assert_eq!(parsed.product_ids, vec!["100001", "200001"]);
        assert_eq!(parsed.total_count, 3);
        assert_eq!(parsed.unique_count, 2);
    }

    #[test]
    fn test_parse_csv_with_header_and_links() {
        let content = "sku,title\n\"100001\",Kettle\nhttps://item.jd.com/200002.html,Toaster\n";
        let parsed = TextCatalogLoader::new().parse("a.csv", content).unwrap();
        assert_eq!(parsed.product_ids, vec!["100001", "200002"]);
    }

    #[test]
    fn test_parse_empty() {
        let result = TextCatalogLoader::new().parse("a.csv", "\n  \n");
        assert!(matches!(result, Err(CatalogError::Empty(_))));
    }

    #[test]
    fn test_parse_invalid_format() {
        let result = TextCatalogLoader::new().parse("a.csv", "name,price\nKettle,59\n");
        assert!(matches!(result, Err(CatalogError::InvalidFormat(_))));
    }
}
