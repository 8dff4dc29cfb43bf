//! Product-search gateway result shape (spec §3, §4.2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCandidate {
    pub product_id: String,
    pub title: String,
    pub link: String,
    pub image: Option<String>,
    pub low_price: i64,
    pub high_price: Option<i64>,
    pub mall_name: String,
    pub brand: Option<String>,
    pub maker: Option<String>,
    pub category1: Option<String>,
    pub category2: Option<String>,
    pub category3: Option<String>,
    pub category4: Option<String>,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

impl ProductCandidate {
    pub fn price_display(&self) -> String {
        format_won(self.low_price)
    }
}

/// Renders an integer as `"{price:,}원"` per spec E2.
pub fn format_won(price: i64) -> String {
    let sign = if price < 0 { "-" } else { "" };
    let digits = price.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let grouped: String = grouped.chars().rev().collect();
    format!("{sign}{grouped}원")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSearchResult {
    pub items: Vec<ProductCandidate>,
    pub total: i64,
    pub cached: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_won_groups_thousands() {
        assert_eq!(format_won(50000), "50,000원");
        assert_eq!(format_won(1000000), "1,000,000원");
        assert_eq!(format_won(500), "500원");
    }
}
