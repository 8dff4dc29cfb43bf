//! Typed wrapper over the external product catalog (spec §4.2). Generalized
//! from a single provider (the source's Naver Shopping client) into an
//! abstract capability interface, matching the teacher's `llm/client.rs`
//! trait-over-provider pattern and spec §9's framing of the catalog as an
//! external collaborator.

use async_trait::async_trait;
use chrono::Utc;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::http_client;
use crate::models::{ProductCandidate, ProductSearchResult};

const USED_KEYWORDS: &[&str] = &["중고", "리퍼", "반품", "재고", "전시"];
const RENTAL_KEYWORDS: &[&str] = &["렌탈", "렌트", "대여", "월납"];

const MAX_RETRIES: u32 = 3;
const BACKOFF_BASE_SECS: u64 = 1;
const BACKOFF_CAP_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sort {
    Similarity,
    Date,
    PriceAsc,
    PriceDesc,
}

impl Sort {
    fn as_query_param(&self) -> &'static str {
        match self {
            Sort::Similarity => "sim",
            Sort::Date => "date",
            Sort::PriceAsc => "asc",
            Sort::PriceDesc => "dsc",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchParams {
    pub query: String,
    pub display: usize,
    pub start: u32,
    pub sort: Sort,
    pub exclude_used: bool,
    pub exclude_rental: bool,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        SearchParams {
            query: query.into(),
            display: 20,
            start: 1,
            sort: Sort::Similarity,
            exclude_used: true,
            exclude_rental: true,
            min_price: None,
            max_price: None,
        }
    }
}

/// Capability interface for the external catalog. Pluggable the same way the
/// generative-text gateway is (spec §4.3), so tests can swap in a stub.
#[async_trait]
pub trait CatalogGateway: Send + Sync {
    async fn search(&self, params: &SearchParams) -> Result<ProductSearchResult>;
}

pub struct HttpCatalogGateway {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl HttpCatalogGateway {
    pub fn new(settings: &Settings) -> Result<Self> {
        if !settings.catalog_configured() {
            return Err(Error::Configuration(
                "catalog client id/secret are required".into(),
            ));
        }
        Ok(HttpCatalogGateway {
            client: http_client::catalog_client(),
            base_url: "https://openapi.naver.com/v1/search/shop.json".to_string(),
            client_id: settings.catalog_client_id.clone(),
            client_secret: settings.catalog_client_secret.clone(),
        })
    }
}

fn clean_html(text: &str) -> String {
    let without_tags = strip_tags(text);
    html_escape::decode_html_entities(&without_tags)
        .trim()
        .to_string()
}

fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn should_exclude(title: &str, mall_name: &str, exclude_used: bool, exclude_rental: bool) -> bool {
    let haystack = format!("{} {}", title.to_lowercase(), mall_name.to_lowercase());
    if exclude_used && USED_KEYWORDS.iter().any(|kw| haystack.contains(kw)) {
        return true;
    }
    if exclude_rental && RENTAL_KEYWORDS.iter().any(|kw| haystack.contains(kw)) {
        return true;
    }
    false
}

#[derive(serde::Deserialize)]
struct RawItem {
    #[serde(rename = "productId", default)]
    product_id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    image: String,
    #[serde(default)]
    lprice: String,
    #[serde(default)]
    hprice: String,
    #[serde(rename = "mallName", default)]
    mall_name: String,
    #[serde(default)]
    brand: String,
    #[serde(default)]
    maker: String,
    #[serde(default)]
    category1: String,
    #[serde(default)]
    category2: String,
    #[serde(default)]
    category3: String,
    #[serde(default)]
    category4: String,
}

#[derive(serde::Deserialize)]
struct RawResponse {
    #[serde(default)]
    total: i64,
    #[serde(default)]
    items: Vec<RawItem>,
}

fn parse_product(item: &RawItem) -> ProductCandidate {
    ProductCandidate {
        product_id: item.product_id.clone(),
        title: clean_html(&item.title),
        link: item.link.clone(),
        image: non_empty(&item.image),
        low_price: item.lprice.parse().unwrap_or(0),
        high_price: item.hprice.parse().ok().filter(|p| *p > 0),
        mall_name: item.mall_name.clone(),
        brand: non_empty(&item.brand),
        maker: non_empty(&item.maker),
        category1: non_empty(&item.category1),
        category2: non_empty(&item.category2),
        category3: non_empty(&item.category3),
        category4: non_empty(&item.category4),
        source: "naver".to_string(),
        fetched_at: Utc::now(),
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[async_trait]
impl CatalogGateway for HttpCatalogGateway {
    async fn search(&self, params: &SearchParams) -> Result<ProductSearchResult> {
        let over_fetch = (params.display * 2).min(100);

        let mut attempt = 0u32;
        loop {
            let mut query = vec![
                ("query", params.query.clone()),
                ("display", over_fetch.to_string()),
                ("start", params.start.to_string()),
                ("sort", params.sort.as_query_param().to_string()),
            ];
            if params.min_price.is_some() {
                query.push(("filter", "exclude_cbshop".to_string()));
            }

            let response = self
                .client
                .get(&self.base_url)
                .header("X-Naver-Client-Id", &self.client_id)
                .header("X-Naver-Client-Secret", &self.client_secret)
                .query(&query)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    if attempt + 1 >= MAX_RETRIES {
                        return Err(Error::UpstreamUnavailable(e.to_string()));
                    }
                    backoff(attempt).await;
                    attempt += 1;
                    continue;
                }
            };

            match response.status().as_u16() {
                200 => {
                    let body: RawResponse = response
                        .json()
                        .await
                        .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;
                    return Ok(build_result(body, params));
                }
                429 => {
                    if attempt + 1 >= MAX_RETRIES {
                        return Err(Error::UpstreamUnavailable(
                            "catalog rate limit exhausted retries".into(),
                        ));
                    }
                    backoff(attempt).await;
                    attempt += 1;
                }
                401 => return Err(Error::UpstreamAuth("catalog rejected credentials".into())),
                status => return Err(Error::UpstreamUnavailable(format!("catalog HTTP {status}"))),
            }
        }
    }
}

fn build_result(body: RawResponse, params: &SearchParams) -> ProductSearchResult {
    let mut items = Vec::with_capacity(params.display);
    for raw in &body.items {
        if should_exclude(&raw.title, &raw.mall_name, params.exclude_used, params.exclude_rental) {
            continue;
        }
        let price: i64 = raw.lprice.parse().unwrap_or(0);
        if let Some(min) = params.min_price {
            if price < min {
                continue;
            }
        }
        if let Some(max) = params.max_price {
            if price > max {
                continue;
            }
        }
        items.push(parse_product(raw));
        if items.len() >= params.display {
            break;
        }
    }
    ProductSearchResult {
        items,
        total: body.total,
        cached: false,
    }
}

async fn backoff(attempt: u32) {
    let secs = (BACKOFF_BASE_SECS << attempt).min(BACKOFF_CAP_SECS);
    tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_html_strips_tags_and_decodes_entities() {
        assert_eq!(clean_html("<b>노트북</b> &amp; 가방"), "노트북 & 가방");
    }

    #[test]
    fn excludes_used_and_rental_keywords() {
        assert!(should_exclude("중고 노트북", "", true, true));
        assert!(should_exclude("깨끗한 렌탈 정수기", "", true, true));
        assert!(!should_exclude("새상품 노트북", "", true, true));
    }

    #[test]
    fn exclusion_flags_are_independent() {
        assert!(!should_exclude("중고 노트북", "", false, true));
        assert!(!should_exclude("렌탈 정수기", "", true, false));
    }
}
