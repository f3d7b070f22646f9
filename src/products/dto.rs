use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::products::repo_types::{ProductFields, ProductFilter, ProductStats, ProductWithOwner};

/// Body of create and update requests. Fields stay optional so that missing
/// values come back as validation errors.
#[derive(Debug, Default, Deserialize)]
pub struct ProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<serde_json::Value>, // number or numeric string
    pub image: Option<String>,
}

impl ProductInput {
    pub fn validate(self) -> AppResult<ProductFields> {
        let required = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let (Some(name), Some(description), Some(price)) = (
            required(self.name),
            required(self.description),
            self.price.filter(|v| !v.is_null()),
        ) else {
            return Err(AppError::validation("Missing required fields"));
        };

        let price = parse_price(&price)
            .ok_or_else(|| AppError::validation("Price must be a non-negative number"))?;

        Ok(ProductFields {
            name,
            description,
            price,
            image: self.image.filter(|s| !s.is_empty()),
        })
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    // rust_decimal accepts `_` digit separators; prices never carry them.
    if s.contains('_') {
        return None;
    }
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
        .filter(|d| !d.is_sign_negative())
}

pub fn parse_price(v: &serde_json::Value) -> Option<Decimal> {
    match v {
        serde_json::Value::Number(n) => parse_decimal(&n.to_string()),
        serde_json::Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

/// Split a `"min-max"` range. Either side that does not parse is dropped;
/// a string without a dash is a lower bound only.
pub fn parse_price_range(s: &str) -> (Option<Decimal>, Option<Decimal>) {
    match s.split_once('-') {
        Some((min, max)) => (parse_decimal(min), parse_decimal(max)),
        None => (parse_decimal(s), None),
    }
}

/// Query string of the public listing.
#[derive(Debug, Default)]
pub struct ListQuery {
    pub query: Option<String>,
    pub price: Option<String>,
    pub page: Option<String>,
}

/// Built from decoded query pairs. A repeated key keeps its first value and
/// unknown keys are ignored.
impl FromIterator<(String, String)> for ListQuery {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(pairs: I) -> Self {
        let mut q = ListQuery::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "query" => &mut q.query,
                "price" => &mut q.price,
                "page" => &mut q.page,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        q
    }
}

impl ListQuery {
    pub fn filter(&self) -> ProductFilter {
        let (min_price, max_price) = self
            .price
            .as_deref()
            .map(parse_price_range)
            .unwrap_or_default();
        ProductFilter {
            name_contains: self
                .query
                .as_deref()
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_string),
            min_price,
            max_price,
        }
    }

    /// 1-based page; anything missing, unparsable or below 1 is page 1.
    pub fn page(&self) -> i64 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1)
    }
}

#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub products: Vec<ProductWithOwner>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct OwnerProducts {
    pub products: Vec<ProductWithOwner>,
    pub stats: ProductStats,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub id: Uuid,
    pub deleted: bool,
}
