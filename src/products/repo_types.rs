use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Product record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    #[sqlx(rename = "user_id")]
    pub owner_id: Uuid, // set at creation, never reassigned
    pub name: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub image: Option<String>, // inline data URL
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Product joined with its owner's public columns.
#[derive(Debug, FromRow)]
pub struct ProductRow {
    #[sqlx(flatten)]
    pub product: Product,
    pub owner_name: String,
    pub owner_email: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OwnerSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductWithOwner {
    #[serde(flatten)]
    pub product: Product,
    pub owner: OwnerSummary,
}

impl From<ProductRow> for ProductWithOwner {
    fn from(r: ProductRow) -> Self {
        Self {
            owner: OwnerSummary {
                id: r.product.owner_id,
                name: r.owner_name,
                email: r.owner_email,
            },
            product: r.product,
        }
    }
}

/// Count and summed price of one owner's products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct ProductStats {
    pub total_count: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_value: Decimal,
}

/// Validated values written on create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFields {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub name_contains: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}
