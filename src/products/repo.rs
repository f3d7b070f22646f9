use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::RepoError;
use crate::products::repo_types::{
    Product, ProductFields, ProductFilter, ProductRow, ProductStats, ProductWithOwner,
};

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn insert(&self, owner_id: Uuid, fields: &ProductFields) -> Result<Product, RepoError>;

    async fn find(&self, id: Uuid) -> Result<Option<Product>, RepoError>;

    async fn find_with_owner(&self, id: Uuid) -> Result<Option<ProductWithOwner>, RepoError>;

    /// Overwrite a product only if it still exists and still belongs to
    /// `owner_id`. `None` means no row matched.
    async fn update_owned(
        &self,
        id: Uuid,
        owner_id: Uuid,
        fields: &ProductFields,
    ) -> Result<Option<Product>, RepoError>;

    /// Delete a product only if it belongs to `owner_id`. Returns whether a
    /// row was removed.
    async fn delete_owned(&self, id: Uuid, owner_id: Uuid) -> Result<bool, RepoError>;

    /// One page of matching products, newest first, plus the total match count.
    async fn search(
        &self,
        filter: &ProductFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<ProductWithOwner>, i64), RepoError>;

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<ProductWithOwner>, RepoError>;

    async fn stats_by_owner(&self, owner_id: Uuid) -> Result<ProductStats, RepoError>;
}

#[derive(Clone)]
pub struct PgProductStore {
    db: PgPool,
}

impl PgProductStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// `ILIKE` pattern matching `q` literally anywhere in the column.
fn contains_pattern(q: &str) -> String {
    let escaped = q
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

const PRODUCT_COLUMNS: &str =
    "p.id, p.user_id, p.name, p.description, p.price, p.image, p.created_at, p.updated_at";

#[async_trait]
impl ProductStore for PgProductStore {
    async fn insert(&self, owner_id: Uuid, fields: &ProductFields) -> Result<Product, RepoError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (user_id, name, description, price, image)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, name, description, price, image, created_at, updated_at
            "#,
        )
        .bind(owner_id)
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(fields.price)
        .bind(fields.image.as_deref())
        .fetch_one(&self.db)
        .await?;
        Ok(product)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Product>, RepoError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, user_id, name, description, price, image, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(product)
    }

    async fn find_with_owner(&self, id: Uuid) -> Result<Option<ProductWithOwner>, RepoError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}, u.name AS owner_name, u.email AS owner_email
            FROM products p
            JOIN users u ON u.id = p.user_id
            WHERE p.id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn update_owned(
        &self,
        id: Uuid,
        owner_id: Uuid,
        fields: &ProductFields,
    ) -> Result<Option<Product>, RepoError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
               SET name = $3, description = $4, price = $5, image = $6, updated_at = now()
             WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, name, description, price, image, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(fields.price)
        .bind(fields.image.as_deref())
        .fetch_optional(&self.db)
        .await?;
        Ok(product)
    }

    async fn delete_owned(&self, id: Uuid, owner_id: Uuid) -> Result<bool, RepoError> {
        let res = sqlx::query(r#"DELETE FROM products WHERE id = $1 AND user_id = $2"#)
            .bind(id)
            .bind(owner_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn search(
        &self,
        filter: &ProductFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<ProductWithOwner>, i64), RepoError> {
        const WHERE: &str = r#"
            WHERE ($1::text IS NULL OR p.name ILIKE $1)
              AND ($2::numeric IS NULL OR p.price >= $2)
              AND ($3::numeric IS NULL OR p.price <= $3)
        "#;
        let pattern = filter.name_contains.as_deref().map(contains_pattern);

        let rows_sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS}, u.name AS owner_name, u.email AS owner_email
            FROM products p
            JOIN users u ON u.id = p.user_id
            {WHERE}
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $4 OFFSET $5
            "#
        );
        let count_sql = format!("SELECT COUNT(*) FROM products p {WHERE}");

        let rows = sqlx::query_as::<_, ProductRow>(&rows_sql)
            .bind(pattern.as_deref())
            .bind(filter.min_price)
            .bind(filter.max_price)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db);
        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(pattern.as_deref())
            .bind(filter.min_price)
            .bind(filter.max_price)
            .fetch_one(&self.db);

        let (rows, total) = tokio::try_join!(rows, total)?;
        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<ProductWithOwner>, RepoError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}, u.name AS owner_name, u.email AS owner_email
            FROM products p
            JOIN users u ON u.id = p.user_id
            WHERE p.user_id = $1
            ORDER BY p.created_at DESC, p.id DESC
            "#
        ))
        .bind(owner_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn stats_by_owner(&self, owner_id: Uuid) -> Result<ProductStats, RepoError> {
        let stats = sqlx::query_as::<_, ProductStats>(
            r#"
            SELECT COUNT(*) AS total_count, COALESCE(SUM(price), 0) AS total_value
            FROM products
            WHERE user_id = $1
            "#,
        )
        .bind(owner_id)
        .fetch_one(&self.db)
        .await?;
        Ok(stats)
    }
}
