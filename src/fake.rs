//! In-memory stores used by unit and router tests in place of Postgres.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{
    dto::Principal,
    repo::UserStore,
    repo_types::{NewUser, User},
};
use crate::error::RepoError;
use crate::products::{
    repo::ProductStore,
    repo_types::{
        OwnerSummary, Product, ProductFields, ProductFilter, ProductStats, ProductWithOwner,
    },
};

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        Ok(self.users.read().await.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, RepoError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(RepoError::Conflict("users_email_key".into()));
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }
}

/// Products kept in insertion order, which is also creation order.
pub struct MemoryProductStore {
    users: Arc<MemoryUserStore>,
    products: RwLock<Vec<Product>>,
}

impl MemoryProductStore {
    pub fn new(users: Arc<MemoryUserStore>) -> Self {
        Self {
            users,
            products: RwLock::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.products.read().await.len()
    }

    async fn with_owner(&self, product: Product) -> Result<ProductWithOwner, RepoError> {
        let owner = self
            .users
            .find_by_id(product.owner_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("product {} has no owner row", product.id))?;
        Ok(ProductWithOwner {
            owner: OwnerSummary {
                id: owner.id,
                name: owner.name,
                email: owner.email,
            },
            product,
        })
    }

    async fn with_owners(&self, products: Vec<Product>) -> Result<Vec<ProductWithOwner>, RepoError> {
        let mut out = Vec::with_capacity(products.len());
        for p in products {
            out.push(self.with_owner(p).await?);
        }
        Ok(out)
    }
}

fn matches(filter: &ProductFilter, p: &Product) -> bool {
    let name_ok = filter
        .name_contains
        .as_deref()
        .map_or(true, |q| p.name.to_lowercase().contains(&q.to_lowercase()));
    let min_ok = filter.min_price.map_or(true, |min| p.price >= min);
    let max_ok = filter.max_price.map_or(true, |max| p.price <= max);
    name_ok && min_ok && max_ok
}

#[async_trait]
impl ProductStore for MemoryProductStore {
    async fn insert(&self, owner_id: Uuid, fields: &ProductFields) -> Result<Product, RepoError> {
        if self.users.find_by_id(owner_id).await?.is_none() {
            return Err(anyhow::anyhow!("owner {owner_id} does not exist").into());
        }
        let now = OffsetDateTime::now_utc();
        let product = Product {
            id: Uuid::new_v4(),
            owner_id,
            name: fields.name.clone(),
            description: fields.description.clone(),
            price: fields.price,
            image: fields.image.clone(),
            created_at: now,
            updated_at: now,
        };
        self.products.write().await.push(product.clone());
        Ok(product)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Product>, RepoError> {
        Ok(self.products.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn find_with_owner(&self, id: Uuid) -> Result<Option<ProductWithOwner>, RepoError> {
        match self.find(id).await? {
            Some(p) => Ok(Some(self.with_owner(p).await?)),
            None => Ok(None),
        }
    }

    async fn update_owned(
        &self,
        id: Uuid,
        owner_id: Uuid,
        fields: &ProductFields,
    ) -> Result<Option<Product>, RepoError> {
        let mut products = self.products.write().await;
        let Some(p) = products
            .iter_mut()
            .find(|p| p.id == id && p.owner_id == owner_id)
        else {
            return Ok(None);
        };
        p.name = fields.name.clone();
        p.description = fields.description.clone();
        p.price = fields.price;
        p.image = fields.image.clone();
        p.updated_at = OffsetDateTime::now_utc();
        Ok(Some(p.clone()))
    }

    async fn delete_owned(&self, id: Uuid, owner_id: Uuid) -> Result<bool, RepoError> {
        let mut products = self.products.write().await;
        let before = products.len();
        products.retain(|p| !(p.id == id && p.owner_id == owner_id));
        Ok(products.len() < before)
    }

    async fn search(
        &self,
        filter: &ProductFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<ProductWithOwner>, i64), RepoError> {
        let matching: Vec<Product> = self
            .products
            .read()
            .await
            .iter()
            .rev()
            .filter(|p| matches(filter, p))
            .cloned()
            .collect();
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect();
        Ok((self.with_owners(page).await?, total))
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<ProductWithOwner>, RepoError> {
        let owned: Vec<Product> = self
            .products
            .read()
            .await
            .iter()
            .rev()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect();
        self.with_owners(owned).await
    }

    async fn stats_by_owner(&self, owner_id: Uuid) -> Result<ProductStats, RepoError> {
        let products = self.products.read().await;
        let owned = products.iter().filter(|p| p.owner_id == owner_id);
        Ok(ProductStats {
            total_count: owned.clone().count() as i64,
            total_value: owned.map(|p| p.price).sum::<Decimal>(),
        })
    }
}

/// A user store and a product store wired together.
pub struct MemoryStores {
    pub users: Arc<MemoryUserStore>,
    pub products: MemoryProductStore,
}

impl MemoryStores {
    pub fn new() -> Self {
        let users = Arc::new(MemoryUserStore::default());
        Self {
            products: MemoryProductStore::new(users.clone()),
            users,
        }
    }

    /// Insert a user named `name` and return its principal.
    pub async fn user(&self, name: &str) -> Principal {
        let user = self
            .users
            .create(NewUser {
                name: name.to_string(),
                email: format!("{name}@example.com"),
                password_hash: "unused".into(),
            })
            .await
            .expect("insert user");
        Principal::from(&user)
    }
}
