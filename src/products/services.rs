//! Product operations. Every mutation takes the caller's principal explicitly
//! and checks, in order: authenticated, product exists, caller owns it.
//! Writes are additionally conditioned on the owner id, so a product deleted
//! between the check and the write surfaces as `NotFound`.

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::dto::Principal,
    error::{AppError, AppResult},
    products::{
        dto::{DeletedResponse, ListQuery, OwnerProducts, ProductInput, ProductPage},
        repo::ProductStore,
        repo_types::{Product, ProductWithOwner},
    },
};

pub const PAGE_SIZE: i64 = 8;

fn not_found() -> AppError {
    AppError::NotFound("Product not found".into())
}

pub(crate) fn require_principal(principal: Option<&Principal>) -> AppResult<&Principal> {
    principal.ok_or_else(AppError::unauthorized)
}

/// Non-UUID ids cannot name a product.
fn product_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| not_found())
}

pub(crate) fn ensure_owner(principal: &Principal, product: &Product) -> AppResult<()> {
    if principal.id == product.owner_id {
        Ok(())
    } else {
        warn!(
            user_id = %principal.id,
            product_id = %product.id,
            owner_id = %product.owner_id,
            "ownership check failed"
        );
        Err(AppError::Forbidden("Not allowed to modify this product".into()))
    }
}

/// Existence first, then ownership.
async fn load_owned(
    store: &dyn ProductStore,
    principal: &Principal,
    id: Uuid,
) -> AppResult<Product> {
    let product = store.find(id).await?.ok_or_else(not_found)?;
    ensure_owner(principal, &product)?;
    Ok(product)
}

#[instrument(skip(store, principal, input))]
pub async fn create(
    store: &dyn ProductStore,
    principal: Option<&Principal>,
    input: ProductInput,
) -> AppResult<Product> {
    let principal = require_principal(principal)?;
    let fields = input.validate()?;
    let product = store.insert(principal.id, &fields).await?;
    info!(product_id = %product.id, user_id = %principal.id, "product created");
    Ok(product)
}

#[instrument(skip(store))]
pub async fn read(store: &dyn ProductStore, id: &str) -> AppResult<ProductWithOwner> {
    let id = product_id(id)?;
    store.find_with_owner(id).await?.ok_or_else(not_found)
}

#[instrument(skip(store, principal, input))]
pub async fn update(
    store: &dyn ProductStore,
    principal: Option<&Principal>,
    id: &str,
    input: ProductInput,
) -> AppResult<Product> {
    let principal = require_principal(principal)?;
    let id = product_id(id)?;
    load_owned(store, principal, id).await?;
    let fields = input.validate()?;

    let updated = store
        .update_owned(id, principal.id, &fields)
        .await?
        .ok_or_else(not_found)?;
    info!(product_id = %id, user_id = %principal.id, "product updated");
    Ok(updated)
}

#[instrument(skip(store, principal))]
pub async fn delete(
    store: &dyn ProductStore,
    principal: Option<&Principal>,
    id: &str,
) -> AppResult<DeletedResponse> {
    let principal = require_principal(principal)?;
    let id = product_id(id)?;
    load_owned(store, principal, id).await?;

    if !store.delete_owned(id, principal.id).await? {
        return Err(not_found());
    }
    info!(product_id = %id, user_id = %principal.id, "product deleted");
    Ok(DeletedResponse { id, deleted: true })
}

#[instrument(skip(store))]
pub async fn list(store: &dyn ProductStore, query: &ListQuery) -> AppResult<ProductPage> {
    let page = query.page();
    let offset = (page - 1).saturating_mul(PAGE_SIZE);
    let (products, total) = store.search(&query.filter(), PAGE_SIZE, offset).await?;
    Ok(ProductPage {
        products,
        total,
        page,
        page_size: PAGE_SIZE,
        total_pages: (total + PAGE_SIZE - 1) / PAGE_SIZE,
    })
}

#[instrument(skip(store, principal))]
pub async fn list_by_owner(
    store: &dyn ProductStore,
    principal: Option<&Principal>,
) -> AppResult<OwnerProducts> {
    let principal = require_principal(principal)?;
    let products = store.list_by_owner(principal.id).await?;
    let stats = store.stats_by_owner(principal.id).await?;
    Ok(OwnerProducts { products, stats })
}
