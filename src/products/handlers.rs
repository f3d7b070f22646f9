use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{extractors::CurrentUser, handlers::body_or_default},
    error::{AppError, AppResult},
    products::{
        dto::{DeletedResponse, ListQuery, OwnerProducts, ProductInput, ProductPage},
        repo_types::{Product, ProductWithOwner},
        services,
    },
    state::AppState,
};

// Reads are public; every other method resolves to 401 without a principal.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/mine", get(my_products))
        .route(
            "/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
}

// Pairs rather than a typed query so repeated or malformed keys degrade to
// the documented defaults instead of a plain-text rejection.
#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    params: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> AppResult<Json<ProductPage>> {
    let q = match params {
        Ok(Query(pairs)) => pairs.into_iter().collect::<ListQuery>(),
        Err(rejection) => {
            warn!(error = %rejection, "unreadable query string");
            ListQuery::default()
        }
    };
    Ok(Json(services::list(state.products.as_ref(), &q).await?))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ProductWithOwner>> {
    Ok(Json(services::read(state.products.as_ref(), &id).await?))
}

#[instrument(skip(state, principal, body))]
pub async fn create_product(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    body: Result<Json<ProductInput>, JsonRejection>,
) -> AppResult<(StatusCode, HeaderMap, Json<Product>)> {
    let product = services::create(
        state.products.as_ref(),
        principal.as_ref(),
        body_or_default(body),
    )
    .await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::LOCATION,
        HeaderValue::from_str(&format!("/products/{}", product.id))
            .map_err(|e| AppError::Internal(e.into()))?,
    );
    Ok((StatusCode::CREATED, headers, Json(product)))
}

#[instrument(skip(state, principal, body))]
pub async fn update_product(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<String>,
    body: Result<Json<ProductInput>, JsonRejection>,
) -> AppResult<Json<Product>> {
    let product = services::update(
        state.products.as_ref(),
        principal.as_ref(),
        &id,
        body_or_default(body),
    )
    .await?;
    Ok(Json(product))
}

#[instrument(skip(state, principal))]
pub async fn delete_product(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<DeletedResponse>> {
    Ok(Json(
        services::delete(state.products.as_ref(), principal.as_ref(), &id).await?,
    ))
}

#[instrument(skip(state, principal))]
pub async fn my_products(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
) -> AppResult<Json<OwnerProducts>> {
    Ok(Json(
        services::list_by_owner(state.products.as_ref(), principal.as_ref()).await?,
    ))
}
