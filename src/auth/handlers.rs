use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, ProfileResponse, RegisterRequest, RegisterResponse},
        extractors::CurrentUser,
        services, session,
    },
    error::{AppError, AppResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/user/profile", get(get_profile))
}

/// Unwrap a JSON body, treating an unreadable one as empty input so that the
/// usual field validation reports it.
pub(crate) fn body_or_default<T: Default>(body: Result<Json<T>, JsonRejection>) -> T {
    match body {
        Ok(Json(v)) => v,
        Err(rejection) => {
            warn!(error = %rejection, "unreadable request body");
            T::default()
        }
    }
}

#[instrument(skip(state, body))]
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let user = services::register(state.users.as_ref(), body_or_default(body)).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User created successfully",
            user,
        }),
    ))
}

#[instrument(skip(state, body))]
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<(HeaderMap, Json<AuthResponse>)> {
    let (token, user) =
        services::login(state.users.as_ref(), &state.keys, body_or_default(body)).await?;

    let cookie = session::set_cookie(&state.config.session, &token, state.keys.ttl.as_secs());
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(|e| AppError::Internal(e.into()))?,
    );
    Ok((headers, Json(AuthResponse { token, user })))
}

#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> AppResult<(StatusCode, HeaderMap)> {
    let cookie = session::clear_cookie(&state.config.session);
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(|e| AppError::Internal(e.into()))?,
    );
    Ok((StatusCode::NO_CONTENT, headers))
}

#[instrument(skip(state, principal))]
pub async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
) -> AppResult<Json<ProfileResponse>> {
    let profile = services::profile(
        state.users.as_ref(),
        state.products.as_ref(),
        principal.as_ref(),
    )
    .await?;
    Ok(Json(profile))
}
