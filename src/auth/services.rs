use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, Principal, ProfileResponse, PublicUser, RegisterRequest},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::UserStore,
        repo_types::NewUser,
    },
    error::{AppError, AppResult, RepoError},
    products::repo::ProductStore,
};

pub const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn present(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

#[instrument(skip(users, req))]
pub async fn register(users: &dyn UserStore, req: RegisterRequest) -> AppResult<PublicUser> {
    let (Some(email), Some(password)) = (present(req.email), present(req.password)) else {
        return Err(AppError::validation("Email and password are required"));
    };

    let name = req.name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(AppError::validation("Name is required"));
    }

    let email = normalize_email(&email);
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::validation("Invalid email format"));
    }

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }

    if users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let password_hash = hash_password(&password).await?;
    let user = users
        .create(NewUser {
            name: name.to_string(),
            email,
            password_hash,
        })
        .await
        .map_err(|e| match e {
            // lost a race with a concurrent registration
            RepoError::Conflict(_) => AppError::Conflict("Email already registered".into()),
            other => other.into(),
        })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user.into())
}

/// Check credentials and issue a session token.
#[instrument(skip(users, keys, req))]
pub async fn login(
    users: &dyn UserStore,
    keys: &JwtKeys,
    req: LoginRequest,
) -> AppResult<(String, PublicUser)> {
    let (Some(email), Some(password)) = (present(req.email), present(req.password)) else {
        return Err(AppError::validation("Email and password are required"));
    };
    let email = normalize_email(&email);

    let invalid = || AppError::Unauthorized("Invalid credentials".into());

    let Some(user) = users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(invalid());
    };

    if !verify_password(&password, &user.password_hash).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    let token = keys.sign(&Principal::from(&user))?;
    info!(user_id = %user.id, "user logged in");
    Ok((token, user.into()))
}

#[instrument(skip(users, products, principal))]
pub async fn profile(
    users: &dyn UserStore,
    products: &dyn ProductStore,
    principal: Option<&Principal>,
) -> AppResult<ProfileResponse> {
    let principal = principal.ok_or_else(AppError::unauthorized)?;
    let user = users
        .find_by_id(principal.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    let products_stats = products.stats_by_owner(user.id).await?;
    Ok(ProfileResponse {
        user: user.into(),
        products_stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn req(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: Some(name.into()),
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    #[test]
    fn email_pattern() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.de"));
        assert!(!is_valid_email("@c.de"));
    }

    #[tokio::test]
    async fn register_strips_hash_and_lowercases_email() {
        let state = AppState::fake();
        let user = register(state.users.as_ref(), req("  Ada  ", "Ada@Example.COM", "secret1"))
            .await
            .unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.name, "Ada");
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());

        let stored = state.users.find_by_email("ada@example.com").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "secret1");
        assert!(verify_password("secret1", &stored.password_hash).await.unwrap());
    }

    #[tokio::test]
    async fn register_validation_errors() {
        let state = AppState::fake();
        let users = state.users.as_ref();
        let cases = [
            RegisterRequest {
                name: Some("A".into()),
                email: None,
                password: Some("secret1".into()),
            },
            RegisterRequest {
                name: Some("A".into()),
                email: Some("a@b.co".into()),
                password: Some(String::new()),
            },
            req("   ", "a@b.co", "secret1"),
            req("A", "not-an-email", "secret1"),
            req("A", "a@b.co", "12345"),
        ];
        for case in cases {
            let err = register(users, case).await.unwrap_err();
            assert_eq!(err.kind(), "validation", "{err}");
        }
        assert!(users.find_by_email("a@b.co").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict_case_insensitive() {
        let state = AppState::fake();
        let users = state.users.as_ref();
        register(users, req("First", "dup@example.com", "secret1"))
            .await
            .unwrap();
        let err = register(users, req("Second", "DUP@Example.com", "secret2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let kept = users.find_by_email("dup@example.com").await.unwrap().unwrap();
        assert_eq!(kept.name, "First");
    }

    #[tokio::test]
    async fn login_checks_credentials() {
        let state = AppState::fake();
        let users = state.users.as_ref();
        let created = register(users, req("Lin", "lin@example.com", "secret1"))
            .await
            .unwrap();

        let (token, user) = login(
            users,
            &state.keys,
            LoginRequest {
                email: Some("LIN@example.com".into()),
                password: Some("secret1".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(user.id, created.id);
        assert_eq!(state.keys.verify(&token).unwrap().sub, created.id);

        for (email, password) in [("lin@example.com", "wrong!!"), ("nobody@example.com", "secret1")] {
            let err = login(
                users,
                &state.keys,
                LoginRequest {
                    email: Some(email.into()),
                    password: Some(password.into()),
                },
            )
            .await
            .unwrap_err();
            assert!(matches!(err, AppError::Unauthorized(_)));
        }
    }

    #[tokio::test]
    async fn profile_requires_principal_and_existing_user() {
        let state = AppState::fake();
        let err = profile(state.users.as_ref(), state.products.as_ref(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let ghost = Principal {
            id: uuid::Uuid::new_v4(),
            email: "ghost@example.com".into(),
            name: "Ghost".into(),
        };
        let err = profile(state.users.as_ref(), state.products.as_ref(), Some(&ghost))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let user = register(state.users.as_ref(), req("Max", "max@example.com", "secret1"))
            .await
            .unwrap();
        let me = Principal {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
        };
        let p = profile(state.users.as_ref(), state.products.as_ref(), Some(&me))
            .await
            .unwrap();
        assert_eq!(p.user.id, user.id);
        assert_eq!(p.products_stats.total_count, 0);
        assert_eq!(p.products_stats.total_value, Decimal::from_str("0").unwrap());
    }
}
