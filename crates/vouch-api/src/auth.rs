use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info};
use uuid::Uuid;

use vouch_drafts::StoreError;
use vouch_types::AccountType;
use vouch_types::api::{
    Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, SessionResponse,
};

use crate::state::AppState;
use crate::store::with_db;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";
const TOKEN_LIFETIME_DAYS: i64 = 30;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let email = req.email.trim().to_ascii_lowercase();
    if !is_plausible_email(&email) {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.password.len() < 8 {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .to_string();

    let user_id = Uuid::new_v4();
    let account_type = req.account_type.unwrap_or(AccountType::Customer);

    let new_email = email.clone();
    with_db(&state.db, move |db| db.create_user(user_id, &new_email, &password_hash, account_type))
        .await
        .map_err(|e| match e {
            // email is the only unique column a fresh uuid can collide on
            StoreError::Conflict(_) => StatusCode::CONFLICT,
            other => {
                error!("DB create_user error: {}", other);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        })?;

    let token = create_token(&state.jwt_secret, user_id, &email)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    info!("Registered {} account {}", account_type.as_str(), user_id);
    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let email = req.email.trim().to_ascii_lowercase();
    let user = with_db(&state.db, move |db| db.get_user_by_email(&email))
        .await
        .map_err(|e| {
            error!("DB get_user_by_email error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // Verify password
    let parsed_hash =
        PasswordHash::new(&user.password).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let user_id: Uuid = user.id.parse().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let token = create_token(&state.jwt_secret, user_id, &user.email)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(LoginResponse {
        user_id,
        email: user.email,
        token,
    }))
}

/// GET /auth/session: the identity-provider view of the caller.
pub async fn session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let profile = with_db(&state.db, move |db| db.author_profile(claims.sub))
        .await
        .map_err(|e| {
            error!("DB author_profile error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    Ok(Json(SessionResponse {
        user_id: profile.id,
        email: profile.email,
        account_type: profile.account_type,
        verified: profile.verified,
    }))
}

/// POST /admin/users/{id}/verify: completes the verification workflow for a user.
pub async fn verify_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StatusCode> {
    let expected = state.admin_token.as_deref().ok_or(StatusCode::NOT_FOUND)?;
    let supplied = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;
    if supplied != expected {
        return Err(StatusCode::FORBIDDEN);
    }

    let updated = with_db(&state.db, move |db| db.set_verified(user_id, true))
        .await
        .map_err(|e| {
            error!("DB set_verified error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    if !updated {
        return Err(StatusCode::NOT_FOUND);
    }

    info!("User {} verified", user_id);
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_token(secret: &str, user_id: Uuid, email: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_LIFETIME_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && email.len() <= 254
        }
        None => false,
    }
}
