use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use lostfound_db::Database;
use lostfound_matching::Evaluator;
use lostfound_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest};

use crate::error::{ApiError, ApiResult};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub evaluator: Arc<Evaluator<Database>>,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req
        .email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing fields".into()))?;
    let password = req
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing fields".into()))?;
    let username = req
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "User".to_string());

    let db = state.db.clone();
    let lookup = email.clone();
    let existing = tokio::task::spawn_blocking(move || db.get_user_by_email(&lookup))
        .await?
        .map_err(|e| ApiError::internal("user lookup failed", e))?;
    if existing.is_some() {
        return Err(ApiError::Conflict("Email already exists".into()));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::internal("password hashing failed", e))?
        .to_string();

    let user_id = Uuid::new_v4();
    let db = state.db.clone();
    let (uid, name, mail) = (user_id.to_string(), username.clone(), email.clone());
    let user = tokio::task::spawn_blocking(move || {
        db.create_user(&uid, &name, &mail, &password_hash)?;
        db.get_user_by_id(&uid)?
            .ok_or_else(|| anyhow::anyhow!("user {} vanished after insert", uid))?
            .into_user()
    })
    .await?
    .map_err(|e| ApiError::internal("user insert failed", e))?;

    let token = create_token(&state.jwt_secret, user_id, &email, state.token_ttl)
        .map_err(|e| ApiError::internal("token signing failed", e))?;

    info!("Registered user {} ({})", user_id, email);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();
    let db = state.db.clone();
    let row = tokio::task::spawn_blocking(move || db.get_user_by_email(&email))
        .await?
        .map_err(|e| ApiError::internal("user lookup failed", e))?
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".into()))?;

    // Verify password
    let parsed_hash =
        PasswordHash::new(&row.password).map_err(|e| ApiError::internal("stored hash unreadable", e))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized("Invalid credentials".into()))?;

    let user = row.into_user().map_err(|e| ApiError::internal("corrupt user row", e))?;
    let token = create_token(&state.jwt_secret, user.id, &user.email, state.token_ttl)
        .map_err(|e| ApiError::internal("token signing failed", e))?;

    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

/// Signs an HS256 token valid for `ttl` (negative values mint already-expired tokens).
pub fn create_token(secret: &str, user_id: Uuid, email: &str, ttl: chrono::Duration) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (chrono::Utc::now() + ttl).timestamp().max(0) as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
