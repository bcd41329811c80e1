// --------------------------------------------------
// Handles API endpoints for accounts and sessions.
//
// Responsibilities:
// - Sign up / sign in with email + password
// - Sign in with a Google ID token
// - Return the caller's profile
// --------------------------------------------------

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{self, AuthError, AuthUser};
use crate::error::{AppError, JsonBody};
use crate::models::{AuthType, User, UserProfile};
use crate::AppState;

// bcrypt is CPU bound; keep it off the async workers
async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsInput {
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
}

fn credentials(input: &CredentialsInput) -> Result<(String, String), AppError> {
    let email = input
        .email
        .as_deref()
        .map(auth::normalize_email)
        .filter(|e| !e.is_empty());
    let password = input.password.clone().filter(|p| !p.is_empty());

    match (email, password) {
        (Some(email), Some(password)) => Ok((email, password)),
        _ => Err(AppError::validation("Email and password are required.")),
    }
}

// -----------------------------
// POST /api/auth/signup
// Creates a local account
// -----------------------------
pub async fn signup(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<CredentialsInput>,
) -> Result<impl IntoResponse, AppError> {
    let (email, password) = credentials(&input)?;

    if state.store.find_user_by_email(&email).await.is_some() {
        return Err(AppError::validation("Email already exists"));
    }

    let password_hash = blocking(move || auth::hash_password(&password)).await??;
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email,
        password_hash: Some(password_hash),
        google_id: None,
        full_name: input.full_name.map(|n| n.trim().to_string()).unwrap_or_default(),
        avatar_url: String::new(),
        auth_type: AuthType::Local,
        created_at: now,
        updated_at: now,
    };

    info!(user_id = %user.id, "user registered");
    state.store.insert_user(user).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User registered successfully" })),
    ))
}

// -----------------------------
// POST /api/auth/signin
// Checks the password and issues a session token
// -----------------------------
pub async fn signin(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<CredentialsInput>,
) -> Result<impl IntoResponse, AppError> {
    let (email, password) = credentials(&input)?;

    let user = state.store.find_user_by_email(&email).await;
    let stored_hash = user.as_ref().and_then(|u| u.password_hash.clone());

    let valid = match stored_hash {
        Some(hash) => blocking(move || auth::verify_password(&password, &hash)).await?,
        None => false,
    };

    let Some(user) = user.filter(|_| valid) else {
        warn!(email = %email, "rejected sign-in");
        return Err(AuthError::BadCredentials.into());
    };

    let token = state.jwt.issue(user.id)?;

    Ok(Json(json!({
        "message": "Login successful",
        "token": token,
        "user": {
            "id": user.id,
            "email": user.email,
            "fullName": user.full_name,
        }
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleSigninInput {
    pub id_token: Option<String>,
}

// -----------------------------
// POST /api/auth/google
// Verifies a Google ID token, links or creates the account,
// and issues a session token
// -----------------------------
pub async fn google_signin(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<GoogleSigninInput>,
) -> Result<impl IntoResponse, AppError> {
    let id_token = input
        .id_token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AuthError::GoogleRejected("missing idToken".into()))?;

    let identity = state.google.verify(&id_token).await.inspect_err(|e| {
        warn!(error = %e, "google sign-in rejected");
    })?;

    let email = auth::normalize_email(&identity.email);
    let now = Utc::now();

    let existing = match state.store.find_user_by_google_id(&identity.sub).await {
        Some(user) => Some(user),
        None => state.store.find_user_by_email(&email).await,
    };

    let user = match existing {
        Some(mut user) => {
            // First Google sign-in for an existing local account: link it
            if user.google_id.is_none() {
                user.google_id = Some(identity.sub);
                user.auth_type = AuthType::Google;
                if user.avatar_url.is_empty() {
                    user.avatar_url = identity.picture.unwrap_or_default();
                }
                if user.full_name.is_empty() {
                    user.full_name = identity.name.unwrap_or_default();
                }
                user.updated_at = now;
                state.store.save_user(&user).await?;
                info!(user_id = %user.id, "linked google account");
            }
            user
        }
        None => {
            let user = User {
                id: Uuid::new_v4(),
                email,
                password_hash: None,
                google_id: Some(identity.sub),
                full_name: identity.name.unwrap_or_default(),
                avatar_url: identity.picture.unwrap_or_default(),
                auth_type: AuthType::Google,
                created_at: now,
                updated_at: now,
            };
            state.store.insert_user(user.clone()).await?;
            info!(user_id = %user.id, "user registered via google");
            user
        }
    };

    let token = state.jwt.issue(user.id)?;

    Ok(Json(json!({
        "message": "Google Login successful",
        "token": token,
        "user": {
            "id": user.id,
            "email": user.email,
            "fullName": user.full_name,
            "avatarUrl": user.avatar_url,
        }
    })))
}

// -----------------------------
// GET /api/auth/profile
// -----------------------------
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserProfile>, AppError> {
    let user = state
        .store
        .find_user(user_id)
        .await
        .ok_or_else(|| AppError::not_found("User does not exist"))?;

    Ok(Json(UserProfile::from(&user)))
}
