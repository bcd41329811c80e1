// --------------------------------------------------
// Authentication collaborators.
//
// Responsibilities:
// - bcrypt password hashing
// - JWT issue / verification (HS256, `userId` claim)
// - Google ID-token verification behind an injected trait
// - `AuthUser` extractor for protected routes
// --------------------------------------------------

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

pub const BCRYPT_COST: u32 = 10;
pub const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No token, authorization denied")]
    MissingToken,

    #[error("Token is not valid")]
    InvalidToken,

    #[error("Wrong password or email")]
    BadCredentials,

    #[error("Google token is invalid: {0}")]
    GoogleRejected(String),

    #[error("Google sign-in is not configured")]
    GoogleNotConfigured,

    #[error("password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    #[error("token signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingToken | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::BadCredentials
            | AuthError::GoogleRejected(_)
            | AuthError::GoogleNotConfigured => StatusCode::BAD_REQUEST,
            AuthError::Hashing(_) | AuthError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    Ok(bcrypt::hash(password, BCRYPT_COST)?)
}

// A malformed stored hash counts as a mismatch
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "userId")]
    user_id: Uuid,
    iat: i64,
    exp: i64,
}

/// Signing material for session tokens, built once at startup.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        JwtKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, user_id: Uuid) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            user_id,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(AuthError::Signing)
    }

    pub fn verify(&self, token: &str) -> Result<Uuid, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims.user_id)
            .map_err(|e| {
                debug!(error = %e, "rejected session token");
                AuthError::InvalidToken
            })
    }
}

/// Identity asserted by a verified Google ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    pub sub: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[async_trait]
pub trait GoogleTokenVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, AuthError>;
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

/// Verifies ID tokens with Google's tokeninfo endpoint.
pub struct GoogleTokenInfoVerifier {
    http: reqwest::Client,
    client_id: Option<String>,
    endpoint: String,
}

impl GoogleTokenInfoVerifier {
    pub fn new(client_id: Option<String>) -> Self {
        GoogleTokenInfoVerifier {
            http: reqwest::Client::new(),
            client_id,
            endpoint: GOOGLE_TOKENINFO_URL.to_string(),
        }
    }
}

#[async_trait]
impl GoogleTokenVerifier for GoogleTokenInfoVerifier {
    async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, AuthError> {
        let Some(client_id) = &self.client_id else {
            return Err(AuthError::GoogleNotConfigured);
        };

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| AuthError::GoogleRejected(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::GoogleRejected(format!(
                "tokeninfo returned {}",
                response.status()
            )));
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|e| AuthError::GoogleRejected(e.to_string()))?;

        if &info.aud != client_id {
            warn!(aud = %info.aud, "google token issued for another client");
            return Err(AuthError::GoogleRejected("audience mismatch".into()));
        }

        let email = info
            .email
            .ok_or_else(|| AuthError::GoogleRejected("token has no email".into()))?;

        Ok(GoogleIdentity {
            sub: info.sub,
            email,
            name: info.name,
            picture: info.picture,
        })
    }
}

/// Caller identity taken from a verified `Authorization: Bearer` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|h| h.strip_prefix("Bearer ").unwrap_or(h).trim())
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        Ok(AuthUser(state.jwt.verify(token)?))
    }
}
