use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::AppConfig,
    error::{ApiError, ApiResult},
    models::User,
    repository::{Repository, RepositoryState},
};

/// Claims
///
/// Payload structure of the access token. Signed with the server secret and
/// validated on every authenticated request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's email address.
    pub sub: String,
    /// Expiration Time (exp): timestamp after which the token must not be
    /// accepted.
    pub exp: usize,
    /// Issued At (iat): timestamp when the token was issued.
    pub iat: usize,
}

fn credentials_error() -> ApiError {
    ApiError::Unauthorized("Could not validate credentials".to_string())
}

/// Hashes a password with Argon2id, producing a PHC string safe for storage.
pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::Internal(format!("password hashing failed: {err}")))
}

/// Verifies a password against a stored PHC digest. A mismatch is a clean
/// `false`; only an unparseable digest is an error.
pub fn verify_password(password: &str, hashed_password: &str) -> ApiResult<bool> {
    let parsed = PasswordHash::new(hashed_password)
        .map_err(|err| ApiError::Internal(format!("invalid password digest: {err}")))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(err) => Err(ApiError::Internal(format!(
            "password verification failed: {err}"
        ))),
    }
}

/// authenticate
///
/// Looks up a user by email and verifies the password against the stored
/// digest. An unknown email and a wrong password are both `None` — callers
/// translate absence into an unauthorized response, so the two cases stay
/// indistinguishable to clients.
pub async fn authenticate(
    repo: &dyn Repository,
    email: &str,
    password: &str,
) -> ApiResult<Option<User>> {
    let Some(user) = repo.get_user_by_email(email).await? else {
        return Ok(None);
    };
    if verify_password(password, &user.hashed_password)? {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}

/// issue_token
///
/// Produces a signed access token for the user, with the email as subject and
/// an expiry derived from the configured lifetime.
pub fn issue_token(config: &AppConfig, user: &User) -> ApiResult<String> {
    let now = Utc::now();
    let expires_at = now + Duration::minutes(config.access_token_expire_minutes);
    let claims = Claims {
        sub: user.email.clone(),
        exp: expires_at.timestamp() as usize,
        iat: now.timestamp() as usize,
    };
    encode(
        &Header::new(config.algorithm),
        &claims,
        &EncodingKey::from_secret(config.secret_key.as_bytes()),
    )
    .map_err(|err| ApiError::Internal(format!("token signing failed: {err}")))
}

/// decode_token
///
/// Validates signature and expiry and returns the embedded claims. Every
/// failure mode (expired, tampered, malformed, wrong algorithm) collapses into
/// the same Unauthorized rejection.
pub fn decode_token(config: &AppConfig, token: &str) -> ApiResult<Claims> {
    let mut validation = Validation::new(config.algorithm);
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret_key.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| credentials_error())
}

/// require_active
///
/// Gate for endpoints that need a usable account, not just a valid credential.
pub fn require_active(user: User) -> ApiResult<User> {
    if !user.is_active {
        return Err(ApiError::BadRequest("Inactive user".to_string()));
    }
    Ok(user)
}

/// require_superuser
///
/// Gate for administrative endpoints. Deliberately does not check
/// `is_active` — the privilege chain only asserts the role.
pub fn require_superuser(user: User) -> ApiResult<User> {
    if !user.is_superuser {
        return Err(ApiError::BadRequest(
            "The user doesn't have enough privileges".to_string(),
        ));
    }
    Ok(user)
}

/// CurrentUser
///
/// The resolved identity of an authenticated request. Extracting this from a
/// request performs the full credential resolution: bearer header → token
/// decode/validation → user lookup by the subject email. Any failure rejects
/// the request with 401 before the handler runs.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(credentials_error)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(credentials_error)?;

        let claims = decode_token(&config, token)?;

        // The token may be technically valid while the user no longer exists.
        let user = repo
            .get_user_by_email(&claims.sub)
            .await?
            .ok_or_else(credentials_error)?;

        Ok(CurrentUser(user))
    }
}

/// ActiveUser
///
/// CurrentUser plus the active-account gate. Used by every standard
/// authenticated endpoint.
#[derive(Debug, Clone)]
pub struct ActiveUser(pub User);

impl<S> FromRequestParts<S> for ActiveUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        Ok(ActiveUser(require_active(user)?))
    }
}

/// Superuser
///
/// CurrentUser plus the privilege gate. Used by administrative endpoints.
#[derive(Debug, Clone)]
pub struct Superuser(pub User);

impl<S> FromRequestParts<S> for Superuser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        Ok(Superuser(require_superuser(user)?))
    }
}
