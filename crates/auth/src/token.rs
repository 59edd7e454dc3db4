//! HS256 session tokens: issue, validate, refresh.
//!
//! The service is stateless: every operation is a pure function of the
//! signing key, the configured durations and the wall clock.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::{TokenClaims, User};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Bad signature, wrong algorithm, wrong issuer or malformed structure.
    #[error("invalid token")]
    Invalid,

    /// Signature is valid but the expiry has passed.
    #[error("token has expired")]
    Expired,

    /// Signature is valid but the payload cannot be decoded into claims.
    #[error("token claims could not be decoded")]
    Claims,

    #[error("token is not yet eligible for refresh")]
    NotEligibleForRefresh,

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Where a token sits in its lifecycle at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// At least one refresh window of life left.
    Valid,
    /// Within the refresh window before expiry, or less than one window past it.
    RefreshEligible,
    /// Past expiry by at least one refresh window. Terminal.
    Expired,
}

impl TokenState {
    pub fn of(claims: &TokenClaims, now: DateTime<Utc>, refresh_window: Duration) -> Self {
        let remaining = claims.exp - now.timestamp();
        let window = refresh_window.num_seconds();
        if remaining <= -window {
            TokenState::Expired
        } else if remaining < window {
            TokenState::RefreshEligible
        } else {
            TokenState::Valid
        }
    }
}

/// Issues and verifies signed session tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    ttl: Duration,
    refresh_window: Duration,
}

impl core::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .field("refresh_window", &self.refresh_window)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(
        secret: &[u8],
        issuer: impl Into<String>,
        ttl: Duration,
        refresh_window: Duration,
    ) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            ttl,
            refresh_window,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn refresh_window(&self) -> Duration {
        self.refresh_window
    }

    /// Issue a token for `user` valid from now.
    pub fn generate_token(&self, user: &User) -> Result<String, TokenError> {
        self.generate_token_at(user, Utc::now())
    }

    pub fn generate_token_at(&self, user: &User, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = TokenClaims::for_user(user, &self.issuer, now, self.ttl);
        self.sign(&claims)
    }

    /// Sign `claims` as-is.
    pub fn sign(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature, algorithm, issuer and expiry; decode the claims.
    pub fn validate_token(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.decode(token, true)
    }

    /// Verify a token presented for renewal.
    ///
    /// Only [`TokenState::RefreshEligible`] tokens pass: one with a full
    /// window of life left is `NotEligibleForRefresh`, and one that expired
    /// more than a window ago is `Expired`.
    pub fn validate_for_refresh(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.validate_for_refresh_at(token, Utc::now())
    }

    pub fn validate_for_refresh_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenClaims, TokenError> {
        let claims = self.decode(token, false)?;
        match TokenState::of(&claims, now, self.refresh_window) {
            TokenState::Valid => Err(TokenError::NotEligibleForRefresh),
            TokenState::Expired => Err(TokenError::Expired),
            TokenState::RefreshEligible => Ok(claims),
        }
    }

    /// Re-sign the same snapshot with a fresh expiry.
    ///
    /// Never consults the directory; the roles and permissions carried over
    /// are whatever `claims` already holds.
    pub fn refresh_token(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        self.refresh_token_at(claims, Utc::now())
    }

    pub fn refresh_token_at(
        &self,
        claims: &TokenClaims,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        match TokenState::of(claims, now, self.refresh_window) {
            TokenState::Valid => Err(TokenError::NotEligibleForRefresh),
            TokenState::Expired => Err(TokenError::Expired),
            TokenState::RefreshEligible => self.sign(&claims.reissue(now, self.ttl)),
        }
    }

    fn decode(&self, token: &str, enforce_expiry: bool) -> Result<TokenClaims, TokenError> {
        // A header that does not parse is structural damage, not a claims problem.
        jsonwebtoken::decode_header(token).map_err(|_| TokenError::Invalid)?;

        jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &self.validation(enforce_expiry))
            .map(|data| data.claims)
            .map_err(classify)
    }

    fn validation(&self, enforce_expiry: bool) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = enforce_expiry;
        validation.validate_nbf = true;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iat", "nbf", "iss", "sub"]);
        validation
    }
}

fn classify(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => TokenError::Claims,
        _ => TokenError::Invalid,
    }
}

/// Extract the credential from an `Authorization` header value.
///
/// Returns `None` unless the value is `Bearer <token>` with a non-empty token.
pub fn extract_bearer(header_value: &str) -> Option<&str> {
    let token = header_value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}
