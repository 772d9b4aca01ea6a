use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::{config::JwtConfig, response::ApiError, state::AppState, users::repo};

pub const NOT_AUTHENTICATED: &str = "User is not Authenticated.";

/// JWT payload. `jti` identifies the token so it can be revoked
/// server-side on logout and refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
    pub jti: Uuid,
}

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            access_ttl: Duration::from_secs((ttl_minutes as u64) * 60),
        }
    }
}

impl JwtKeys {
    pub fn sign(&self, user_id: Uuid) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.access_ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, jti = %claims.jti, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, jti = %data.claims.jti, "jwt verified");
        Ok(data.claims)
    }
}

/// Extracts the authenticated caller from the bearer token, rejecting
/// revoked tokens. Any failure replies with the uniform HTTP 200
/// `{"success": false, "message": "User is not Authenticated."}` body.
#[derive(Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub jti: Uuid,
    pub expires_at: OffsetDateTime,
}

fn not_authenticated() -> ApiError {
    ApiError::failure(NOT_AUTHENTICATED)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(not_authenticated)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(not_authenticated)?;

        let claims = match keys.verify(token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid or expired token");
                return Err(not_authenticated());
            }
        };

        match repo::is_token_revoked(&state.db, claims.jti).await {
            Ok(false) => {}
            Ok(true) => {
                warn!(jti = %claims.jti, "revoked token presented");
                return Err(not_authenticated());
            }
            Err(e) => {
                error!(error = %e, "revocation lookup failed");
                return Err(not_authenticated());
            }
        }

        let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp as i64)
            .map_err(|_| not_authenticated())?;

        Ok(AuthUser {
            user_id: claims.sub,
            jti: claims.jti,
            expires_at,
        })
    }
}

#[cfg(test)]
mod jwt_tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        let state = AppState::fake();
        JwtKeys::from_ref(&state)
    }

    #[tokio::test]
    async fn sign_and_verify_token() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign(user_id).expect("sign");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
    }

    #[tokio::test]
    async fn each_token_carries_a_fresh_jti() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let first = keys.verify(&keys.sign(user_id).expect("sign")).expect("verify");
        let second = keys.verify(&keys.sign(user_id).expect("sign")).expect("verify");
        assert_ne!(first.jti, second.jti);
    }

    #[tokio::test]
    async fn ttl_follows_configured_minutes() {
        let keys = make_keys();
        // fake() configures 5 minutes
        assert_eq!(keys.access_ttl.as_secs(), 5 * 60);
        let claims = keys
            .verify(&keys.sign(Uuid::new_v4()).expect("sign"))
            .expect("verify");
        assert_eq!(claims.exp - claims.iat, 5 * 60);
    }

    #[tokio::test]
    async fn verify_rejects_garbage() {
        let keys = make_keys();
        assert!(keys.verify("not-a-jwt").is_err());
    }
}
