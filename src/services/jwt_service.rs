use crate::{
    config::AuthConfig,
    error::{ApiError, Result},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Caller token claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user id, also the key of the user's document)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Validates caller identity tokens issued by the identity provider
pub struct JWTService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JWTService {
    pub fn new(config: &AuthConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

        Self {
            encoding_key,
            decoding_key,
        }
    }

    /// Issue a token for `uid`. Used by local tooling and tests; production
    /// tokens come from the identity provider.
    pub fn generate_token(&self, uid: &str, ttl_seconds: i64) -> Result<String> {
        let now = OffsetDateTime::now_utc().unix_timestamp();

        let claims = Claims {
            sub: uid.to_string(),
            iat: now,
            exp: now + ttl_seconds,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(e.into()))
    }

    /// Validate and decode a caller token
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    ApiError::Unauthenticated("Authentication token has expired".to_string())
                }
                _ => ApiError::Unauthenticated(format!("Invalid authentication token: {}", e)),
            })?;

        if token_data.claims.sub.is_empty() {
            return Err(ApiError::Unauthenticated(
                "Authentication token has no subject".to_string(),
            ));
        }

        Ok(token_data.claims)
    }
}
