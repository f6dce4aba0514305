use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info, instrument};

use crate::{
    config::GooglePlayConfig, models::subscription::SubscriptionStatus,
    services::credentials::ServiceAccountCredentials,
};

/// OAuth scope for the Play Developer (android publisher) API
pub const ANDROID_PUBLISHER_SCOPE: &str = "https://www.googleapis.com/auth/androidpublisher";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, thiserror::Error)]
pub enum StoreApiError {
    #[error("authorization failed: {0}")]
    Authorization(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid request url: {0}")]
    InvalidUrl(String),
}

/// Fetches subscription state from the store
#[async_trait]
pub trait SubscriptionStatusApi: Send + Sync {
    async fn get_subscription(
        &self,
        credentials: &ServiceAccountCredentials,
        package_name: &str,
        subscription_id: &str,
        token: &str,
    ) -> Result<SubscriptionStatus, StoreApiError>;
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Play Developer API client authenticating with a service account
pub struct GooglePlayClient {
    http_client: reqwest::Client,
    api_base: String,
    default_token_uri: String,
}

impl GooglePlayClient {
    pub fn new(config: &GooglePlayConfig) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            default_token_uri: config.oauth_token_uri.clone(),
        }
    }

    fn token_uri<'a>(&'a self, credentials: &'a ServiceAccountCredentials) -> &'a str {
        credentials
            .token_uri
            .as_deref()
            .unwrap_or(&self.default_token_uri)
    }

    /// Build the RS256-signed assertion for the JWT bearer grant
    pub fn sign_assertion(
        credentials: &ServiceAccountCredentials,
        token_uri: &str,
        now: OffsetDateTime,
    ) -> Result<String, StoreApiError> {
        let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())
            .map_err(|e| StoreApiError::Authorization(format!("invalid private key: {}", e)))?;

        let mut header = Header::new(Algorithm::RS256);
        header.kid = credentials.private_key_id.clone();

        let iat = now.unix_timestamp();
        let claims = AssertionClaims {
            iss: &credentials.client_email,
            scope: ANDROID_PUBLISHER_SCOPE,
            aud: token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        encode(&header, &claims, &key)
            .map_err(|e| StoreApiError::Authorization(format!("signing failed: {}", e)))
    }

    /// Exchange a signed assertion for an access token
    async fn authorize(&self, credentials: &ServiceAccountCredentials) -> Result<String, StoreApiError> {
        let token_uri = self.token_uri(credentials);
        let assertion = Self::sign_assertion(credentials, token_uri, OffsetDateTime::now_utc())?;

        let response = self
            .http_client
            .post(token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreApiError::Authorization(format!(
                "token endpoint returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = response.json().await?;
        info!("JWT authorization successful");

        Ok(token.access_token)
    }

    /// `purchases.subscriptions.get` URL. Each parameter becomes exactly one
    /// percent-encoded path segment.
    pub fn subscription_url(
        &self,
        package_name: &str,
        subscription_id: &str,
        token: &str,
    ) -> Result<Url, StoreApiError> {
        let params = [package_name, subscription_id, token];
        // The url crate silently drops "." and ".." segments
        if params.iter().any(|p| matches!(*p, "" | "." | "..")) {
            return Err(StoreApiError::InvalidUrl(
                "empty or dot path parameter".to_string(),
            ));
        }

        let mut url = Url::parse(&self.api_base)
            .map_err(|e| StoreApiError::InvalidUrl(format!("{}: {}", self.api_base, e)))?;
        url.path_segments_mut()
            .map_err(|_| StoreApiError::InvalidUrl(format!("{}: cannot be a base", self.api_base)))?
            .pop_if_empty()
            .extend(["androidpublisher", "v3", "applications", package_name])
            .extend(["purchases", "subscriptions", subscription_id, "tokens", token]);

        Ok(url)
    }
}

#[async_trait]
impl SubscriptionStatusApi for GooglePlayClient {
    #[instrument(skip(self, credentials, token), fields(client_email = %credentials.client_email))]
    async fn get_subscription(
        &self,
        credentials: &ServiceAccountCredentials,
        package_name: &str,
        subscription_id: &str,
        token: &str,
    ) -> Result<SubscriptionStatus, StoreApiError> {
        let url = self.subscription_url(package_name, subscription_id, token)?;
        let access_token = self.authorize(credentials).await?;

        debug!(package_name, subscription_id, "Querying subscription status");

        let response = self
            .http_client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let subscription: SubscriptionStatus = response.json().await?;

        info!(
            http_status = status.as_u16(),
            response_fields = ?subscription.present_fields(),
            "Google Play API response received"
        );

        Ok(subscription)
    }
}
