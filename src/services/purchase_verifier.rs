use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::{
    config::GooglePlayConfig,
    models::common::PurchaseSource,
    services::{
        credentials::{ConfigurationError, ServiceAccountCredentials},
        google_play_client::{StoreApiError, SubscriptionStatusApi},
    },
};

/// Outcome of a purchase verification. Fails closed: anything that is not a
/// positive answer from the store is a rejection.
#[derive(Debug)]
pub enum Verdict {
    Verified,
    Rejected(RejectReason),
}

#[derive(Debug, thiserror::Error)]
pub enum RejectReason {
    #[error("subscription not active (paymentState={payment_state:?}, autoRenewing={auto_renewing:?})")]
    InactiveSubscription {
        payment_state: Option<i32>,
        auto_renewing: Option<bool>,
    },

    #[error("credentials unavailable: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreApiError),

    #[error("unsupported purchase source: {0}")]
    UnsupportedSource(String),
}

impl Verdict {
    pub fn is_verified(&self) -> bool {
        matches!(self, Verdict::Verified)
    }
}

pub struct PurchaseVerifier {
    config: GooglePlayConfig,
    status_api: Arc<dyn SubscriptionStatusApi>,
}

impl PurchaseVerifier {
    pub fn new(config: &GooglePlayConfig, status_api: Arc<dyn SubscriptionStatusApi>) -> Self {
        Self {
            config: config.clone(),
            status_api,
        }
    }

    /// Verify a purchase token with the store it came from
    #[instrument(skip(self, token), fields(package_name = %self.config.package_name))]
    pub async fn verify(&self, source: &str, token: &str, product_id: &str) -> Verdict {
        info!(
            source,
            product_id,
            token_length = token.len(),
            "Starting purchase verification"
        );

        match source.parse::<PurchaseSource>() {
            Ok(PurchaseSource::GooglePlay) => {
                match self.verify_google_play(token, product_id).await {
                    Ok(()) => Verdict::Verified,
                    Err(reason) => {
                        error!(reason = %reason, product_id, "Google Play verification failed");
                        Verdict::Rejected(reason)
                    }
                }
            }
            Ok(PurchaseSource::AppStore) => {
                // Placeholder: App Store receipts are not checked yet and always pass
                warn!("Apple App Store verification not implemented yet");
                Verdict::Verified
            }
            Err(unknown) => {
                warn!(source, "Unsupported purchase source");
                Verdict::Rejected(RejectReason::UnsupportedSource(unknown.0))
            }
        }
    }

    async fn verify_google_play(&self, token: &str, product_id: &str) -> Result<(), RejectReason> {
        // Decoded on every call so a rotated secret takes effect without a restart
        let credentials =
            ServiceAccountCredentials::from_base64(self.config.service_account_base64.as_deref())?;
        info!(
            client_email = %credentials.client_email,
            "Service account credentials loaded"
        );

        let status = self
            .status_api
            .get_subscription(&credentials, &self.config.package_name, product_id, token)
            .await?;

        let valid = status.is_valid();
        info!(
            product_id,
            payment_state = ?status.payment_state,
            auto_renewing = ?status.auto_renewing,
            valid,
            "Google Play verification result"
        );

        if valid {
            Ok(())
        } else {
            Err(RejectReason::InactiveSubscription {
                payment_state: status.payment_state,
                auto_renewing: status.auto_renewing,
            })
        }
    }
}
