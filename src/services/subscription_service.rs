use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::{
    error::{ApiError, Result},
    middleware::UserIdentity,
    models::subscription::{
        PurchaseVerificationRequest, VerifySubscriptionRequest, VerifySubscriptionResponse,
    },
    services::{entitlement_service::EntitlementService, purchase_verifier::PurchaseVerifier},
};

/// Verify-then-grant flow behind the callable endpoint.
///
/// Steps run strictly in order and the first failure ends the call:
/// identity check, argument check, store verification, entitlement write.
/// Nothing is written before the last step. The body arrives unparsed so that
/// a malformed payload never outranks a missing identity.
pub struct SubscriptionService {
    verifier: Arc<PurchaseVerifier>,
    entitlements: Arc<EntitlementService>,
}

impl SubscriptionService {
    pub fn new(verifier: Arc<PurchaseVerifier>, entitlements: Arc<EntitlementService>) -> Self {
        Self {
            verifier,
            entitlements,
        }
    }

    #[instrument(skip_all)]
    pub async fn verify_subscription(
        &self,
        caller: Option<&UserIdentity>,
        body: &[u8],
    ) -> Result<VerifySubscriptionResponse> {
        let parsed = VerifySubscriptionRequest::from_body(body);
        let shown = parsed.as_ref();
        info!(
            uid = caller.map(|c| c.uid.as_str()).unwrap_or("UNAUTHENTICATED"),
            parsed = parsed.is_some(),
            has_token = shown.is_some_and(VerifySubscriptionRequest::has_token),
            has_product = shown.is_some_and(VerifySubscriptionRequest::has_product),
            has_source = shown.is_some_and(VerifySubscriptionRequest::has_source),
            "Subscription verification request received"
        );

        let Some(caller) = caller else {
            warn!("Unauthenticated request blocked");
            return Err(ApiError::Unauthenticated(
                "User must be logged in.".to_string(),
            ));
        };

        let Some(request) = parsed else {
            warn!(body_len = body.len(), "Unparseable request body blocked");
            return Err(missing_arguments());
        };

        let (has_token, has_product, has_source) =
            (request.has_token(), request.has_product(), request.has_source());
        let request = PurchaseVerificationRequest::try_from(request).map_err(|_| {
            warn!(has_token, has_product, has_source, "Invalid arguments blocked");
            missing_arguments()
        })?;

        let verdict = self
            .verifier
            .verify(&request.source, &request.purchase_token, &request.product_id)
            .await;

        if !verdict.is_verified() {
            error!(uid = %caller.uid, ?verdict, "Final purchase verification failed");
            return Err(ApiError::PermissionDenied(
                "Purchase verification failed with the store.".to_string(),
            ));
        }

        self.entitlements
            .grant(&caller.uid, &request.product_id)
            .await?;

        Ok(VerifySubscriptionResponse::granted())
    }
}

fn missing_arguments() -> ApiError {
    ApiError::InvalidArgument("Missing required purchase verification parameters.".to_string())
}
