use axum::{
    body::Bytes,
    extract::{FromRequest, Request, State},
    Json,
};
use std::convert::Infallible;
use tracing::{instrument, warn};

use crate::{
    app_state::AppState, error::Result, middleware::UserIdentity,
    models::subscription::VerifySubscriptionResponse,
};

/// Raw request body, never rejected at extraction.
///
/// Content type and shape are checked by the service after the identity
/// check, so every failure maps onto the callable error codes. A body that
/// cannot be read is treated as empty.
pub struct CallableBody(pub Bytes);

impl<S> FromRequest<S> for CallableBody
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        match Bytes::from_request(req, state).await {
            Ok(bytes) => Ok(Self(bytes)),
            Err(e) => {
                warn!(error = %e, "Request body could not be read");
                Ok(Self(Bytes::new()))
            }
        }
    }
}

/// POST /api/v1/subscriptions/verify
#[instrument(skip_all)]
pub async fn verify_subscription(
    State(state): State<AppState>,
    identity: Option<UserIdentity>,
    CallableBody(body): CallableBody,
) -> Result<Json<VerifySubscriptionResponse>> {
    let response = state
        .subscription_service
        .verify_subscription(identity.as_ref(), &body)
        .await?;

    Ok(Json(response))
}
