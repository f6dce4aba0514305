use serde::{Deserialize, Serialize};
use validator::Validate;

/// Subscription verification request.
///
/// Every field is optional on the wire so that a missing or empty value is
/// reported as `invalid-argument` rather than as a body rejection.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifySubscriptionRequest {
    #[validate(required, length(min = 1))]
    pub purchase_token: Option<String>,
    #[validate(required, length(min = 1))]
    pub product_id: Option<String>,
    #[validate(required, length(min = 1))]
    pub source: Option<String>,
}

impl VerifySubscriptionRequest {
    /// Parse a raw request body. An empty body, `null`, non-JSON input or a
    /// mistyped field all yield `None`; the caller decides how to report it.
    pub fn from_body(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    pub fn has_token(&self) -> bool {
        self.purchase_token.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn has_product(&self) -> bool {
        self.product_id.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn has_source(&self) -> bool {
        self.source.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// Validated, immutable form of [`VerifySubscriptionRequest`]
#[derive(Debug, Clone)]
pub struct PurchaseVerificationRequest {
    pub source: String,
    pub purchase_token: String,
    pub product_id: String,
}

impl TryFrom<VerifySubscriptionRequest> for PurchaseVerificationRequest {
    type Error = validator::ValidationErrors;

    fn try_from(request: VerifySubscriptionRequest) -> Result<Self, Self::Error> {
        request.validate()?;

        match (request.source, request.purchase_token, request.product_id) {
            (Some(source), Some(purchase_token), Some(product_id)) => Ok(Self {
                source,
                purchase_token,
                product_id,
            }),
            // validate() already rejected any None
            _ => Err(validator::ValidationErrors::new()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifySubscriptionResponse {
    pub success: bool,
    pub message: String,
}

impl VerifySubscriptionResponse {
    pub fn granted() -> Self {
        Self {
            success: true,
            message: "Subscription successfully granted.".to_string(),
        }
    }
}

/// Subset of the Play Developer API `SubscriptionPurchase` resource
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatus {
    /// 0 pending, 1 received, 2 free trial, 3 pending deferred change
    #[serde(default)]
    pub payment_state: Option<i32>,
    #[serde(default)]
    pub auto_renewing: Option<bool>,
    #[serde(default)]
    pub expiry_time_millis: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
}

impl SubscriptionStatus {
    /// Paid (or in trial) and still renewing
    pub fn is_valid(&self) -> bool {
        matches!(self.payment_state, Some(1 | 2)) && self.auto_renewing == Some(true)
    }

    /// Names of the fields the store actually returned, for logging
    pub fn present_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.payment_state.is_some() {
            fields.push("paymentState");
        }
        if self.auto_renewing.is_some() {
            fields.push("autoRenewing");
        }
        if self.expiry_time_millis.is_some() {
            fields.push("expiryTimeMillis");
        }
        if self.order_id.is_some() {
            fields.push("orderId");
        }
        fields
    }
}
