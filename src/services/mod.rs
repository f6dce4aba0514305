// Service modules
pub mod credentials;
pub mod entitlement_service;
pub mod google_play_client;
pub mod jwt_service;
pub mod purchase_verifier;
pub mod subscription_service;

pub use entitlement_service::{
    EntitlementService, EntitlementStore, InMemoryEntitlementStore, PostgresEntitlementStore,
};
pub use google_play_client::{GooglePlayClient, SubscriptionStatusApi};
pub use jwt_service::JWTService;
pub use purchase_verifier::{PurchaseVerifier, Verdict};
pub use subscription_service::SubscriptionService;
