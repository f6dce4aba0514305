use crate::{
    config::Config,
    services::{
        EntitlementService, EntitlementStore, GooglePlayClient, JWTService,
        PostgresEntitlementStore, PurchaseVerifier, SubscriptionService, SubscriptionStatusApi,
    },
};
use migration::{Migrator, MigratorTrait};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub jwt_service: Arc<JWTService>,
    pub subscription_service: Arc<SubscriptionService>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Production wiring: Postgres-backed entitlements and the live Play API
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        // Connect to database
        let db = sea_orm::Database::connect(&config.database.url).await?;
        Migrator::up(&db, None).await?;

        let store: Arc<dyn EntitlementStore> = Arc::new(PostgresEntitlementStore::new(db));
        let status_api: Arc<dyn SubscriptionStatusApi> =
            Arc::new(GooglePlayClient::new(&config.google_play));

        Ok(Self::with_dependencies(config, status_api, store))
    }

    /// Wire the services around caller-supplied collaborators
    pub fn with_dependencies(
        config: Config,
        status_api: Arc<dyn SubscriptionStatusApi>,
        store: Arc<dyn EntitlementStore>,
    ) -> Self {
        let jwt_service = Arc::new(JWTService::new(&config.auth));
        let verifier = Arc::new(PurchaseVerifier::new(&config.google_play, status_api));
        let entitlements = Arc::new(EntitlementService::new(&config.entitlement, store));
        let subscription_service = Arc::new(SubscriptionService::new(verifier, entitlements));

        Self {
            jwt_service,
            subscription_service,
            config: Arc::new(config),
        }
    }
}
