use async_trait::async_trait;
use entity::users;
use sea_orm::{
    entity::*,
    sea_query::{Expr, OnConflict},
    DatabaseConnection,
};
use std::{collections::HashMap, sync::Arc};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::{
    config::{EntitlementConfig, ProductTierEntry},
    error::{ApiError, Result},
    models::entitlement::{EntitlementGrant, ProductTier, TierResolution},
};

/// Per-user entitlement persistence with merge-upsert semantics: the user
/// row is created if absent, and only the entitlement fields are touched if
/// present. Last writer wins.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    async fn upsert_entitlement(&self, uid: &str, grant: &EntitlementGrant) -> Result<()>;
}

/// `users` table in Postgres
pub struct PostgresEntitlementStore {
    db: DatabaseConnection,
}

impl PostgresEntitlementStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EntitlementStore for PostgresEntitlementStore {
    async fn upsert_entitlement(&self, uid: &str, grant: &EntitlementGrant) -> Result<()> {
        // last_verified is left unset so the column default stamps it on insert
        let row = users::ActiveModel {
            id: Set(uid.to_string()),
            is_pro: Set(true),
            pro_expiry: Set(Some(grant.expires_at)),
            last_subscription_id: Set(Some(grant.product_id.clone())),
            ..Default::default()
        };

        users::Entity::insert(row)
            .on_conflict(
                OnConflict::column(users::Column::Id)
                    .update_columns([
                        users::Column::IsPro,
                        users::Column::ProExpiry,
                        users::Column::LastSubscriptionId,
                    ])
                    .value(users::Column::LastVerified, Expr::current_timestamp())
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Ok(())
    }
}

/// Process-local store for tests and database-less runs
#[derive(Default)]
pub struct InMemoryEntitlementStore {
    rows: RwLock<HashMap<String, users::Model>>,
}

impl InMemoryEntitlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a full user row
    pub async fn seed(&self, user: users::Model) {
        self.rows.write().await.insert(user.id.clone(), user);
    }

    pub async fn get(&self, uid: &str) -> Option<users::Model> {
        self.rows.read().await.get(uid).cloned()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl EntitlementStore for InMemoryEntitlementStore {
    async fn upsert_entitlement(&self, uid: &str, grant: &EntitlementGrant) -> Result<()> {
        let now = OffsetDateTime::now_utc();
        let mut rows = self.rows.write().await;

        let user = rows.entry(uid.to_string()).or_insert_with(|| users::Model {
            id: uid.to_string(),
            display_name: None,
            is_pro: false,
            pro_expiry: None,
            last_subscription_id: None,
            last_verified: None,
            created_at: now,
        });

        user.is_pro = true;
        user.pro_expiry = Some(grant.expires_at);
        user.last_subscription_id = Some(grant.product_id.clone());
        user.last_verified = Some(now);

        Ok(())
    }
}

/// Computes entitlement expiry and hands it to the store
pub struct EntitlementService {
    store: Arc<dyn EntitlementStore>,
    product_tiers: Vec<ProductTierEntry>,
}

impl EntitlementService {
    pub fn new(config: &EntitlementConfig, store: Arc<dyn EntitlementStore>) -> Self {
        Self {
            store,
            product_tiers: config.product_tiers.clone(),
        }
    }

    /// Work out what a verified product grants, starting at `now`
    pub fn grant_for(&self, product_id: &str, now: OffsetDateTime) -> Result<EntitlementGrant> {
        let (tier, resolution) = ProductTier::resolve(product_id, &self.product_tiers);
        if resolution == TierResolution::Substring {
            debug!(
                product_id,
                tier = tier.as_str(),
                "Product not in tier table, matched by substring"
            );
        }

        let expires_at = tier
            .expiry_from(now)
            .map_err(|e| ApiError::Internal(e.into()))?;

        Ok(EntitlementGrant {
            product_id: product_id.to_string(),
            tier,
            expires_at,
        })
    }

    /// Grant pro access to `uid` for the verified product
    #[instrument(skip(self))]
    pub async fn grant(&self, uid: &str, product_id: &str) -> Result<EntitlementGrant> {
        let grant = self.grant_for(product_id, OffsetDateTime::now_utc())?;

        self.store.upsert_entitlement(uid, &grant).await?;

        info!(
            uid,
            product_id,
            tier = grant.tier.as_str(),
            expiry = %grant.expires_at,
            "Subscription successfully granted"
        );

        Ok(grant)
    }
}
