use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-account document. Only the entitlement columns are written by the
/// verification flow; everything else belongs to other writers.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub display_name: Option<String>,
    pub is_pro: bool,
    pub pro_expiry: Option<TimeDateTimeWithTimeZone>,
    pub last_subscription_id: Option<String>,
    pub last_verified: Option<TimeDateTimeWithTimeZone>,
    pub created_at: TimeDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
