use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime};

use crate::config::ProductTierEntry;

/// Length of the entitlement a verified product grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductTier {
    Monthly,
    Annual,
    Trial,
}

/// How a product id was mapped to its tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierResolution {
    /// Exact entry in the configured product table
    Table,
    /// Substring match on the product id
    Substring,
}

impl ProductTier {
    /// Resolve a product id to a tier.
    ///
    /// The configured table wins. Otherwise the id is matched by substring,
    /// case-sensitively, checking "monthly" before "annual"; anything else is
    /// a trial.
    pub fn resolve(product_id: &str, table: &[ProductTierEntry]) -> (Self, TierResolution) {
        if let Some(entry) = table.iter().find(|entry| entry.product_id == product_id) {
            return (entry.tier, TierResolution::Table);
        }

        let tier = if product_id.contains("monthly") {
            Self::Monthly
        } else if product_id.contains("annual") {
            Self::Annual
        } else {
            Self::Trial
        };

        (tier, TierResolution::Substring)
    }

    /// Expiry for an entitlement starting at `start`.
    ///
    /// Calendar arithmetic clamps to the last day of the target month, so
    /// Jan 31 + 1 month is Feb 28/29 and Feb 29 + 1 year is Feb 28.
    pub fn expiry_from(
        &self,
        start: OffsetDateTime,
    ) -> Result<OffsetDateTime, time::error::ComponentRange> {
        match self {
            Self::Monthly => add_months(start, 1),
            Self::Annual => add_months(start, 12),
            Self::Trial => Ok(start + Duration::days(7)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Annual => "annual",
            Self::Trial => "trial",
        }
    }
}

fn add_months(
    start: OffsetDateTime,
    months: i32,
) -> Result<OffsetDateTime, time::error::ComponentRange> {
    let total = start.year() * 12 + (u8::from(start.month()) as i32 - 1) + months;
    let year = total.div_euclid(12);
    let month = time::Month::try_from((total.rem_euclid(12) + 1) as u8)?;

    let mut day = start.day();
    let date = loop {
        match Date::from_calendar_date(year, month, day) {
            Ok(date) => break date,
            Err(_) if day > 28 => day -= 1,
            Err(e) => return Err(e),
        }
    };

    Ok(start.replace_date(date))
}

/// Entitlement about to be written for a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitlementGrant {
    pub product_id: String,
    pub tier: ProductTier,
    pub expires_at: OffsetDateTime,
}
