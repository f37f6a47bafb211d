//! Database row types. These map directly to SQLite rows and are kept
//! distinct from the kickfund-types API models.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub occupation: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub avatar: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct NewUser<'a> {
    pub name: &'a str,
    pub occupation: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

/// Campaign joined with its owner snippet and one representative image
/// (cover first, else the earliest upload).
#[derive(Debug, Clone)]
pub struct CampaignRow {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub slug: String,
    pub highlight: String,
    pub description: String,
    pub perks: String,
    pub goal_amount: i64,
    pub current_amount: i64,
    pub backers_count: i64,
    pub created_at: String,
    pub updated_at: String,
    pub owner_name: String,
    pub owner_avatar: Option<String>,
    pub image: Option<String>,
}

pub struct NewCampaign<'a> {
    pub user_id: i64,
    pub name: &'a str,
    pub slug: &'a str,
    pub highlight: &'a str,
    pub description: &'a str,
    pub perks: &'a str,
    pub goal_amount: i64,
}

/// Field-level campaign update. `None` keeps the stored value; `Some` overrides it,
/// zero and empty string included.
#[derive(Debug, Default, Clone)]
pub struct CampaignPatch {
    pub name: Option<String>,
    pub highlight: Option<String>,
    pub description: Option<String>,
    pub perks: Option<String>,
    pub goal_amount: Option<i64>,
    pub current_amount: Option<i64>,
    pub backers_count: Option<i64>,
}

impl From<CampaignStats> for CampaignPatch {
    fn from(stats: CampaignStats) -> Self {
        Self {
            current_amount: Some(stats.current_amount),
            backers_count: Some(stats.backers_count),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct CampaignImageRow {
    pub id: i64,
    pub campaign_id: i64,
    pub filename: String,
    pub is_cover: bool,
    pub created_at: String,
}

/// Result of a delete request; the caller decides how to report each case.
#[derive(Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Row removed. Holds the storage keys of its (cascaded) images.
    Deleted { image_keys: Vec<String> },
    /// Ledger entries still reference the campaign.
    HasTransactions,
    NotFound,
}

/// Ledger entry joined with campaign and backer snippets.
#[derive(Debug, Clone)]
pub struct TransactionRow {
    pub id: i64,
    pub campaign_id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub status: String,
    pub code: String,
    pub payment_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub campaign_name: String,
    pub campaign_highlight: String,
    pub user_name: String,
    pub user_email: String,
}

pub struct NewTransaction<'a> {
    pub campaign_id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub code: &'a str,
    pub payment_url: Option<&'a str>,
}

#[derive(Debug, Clone, Copy)]
pub enum TransactionFilter {
    All,
    Campaign(i64),
    User(i64),
}

/// Aggregate snapshot derived from the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CampaignStats {
    pub current_amount: i64,
    pub backers_count: i64,
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Parse as naive UTC, falling back to RFC 3339.
pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|ndt| ndt.and_utc())
        .or_else(|_| raw.parse::<DateTime<Utc>>())
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}
