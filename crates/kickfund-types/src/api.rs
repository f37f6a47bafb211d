use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::TransactionStatus;

// -- Envelope --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub message: String,
    pub code: u16,
    pub status: String,
}

/// Every response body, success or failure, is wrapped in this envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub meta: Meta,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn new(message: impl Into<String>, code: u16, status: impl Into<String>, data: T) -> Self {
        Self {
            meta: Meta {
                message: message.into(),
                code,
                status: status.into(),
            },
            data,
        }
    }
}

// -- JWT Claims --

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub iat: i64,
    pub exp: i64,
}

// -- Users & auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub name: String,
    pub occupation: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn field_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("name is required".to_string());
        }
        if self.occupation.trim().is_empty() {
            errors.push("occupation is required".to_string());
        }
        if !looks_like_email(&self.email) {
            errors.push("email must be a valid email address".to_string());
        }
        if self.password.len() < 8 {
            errors.push("password must be at least 8 characters".to_string());
        }
        errors
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn field_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !looks_like_email(&self.email) {
            errors.push("email must be a valid email address".to_string());
        }
        if self.password.is_empty() {
            errors.push("password is required".to_string());
        }
        errors
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmailCheckRequest {
    pub email: String,
}

impl EmailCheckRequest {
    pub fn field_errors(&self) -> Vec<String> {
        if looks_like_email(&self.email) {
            vec![]
        } else {
            vec!["email must be a valid email address".to_string()]
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmailCheckResponse {
    pub is_available: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub occupation: String,
    pub email: String,
    pub avatar: String,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AvatarResponse {
    pub avatar: String,
}

// -- Campaigns --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCampaignRequest {
    pub name: String,
    pub highlight: String,
    pub description: String,
    pub goal_amount: i64,
    pub perks: String,
}

impl CreateCampaignRequest {
    pub fn field_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("name is required".to_string());
        }
        if self.highlight.trim().is_empty() {
            errors.push("highlight is required".to_string());
        }
        if self.description.trim().is_empty() {
            errors.push("description is required".to_string());
        }
        if self.perks.trim().is_empty() {
            errors.push("perks is required".to_string());
        }
        if self.goal_amount <= 0 {
            errors.push("goal_amount must be greater than zero".to_string());
        }
        errors
    }
}

/// Partial update: a present field overrides, an absent one is kept. Present
/// fields follow the same rules as on create.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub highlight: Option<String>,
    pub description: Option<String>,
    pub goal_amount: Option<i64>,
    pub perks: Option<String>,
}

impl UpdateCampaignRequest {
    pub fn field_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let texts = [
            ("name", &self.name),
            ("highlight", &self.highlight),
            ("description", &self.description),
            ("perks", &self.perks),
        ];
        for (field, value) in texts {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                errors.push(format!("{} cannot be empty", field));
            }
        }
        if self.goal_amount.is_some_and(|g| g <= 0) {
            errors.push("goal_amount must be greater than zero".to_string());
        }
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct CampaignListQuery {
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignImageResponse {
    pub url: String,
    pub is_cover: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignUserSnippet {
    pub id: i64,
    pub name: String,
    pub avatar: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CampaignResponse {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub slug: String,
    pub highlight: String,
    pub description: String,
    pub perks: String,
    pub cover_image: String,
    pub images: Vec<CampaignImageResponse>,
    pub goal_amount: i64,
    pub current_amount: i64,
    pub backers_count: i64,
    pub user: CampaignUserSnippet,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CampaignThumbnail {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub slug: String,
    pub highlight: String,
    pub image: String,
    pub goal_amount: i64,
    pub current_amount: i64,
    pub backers_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadImagesResponse {
    pub images: Vec<CampaignImageResponse>,
}

// -- Transactions --

/// Largest single backing, in minor currency units. Keeps campaign totals far
/// from the `i64` ceiling that SQLite's `SUM` refuses to cross.
pub const MAX_BACKING_AMOUNT: i64 = 1_000_000_000_000;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackCampaignRequest {
    pub amount: i64,
}

impl BackCampaignRequest {
    pub fn field_errors(&self) -> Vec<String> {
        if self.amount <= 0 {
            vec!["amount must be greater than zero".to_string()]
        } else if self.amount > MAX_BACKING_AMOUNT {
            vec![format!("amount must not exceed {}", MAX_BACKING_AMOUNT)]
        } else {
            vec![]
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionCampaignSnippet {
    pub id: i64,
    pub name: String,
    pub highlight: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionUserSnippet {
    pub id: i64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub id: i64,
    pub amount: i64,
    pub status: TransactionStatus,
    pub code: String,
    pub payment_url: String,
    pub campaign: TransactionCampaignSnippet,
    pub user: TransactionUserSnippet,
    pub created_at: DateTime<Utc>,
}

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.trim().split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.starts_with('.')
        && domain.contains('.')
        && !domain.ends_with('.')
        && !domain.contains('@')
        && !email.contains(char::is_whitespace)
}
