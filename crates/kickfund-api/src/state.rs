use std::sync::Arc;

use kickfund_db::Database;
use kickfund_types::models::StatsPolicy;
use tracing::error;

use crate::credentials::CredentialService;
use crate::error::ApiError;
use crate::payment::PaymentLinks;
use crate::storage::ImageStorage;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub credentials: CredentialService,
    pub storage: ImageStorage,
    pub payments: PaymentLinks,
    pub stats_policy: StatsPolicy,
    /// Request body cap for multipart uploads, in bytes.
    pub max_upload_bytes: usize,
}

/// Run blocking DB work off the async runtime.
pub async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Server(e.into())
        })?
        .map_err(ApiError::Server)
}
