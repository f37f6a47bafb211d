use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post, put},
};
use tower_http::services::ServeDir;

use crate::auth;
use crate::campaigns;
use crate::middleware::require_auth;
use crate::state::AppState;
use crate::storage::PUBLIC_PREFIX;
use crate::transactions;
use crate::users;

/// The full HTTP surface: JSON API under `/api/v1` and stored images under
/// [`PUBLIC_PREFIX`]. Cross-cutting layers (CORS, tracing) are left to the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/email-check", post(auth::check_email))
        .route("/campaigns", get(campaigns::list_campaigns))
        .route("/campaigns/{id}", get(campaigns::get_campaign))
        .route("/campaigns/{id}/transactions", get(transactions::list_campaign_transactions));

    let protected_routes = Router::new()
        .route("/update-avatar", post(users::update_avatar))
        .route("/me/fetch", get(users::fetch_me))
        .route("/me/campaigns", get(campaigns::list_own_campaigns))
        .route("/me/transactions", get(transactions::list_own_transactions))
        .route("/campaigns", post(campaigns::create_campaign))
        .route(
            "/campaigns/{id}",
            patch(campaigns::update_campaign).delete(campaigns::delete_campaign),
        )
        .route("/campaigns/{id}/images", post(campaigns::upload_images))
        .route("/campaigns/{id}/back", post(transactions::back_campaign))
        .route("/transactions", get(transactions::list_all_transactions))
        .route("/transactions/{id}", get(transactions::get_transaction))
        .route("/transactions/{id}/verify", put(transactions::verify_transaction))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let api = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(state.max_upload_bytes));

    Router::new()
        .nest("/api/v1", api)
        .nest_service(PUBLIC_PREFIX, ServeDir::new(state.storage.root()))
        .with_state(state)
}
