use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::{info, warn};

use kickfund_db::models::{NewTransaction, TransactionFilter, TransactionRow, parse_timestamp};
use kickfund_types::api::{
    BackCampaignRequest, Envelope, TransactionCampaignSnippet, TransactionResponse, TransactionUserSnippet,
};
use kickfund_types::models::TransactionStatus;

use crate::error::{ApiError, respond};
use crate::middleware::Principal;
use crate::payment::new_transaction_code;
use crate::state::{AppState, with_db};

const TRANSACTION_NOT_FOUND: &str = "Transaction not found.";

/// POST /campaigns/{id}/back: records a pending transaction and refreshes the
/// campaign totals in the same database transaction.
pub async fn back_campaign(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Path(campaign_id), _): WithRejection<Path<i64>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<BackCampaignRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    ApiError::check(req.field_errors())?;

    if with_db(&state, move |db| db.get_campaign(campaign_id)).await?.is_none() {
        return Err(ApiError::NotFound("Campaign not found."));
    }

    let code = new_transaction_code();
    let payment_url = state.payments.link_for(&code);
    let backer = principal.id();
    let policy = state.stats_policy;

    let (row, stats) = with_db(&state, move |db| {
        db.record_backing(
            &NewTransaction {
                campaign_id,
                user_id: backer,
                amount: req.amount,
                code: &code,
                payment_url: payment_url.as_deref(),
            },
            policy,
        )
    })
    .await?;
    info!(
        "User {} backed campaign {} with {} ({}); total now {} from {} backers",
        backer, campaign_id, row.amount, row.code, stats.current_amount, stats.backers_count
    );

    Ok(respond(
        StatusCode::CREATED,
        "Transaction created.",
        "created",
        transaction_response(row),
    ))
}

/// GET /campaigns/{id}/transactions
pub async fn list_campaign_transactions(
    State(state): State<AppState>,
    WithRejection(Path(campaign_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    list(&state, TransactionFilter::Campaign(campaign_id)).await
}

/// GET /me/transactions
pub async fn list_own_transactions(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse, ApiError> {
    list(&state, TransactionFilter::User(principal.id())).await
}

/// GET /transactions
pub async fn list_all_transactions(
    State(state): State<AppState>,
    _principal: Principal,
) -> Result<impl IntoResponse, ApiError> {
    list(&state, TransactionFilter::All).await
}

pub async fn get_transaction(
    State(state): State<AppState>,
    _principal: Principal,
    WithRejection(Path(transaction_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let row = with_db(&state, move |db| db.get_transaction(transaction_id))
        .await?
        .ok_or(ApiError::NotFound(TRANSACTION_NOT_FOUND))?;
    Ok(respond(StatusCode::OK, "Ok", "success", transaction_response(row)))
}

/// PUT /transactions/{id}/verify: marks the transaction paid and recomputes
/// the campaign totals in one database transaction.
pub async fn verify_transaction(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Path(transaction_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let policy = state.stats_policy;
    let (row, stats) = with_db(&state, move |db| db.verify_transaction(transaction_id, policy))
        .await?
        .ok_or(ApiError::NotFound(TRANSACTION_NOT_FOUND))?;

    info!(
        "User {} verified transaction {}; campaign {} total {}",
        principal.id(),
        row.code,
        row.campaign_id,
        stats.current_amount
    );

    Ok(respond(
        StatusCode::OK,
        "Transaction verified.",
        "success",
        transaction_response(row),
    ))
}

async fn list(
    state: &AppState,
    filter: TransactionFilter,
) -> Result<(StatusCode, Json<Envelope<Vec<TransactionResponse>>>), ApiError> {
    let rows = with_db(state, move |db| db.list_transactions(filter)).await?;
    let data: Vec<TransactionResponse> = rows.into_iter().map(transaction_response).collect();
    Ok(respond(StatusCode::OK, "Ok", "success", data))
}

fn transaction_response(row: TransactionRow) -> TransactionResponse {
    let status = row.status.parse().unwrap_or_else(|_| {
        warn!("Transaction {} has unknown status '{}'", row.id, row.status);
        TransactionStatus::Pending
    });

    TransactionResponse {
        id: row.id,
        amount: row.amount,
        status,
        code: row.code,
        payment_url: row.payment_url.unwrap_or_default(),
        campaign: TransactionCampaignSnippet {
            id: row.campaign_id,
            name: row.campaign_name,
            highlight: row.campaign_highlight,
        },
        user: TransactionUserSnippet {
            id: row.user_id,
            name: row.user_name,
            email: row.user_email,
        },
        created_at: parse_timestamp(&row.created_at),
    }
}
