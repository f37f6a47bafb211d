use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::{error, info};
use uuid::Uuid;

use kickfund_types::api::AvatarResponse;

use crate::auth::{issue_token, user_response};
use crate::error::{ApiError, respond};
use crate::middleware::Principal;
use crate::state::{AppState, with_db};
use crate::storage::{UploadForm, public_url};

/// GET /me/fetch: the principal with a fresh access token.
pub async fn fetch_me(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse, ApiError> {
    let token = issue_token(&state, principal.id())?;
    Ok(respond(StatusCode::OK, "Ok", "success", user_response(&principal.0, token)))
}

/// POST /update-avatar: multipart with a single `avatar` image.
pub async fn update_avatar(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(multipart, _): WithRejection<Multipart, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let form = UploadForm::read(multipart).await?;
    let images = form.images("avatar")?;
    let [(file, ext)] = images.as_slice() else {
        return Err(ApiError::invalid("exactly one avatar image is required"));
    };

    let user_id = principal.id();
    let key = format!("users/ava-{}-{}{}", user_id, Uuid::new_v4().simple(), ext);
    state.storage.store(&key, &file.bytes).await?;

    let stored = key.clone();
    let previous = match with_db(&state, move |db| db.update_avatar(user_id, &stored)).await {
        Ok(previous) => previous,
        Err(e) => {
            error!("Avatar update failed for user {}, removing {}", user_id, key);
            state.storage.discard(std::slice::from_ref(&key)).await;
            return Err(e);
        }
    };

    if let Some(previous) = previous {
        state.storage.discard(&[previous]).await;
    }
    info!("User {} changed avatar to {}", user_id, key);

    Ok(respond(
        StatusCode::OK,
        "Avatar updated.",
        "success",
        AvatarResponse { avatar: public_url(Some(&key)) },
    ))
}
