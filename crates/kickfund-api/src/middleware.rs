use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use kickfund_db::models::UserRow;

use crate::error::{ApiError, INVALID_ACCESS_TOKEN};
use crate::state::{AppState, with_db};

/// The authenticated user, attached to the request by [`require_auth`].
#[derive(Debug, Clone)]
pub struct Principal(pub UserRow);

impl Principal {
    pub fn id(&self) -> i64 {
        self.0.id
    }
}

/// Extract and validate the bearer token, resolve the user it names and attach
/// it as a [`Principal`]. Every failure answers 401 with the same message.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or_else(|| {
        debug!("Rejected request without bearer token");
        ApiError::Unauthenticated(INVALID_ACCESS_TOKEN)
    })?;

    let claims = state.credentials.validate(token).map_err(|e| {
        debug!("Rejected access token: {}", e);
        ApiError::Unauthenticated(INVALID_ACCESS_TOKEN)
    })?;

    let user_id = claims.user_id;
    let user = with_db(&state, move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or_else(|| {
            debug!("Access token names unknown user {}", user_id);
            ApiError::Unauthenticated(INVALID_ACCESS_TOKEN)
        })?;

    req.extensions_mut().insert(Principal(user));
    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}

/// Reads the principal left by [`require_auth`]. Fails closed with 401 when a
/// handler is mounted without the gate.
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(ApiError::Unauthenticated(INVALID_ACCESS_TOKEN))
    }
}
