use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::AppState;
use crate::error::ApiError;

/// Extract and verify the bearer token, attaching the resulting
/// [`Identity`](crate::auth::Identity) to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(ApiError::Unauthenticated("authorization token is not provided"))?
        .to_str()
        .map_err(|_| ApiError::Unauthenticated("invalid authorization header format"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::Unauthenticated("invalid authorization header format"))?;

    let identity = state.verifier.verify(token).map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        ApiError::Unauthenticated("invalid token")
    })?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
