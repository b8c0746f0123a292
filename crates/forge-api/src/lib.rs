pub mod actor;
pub mod auth;
pub mod error;
pub mod influencers;
pub mod middleware;
pub mod pagination;
pub mod policy;
pub mod posts;
pub mod routes;
pub mod users;

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tracing::error;

use forge_db::Store;

use crate::auth::TokenVerifier;
use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Arc<dyn Store>,
    pub verifier: Arc<dyn TokenVerifier>,
    /// Subjects provisioned as admins on their first write.
    pub admin_subjects: HashSet<String>,
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/v1/users", get(routes::list_users))
        .route("/v1/users/{id}", get(routes::get_user).patch(routes::update_user))
        .route(
            "/v1/influencers",
            get(routes::list_influencers).post(routes::create_influencer),
        )
        .route("/v1/influencers/{id}", get(routes::get_influencer))
        .route("/v1/influencers/{id}/posts", get(routes::list_posts))
        .route("/v1/posts", post(routes::schedule_post))
        .route("/v1/posts/{id}", get(routes::get_post))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state);

    Router::new()
        .route("/health", get(routes::health))
        .merge(protected)
}

/// Run store-bound work off the async runtime.
pub(crate) async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
}
