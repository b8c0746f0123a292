//! HTTP bindings for the RPC surface. Each handler resolves the actor,
//! then runs the matching operation off the async runtime.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use forge_types::api::{
    CreateInfluencerRequest, InfluencerPage, InfluencerResponse, PageQuery, PostPage,
    PostResponse, SchedulePostRequest, UpdateUserRequest, UserPage, UserResponse,
};

use crate::actor::{provision_actor, resolve_actor};
use crate::auth::Identity;
use crate::error::ApiError;
use crate::{AppState, blocking, influencers, posts, users};

// -- Users --

pub async fn get_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = blocking(&state, move |s| {
        let actor = resolve_actor(s.store.as_ref(), &identity)?;
        users::get_user(s.store.as_ref(), &actor, &id)
    })
    .await?;
    Ok(Json(user.into()))
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<PageQuery>,
) -> Result<Json<UserPage>, ApiError> {
    let (rows, next_page_token) = blocking(&state, move |s| {
        let actor = resolve_actor(s.store.as_ref(), &identity)?;
        users::list_users(s.store.as_ref(), &actor, &query)
    })
    .await?;
    Ok(Json(UserPage {
        users: rows.into_iter().map(Into::into).collect(),
        next_page_token,
    }))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = blocking(&state, move |s| {
        let actor = provision_actor(s.store.as_ref(), &identity, &s.admin_subjects)?;
        users::update_user(s.store.as_ref(), &actor, &id, req)
    })
    .await?;
    Ok(Json(user.into()))
}

// -- Influencers --

pub async fn create_influencer(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateInfluencerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let influencer = blocking(&state, move |s| {
        let actor = provision_actor(s.store.as_ref(), &identity, &s.admin_subjects)?;
        influencers::create_influencer(s.store.as_ref(), &actor, req)
    })
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(InfluencerResponse::from(influencer)),
    ))
}

pub async fn get_influencer(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<InfluencerResponse>, ApiError> {
    let influencer = blocking(&state, move |s| {
        let actor = resolve_actor(s.store.as_ref(), &identity)?;
        influencers::get_influencer(s.store.as_ref(), &actor, &id)
    })
    .await?;
    Ok(Json(influencer.into()))
}

pub async fn list_influencers(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<PageQuery>,
) -> Result<Json<InfluencerPage>, ApiError> {
    let (rows, next_page_token) = blocking(&state, move |s| {
        let actor = resolve_actor(s.store.as_ref(), &identity)?;
        influencers::list_influencers(s.store.as_ref(), &actor, &query)
    })
    .await?;
    Ok(Json(InfluencerPage {
        influencers: rows.into_iter().map(Into::into).collect(),
        next_page_token,
    }))
}

// -- Posts --

pub async fn schedule_post(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<SchedulePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post = blocking(&state, move |s| {
        let actor = provision_actor(s.store.as_ref(), &identity, &s.admin_subjects)?;
        posts::schedule_post(s.store.as_ref(), &actor, req)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(PostResponse::from(post))))
}

pub async fn get_post(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<PostResponse>, ApiError> {
    let post = blocking(&state, move |s| {
        let actor = resolve_actor(s.store.as_ref(), &identity)?;
        posts::get_post(s.store.as_ref(), &actor, &id)
    })
    .await?;
    Ok(Json(post.into()))
}

pub async fn list_posts(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(influencer_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PostPage>, ApiError> {
    let (rows, next_page_token) = blocking(&state, move |s| {
        let actor = resolve_actor(s.store.as_ref(), &identity)?;
        posts::list_posts(s.store.as_ref(), &actor, &influencer_id, &query)
    })
    .await?;
    Ok(Json(PostPage {
        posts: rows.into_iter().map(Into::into).collect(),
        next_page_token,
    }))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
