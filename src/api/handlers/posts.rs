// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::debug;

use crate::api::routes::{CommentRequest, LimitQuery, PostsQuery, ToggleRequest};
use crate::api::{ApiJson, ApiPath, ApiQuery, AppState};
use crate::auth::{AuthUser, Viewer};
use crate::error::AppResult;
use crate::models::{CommentView, EdgeKind, PostView};
use crate::services::content::{PostDraft, PostPatch};

/// List posts, newest first
pub async fn list_posts(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    ApiQuery(query): ApiQuery<PostsQuery>,
) -> AppResult<Json<Vec<PostView>>> {
    let posts = state.content.list_posts(&query.filter(), query.page(), viewer).await?;
    debug!("Returning {} posts", posts.len());
    Ok(Json(posts))
}

/// Most-liked posts
pub async fn top_posts(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> AppResult<Json<Vec<PostView>>> {
    Ok(Json(state.ranking.top_posts(query.limit, viewer).await?))
}

pub async fn get_post(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    ApiPath(id): ApiPath<i32>,
) -> AppResult<Json<PostView>> {
    Ok(Json(state.content.get_post(id, viewer).await?))
}

pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(draft): ApiJson<PostDraft>,
) -> AppResult<impl IntoResponse> {
    let post = state.content.create_post(user_id, draft).await?;
    state.metrics.post_created();
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn update_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(patch): ApiJson<PostPatch>,
) -> AppResult<Json<PostView>> {
    Ok(Json(state.content.update_post(id, user_id, patch).await?))
}

pub async fn delete_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> AppResult<StatusCode> {
    state.content.delete_post(id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn like_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(body): ApiJson<ToggleRequest>,
) -> AppResult<impl IntoResponse> {
    let edge = state.graph.toggle_edge(EdgeKind::Like, user_id, id, body.action).await?;
    state.metrics.edge_toggled(EdgeKind::Like, body.action);
    Ok(Json(json!({ "liked": edge.active })))
}

pub async fn save_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(body): ApiJson<ToggleRequest>,
) -> AppResult<impl IntoResponse> {
    let edge = state.graph.toggle_edge(EdgeKind::Save, user_id, id, body.action).await?;
    state.metrics.edge_toggled(EdgeKind::Save, body.action);
    Ok(Json(json!({ "saved": edge.active })))
}

/// Comments, oldest first
pub async fn list_comments(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> AppResult<Json<Vec<CommentView>>> {
    Ok(Json(state.content.list_comments(id).await?))
}

pub async fn add_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(body): ApiJson<CommentRequest>,
) -> AppResult<impl IntoResponse> {
    let comment = state.content.add_comment(id, user_id, body.content).await?;
    state.metrics.comment_created();
    Ok((StatusCode::CREATED, Json(comment)))
}
