// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

use axum::{extract::State, Json};

use crate::api::routes::{LimitQuery, PaginationParams, ToggleRequest, UsersQuery};
use crate::api::{ApiJson, ApiPath, ApiQuery, AppState};
use crate::auth::{AuthUser, Viewer};
use crate::error::AppResult;
use crate::models::UserView;
use crate::services::accounts::ProfilePatch;
use crate::services::graph::FollowState;
use crate::services::{PostList, UserList};

/// User directory with prefix filter and sort
pub async fn list_users(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    ApiQuery(query): ApiQuery<UsersQuery>,
) -> AppResult<Json<UserList>> {
    Ok(Json(state.ranking.list_users(query.into_query(), viewer).await?))
}

/// Most-followed users
pub async fn top_users(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> AppResult<Json<Vec<UserView>>> {
    Ok(Json(state.ranking.top_users(query.limit, viewer).await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    ApiPath(id): ApiPath<i32>,
) -> AppResult<Json<UserView>> {
    Ok(Json(state.accounts.get_user(id, viewer).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(patch): ApiJson<ProfilePatch>,
) -> AppResult<Json<UserView>> {
    Ok(Json(state.accounts.update_profile(id, user_id, patch).await?))
}

pub async fn follow_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(body): ApiJson<ToggleRequest>,
) -> AppResult<Json<FollowState>> {
    let follow = state.graph.toggle_follow(user_id, id, body.action).await?;
    state.metrics.follow_toggled(body.action);
    Ok(Json(follow))
}

pub async fn get_followers(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    ApiPath(id): ApiPath<i32>,
    ApiQuery(query): ApiQuery<PaginationParams>,
) -> AppResult<Json<UserList>> {
    Ok(Json(state.graph.followers(id, query.page(), viewer).await?))
}

pub async fn get_following(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    ApiPath(id): ApiPath<i32>,
    ApiQuery(query): ApiQuery<PaginationParams>,
) -> AppResult<Json<UserList>> {
    Ok(Json(state.graph.following(id, query.page(), viewer).await?))
}

/// The caller's saved posts
pub async fn saved_posts(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiQuery(query): ApiQuery<PaginationParams>,
) -> AppResult<Json<PostList>> {
    Ok(Json(state.graph.saved_posts(user_id, query.page()).await?))
}
