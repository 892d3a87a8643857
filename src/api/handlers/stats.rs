// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

use axum::{extract::State, Json};

use crate::api::AppState;
use crate::error::AppResult;
use crate::models::CommunityStats;

pub async fn community_stats(State(state): State<AppState>) -> AppResult<Json<CommunityStats>> {
    Ok(Json(state.ranking.community_stats().await?))
}
