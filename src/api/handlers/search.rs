// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

use axum::{extract::State, Json};

use crate::api::routes::SearchQuery;
use crate::api::{ApiQuery, AppState};
use crate::auth::Viewer;
use crate::error::AppResult;
use crate::services::search::SearchResults;

/// Combined post/user search; `type` narrows to one collection
pub async fn search(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> AppResult<Json<SearchResults>> {
    let results = state
        .search
        .search(query.q.as_deref(), query.scope, query.limit, viewer)
        .await?;
    Ok(Json(results))
}
