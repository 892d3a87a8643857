// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

use axum::{extract::State, http::header, response::IntoResponse};

use crate::api::AppState;
use crate::error::AppResult;

/// Prometheus text exposition
pub async fn get_metrics(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let body = state.metrics.render()?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
