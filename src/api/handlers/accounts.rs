// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::api::{ApiJson, AppState};
use crate::error::AppResult;
use crate::services::accounts::SignupForm;

/// Register and receive a session token
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(form): ApiJson<SignupForm>,
) -> AppResult<impl IntoResponse> {
    let account = state.accounts.signup(form).await?;
    Ok((StatusCode::CREATED, Json(account)))
}
