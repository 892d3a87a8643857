// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};

use crate::error::AppError;
use crate::models::{Page, PostFilter, ToggleAction, UserSort};
use crate::services::search::SearchScope;
use crate::store::UserQuery;

/// JSON body whose rejections render as `400 {error}`
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(AppError::validation(rejection.body_text())),
        }
    }
}

/// Query string whose rejections render as `400 {error}`
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(AppError::validation(rejection.body_text())),
        }
    }
}

/// Path parameters whose rejections render as `400 {error}`
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(ApiPath(value)),
            Err(rejection) => Err(AppError::validation(rejection.body_text())),
        }
    }
}

/// Pagination parameters
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PaginationParams {
    pub fn page(&self) -> Page {
        Page::new(self.limit, self.offset)
    }
}

/// `GET /posts` filters
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub genre: Option<String>,
    pub author_id: Option<i32>,
    pub mood: Option<String>,
    pub has_audio: Option<bool>,
}

impl PostsQuery {
    pub fn filter(&self) -> PostFilter {
        PostFilter {
            genre: self.genre.clone().filter(|g| !g.trim().is_empty()),
            author_id: self.author_id,
            mood: self.mood.clone().filter(|m| !m.trim().is_empty()),
            has_audio: self.has_audio,
        }
    }

    pub fn page(&self) -> Page {
        Page::new(self.limit, self.offset)
    }
}

/// `GET /users` filters
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub name_starts_with: Option<String>,
    #[serde(default)]
    pub sort: UserSort,
}

impl UsersQuery {
    pub fn into_query(self) -> UserQuery {
        UserQuery {
            page: Page::new(self.limit, self.offset),
            name_starts_with: self.name_starts_with,
            sort: self.sort,
        }
    }
}

/// Limit-only query used by the ranked endpoints
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    #[serde(rename = "type", default)]
    pub scope: SearchScope,
    pub limit: Option<i64>,
}

/// Body of the like/save/follow toggles
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToggleRequest {
    pub action: ToggleAction,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentRequest {
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posts_query_drops_blank_filters() {
        let query = PostsQuery {
            genre: Some("  ".to_string()),
            has_audio: Some(true),
            limit: Some(500),
            ..Default::default()
        };
        assert_eq!(
            query.filter(),
            PostFilter {
                has_audio: Some(true),
                ..Default::default()
            }
        );
        assert_eq!(query.page().limit, 200);
    }
}
