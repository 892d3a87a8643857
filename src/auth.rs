// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

//! Request identity. Handlers never look at credentials themselves; they ask
//! for a [`Viewer`] or an [`AuthUser`] and receive a resolved user id.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::debug;

use crate::error::AppError;
use crate::store::SocialStore;

/// Maps a bearer credential to a user id
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Option<i32>>;
}

/// Resolves session tokens issued at signup
pub struct SessionResolver {
    store: Arc<dyn SocialStore>,
}

impl SessionResolver {
    pub fn new(store: Arc<dyn SocialStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl IdentityResolver for SessionResolver {
    async fn resolve(&self, token: &str) -> Result<Option<i32>> {
        Ok(self.store.session_user(token).await?)
    }
}

/// Extract the token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

async fn identify<S>(parts: &Parts, state: &S) -> Result<Option<i32>, AppError>
where
    Arc<dyn IdentityResolver>: FromRef<S>,
{
    let Some(token) = bearer_token(&parts.headers) else {
        return Ok(None);
    };
    let resolver = <Arc<dyn IdentityResolver> as FromRef<S>>::from_ref(state);
    let user = resolver.resolve(token).await?;
    if user.is_none() {
        debug!("Ignoring unknown session token");
    }
    Ok(user)
}

/// Optional identity; a missing or unknown token means anonymous
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer(pub Option<i32>);

#[async_trait]
impl<S> FromRequestParts<S> for Viewer
where
    Arc<dyn IdentityResolver>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Viewer(identify(parts, state).await?))
    }
}

/// Required identity; rejects with 401 before the handler runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub i32);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    Arc<dyn IdentityResolver>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        identify(parts, state)
            .await?
            .map(AuthUser)
            .ok_or(AppError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        map
    }

    #[test]
    fn parses_bearer_scheme_case_insensitively() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("bearer   abc ")), Some("abc"));
    }

    #[test]
    fn rejects_other_schemes_and_empty_tokens() {
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
