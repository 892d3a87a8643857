// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AppResult;
use crate::models::{Page, PostView, UserView};
use crate::store::{SocialStore, TextSearch};

use super::{assemble_posts, assemble_users};

pub const DEFAULT_SEARCH_LIMIT: i64 = 50;

/// Which collections a search covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    #[default]
    All,
    Posts,
    Users,
}

impl SearchScope {
    fn posts(self) -> bool {
        matches!(self, SearchScope::All | SearchScope::Posts)
    }

    fn users(self) -> bool {
        matches!(self, SearchScope::All | SearchScope::Users)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResults {
    pub posts: Vec<PostView>,
    pub users: Vec<UserView>,
}

/// Substring search over post title/content/genre and user name/username.
/// A blank query lists the newest entries instead of matching nothing.
#[derive(Clone)]
pub struct SearchService {
    store: Arc<dyn SocialStore>,
    case_sensitive: bool,
}

impl SearchService {
    pub fn new(store: Arc<dyn SocialStore>, case_sensitive: bool) -> Self {
        Self { store, case_sensitive }
    }

    pub async fn search(
        &self,
        query: Option<&str>,
        scope: SearchScope,
        limit: Option<i64>,
        viewer: Option<i32>,
    ) -> AppResult<SearchResults> {
        let search = TextSearch {
            needle: query.map(str::trim).filter(|q| !q.is_empty()).map(str::to_string),
            case_sensitive: self.case_sensitive,
            limit: Page::first(limit.unwrap_or(DEFAULT_SEARCH_LIMIT)).limit,
        };
        debug!("Searching {:?} for {:?}", scope, search.needle);

        let mut results = SearchResults::default();
        if scope.posts() {
            let posts = self.store.search_posts(&search).await?;
            results.posts = assemble_posts(&self.store, posts, viewer).await?;
        }
        if scope.users() {
            let users = self.store.search_users(&search).await?;
            results.users = assemble_users(&self.store, users, viewer).await?;
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::content::ContentService;
    use crate::services::testing::{draft, memory_store, signup};

    async fn seeded(case_sensitive: bool) -> SearchService {
        let (_, store) = memory_store();
        let a = signup(&store, "Rumi").await;
        signup(&store, "Ben").await;
        let content = ContentService::new(store.clone());
        content.create_post(a, draft("Moonlight", "Ghazal")).await.unwrap();
        content.create_post(a, draft("Harbour", "Sonnet")).await.unwrap();
        SearchService::new(store, case_sensitive)
    }

    #[tokio::test]
    async fn matches_titles_genres_and_names() {
        let search = seeded(false).await;

        let found = search.search(Some("moon"), SearchScope::All, None, None).await.unwrap();
        assert_eq!(found.posts.len(), 1);
        assert_eq!(found.posts[0].title, "Moonlight");
        assert!(found.users.is_empty());

        let found = search.search(Some("sonnet"), SearchScope::Posts, None, None).await.unwrap();
        assert_eq!(found.posts[0].title, "Harbour");

        let found = search.search(Some("RUM"), SearchScope::Users, None, None).await.unwrap();
        assert_eq!(found.users.len(), 1);
        assert!(found.posts.is_empty());
    }

    #[tokio::test]
    async fn case_sensitivity_is_configurable() {
        let search = seeded(true).await;
        let found = search.search(Some("moon"), SearchScope::Posts, None, None).await.unwrap();
        assert!(found.posts.is_empty());
        let found = search.search(Some("Moon"), SearchScope::Posts, None, None).await.unwrap();
        assert_eq!(found.posts.len(), 1);
    }

    #[tokio::test]
    async fn blank_query_lists_everything_up_to_limit() {
        let search = seeded(false).await;
        let found = search.search(Some("   "), SearchScope::All, None, None).await.unwrap();
        assert_eq!(found.posts.len(), 2);
        assert_eq!(found.users.len(), 2);
        assert_eq!(found.posts[0].title, "Harbour");

        let found = search.search(None, SearchScope::Posts, Some(1), None).await.unwrap();
        assert_eq!(found.posts.len(), 1);
    }
}
