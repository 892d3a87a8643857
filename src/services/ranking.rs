// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::AppResult;
use crate::models::{CommunityStats, Page, PostView, UserSort, UserView};
use crate::store::{SocialStore, UserQuery};

use super::{assemble_posts, assemble_users, UserList};

pub const TOP_POSTS_LIMIT: i64 = 5;
pub const TOP_USERS_LIMIT: i64 = 8;

/// Window counted by `newThisWeek`
const RECENT_WINDOW_DAYS: i64 = 7;

/// Ordered result sets with derived counts.
///
/// Every ranking ends with `created_at DESC, id DESC` so that equal scores
/// come back in the same order on repeated calls.
#[derive(Clone)]
pub struct RankingService {
    store: Arc<dyn SocialStore>,
}

impl RankingService {
    pub fn new(store: Arc<dyn SocialStore>) -> Self {
        Self { store }
    }

    /// Most-liked posts
    pub async fn top_posts(&self, limit: Option<i64>, viewer: Option<i32>) -> AppResult<Vec<PostView>> {
        let limit = Page::first(limit.unwrap_or(TOP_POSTS_LIMIT)).limit;
        let posts = self.store.top_posts(limit).await?;
        debug!("Ranked {} top posts", posts.len());
        assemble_posts(&self.store, posts, viewer).await
    }

    /// Most-followed users
    pub async fn top_users(&self, limit: Option<i64>, viewer: Option<i32>) -> AppResult<Vec<UserView>> {
        let query = UserQuery {
            name_starts_with: None,
            sort: UserSort::Popularity,
            page: Page::first(limit.unwrap_or(TOP_USERS_LIMIT)),
        };
        let (users, _) = self.store.list_users(&query).await?;
        assemble_users(&self.store, users, viewer).await
    }

    /// The user directory, filtered by name prefix and sorted
    pub async fn list_users(&self, mut query: UserQuery, viewer: Option<i32>) -> AppResult<UserList> {
        query.name_starts_with = query
            .name_starts_with
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        let (users, total) = self.store.list_users(&query).await?;
        let users = assemble_users(&self.store, users, viewer).await?;
        Ok(UserList { users, total })
    }

    pub async fn community_stats(&self) -> AppResult<CommunityStats> {
        self.community_stats_at(Utc::now()).await
    }

    /// Stats with the recent-posts window ending at `now`
    pub async fn community_stats_at(&self, now: DateTime<Utc>) -> AppResult<CommunityStats> {
        let since = now - Duration::days(RECENT_WINDOW_DAYS);
        Ok(self.store.community_stats(since).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EdgeKind, ToggleAction};
    use crate::services::graph::GraphService;
    use crate::services::testing::{memory_store, publish, signup};

    #[test_log::test(tokio::test)]
    async fn top_posts_orders_by_likes_and_is_stable() {
        let (_, store) = memory_store();
        let a = signup(&store, "Ana").await;
        let b = signup(&store, "Ben").await;
        let quiet = publish(&store, a, "quiet").await;
        let loved = publish(&store, a, "loved").await;
        let liked_once = publish(&store, b, "liked once").await;
        let newest = publish(&store, b, "newest").await;

        let graph = GraphService::new(store.clone());
        for user in [a, b] {
            graph.toggle_edge(EdgeKind::Like, user, loved, ToggleAction::Add).await.unwrap();
        }
        graph.toggle_edge(EdgeKind::Like, a, liked_once, ToggleAction::Add).await.unwrap();

        let ranking = RankingService::new(store);
        let first = ranking.top_posts(None, None).await.unwrap();
        let second = ranking.top_posts(None, None).await.unwrap();
        assert_eq!(first, second);

        let ids: Vec<i32> = first.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![loved, liked_once, newest, quiet]);
        assert_eq!(first[0].likes_count, 2);
    }

    #[tokio::test]
    async fn top_posts_respects_limit() {
        let (_, store) = memory_store();
        let a = signup(&store, "Ana").await;
        for n in 0..7 {
            publish(&store, a, &format!("poem {}", n)).await;
        }
        let ranking = RankingService::new(store);
        assert_eq!(ranking.top_posts(None, None).await.unwrap().len(), 5);
        assert_eq!(ranking.top_posts(Some(2), None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn top_users_by_followers() {
        let (_, store) = memory_store();
        let a = signup(&store, "Ana").await;
        let b = signup(&store, "Ben").await;
        let c = signup(&store, "Cai").await;
        let graph = GraphService::new(store.clone());
        graph.follow(a, c).await.unwrap();
        graph.follow(b, c).await.unwrap();
        graph.follow(c, a).await.unwrap();

        let top = RankingService::new(store).top_users(None, Some(a)).await.unwrap();
        let ids: Vec<i32> = top.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![c, a, b]);
        assert_eq!(top[0].followers_count, 2);
        assert_eq!(top[0].is_following, Some(true));
    }

    #[tokio::test]
    async fn list_users_by_name_prefix() {
        let (_, store) = memory_store();
        signup(&store, "anwar").await;
        signup(&store, "Amelia").await;
        signup(&store, "Ben").await;
        let ranking = RankingService::new(store);

        let query = UserQuery {
            name_starts_with: Some("a".to_string()),
            sort: UserSort::Name,
            page: Page::default(),
        };
        let listed = ranking.list_users(query, None).await.unwrap();
        assert_eq!(listed.total, 2);
        let names: Vec<&str> = listed.users.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Amelia", "anwar"]);

        let everyone = ranking.list_users(UserQuery::default(), None).await.unwrap();
        assert_eq!(everyone.total, 3);
    }

    #[tokio::test]
    async fn community_stats_counts_recent_window() {
        let (concrete, store) = memory_store();
        let a = signup(&store, "Ana").await;
        let _idle = signup(&store, "Ben").await;
        let old = publish(&store, a, "old").await;
        publish(&store, a, "fresh").await;
        concrete.set_post_created_at(old, Utc::now() - Duration::days(8)).await;

        let stats = RankingService::new(store).community_stats().await.unwrap();
        assert_eq!(
            stats,
            CommunityStats {
                total_poems: 2,
                active_poets: 1,
                new_this_week: 1,
            }
        );
    }
}
