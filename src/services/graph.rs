// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::{EdgeKind, Page, ToggleAction};
use crate::store::{SocialStore, StoreError};

use super::{assemble_posts, assemble_users, missing_as, PostList, UserList};

/// State of a user -> post edge after a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EdgeState {
    pub active: bool,
}

/// Outcome of a follow toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FollowState {
    pub ok: bool,
    pub following: bool,
}

/// Like/Save edges and the directed follow graph.
///
/// Toggles are idempotent: adding an existing edge and removing a missing
/// one both succeed. The storage-level uniqueness of each pair is the only
/// serialization point, so concurrent duplicate adds never surface a
/// conflict.
#[derive(Clone)]
pub struct GraphService {
    store: Arc<dyn SocialStore>,
}

impl GraphService {
    pub fn new(store: Arc<dyn SocialStore>) -> Self {
        Self { store }
    }

    pub async fn toggle_edge(&self, kind: EdgeKind, user_id: i32, post_id: i32, action: ToggleAction) -> AppResult<EdgeState> {
        match action {
            ToggleAction::Add => {
                let created = self
                    .store
                    .insert_reaction(kind, user_id, post_id, Utc::now())
                    .await
                    .map_err(|e| missing_as(e, "post"))?;
                debug!("{} {} -> {} (new edge: {})", kind, user_id, post_id, created);
                Ok(EdgeState { active: true })
            }
            ToggleAction::Remove => {
                let removed = self.store.delete_reaction(kind, user_id, post_id).await?;
                debug!("un{} {} -> {} (edge removed: {})", kind, user_id, post_id, removed);
                Ok(EdgeState { active: false })
            }
        }
    }

    pub async fn has_edge(&self, kind: EdgeKind, user_id: i32, post_id: i32) -> AppResult<bool> {
        let found = self.store.reacted_posts(kind, user_id, &[post_id]).await?;
        Ok(found.contains(&post_id))
    }

    /// Follow `followee_id`; following yourself or a missing user fails
    pub async fn follow(&self, follower_id: i32, followee_id: i32) -> AppResult<FollowState> {
        if follower_id == followee_id {
            return Err(AppError::validation("you cannot follow yourself"));
        }
        match self.store.insert_follow(follower_id, followee_id, Utc::now()).await {
            Ok(created) => {
                if created {
                    info!("User {} followed {}", follower_id, followee_id);
                }
                Ok(FollowState { ok: true, following: true })
            }
            Err(StoreError::CheckViolation { .. }) => Err(AppError::validation("you cannot follow yourself")),
            Err(err) => Err(missing_as(err, "user")),
        }
    }

    pub async fn unfollow(&self, follower_id: i32, followee_id: i32) -> AppResult<FollowState> {
        if self.store.delete_follow(follower_id, followee_id).await? {
            info!("User {} unfollowed {}", follower_id, followee_id);
        }
        Ok(FollowState { ok: true, following: false })
    }

    pub async fn toggle_follow(&self, follower_id: i32, followee_id: i32, action: ToggleAction) -> AppResult<FollowState> {
        match action {
            ToggleAction::Add => self.follow(follower_id, followee_id).await,
            ToggleAction::Remove => self.unfollow(follower_id, followee_id).await,
        }
    }

    pub async fn is_following(&self, follower_id: i32, followee_id: i32) -> AppResult<bool> {
        let found = self.store.followed_among(follower_id, &[followee_id]).await?;
        Ok(found.contains(&followee_id))
    }

    /// Users following `user_id`, most recent follow first
    pub async fn followers(&self, user_id: i32, page: Page, viewer: Option<i32>) -> AppResult<UserList> {
        self.ensure_user(user_id).await?;
        let (users, total) = self.store.list_followers(user_id, page).await?;
        let users = assemble_users(&self.store, users, viewer).await?;
        Ok(UserList { users, total })
    }

    /// Users `user_id` follows, most recent follow first
    pub async fn following(&self, user_id: i32, page: Page, viewer: Option<i32>) -> AppResult<UserList> {
        self.ensure_user(user_id).await?;
        let (users, total) = self.store.list_following(user_id, page).await?;
        let users = assemble_users(&self.store, users, viewer).await?;
        Ok(UserList { users, total })
    }

    /// The caller's saved posts, most recently saved first
    pub async fn saved_posts(&self, user_id: i32, page: Page) -> AppResult<PostList> {
        let (posts, total) = self.store.reacted_post_list(EdgeKind::Save, user_id, page).await?;
        let posts = assemble_posts(&self.store, posts, Some(user_id)).await?;
        Ok(PostList { posts, total })
    }

    async fn ensure_user(&self, user_id: i32) -> AppResult<()> {
        match self.store.find_user(user_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound("user")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::content::ContentService;
    use crate::services::testing::{memory_store, publish, signup};
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn like_add_twice_is_idempotent() {
        let (_, store) = memory_store();
        let a = signup(&store, "Ana").await;
        let post = publish(&store, a, "Title").await;
        let graph = GraphService::new(store.clone());

        let first = assert_ok!(graph.toggle_edge(EdgeKind::Like, a, post, ToggleAction::Add).await);
        let second = assert_ok!(graph.toggle_edge(EdgeKind::Like, a, post, ToggleAction::Add).await);
        assert_eq!(first, EdgeState { active: true });
        assert_eq!(second, EdgeState { active: true });

        let view = ContentService::new(store).get_post(post, None).await.unwrap();
        assert_eq!(view.likes_count, 1);
    }

    #[tokio::test]
    async fn remove_missing_edge_succeeds() {
        let (_, store) = memory_store();
        let a = signup(&store, "Ana").await;
        let post = publish(&store, a, "Title").await;
        let graph = GraphService::new(store);

        let state = assert_ok!(graph.toggle_edge(EdgeKind::Save, a, post, ToggleAction::Remove).await);
        assert!(!state.active);
        let state = assert_ok!(graph.toggle_edge(EdgeKind::Save, a, 4242, ToggleAction::Remove).await);
        assert!(!state.active);
    }

    #[tokio::test]
    async fn like_and_save_are_independent() {
        let (_, store) = memory_store();
        let a = signup(&store, "Ana").await;
        let post = publish(&store, a, "Title").await;
        let graph = GraphService::new(store);

        graph.toggle_edge(EdgeKind::Save, a, post, ToggleAction::Add).await.unwrap();
        assert!(graph.has_edge(EdgeKind::Save, a, post).await.unwrap());
        assert!(!graph.has_edge(EdgeKind::Like, a, post).await.unwrap());
    }

    #[tokio::test]
    async fn liking_a_missing_post_is_not_found() {
        let (_, store) = memory_store();
        let a = signup(&store, "Ana").await;
        let graph = GraphService::new(store);
        let err = assert_err!(graph.toggle_edge(EdgeKind::Like, a, 77, ToggleAction::Add).await);
        assert!(matches!(err, AppError::NotFound("post")));
    }

    #[tokio::test]
    async fn concurrent_duplicate_adds_both_succeed() {
        let (_, store) = memory_store();
        let a = signup(&store, "Ana").await;
        let post = publish(&store, a, "Title").await;
        let graph = GraphService::new(store.clone());

        let (left, right) = tokio::join!(
            graph.toggle_edge(EdgeKind::Like, a, post, ToggleAction::Add),
            graph.toggle_edge(EdgeKind::Like, a, post, ToggleAction::Add),
        );
        assert_ok!(left);
        assert_ok!(right);
        assert_eq!(store.post_counts(&[post]).await.unwrap()[&post].likes, 1);
    }

    #[tokio::test]
    async fn follow_scenario() {
        let (_, store) = memory_store();
        let a = signup(&store, "Ana").await;
        let b = signup(&store, "Ben").await;
        let graph = GraphService::new(store);

        assert_eq!(graph.follow(a, b).await.unwrap(), FollowState { ok: true, following: true });
        assert_eq!(graph.follow(a, b).await.unwrap(), FollowState { ok: true, following: true });
        assert!(graph.is_following(a, b).await.unwrap());
        assert!(!graph.is_following(b, a).await.unwrap());

        let err = assert_err!(graph.follow(a, a).await);
        assert!(matches!(err, AppError::Validation(_)));
        assert!(!graph.is_following(a, a).await.unwrap());

        graph.unfollow(a, b).await.unwrap();
        graph.unfollow(a, b).await.unwrap();
        assert!(!graph.is_following(a, b).await.unwrap());
    }

    #[tokio::test]
    async fn following_a_missing_user_is_not_found() {
        let (_, store) = memory_store();
        let a = signup(&store, "Ana").await;
        let graph = GraphService::new(store);
        let err = assert_err!(graph.follow(a, 999).await);
        assert!(matches!(err, AppError::NotFound("user")));
    }

    #[tokio::test]
    async fn follower_listings_carry_totals_and_viewer_state() {
        let (_, store) = memory_store();
        let a = signup(&store, "Ana").await;
        let b = signup(&store, "Ben").await;
        let c = signup(&store, "Cai").await;
        let graph = GraphService::new(store);

        graph.follow(b, a).await.unwrap();
        graph.follow(c, a).await.unwrap();
        graph.follow(a, b).await.unwrap();

        let followers = graph.followers(a, Page::default(), Some(a)).await.unwrap();
        assert_eq!(followers.total, 2);
        let ben = followers.users.iter().find(|u| u.id == b).unwrap();
        assert_eq!(ben.is_following, Some(true));
        let cai = followers.users.iter().find(|u| u.id == c).unwrap();
        assert_eq!(cai.is_following, Some(false));

        let following = graph.following(a, Page::default(), None).await.unwrap();
        assert_eq!(following.total, 1);
        assert_eq!(following.users[0].followers_count, 1);

        assert!(matches!(graph.followers(999, Page::default(), None).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn saved_posts_list_newest_save_first() {
        let (_, store) = memory_store();
        let a = signup(&store, "Ana").await;
        let first = publish(&store, a, "first").await;
        let second = publish(&store, a, "second").await;
        let graph = GraphService::new(store);

        graph.toggle_edge(EdgeKind::Save, a, second, ToggleAction::Add).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        graph.toggle_edge(EdgeKind::Save, a, first, ToggleAction::Add).await.unwrap();

        let saved = graph.saved_posts(a, Page::default()).await.unwrap();
        assert_eq!(saved.total, 2);
        assert_eq!(saved.posts.iter().map(|p| p.id).collect::<Vec<_>>(), vec![first, second]);
        assert!(saved.posts.iter().all(|p| p.is_saved == Some(true)));
    }
}
