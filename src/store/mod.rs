// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

//! Persistence seam for users, posts, comments and the social graph.
//!
//! Services hold an `Arc<dyn SocialStore>` and never reach a datastore any
//! other way. Implementations enforce the pair-uniqueness of edges, cascade
//! post deletion onto reactions and comments, and evaluate ownership inside
//! the same atomic unit as the mutation it guards.

pub mod memory;
pub mod postgres;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    Comment, CommunityStats, EdgeKind, NewComment, NewPost, NewUser, Page, Post, PostCounts,
    PostFilter, UpdatePost, UpdateUser, User, UserCounts, UserSort,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Constraint names shared by every backend
pub const USERS_EMAIL_KEY: &str = "users_email_key";
pub const USERS_USERNAME_KEY: &str = "users_username_key";
pub const FOLLOWS_NO_SELF_FOLLOW: &str = "follows_no_self_follow";

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// The write referenced a row that does not exist
    #[error("referenced row does not exist: {constraint}")]
    MissingReference { constraint: String },

    /// A check constraint rejected the write
    #[error("check constraint violated: {constraint}")]
    CheckViolation { constraint: String },

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("database error: {0}")]
    Database(#[source] diesel::result::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of an owner-guarded mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ownership<T> {
    Applied(T),
    NotOwner,
    Missing,
}

/// Listing query for the user directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserQuery {
    pub name_starts_with: Option<String>,
    pub sort: UserSort,
    pub page: Page,
}

/// Substring search over text columns; `needle == None` means unfiltered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSearch {
    pub needle: Option<String>,
    pub case_sensitive: bool,
    pub limit: i64,
}

impl TextSearch {
    /// Whether `haystack` contains the needle under this search's case rule
    pub fn matches(&self, haystack: &str) -> bool {
        match &self.needle {
            None => true,
            Some(needle) if self.case_sensitive => haystack.contains(needle.as_str()),
            Some(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
        }
    }
}

#[async_trait]
pub trait SocialStore: Send + Sync {
    /// Check the backend is reachable
    async fn ping(&self) -> StoreResult<()>;

    // Users

    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: i32) -> StoreResult<Option<User>>;
    async fn find_users(&self, ids: &[i32]) -> StoreResult<Vec<User>>;
    async fn update_user(&self, id: i32, changes: UpdateUser) -> StoreResult<Option<User>>;
    async fn user_counts(&self, ids: &[i32]) -> StoreResult<HashMap<i32, UserCounts>>;
    /// Page of users plus the total matching the filter
    async fn list_users(&self, query: &UserQuery) -> StoreResult<(Vec<User>, i64)>;
    async fn search_users(&self, search: &TextSearch) -> StoreResult<Vec<User>>;

    // Sessions

    /// Create a user and their first session together; neither row exists on failure
    async fn insert_user_with_session(&self, user: NewUser, token: &str) -> StoreResult<User>;
    async fn session_user(&self, token: &str) -> StoreResult<Option<i32>>;

    // Posts

    async fn insert_post(&self, post: NewPost) -> StoreResult<Post>;
    async fn find_post(&self, id: i32) -> StoreResult<Option<Post>>;
    /// Newest first, ties on `created_at` broken by id descending
    async fn list_posts(&self, filter: &PostFilter, page: Page) -> StoreResult<Vec<Post>>;
    async fn update_post(&self, id: i32, requester: i32, changes: UpdatePost) -> StoreResult<Ownership<Post>>;
    /// Delete a post together with its reactions and comments
    async fn delete_post(&self, id: i32, requester: i32) -> StoreResult<Ownership<()>>;
    /// Posts by like count descending, then `created_at` descending, then id descending
    async fn top_posts(&self, limit: i64) -> StoreResult<Vec<Post>>;
    async fn search_posts(&self, search: &TextSearch) -> StoreResult<Vec<Post>>;
    async fn post_counts(&self, ids: &[i32]) -> StoreResult<HashMap<i32, PostCounts>>;

    // Reactions (Like / Save)

    /// Returns whether a new edge was written; an existing edge is not an error
    async fn insert_reaction(&self, kind: EdgeKind, user_id: i32, post_id: i32, at: DateTime<Utc>) -> StoreResult<bool>;
    /// Returns whether an edge was removed
    async fn delete_reaction(&self, kind: EdgeKind, user_id: i32, post_id: i32) -> StoreResult<bool>;
    /// Subset of `post_ids` carrying a `kind` edge from `user_id`
    async fn reacted_posts(&self, kind: EdgeKind, user_id: i32, post_ids: &[i32]) -> StoreResult<HashSet<i32>>;
    /// Posts carrying a `kind` edge from `user_id`, most recent edge first
    async fn reacted_post_list(&self, kind: EdgeKind, user_id: i32, page: Page) -> StoreResult<(Vec<Post>, i64)>;

    // Comments

    async fn insert_comment(&self, comment: NewComment) -> StoreResult<Comment>;
    /// Oldest first
    async fn list_comments(&self, post_id: i32) -> StoreResult<Vec<Comment>>;

    // Follows

    async fn insert_follow(&self, follower_id: i32, followee_id: i32, at: DateTime<Utc>) -> StoreResult<bool>;
    async fn delete_follow(&self, follower_id: i32, followee_id: i32) -> StoreResult<bool>;
    /// Subset of `candidates` followed by `follower_id`
    async fn followed_among(&self, follower_id: i32, candidates: &[i32]) -> StoreResult<HashSet<i32>>;
    async fn list_followers(&self, user_id: i32, page: Page) -> StoreResult<(Vec<User>, i64)>;
    async fn list_following(&self, user_id: i32, page: Page) -> StoreResult<(Vec<User>, i64)>;

    // Aggregates

    async fn community_stats(&self, since: DateTime<Utc>) -> StoreResult<CommunityStats>;
}
