// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::{
    Comment, CommunityStats, EdgeKind, NewComment, NewPost, NewUser, Page, Post, PostCounts,
    PostFilter, UpdatePost, UpdateUser, User, UserCounts, UserSort,
};

use super::{
    Ownership, SocialStore, StoreError, StoreResult, TextSearch, UserQuery, FOLLOWS_NO_SELF_FOLLOW,
    USERS_EMAIL_KEY, USERS_USERNAME_KEY,
};

#[derive(Default)]
struct State {
    next_user_id: i32,
    next_post_id: i32,
    next_comment_id: i32,
    users: BTreeMap<i32, User>,
    sessions: HashMap<String, i32>,
    posts: BTreeMap<i32, Post>,
    comments: BTreeMap<i32, Comment>,
    reactions: BTreeMap<(EdgeKind, i32, i32), DateTime<Utc>>,
    follows: BTreeMap<(i32, i32), DateTime<Utc>>,
}

impl State {
    fn next_id(counter: &mut i32) -> i32 {
        *counter += 1;
        *counter
    }

    fn unique_violation(&self, email: Option<&str>, username: Option<&str>, except: Option<i32>) -> Option<StoreError> {
        let others = self.users.values().filter(|u| Some(u.id) != except);
        for user in others {
            if email == Some(user.email.as_str()) {
                return Some(StoreError::UniqueViolation {
                    constraint: USERS_EMAIL_KEY.to_string(),
                });
            }
            if username == Some(user.username.as_str()) {
                return Some(StoreError::UniqueViolation {
                    constraint: USERS_USERNAME_KEY.to_string(),
                });
            }
        }
        None
    }

    fn insert_user(&mut self, user: NewUser) -> StoreResult<User> {
        if let Some(err) = self.unique_violation(Some(&user.email), Some(&user.username), None) {
            return Err(err);
        }
        let id = Self::next_id(&mut self.next_user_id);
        let created = User {
            id,
            email: user.email,
            username: user.username,
            name: user.name,
            avatar_url: user.avatar_url,
            bio: user.bio,
            created_at: user.created_at,
            updated_at: user.updated_at,
        };
        self.users.insert(id, created.clone());
        Ok(created)
    }

    fn likes_of(&self, post_id: i32) -> usize {
        self.reactions
            .keys()
            .filter(|(kind, _, post)| *kind == EdgeKind::Like && *post == post_id)
            .count()
    }

    fn followers_of(&self, user_id: i32) -> usize {
        self.follows.keys().filter(|(_, followee)| *followee == user_id).count()
    }

    fn newest_first(posts: &mut [Post]) {
        posts.sort_by_key(|p| Reverse((p.created_at, p.id)));
    }
}

fn paginate<T>(items: Vec<T>, page: Page) -> Vec<T> {
    items.into_iter().skip(page.offset as usize).take(page.limit as usize).collect()
}

/// In-process `SocialStore`; every operation runs under one lock, so each
/// call is atomic with respect to the others
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backdate a post, for exercising time-window aggregates
    pub async fn set_post_created_at(&self, post_id: i32, at: DateTime<Utc>) -> bool {
        let mut state = self.state.write().await;
        match state.posts.get_mut(&post_id) {
            Some(post) => {
                post.created_at = at;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl SocialStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        self.state.write().await.insert_user(user)
    }

    async fn find_user(&self, id: i32) -> StoreResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_users(&self, ids: &[i32]) -> StoreResult<Vec<User>> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.users.get(id).cloned()).collect())
    }

    async fn update_user(&self, id: i32, changes: UpdateUser) -> StoreResult<Option<User>> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&id) {
            return Ok(None);
        }
        if let Some(err) = state.unique_violation(None, changes.username.as_deref(), Some(id)) {
            return Err(err);
        }
        let user = match state.users.get_mut(&id) {
            Some(user) => user,
            None => return Ok(None),
        };
        if !changes.is_empty() {
            changes.apply(user);
            user.updated_at = Utc::now();
        }
        Ok(Some(user.clone()))
    }

    async fn user_counts(&self, ids: &[i32]) -> StoreResult<HashMap<i32, UserCounts>> {
        let state = self.state.read().await;
        let counts = ids
            .iter()
            .map(|id| {
                let counts = UserCounts {
                    followers: state.followers_of(*id) as i64,
                    following: state.follows.keys().filter(|(follower, _)| follower == id).count() as i64,
                    posts: state.posts.values().filter(|p| p.author_id == *id).count() as i64,
                };
                (*id, counts)
            })
            .collect();
        Ok(counts)
    }

    async fn list_users(&self, query: &UserQuery) -> StoreResult<(Vec<User>, i64)> {
        let state = self.state.read().await;
        let prefix = query.name_starts_with.as_ref().map(|p| p.to_lowercase());
        let mut matching: Vec<User> = state
            .users
            .values()
            .filter(|u| prefix.as_ref().map_or(true, |p| u.name.to_lowercase().starts_with(p.as_str())))
            .cloned()
            .collect();
        match query.sort {
            UserSort::Popularity => {
                matching.sort_by_key(|u| Reverse((state.followers_of(u.id), u.created_at, u.id)));
            }
            UserSort::Name => {
                matching.sort_by(|a, b| (a.name.to_lowercase(), a.id).cmp(&(b.name.to_lowercase(), b.id)));
            }
        }
        let total = matching.len() as i64;
        Ok((paginate(matching, query.page), total))
    }

    async fn search_users(&self, search: &TextSearch) -> StoreResult<Vec<User>> {
        let state = self.state.read().await;
        let mut found: Vec<User> = state
            .users
            .values()
            .filter(|u| search.matches(&u.name) || search.matches(&u.username))
            .cloned()
            .collect();
        found.sort_by_key(|u| Reverse((u.created_at, u.id)));
        found.truncate(search.limit as usize);
        Ok(found)
    }

    async fn insert_user_with_session(&self, user: NewUser, token: &str) -> StoreResult<User> {
        let mut state = self.state.write().await;
        // Every check runs before the first write
        if state.sessions.contains_key(token) {
            return Err(StoreError::UniqueViolation {
                constraint: "sessions_pkey".to_string(),
            });
        }
        let created = state.insert_user(user)?;
        state.sessions.insert(token.to_string(), created.id);
        Ok(created)
    }

    async fn session_user(&self, token: &str) -> StoreResult<Option<i32>> {
        Ok(self.state.read().await.sessions.get(token).copied())
    }

    async fn insert_post(&self, post: NewPost) -> StoreResult<Post> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&post.author_id) {
            return Err(StoreError::MissingReference {
                constraint: "posts_author_id_fkey".to_string(),
            });
        }
        let id = State::next_id(&mut state.next_post_id);
        let created = Post {
            id,
            author_id: post.author_id,
            title: post.title,
            content: post.content,
            genre: post.genre,
            mood: post.mood,
            audio_url: post.audio_url,
            created_at: post.created_at,
            updated_at: post.updated_at,
        };
        state.posts.insert(id, created.clone());
        Ok(created)
    }

    async fn find_post(&self, id: i32) -> StoreResult<Option<Post>> {
        Ok(self.state.read().await.posts.get(&id).cloned())
    }

    async fn list_posts(&self, filter: &PostFilter, page: Page) -> StoreResult<Vec<Post>> {
        let state = self.state.read().await;
        let mut found: Vec<Post> = state.posts.values().filter(|p| filter.matches(p)).cloned().collect();
        State::newest_first(&mut found);
        Ok(paginate(found, page))
    }

    async fn update_post(&self, id: i32, requester: i32, changes: UpdatePost) -> StoreResult<Ownership<Post>> {
        let mut state = self.state.write().await;
        let post = match state.posts.get_mut(&id) {
            None => return Ok(Ownership::Missing),
            Some(post) if post.author_id != requester => return Ok(Ownership::NotOwner),
            Some(post) => post,
        };
        if !changes.is_empty() {
            changes.apply(post);
            post.updated_at = Utc::now();
        }
        Ok(Ownership::Applied(post.clone()))
    }

    async fn delete_post(&self, id: i32, requester: i32) -> StoreResult<Ownership<()>> {
        let mut state = self.state.write().await;
        match state.posts.get(&id) {
            None => return Ok(Ownership::Missing),
            Some(post) if post.author_id != requester => return Ok(Ownership::NotOwner),
            Some(_) => {}
        }
        state.posts.remove(&id);
        state.reactions.retain(|(_, _, post_id), _| *post_id != id);
        state.comments.retain(|_, c| c.post_id != id);
        debug!("Deleted post {} and its dependent rows", id);
        Ok(Ownership::Applied(()))
    }

    async fn top_posts(&self, limit: i64) -> StoreResult<Vec<Post>> {
        let state = self.state.read().await;
        let mut ranked: Vec<Post> = state.posts.values().cloned().collect();
        ranked.sort_by_key(|p| Reverse((state.likes_of(p.id), p.created_at, p.id)));
        ranked.truncate(limit.max(0) as usize);
        Ok(ranked)
    }

    async fn search_posts(&self, search: &TextSearch) -> StoreResult<Vec<Post>> {
        let state = self.state.read().await;
        let mut found: Vec<Post> = state
            .posts
            .values()
            .filter(|p| search.matches(&p.title) || search.matches(&p.content) || search.matches(&p.genre))
            .cloned()
            .collect();
        State::newest_first(&mut found);
        found.truncate(search.limit as usize);
        Ok(found)
    }

    async fn post_counts(&self, ids: &[i32]) -> StoreResult<HashMap<i32, PostCounts>> {
        let state = self.state.read().await;
        let mut counts: HashMap<i32, PostCounts> = ids.iter().map(|id| (*id, PostCounts::default())).collect();
        for (kind, _, post_id) in state.reactions.keys() {
            if let Some(entry) = counts.get_mut(post_id) {
                match kind {
                    EdgeKind::Like => entry.likes += 1,
                    EdgeKind::Save => entry.saves += 1,
                }
            }
        }
        for comment in state.comments.values() {
            if let Some(entry) = counts.get_mut(&comment.post_id) {
                entry.comments += 1;
            }
        }
        Ok(counts)
    }

    async fn insert_reaction(&self, kind: EdgeKind, user_id: i32, post_id: i32, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        if !state.posts.contains_key(&post_id) {
            return Err(StoreError::MissingReference {
                constraint: "post_reactions_post_id_fkey".to_string(),
            });
        }
        if !state.users.contains_key(&user_id) {
            return Err(StoreError::MissingReference {
                constraint: "post_reactions_user_id_fkey".to_string(),
            });
        }
        let key = (kind, user_id, post_id);
        if state.reactions.contains_key(&key) {
            return Ok(false);
        }
        state.reactions.insert(key, at);
        Ok(true)
    }

    async fn delete_reaction(&self, kind: EdgeKind, user_id: i32, post_id: i32) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.reactions.remove(&(kind, user_id, post_id)).is_some())
    }

    async fn reacted_posts(&self, kind: EdgeKind, user_id: i32, post_ids: &[i32]) -> StoreResult<HashSet<i32>> {
        let state = self.state.read().await;
        Ok(post_ids
            .iter()
            .copied()
            .filter(|post_id| state.reactions.contains_key(&(kind, user_id, *post_id)))
            .collect())
    }

    async fn reacted_post_list(&self, kind: EdgeKind, user_id: i32, page: Page) -> StoreResult<(Vec<Post>, i64)> {
        let state = self.state.read().await;
        let mut edges: Vec<(DateTime<Utc>, i32)> = state
            .reactions
            .iter()
            .filter(|((k, u, _), _)| *k == kind && *u == user_id)
            .map(|((_, _, post_id), at)| (*at, *post_id))
            .collect();
        edges.sort_by_key(|edge| Reverse(*edge));
        let total = edges.len() as i64;
        let found = paginate(edges, page)
            .into_iter()
            .filter_map(|(_, post_id)| state.posts.get(&post_id).cloned())
            .collect();
        Ok((found, total))
    }

    async fn insert_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let mut state = self.state.write().await;
        if !state.posts.contains_key(&comment.post_id) {
            return Err(StoreError::MissingReference {
                constraint: "comments_post_id_fkey".to_string(),
            });
        }
        if !state.users.contains_key(&comment.author_id) {
            return Err(StoreError::MissingReference {
                constraint: "comments_author_id_fkey".to_string(),
            });
        }
        let id = State::next_id(&mut state.next_comment_id);
        let created = Comment {
            id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            content: comment.content,
            created_at: comment.created_at,
        };
        state.comments.insert(id, created.clone());
        Ok(created)
    }

    async fn list_comments(&self, post_id: i32) -> StoreResult<Vec<Comment>> {
        let state = self.state.read().await;
        let mut found: Vec<Comment> = state.comments.values().filter(|c| c.post_id == post_id).cloned().collect();
        found.sort_by_key(|c| (c.created_at, c.id));
        Ok(found)
    }

    async fn insert_follow(&self, follower_id: i32, followee_id: i32, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        if follower_id == followee_id {
            return Err(StoreError::CheckViolation {
                constraint: FOLLOWS_NO_SELF_FOLLOW.to_string(),
            });
        }
        if !state.users.contains_key(&follower_id) {
            return Err(StoreError::MissingReference {
                constraint: "follows_follower_id_fkey".to_string(),
            });
        }
        if !state.users.contains_key(&followee_id) {
            return Err(StoreError::MissingReference {
                constraint: "follows_followee_id_fkey".to_string(),
            });
        }
        let key = (follower_id, followee_id);
        if state.follows.contains_key(&key) {
            return Ok(false);
        }
        state.follows.insert(key, at);
        Ok(true)
    }

    async fn delete_follow(&self, follower_id: i32, followee_id: i32) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.follows.remove(&(follower_id, followee_id)).is_some())
    }

    async fn followed_among(&self, follower_id: i32, candidates: &[i32]) -> StoreResult<HashSet<i32>> {
        let state = self.state.read().await;
        Ok(candidates
            .iter()
            .copied()
            .filter(|followee| state.follows.contains_key(&(follower_id, *followee)))
            .collect())
    }

    async fn list_followers(&self, user_id: i32, page: Page) -> StoreResult<(Vec<User>, i64)> {
        let state = self.state.read().await;
        let mut edges: Vec<(DateTime<Utc>, i32)> = state
            .follows
            .iter()
            .filter(|((_, followee), _)| *followee == user_id)
            .map(|((follower, _), at)| (*at, *follower))
            .collect();
        edges.sort_by_key(|edge| Reverse(*edge));
        let total = edges.len() as i64;
        let found = paginate(edges, page)
            .into_iter()
            .filter_map(|(_, id)| state.users.get(&id).cloned())
            .collect();
        Ok((found, total))
    }

    async fn list_following(&self, user_id: i32, page: Page) -> StoreResult<(Vec<User>, i64)> {
        let state = self.state.read().await;
        let mut edges: Vec<(DateTime<Utc>, i32)> = state
            .follows
            .iter()
            .filter(|((follower, _), _)| *follower == user_id)
            .map(|((_, followee), at)| (*at, *followee))
            .collect();
        edges.sort_by_key(|edge| Reverse(*edge));
        let total = edges.len() as i64;
        let found = paginate(edges, page)
            .into_iter()
            .filter_map(|(_, id)| state.users.get(&id).cloned())
            .collect();
        Ok((found, total))
    }

    async fn community_stats(&self, since: DateTime<Utc>) -> StoreResult<CommunityStats> {
        let state = self.state.read().await;
        let authors: HashSet<i32> = state.posts.values().map(|p| p.author_id).collect();
        Ok(CommunityStats {
            total_poems: state.posts.len() as i64,
            active_poets: authors.len() as i64,
            new_this_week: state.posts.values().filter(|p| p.created_at >= since).count() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_user(name: &str) -> NewUser {
        let now = Utc::now();
        NewUser {
            email: format!("{}@x.com", name.to_lowercase()),
            username: name.to_lowercase(),
            name: name.to_string(),
            avatar_url: None,
            bio: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn new_post(author_id: i32, title: &str) -> NewPost {
        let now = Utc::now();
        NewPost {
            author_id,
            title: title.to_string(),
            content: "Body".to_string(),
            genre: "Ghazal".to_string(),
            mood: None,
            audio_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn duplicate_email_reports_constraint() {
        let store = MemoryStore::new();
        store.insert_user(new_user("Ana")).await.unwrap();
        let mut dup = new_user("Other");
        dup.email = "ana@x.com".to_string();
        match store.insert_user(dup).await {
            Err(StoreError::UniqueViolation { constraint }) => assert_eq!(constraint, USERS_EMAIL_KEY),
            other => panic!("expected unique violation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn reaction_insert_is_at_most_once() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("Ana")).await.unwrap();
        let post = store.insert_post(new_post(user.id, "T")).await.unwrap();
        let now = Utc::now();
        assert!(store.insert_reaction(EdgeKind::Like, user.id, post.id, now).await.unwrap());
        assert!(!store.insert_reaction(EdgeKind::Like, user.id, post.id, now).await.unwrap());
        assert!(store.insert_reaction(EdgeKind::Save, user.id, post.id, now).await.unwrap());
        let counts = store.post_counts(&[post.id]).await.unwrap();
        assert_eq!(counts[&post.id], PostCounts { likes: 1, saves: 1, comments: 0 });
    }

    #[tokio::test]
    async fn delete_cascades_to_edges_and_comments() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("Ana")).await.unwrap();
        let post = store.insert_post(new_post(user.id, "T")).await.unwrap();
        let now = Utc::now();
        store.insert_reaction(EdgeKind::Like, user.id, post.id, now).await.unwrap();
        store
            .insert_comment(NewComment {
                post_id: post.id,
                author_id: user.id,
                content: "lovely".to_string(),
                created_at: now,
            })
            .await
            .unwrap();

        assert_eq!(store.delete_post(post.id, user.id).await.unwrap(), Ownership::Applied(()));
        assert!(store.list_comments(post.id).await.unwrap().is_empty());
        assert!(store.reacted_posts(EdgeKind::Like, user.id, &[post.id]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn top_posts_break_ties_by_recency() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("Ana")).await.unwrap();
        let older = store.insert_post(new_post(user.id, "older")).await.unwrap();
        let newer = store.insert_post(new_post(user.id, "newer")).await.unwrap();
        store
            .set_post_created_at(older.id, Utc::now() - Duration::hours(1))
            .await;

        let top = store.top_posts(5).await.unwrap();
        let ids: Vec<i32> = top.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);

        store.insert_reaction(EdgeKind::Like, user.id, older.id, Utc::now()).await.unwrap();
        let top = store.top_posts(5).await.unwrap();
        assert_eq!(top[0].id, older.id);
    }

    #[tokio::test]
    async fn failed_session_insert_leaves_no_user() {
        let store = MemoryStore::new();
        let ana = store.insert_user_with_session(new_user("Ana"), "tok").await.unwrap();
        assert_eq!(store.session_user("tok").await.unwrap(), Some(ana.id));

        match store.insert_user_with_session(new_user("Ben"), "tok").await {
            Err(StoreError::UniqueViolation { constraint }) => assert_eq!(constraint, "sessions_pkey"),
            other => panic!("expected unique violation, got {:?}", other),
        }
        let state = store.state.read().await;
        assert_eq!(state.users.len(), 1);
        assert!(state.users.values().all(|u| u.username != "ben"));
        assert_eq!(state.sessions.get("tok"), Some(&ana.id));
    }

    #[tokio::test]
    async fn duplicate_username_at_signup_opens_no_session() {
        let store = MemoryStore::new();
        store.insert_user_with_session(new_user("Ana"), "first").await.unwrap();
        let mut dup = new_user("Other");
        dup.username = "ana".to_string();
        assert!(store.insert_user_with_session(dup, "second").await.is_err());
        assert_eq!(store.session_user("second").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_references_name_their_constraint() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("Ana")).await.unwrap();
        let post = store.insert_post(new_post(user.id, "T")).await.unwrap();
        let now = Utc::now();

        let orphan = NewComment {
            post_id: post.id,
            author_id: user.id + 100,
            content: "hello".to_string(),
            created_at: now,
        };
        match store.insert_comment(orphan).await {
            Err(StoreError::MissingReference { constraint }) => assert_eq!(constraint, "comments_author_id_fkey"),
            other => panic!("expected missing reference, got {:?}", other),
        }
        assert!(store.list_comments(post.id).await.unwrap().is_empty());

        match store.insert_follow(user.id + 100, user.id, now).await {
            Err(StoreError::MissingReference { constraint }) => assert_eq!(constraint, "follows_follower_id_fkey"),
            other => panic!("expected missing reference, got {:?}", other),
        }
        match store.insert_follow(user.id, user.id + 100, now).await {
            Err(StoreError::MissingReference { constraint }) => assert_eq!(constraint, "follows_followee_id_fkey"),
            other => panic!("expected missing reference, got {:?}", other),
        }
    }
}
