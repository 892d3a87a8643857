// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::{count_distinct, count_star};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{BigInt, Nullable, Text};
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::{debug, error};

use crate::db::{Database, DbConnection};
use crate::models::reaction::{NewFollow, NewPostReaction};
use crate::models::{
    Comment, CommunityStats, EdgeKind, NewComment, NewPost, NewUser, Page, Post, PostCounts,
    PostFilter, UpdatePost, UpdateUser, User, UserCounts, UserSort,
};
use crate::schema::{comments, follows, post_reactions, posts, sessions, users};

use super::{Ownership, SocialStore, StoreError, StoreResult, TextSearch, UserQuery};

/// `SocialStore` backed by PostgreSQL through a pooled async diesel connection
pub struct PgStore {
    db: Arc<Database>,
}

impl PgStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn get_connection(&self) -> StoreResult<DbConnection> {
        self.db.get_connection().await.map_err(|e| {
            error!("Database connection error: {}", e);
            StoreError::Pool(e.to_string())
        })
    }
}

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        let classified = match &err {
            DieselError::DatabaseError(kind, info) => {
                let constraint = info.constraint_name().unwrap_or_default().to_string();
                match kind {
                    DatabaseErrorKind::UniqueViolation => Some(StoreError::UniqueViolation { constraint }),
                    DatabaseErrorKind::ForeignKeyViolation => Some(StoreError::MissingReference { constraint }),
                    DatabaseErrorKind::CheckViolation => Some(StoreError::CheckViolation { constraint }),
                    _ => None,
                }
            }
            _ => None,
        };
        classified.unwrap_or(StoreError::Database(err))
    }
}

#[derive(QueryableByName)]
struct CountRow {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

/// Escape LIKE metacharacters so user input only matches literally
fn like_pattern(needle: &str, prefix_only: bool) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    if prefix_only {
        format!("{}%", escaped)
    } else {
        format!("%{}%", escaped)
    }
}

fn user_order_clause(sort: UserSort) -> &'static str {
    match sort {
        UserSort::Popularity => "COALESCE(f.followers, 0) DESC, u.created_at DESC, u.id DESC",
        UserSort::Name => "LOWER(u.name) ASC, u.id ASC",
    }
}

#[async_trait]
impl SocialStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.get_connection().await?;
        diesel::sql_query("SELECT 1").execute(&mut conn).await?;
        Ok(())
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut conn = self.get_connection().await?;
        let created = diesel::insert_into(users::table)
            .values(&user)
            .returning(User::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(created)
    }

    async fn find_user(&self, id: i32) -> StoreResult<Option<User>> {
        let mut conn = self.get_connection().await?;
        let user = users::table
            .find(id)
            .select(User::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(user)
    }

    async fn find_users(&self, ids: &[i32]) -> StoreResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.get_connection().await?;
        let found = users::table
            .filter(users::id.eq_any(ids))
            .select(User::as_select())
            .load(&mut conn)
            .await?;
        Ok(found)
    }

    async fn update_user(&self, id: i32, changes: UpdateUser) -> StoreResult<Option<User>> {
        if changes.is_empty() {
            return self.find_user(id).await;
        }
        let mut conn = self.get_connection().await?;
        let updated = diesel::update(users::table.find(id))
            .set(&changes)
            .returning(User::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?;
        Ok(updated)
    }

    async fn user_counts(&self, ids: &[i32]) -> StoreResult<HashMap<i32, UserCounts>> {
        let mut counts: HashMap<i32, UserCounts> = ids.iter().map(|id| (*id, UserCounts::default())).collect();
        if ids.is_empty() {
            return Ok(counts);
        }
        let mut conn = self.get_connection().await?;

        let followers = follows::table
            .filter(follows::followee_id.eq_any(ids))
            .group_by(follows::followee_id)
            .select((follows::followee_id, count_star()))
            .load::<(i32, i64)>(&mut conn)
            .await?;
        for (id, n) in followers {
            counts.entry(id).or_default().followers = n;
        }

        let following = follows::table
            .filter(follows::follower_id.eq_any(ids))
            .group_by(follows::follower_id)
            .select((follows::follower_id, count_star()))
            .load::<(i32, i64)>(&mut conn)
            .await?;
        for (id, n) in following {
            counts.entry(id).or_default().following = n;
        }

        let authored = posts::table
            .filter(posts::author_id.eq_any(ids))
            .group_by(posts::author_id)
            .select((posts::author_id, count_star()))
            .load::<(i32, i64)>(&mut conn)
            .await?;
        for (id, n) in authored {
            counts.entry(id).or_default().posts = n;
        }

        Ok(counts)
    }

    async fn list_users(&self, query: &UserQuery) -> StoreResult<(Vec<User>, i64)> {
        let pattern = query.name_starts_with.as_deref().map(|p| like_pattern(p, true));
        debug!("Listing users with pattern {:?}, sort {:?}, page {:?}", pattern, query.sort, query.page);

        let mut conn = self.get_connection().await?;

        let total = diesel::sql_query("SELECT COUNT(*) AS count FROM users WHERE ($1::text IS NULL OR name ILIKE $1)")
            .bind::<Nullable<Text>, _>(pattern.clone())
            .get_result::<CountRow>(&mut conn)
            .await?
            .count;

        let sql = format!(
            "SELECT u.id, u.email, u.username, u.name, u.avatar_url, u.bio, u.created_at, u.updated_at
             FROM users u
             LEFT JOIN (SELECT followee_id, COUNT(*) AS followers FROM follows GROUP BY followee_id) f
                 ON f.followee_id = u.id
             WHERE ($1::text IS NULL OR u.name ILIKE $1)
             ORDER BY {}
             LIMIT $2 OFFSET $3",
            user_order_clause(query.sort)
        );
        let page = diesel::sql_query(sql)
            .bind::<Nullable<Text>, _>(pattern)
            .bind::<BigInt, _>(query.page.limit)
            .bind::<BigInt, _>(query.page.offset)
            .load::<User>(&mut conn)
            .await?;

        Ok((page, total))
    }

    async fn search_users(&self, search: &TextSearch) -> StoreResult<Vec<User>> {
        let mut conn = self.get_connection().await?;
        let mut query = users::table.select(User::as_select()).into_boxed::<Pg>();
        if let Some(needle) = &search.needle {
            let pattern = like_pattern(needle, false);
            query = if search.case_sensitive {
                query.filter(users::name.like(pattern.clone()).or(users::username.like(pattern)))
            } else {
                query.filter(users::name.ilike(pattern.clone()).or(users::username.ilike(pattern)))
            };
        }
        let found = query
            .order((users::created_at.desc(), users::id.desc()))
            .limit(search.limit)
            .load(&mut conn)
            .await?;
        Ok(found)
    }

    async fn insert_user_with_session(&self, user: NewUser, token: &str) -> StoreResult<User> {
        let mut conn = self.get_connection().await?;
        let token = token.to_string();
        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let created = diesel::insert_into(users::table)
                    .values(&user)
                    .returning(User::as_returning())
                    .get_result(conn)
                    .await?;
                diesel::insert_into(sessions::table)
                    .values((
                        sessions::token.eq(token.as_str()),
                        sessions::user_id.eq(created.id),
                        sessions::created_at.eq(created.created_at),
                    ))
                    .execute(conn)
                    .await?;
                Ok(created)
            }
            .scope_boxed()
        })
        .await
    }

    async fn session_user(&self, token: &str) -> StoreResult<Option<i32>> {
        let mut conn = self.get_connection().await?;
        let user_id = sessions::table
            .find(token)
            .select(sessions::user_id)
            .first::<i32>(&mut conn)
            .await
            .optional()?;
        Ok(user_id)
    }

    async fn insert_post(&self, post: NewPost) -> StoreResult<Post> {
        let mut conn = self.get_connection().await?;
        let created = diesel::insert_into(posts::table)
            .values(&post)
            .returning(Post::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(created)
    }

    async fn find_post(&self, id: i32) -> StoreResult<Option<Post>> {
        let mut conn = self.get_connection().await?;
        let post = posts::table
            .find(id)
            .select(Post::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(post)
    }

    async fn list_posts(&self, filter: &PostFilter, page: Page) -> StoreResult<Vec<Post>> {
        let mut conn = self.get_connection().await?;
        let mut query = posts::table.select(Post::as_select()).into_boxed::<Pg>();
        if let Some(genre) = &filter.genre {
            query = query.filter(posts::genre.eq(genre.clone()));
        }
        if let Some(author_id) = filter.author_id {
            query = query.filter(posts::author_id.eq(author_id));
        }
        if let Some(mood) = &filter.mood {
            query = query.filter(posts::mood.eq(mood.clone()));
        }
        match filter.has_audio {
            Some(true) => query = query.filter(posts::audio_url.is_not_null()),
            Some(false) => query = query.filter(posts::audio_url.is_null()),
            None => {}
        }
        let found = query
            .order((posts::created_at.desc(), posts::id.desc()))
            .limit(page.limit)
            .offset(page.offset)
            .load(&mut conn)
            .await?;
        Ok(found)
    }

    async fn update_post(&self, id: i32, requester: i32, changes: UpdatePost) -> StoreResult<Ownership<Post>> {
        let mut conn = self.get_connection().await?;
        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let author = posts::table
                    .find(id)
                    .select(posts::author_id)
                    .for_update()
                    .first::<i32>(conn)
                    .await
                    .optional()?;
                match author {
                    None => return Ok(Ownership::Missing),
                    Some(author_id) if author_id != requester => return Ok(Ownership::NotOwner),
                    Some(_) => {}
                }

                let post = if changes.is_empty() {
                    posts::table.find(id).select(Post::as_select()).first(conn).await?
                } else {
                    diesel::update(posts::table.find(id))
                        .set(&changes)
                        .returning(Post::as_returning())
                        .get_result(conn)
                        .await?
                };
                Ok(Ownership::Applied(post))
            }
            .scope_boxed()
        })
        .await
    }

    async fn delete_post(&self, id: i32, requester: i32) -> StoreResult<Ownership<()>> {
        let mut conn = self.get_connection().await?;
        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let author = posts::table
                    .find(id)
                    .select(posts::author_id)
                    .for_update()
                    .first::<i32>(conn)
                    .await
                    .optional()?;
                match author {
                    None => return Ok(Ownership::Missing),
                    Some(author_id) if author_id != requester => return Ok(Ownership::NotOwner),
                    Some(_) => {}
                }

                let reactions = diesel::delete(post_reactions::table.filter(post_reactions::post_id.eq(id)))
                    .execute(conn)
                    .await?;
                let removed_comments = diesel::delete(comments::table.filter(comments::post_id.eq(id)))
                    .execute(conn)
                    .await?;
                diesel::delete(posts::table.find(id)).execute(conn).await?;
                debug!(
                    "Deleted post {} with {} reactions and {} comments",
                    id, reactions, removed_comments
                );
                Ok(Ownership::Applied(()))
            }
            .scope_boxed()
        })
        .await
    }

    async fn top_posts(&self, limit: i64) -> StoreResult<Vec<Post>> {
        let mut conn = self.get_connection().await?;
        let top = diesel::sql_query(
            "SELECT p.id, p.author_id, p.title, p.content, p.genre, p.mood, p.audio_url, p.created_at, p.updated_at
             FROM posts p
             LEFT JOIN (
                 SELECT post_id, COUNT(*) AS likes FROM post_reactions WHERE kind = 'like' GROUP BY post_id
             ) l ON l.post_id = p.id
             ORDER BY COALESCE(l.likes, 0) DESC, p.created_at DESC, p.id DESC
             LIMIT $1",
        )
        .bind::<BigInt, _>(limit)
        .load::<Post>(&mut conn)
        .await?;
        Ok(top)
    }

    async fn search_posts(&self, search: &TextSearch) -> StoreResult<Vec<Post>> {
        let mut conn = self.get_connection().await?;
        let mut query = posts::table.select(Post::as_select()).into_boxed::<Pg>();
        if let Some(needle) = &search.needle {
            let pattern = like_pattern(needle, false);
            query = if search.case_sensitive {
                query.filter(
                    posts::title
                        .like(pattern.clone())
                        .or(posts::content.like(pattern.clone()))
                        .or(posts::genre.like(pattern)),
                )
            } else {
                query.filter(
                    posts::title
                        .ilike(pattern.clone())
                        .or(posts::content.ilike(pattern.clone()))
                        .or(posts::genre.ilike(pattern)),
                )
            };
        }
        let found = query
            .order((posts::created_at.desc(), posts::id.desc()))
            .limit(search.limit)
            .load(&mut conn)
            .await?;
        Ok(found)
    }

    async fn post_counts(&self, ids: &[i32]) -> StoreResult<HashMap<i32, PostCounts>> {
        let mut counts: HashMap<i32, PostCounts> = ids.iter().map(|id| (*id, PostCounts::default())).collect();
        if ids.is_empty() {
            return Ok(counts);
        }
        let mut conn = self.get_connection().await?;

        let reactions = post_reactions::table
            .filter(post_reactions::post_id.eq_any(ids))
            .group_by((post_reactions::post_id, post_reactions::kind))
            .select((post_reactions::post_id, post_reactions::kind, count_star()))
            .load::<(i32, String, i64)>(&mut conn)
            .await?;
        for (post_id, kind, n) in reactions {
            let entry = counts.entry(post_id).or_default();
            match EdgeKind::from_db(&kind) {
                Some(EdgeKind::Like) => entry.likes = n,
                Some(EdgeKind::Save) => entry.saves = n,
                None => {}
            }
        }

        let commented = comments::table
            .filter(comments::post_id.eq_any(ids))
            .group_by(comments::post_id)
            .select((comments::post_id, count_star()))
            .load::<(i32, i64)>(&mut conn)
            .await?;
        for (post_id, n) in commented {
            counts.entry(post_id).or_default().comments = n;
        }

        Ok(counts)
    }

    async fn insert_reaction(&self, kind: EdgeKind, user_id: i32, post_id: i32, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut conn = self.get_connection().await?;
        let row = NewPostReaction {
            user_id,
            post_id,
            kind: kind.as_str(),
            created_at: at,
        };
        let inserted = diesel::insert_into(post_reactions::table)
            .values(&row)
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .await?;
        Ok(inserted > 0)
    }

    async fn delete_reaction(&self, kind: EdgeKind, user_id: i32, post_id: i32) -> StoreResult<bool> {
        let mut conn = self.get_connection().await?;
        let deleted = diesel::delete(
            post_reactions::table
                .filter(post_reactions::user_id.eq(user_id))
                .filter(post_reactions::post_id.eq(post_id))
                .filter(post_reactions::kind.eq(kind.as_str())),
        )
        .execute(&mut conn)
        .await?;
        Ok(deleted > 0)
    }

    async fn reacted_posts(&self, kind: EdgeKind, user_id: i32, post_ids: &[i32]) -> StoreResult<HashSet<i32>> {
        if post_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let mut conn = self.get_connection().await?;
        let found = post_reactions::table
            .filter(post_reactions::user_id.eq(user_id))
            .filter(post_reactions::kind.eq(kind.as_str()))
            .filter(post_reactions::post_id.eq_any(post_ids))
            .select(post_reactions::post_id)
            .load::<i32>(&mut conn)
            .await?;
        Ok(found.into_iter().collect())
    }

    async fn reacted_post_list(&self, kind: EdgeKind, user_id: i32, page: Page) -> StoreResult<(Vec<Post>, i64)> {
        let mut conn = self.get_connection().await?;
        let total = post_reactions::table
            .filter(post_reactions::user_id.eq(user_id))
            .filter(post_reactions::kind.eq(kind.as_str()))
            .count()
            .get_result::<i64>(&mut conn)
            .await?;
        let found = post_reactions::table
            .inner_join(posts::table)
            .filter(post_reactions::user_id.eq(user_id))
            .filter(post_reactions::kind.eq(kind.as_str()))
            .order((post_reactions::created_at.desc(), posts::id.desc()))
            .select(Post::as_select())
            .limit(page.limit)
            .offset(page.offset)
            .load(&mut conn)
            .await?;
        Ok((found, total))
    }

    async fn insert_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let mut conn = self.get_connection().await?;
        let created = diesel::insert_into(comments::table)
            .values(&comment)
            .returning(Comment::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(created)
    }

    async fn list_comments(&self, post_id: i32) -> StoreResult<Vec<Comment>> {
        let mut conn = self.get_connection().await?;
        let found = comments::table
            .filter(comments::post_id.eq(post_id))
            .order((comments::created_at.asc(), comments::id.asc()))
            .select(Comment::as_select())
            .load(&mut conn)
            .await?;
        Ok(found)
    }

    async fn insert_follow(&self, follower_id: i32, followee_id: i32, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut conn = self.get_connection().await?;
        let row = NewFollow {
            follower_id,
            followee_id,
            created_at: at,
        };
        let inserted = diesel::insert_into(follows::table)
            .values(&row)
            .on_conflict((follows::follower_id, follows::followee_id))
            .do_nothing()
            .execute(&mut conn)
            .await?;
        Ok(inserted > 0)
    }

    async fn delete_follow(&self, follower_id: i32, followee_id: i32) -> StoreResult<bool> {
        let mut conn = self.get_connection().await?;
        let deleted = diesel::delete(
            follows::table
                .filter(follows::follower_id.eq(follower_id))
                .filter(follows::followee_id.eq(followee_id)),
        )
        .execute(&mut conn)
        .await?;
        Ok(deleted > 0)
    }

    async fn followed_among(&self, follower_id: i32, candidates: &[i32]) -> StoreResult<HashSet<i32>> {
        if candidates.is_empty() {
            return Ok(HashSet::new());
        }
        let mut conn = self.get_connection().await?;
        let found = follows::table
            .filter(follows::follower_id.eq(follower_id))
            .filter(follows::followee_id.eq_any(candidates))
            .select(follows::followee_id)
            .load::<i32>(&mut conn)
            .await?;
        Ok(found.into_iter().collect())
    }

    async fn list_followers(&self, user_id: i32, page: Page) -> StoreResult<(Vec<User>, i64)> {
        let mut conn = self.get_connection().await?;
        let total = follows::table
            .filter(follows::followee_id.eq(user_id))
            .count()
            .get_result::<i64>(&mut conn)
            .await?;
        let found = follows::table
            .inner_join(users::table.on(users::id.eq(follows::follower_id)))
            .filter(follows::followee_id.eq(user_id))
            .order((follows::created_at.desc(), users::id.desc()))
            .select(User::as_select())
            .limit(page.limit)
            .offset(page.offset)
            .load(&mut conn)
            .await?;
        Ok((found, total))
    }

    async fn list_following(&self, user_id: i32, page: Page) -> StoreResult<(Vec<User>, i64)> {
        let mut conn = self.get_connection().await?;
        let total = follows::table
            .filter(follows::follower_id.eq(user_id))
            .count()
            .get_result::<i64>(&mut conn)
            .await?;
        let found = follows::table
            .inner_join(users::table.on(users::id.eq(follows::followee_id)))
            .filter(follows::follower_id.eq(user_id))
            .order((follows::created_at.desc(), users::id.desc()))
            .select(User::as_select())
            .limit(page.limit)
            .offset(page.offset)
            .load(&mut conn)
            .await?;
        Ok((found, total))
    }

    async fn community_stats(&self, since: DateTime<Utc>) -> StoreResult<CommunityStats> {
        let mut conn = self.get_connection().await?;
        let total_poems = posts::table.count().get_result::<i64>(&mut conn).await?;
        let active_poets = posts::table
            .select(count_distinct(posts::author_id))
            .get_result::<i64>(&mut conn)
            .await?;
        let new_this_week = posts::table
            .filter(posts::created_at.ge(since))
            .count()
            .get_result::<i64>(&mut conn)
            .await?;
        Ok(CommunityStats {
            total_poems,
            active_poets,
            new_this_week,
        })
    }
}
