// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::user::UserSummary;
use crate::schema::posts;

#[derive(Debug, Clone, PartialEq, Queryable, QueryableByName, Selectable, Serialize, Deserialize)]
#[diesel(table_name = posts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Post {
    pub id: i32,
    pub author_id: i32,
    pub title: String,
    pub content: String,
    pub genre: String,
    pub mood: Option<String>,
    pub audio_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = posts)]
pub struct NewPost {
    pub author_id: i32,
    pub title: String,
    pub content: String,
    pub genre: String,
    pub mood: Option<String>,
    pub audio_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial post update; the author is never part of the changeset
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = posts)]
pub struct UpdatePost {
    pub title: Option<String>,
    pub content: Option<String>,
    pub genre: Option<String>,
    pub mood: Option<String>,
    pub audio_url: Option<String>,
}

impl UpdatePost {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.genre.is_none()
            && self.mood.is_none()
            && self.audio_url.is_none()
    }

    pub fn apply(&self, post: &mut Post) {
        if let Some(title) = &self.title {
            post.title = title.clone();
        }
        if let Some(content) = &self.content {
            post.content = content.clone();
        }
        if let Some(genre) = &self.genre {
            post.genre = genre.clone();
        }
        if let Some(mood) = &self.mood {
            post.mood = Some(mood.clone());
        }
        if let Some(audio_url) = &self.audio_url {
            post.audio_url = Some(audio_url.clone());
        }
    }
}

/// Listing filters; every field narrows the result when present
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    pub genre: Option<String>,
    pub author_id: Option<i32>,
    pub mood: Option<String>,
    pub has_audio: Option<bool>,
}

impl PostFilter {
    pub fn matches(&self, post: &Post) -> bool {
        self.genre.as_ref().map_or(true, |g| &post.genre == g)
            && self.author_id.map_or(true, |a| post.author_id == a)
            && self.mood.as_ref().map_or(true, |m| post.mood.as_ref() == Some(m))
            && self.has_audio.map_or(true, |h| post.audio_url.is_some() == h)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostCounts {
    pub likes: i64,
    pub saves: i64,
    pub comments: i64,
}

/// A post as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: i32,
    pub author_id: i32,
    pub author: Option<UserSummary>,
    pub title: String,
    pub content: String,
    pub genre: String,
    pub mood: Option<String>,
    pub audio_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub likes_count: i64,
    pub saves_count: i64,
    pub comments_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_liked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_saved: Option<bool>,
}

impl PostView {
    pub fn new(post: Post, author: Option<UserSummary>, counts: PostCounts) -> Self {
        Self {
            id: post.id,
            author_id: post.author_id,
            author,
            title: post.title,
            content: post.content,
            genre: post.genre,
            mood: post.mood,
            audio_url: post.audio_url,
            created_at: post.created_at,
            updated_at: post.updated_at,
            likes_count: counts.likes,
            saves_count: counts.saves,
            comments_count: counts.comments,
            is_liked: None,
            is_saved: None,
        }
    }
}
