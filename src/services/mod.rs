// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

//! Request-independent core: content, social graph, ranking, search and
//! accounts. Each service is constructed around an injected store handle.

pub mod accounts;
pub mod content;
pub mod graph;
pub mod ranking;
pub mod search;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::models::{EdgeKind, Post, PostView, User, UserSummary, UserView};
use crate::store::{SocialStore, StoreError};

pub use accounts::AccountService;
pub use content::ContentService;
pub use graph::GraphService;
pub use ranking::RankingService;
pub use search::SearchService;

/// A page of users together with the unpaged total
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserList {
    pub users: Vec<UserView>,
    pub total: i64,
}

/// A page of posts together with the unpaged total
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostList {
    pub posts: Vec<PostView>,
    pub total: i64,
}

/// Map a missing foreign reference to `NotFound`, anything else through the
/// usual store conversion
pub(crate) fn missing_as(err: StoreError, what: &'static str) -> AppError {
    match err {
        StoreError::MissingReference { .. } => AppError::NotFound(what),
        other => other.into(),
    }
}

/// Reject absent or blank input, returning the trimmed value
pub(crate) fn required(field: &str, value: Option<String>) -> AppResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(AppError::validation(format!("{} is required", field))),
    }
}

/// Reject a supplied-but-blank value in a partial update
pub(crate) fn not_blank(field: &str, value: Option<String>) -> AppResult<Option<String>> {
    match value {
        Some(v) if v.trim().is_empty() => Err(AppError::validation(format!("{} cannot be empty", field))),
        Some(v) => Ok(Some(v.trim().to_string())),
        None => Ok(None),
    }
}

/// Attach counts, author cards and viewer flags to a page of posts.
///
/// Issues a fixed number of store calls regardless of page size: one for
/// counts, one for authors, and one per edge kind when a viewer is present.
pub(crate) async fn assemble_posts(
    store: &Arc<dyn SocialStore>,
    posts: Vec<Post>,
    viewer: Option<i32>,
) -> AppResult<Vec<PostView>> {
    if posts.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i32> = posts.iter().map(|p| p.id).collect();
    let author_ids: Vec<i32> = posts
        .iter()
        .map(|p| p.author_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let counts = store.post_counts(&ids).await?;
    let authors: HashMap<i32, UserSummary> = store
        .find_users(&author_ids)
        .await?
        .iter()
        .map(|u| (u.id, UserSummary::from(u)))
        .collect();

    let flags = match viewer {
        Some(viewer_id) => Some((
            store.reacted_posts(EdgeKind::Like, viewer_id, &ids).await?,
            store.reacted_posts(EdgeKind::Save, viewer_id, &ids).await?,
        )),
        None => None,
    };

    Ok(posts
        .into_iter()
        .map(|post| {
            let id = post.id;
            let author = authors.get(&post.author_id).cloned();
            let mut view = PostView::new(post, author, counts.get(&id).copied().unwrap_or_default());
            if let Some((liked, saved)) = &flags {
                view.is_liked = Some(liked.contains(&id));
                view.is_saved = Some(saved.contains(&id));
            }
            view
        })
        .collect())
}

/// Attach follow counts and the viewer's follow state to a page of users
pub(crate) async fn assemble_users(
    store: &Arc<dyn SocialStore>,
    users: Vec<User>,
    viewer: Option<i32>,
) -> AppResult<Vec<UserView>> {
    if users.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i32> = users.iter().map(|u| u.id).collect();
    let counts = store.user_counts(&ids).await?;
    let followed = match viewer {
        Some(viewer_id) => Some(store.followed_among(viewer_id, &ids).await?),
        None => None,
    };

    Ok(users
        .into_iter()
        .map(|user| {
            let id = user.id;
            let is_following = followed.as_ref().map(|set| set.contains(&id));
            UserView::new(user, counts.get(&id).copied().unwrap_or_default(), is_following)
        })
        .collect())
}
