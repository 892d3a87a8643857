// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{
    CommentView, NewComment, NewPost, Page, Post, PostFilter, PostView, UpdatePost, UserSummary,
};
use crate::store::{Ownership, SocialStore};

use super::{assemble_posts, missing_as, not_blank, required};

/// Fields accepted when publishing a poem
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PostDraft {
    pub title: Option<String>,
    pub content: Option<String>,
    pub genre: Option<String>,
    pub mood: Option<String>,
    pub audio_url: Option<String>,
}

/// Fields accepted when editing a poem; absent means unchanged
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub genre: Option<String>,
    pub mood: Option<String>,
    pub audio_url: Option<String>,
}

#[derive(Clone)]
pub struct ContentService {
    store: Arc<dyn SocialStore>,
}

impl ContentService {
    pub fn new(store: Arc<dyn SocialStore>) -> Self {
        Self { store }
    }

    pub async fn create_post(&self, author_id: i32, draft: PostDraft) -> AppResult<PostView> {
        let title = required("title", draft.title)?;
        let genre = required("genre", draft.genre)?;
        // Poem bodies keep their whitespace; only blank bodies are rejected
        let content = match draft.content {
            Some(content) if !content.trim().is_empty() => content,
            _ => return Err(AppError::validation("content is required")),
        };

        let now = Utc::now();
        let post = self
            .store
            .insert_post(NewPost {
                author_id,
                title,
                content,
                genre,
                mood: draft.mood.filter(|m| !m.trim().is_empty()),
                audio_url: draft.audio_url.filter(|a| !a.trim().is_empty()),
                created_at: now,
                updated_at: now,
            })
            .await
            .map_err(|e| missing_as(e, "user"))?;
        info!("User {} published post {}", author_id, post.id);

        self.single(post, Some(author_id)).await
    }

    pub async fn get_post(&self, id: i32, viewer: Option<i32>) -> AppResult<PostView> {
        let post = self.store.find_post(id).await?.ok_or(AppError::NotFound("post"))?;
        self.single(post, viewer).await
    }

    /// Newest first; viewer flags are resolved for the whole page at once
    pub async fn list_posts(&self, filter: &PostFilter, page: Page, viewer: Option<i32>) -> AppResult<Vec<PostView>> {
        debug!("Listing posts with filter {:?}, page {:?}", filter, page);
        let posts = self.store.list_posts(filter, page).await?;
        assemble_posts(&self.store, posts, viewer).await
    }

    pub async fn update_post(&self, id: i32, requester: i32, patch: PostPatch) -> AppResult<PostView> {
        let changes = UpdatePost {
            title: not_blank("title", patch.title)?,
            content: match patch.content {
                Some(c) if c.trim().is_empty() => return Err(AppError::validation("content cannot be empty")),
                other => other,
            },
            genre: not_blank("genre", patch.genre)?,
            mood: patch.mood,
            audio_url: patch.audio_url,
        };

        match self.store.update_post(id, requester, changes).await? {
            Ownership::Applied(post) => {
                info!("User {} updated post {}", requester, id);
                self.single(post, Some(requester)).await
            }
            Ownership::NotOwner => {
                warn!("User {} attempted to edit post {} they do not own", requester, id);
                Err(AppError::forbidden("only the author can edit this post"))
            }
            Ownership::Missing => Err(AppError::NotFound("post")),
        }
    }

    /// Delete a post and everything hanging off it
    pub async fn delete_post(&self, id: i32, requester: i32) -> AppResult<()> {
        match self.store.delete_post(id, requester).await? {
            Ownership::Applied(()) => {
                info!("User {} deleted post {}", requester, id);
                Ok(())
            }
            Ownership::NotOwner => {
                warn!("User {} attempted to delete post {} they do not own", requester, id);
                Err(AppError::forbidden("only the author can delete this post"))
            }
            Ownership::Missing => Err(AppError::NotFound("post")),
        }
    }

    /// Comments in chat-log order, oldest first
    pub async fn list_comments(&self, post_id: i32) -> AppResult<Vec<CommentView>> {
        if self.store.find_post(post_id).await?.is_none() {
            return Err(AppError::NotFound("post"));
        }
        let comments = self.store.list_comments(post_id).await?;
        let author_ids: Vec<i32> = comments
            .iter()
            .map(|c| c.author_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let authors: HashMap<i32, UserSummary> = self
            .store
            .find_users(&author_ids)
            .await?
            .iter()
            .map(|u| (u.id, UserSummary::from(u)))
            .collect();

        Ok(comments
            .into_iter()
            .map(|c| {
                let author = authors.get(&c.author_id).cloned();
                CommentView::new(c, author)
            })
            .collect())
    }

    pub async fn add_comment(&self, post_id: i32, author_id: i32, content: Option<String>) -> AppResult<CommentView> {
        let content = required("content", content)?;
        let comment = self
            .store
            .insert_comment(NewComment {
                post_id,
                author_id,
                content,
                created_at: Utc::now(),
            })
            .await
            .map_err(|e| missing_as(e, "post"))?;
        info!("User {} commented on post {}", author_id, post_id);

        let author = self.store.find_user(author_id).await?.as_ref().map(UserSummary::from);
        Ok(CommentView::new(comment, author))
    }

    async fn single(&self, post: Post, viewer: Option<i32>) -> AppResult<PostView> {
        assemble_posts(&self.store, vec![post], viewer)
            .await?
            .pop()
            .ok_or(AppError::NotFound("post"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EdgeKind, ToggleAction};
    use crate::services::graph::GraphService;
    use crate::services::testing::{draft, memory_store, publish, signup};
    use tokio_test::assert_ok;

    #[test_log::test(tokio::test)]
    async fn create_requires_title_content_and_genre() {
        let (_, store) = memory_store();
        let a = signup(&store, "Ana").await;
        let content = ContentService::new(store);

        let mut missing_genre = draft("Title", "Ghazal");
        missing_genre.genre = None;
        assert!(matches!(content.create_post(a, missing_genre).await, Err(AppError::Validation(_))));

        let mut blank_body = draft("Title", "Ghazal");
        blank_body.content = Some("  \n ".to_string());
        assert!(matches!(content.create_post(a, blank_body).await, Err(AppError::Validation(_))));

        let created = assert_ok!(content.create_post(a, draft("Title", "Ghazal")).await);
        assert_eq!(created.likes_count, 0);
        assert_eq!(created.author.as_ref().map(|u| u.username.as_str()), Some("ana"));
    }

    #[tokio::test]
    async fn non_owner_cannot_update_or_delete() {
        let (_, store) = memory_store();
        let a = signup(&store, "Ana").await;
        let b = signup(&store, "Ben").await;
        let post = publish(&store, a, "Mine").await;
        let content = ContentService::new(store);

        let patch = PostPatch {
            title: Some("Stolen".to_string()),
            ..Default::default()
        };
        assert!(matches!(content.update_post(post, b, patch).await, Err(AppError::Forbidden(_))));
        assert!(matches!(content.delete_post(post, b).await, Err(AppError::Forbidden(_))));

        let unchanged = content.get_post(post, None).await.unwrap();
        assert_eq!(unchanged.title, "Mine");
    }

    #[tokio::test]
    async fn update_only_touches_supplied_fields() {
        let (_, store) = memory_store();
        let a = signup(&store, "Ana").await;
        let post = publish(&store, a, "Mine").await;
        let content = ContentService::new(store);

        let patch = PostPatch {
            mood: Some("wistful".to_string()),
            ..Default::default()
        };
        let updated = content.update_post(post, a, patch).await.unwrap();
        assert_eq!(updated.title, "Mine");
        assert_eq!(updated.content, "Body");
        assert_eq!(updated.mood.as_deref(), Some("wistful"));

        assert!(matches!(
            content.update_post(post, a, PostPatch { title: Some(String::new()), ..Default::default() }).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            content.update_post(999, a, PostPatch::default()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_is_newest_first_and_capped() {
        let (_, store) = memory_store();
        let a = signup(&store, "Ana").await;
        for i in 0..205 {
            publish(&store, a, &format!("poem {}", i)).await;
        }
        let content = ContentService::new(store);

        let page = content
            .list_posts(&PostFilter::default(), Page::new(Some(300), None), None)
            .await
            .unwrap();
        assert_eq!(page.len(), 200);
        assert_eq!(page[0].title, "poem 204");
        assert!(page.iter().all(|p| p.is_liked.is_none()));
    }

    #[tokio::test]
    async fn list_filters_and_annotates_for_viewer() {
        let (_, store) = memory_store();
        let a = signup(&store, "Ana").await;
        let b = signup(&store, "Ben").await;
        let content = ContentService::new(store.clone());
        let graph = GraphService::new(store.clone());

        let ghazal = publish(&store, a, "ghazal").await;
        let mut with_audio = draft("spoken", "Nazm");
        with_audio.audio_url = Some("https://cdn.example/a.mp3".to_string());
        let nazm = content.create_post(b, with_audio).await.unwrap().id;

        graph.toggle_edge(EdgeKind::Like, b, ghazal, ToggleAction::Add).await.unwrap();

        let filter = PostFilter {
            genre: Some("Ghazal".to_string()),
            ..Default::default()
        };
        let ghazals = content.list_posts(&filter, Page::default(), Some(b)).await.unwrap();
        assert_eq!(ghazals.len(), 1);
        assert_eq!(ghazals[0].is_liked, Some(true));
        assert_eq!(ghazals[0].is_saved, Some(false));

        let audio = PostFilter {
            has_audio: Some(true),
            ..Default::default()
        };
        let spoken = content.list_posts(&audio, Page::default(), None).await.unwrap();
        assert_eq!(spoken.iter().map(|p| p.id).collect::<Vec<_>>(), vec![nazm]);
    }

    #[tokio::test]
    async fn delete_removes_edges_and_comments() {
        let (_, store) = memory_store();
        let a = signup(&store, "Ana").await;
        let b = signup(&store, "Ben").await;
        let post = publish(&store, a, "short-lived").await;
        let content = ContentService::new(store.clone());
        let graph = GraphService::new(store.clone());

        graph.toggle_edge(EdgeKind::Like, b, post, ToggleAction::Add).await.unwrap();
        graph.toggle_edge(EdgeKind::Save, b, post, ToggleAction::Add).await.unwrap();
        content.add_comment(post, b, Some("wow".to_string())).await.unwrap();

        content.delete_post(post, a).await.unwrap();

        assert!(!graph.has_edge(EdgeKind::Like, b, post).await.unwrap());
        assert!(!graph.has_edge(EdgeKind::Save, b, post).await.unwrap());
        assert!(matches!(content.list_comments(post).await, Err(AppError::NotFound(_))));
        assert!(store.list_comments(post).await.unwrap().is_empty());
        assert!(matches!(content.get_post(post, None).await, Err(AppError::NotFound(_))));
    }

    #[test_log::test(tokio::test)]
    async fn racing_deletes_apply_once() {
        let (_, store) = memory_store();
        let a = signup(&store, "Ana").await;
        let post = publish(&store, a, "Once").await;
        let content = ContentService::new(store);

        let (first, second) = tokio::join!(content.delete_post(post, a), content.delete_post(post, a));
        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(AppError::NotFound("post"))))
                .count(),
            1
        );
        assert!(matches!(content.get_post(post, None).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn comments_are_oldest_first_and_validated() {
        let (_, store) = memory_store();
        let a = signup(&store, "Ana").await;
        let post = publish(&store, a, "thread").await;
        let content = ContentService::new(store);

        content.add_comment(post, a, Some("first".to_string())).await.unwrap();
        content.add_comment(post, a, Some("second".to_string())).await.unwrap();
        assert!(matches!(content.add_comment(post, a, Some(" ".to_string())).await, Err(AppError::Validation(_))));
        assert!(matches!(content.add_comment(404, a, Some("hi".to_string())).await, Err(AppError::NotFound(_))));

        let thread = content.list_comments(post).await.unwrap();
        let bodies: Vec<&str> = thread.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second"]);
        assert_eq!(thread[0].author.as_ref().map(|u| u.id), Some(a));
    }
}
