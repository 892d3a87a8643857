// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{NewUser, UpdateUser, UserView};
use crate::store::SocialStore;

use super::{assemble_users, not_blank, required};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SignupForm {
    pub email: Option<String>,
    pub username: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

/// The caller's own account, including private fields and a session token
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    #[serde(flatten)]
    pub profile: UserView,
    pub email: String,
    pub token: String,
}

fn valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

fn valid_username(username: &str) -> bool {
    username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '-')
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn SocialStore>,
}

impl AccountService {
    pub fn new(store: Arc<dyn SocialStore>) -> Self {
        Self { store }
    }

    /// Register a user and open a session for them
    pub async fn signup(&self, form: SignupForm) -> AppResult<Account> {
        let email = required("email", form.email)?.to_lowercase();
        let username = required("username", form.username)?;
        let name = required("name", form.name)?;
        if !valid_email(&email) {
            return Err(AppError::validation("email is malformed"));
        }
        if !valid_username(&username) {
            return Err(AppError::validation("username may only contain letters, digits, '_', '.' and '-'"));
        }

        let now = Utc::now();
        let token = Uuid::new_v4().to_string();
        let user = self
            .store
            .insert_user_with_session(
                NewUser {
                    email,
                    username,
                    name,
                    avatar_url: form.avatar_url,
                    bio: form.bio,
                    created_at: now,
                    updated_at: now,
                },
                &token,
            )
            .await?;
        info!("Registered user {} ({})", user.id, user.username);

        let email = user.email.clone();
        let profile = UserView::new(user, Default::default(), None);
        Ok(Account { profile, email, token })
    }

    /// Public profile with aggregates, plus follow state when a viewer is known
    pub async fn get_user(&self, id: i32, viewer: Option<i32>) -> AppResult<UserView> {
        let user = self.store.find_user(id).await?.ok_or(AppError::NotFound("user"))?;
        assemble_users(&self.store, vec![user], viewer)
            .await?
            .pop()
            .ok_or(AppError::NotFound("user"))
    }

    /// Update the requester's own profile; only supplied fields change
    pub async fn update_profile(&self, id: i32, requester: i32, patch: ProfilePatch) -> AppResult<UserView> {
        if id != requester {
            warn!("User {} attempted to edit profile {}", requester, id);
            return Err(AppError::forbidden("you can only edit your own profile"));
        }
        let username = not_blank("username", patch.username)?;
        if let Some(username) = &username {
            if !valid_username(username) {
                return Err(AppError::validation("username may only contain letters, digits, '_', '.' and '-'"));
            }
        }
        let changes = UpdateUser {
            name: not_blank("name", patch.name)?,
            username,
            avatar_url: patch.avatar_url,
            bio: patch.bio,
        };

        self.store
            .update_user(id, changes)
            .await?
            .ok_or(AppError::NotFound("user"))?;
        info!("Updated profile {}", id);
        self.get_user(id, Some(requester)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{memory_store, signup};
    use tokio_test::{assert_err, assert_ok};

    fn form(email: &str, username: &str) -> SignupForm {
        SignupForm {
            email: Some(email.to_string()),
            username: Some(username.to_string()),
            name: Some("Ana".to_string()),
            avatar_url: None,
            bio: None,
        }
    }

    #[tokio::test]
    async fn signup_issues_resolvable_session() {
        let (_, store) = memory_store();
        let accounts = AccountService::new(store.clone());
        let account = assert_ok!(accounts.signup(form("A@X.com", "ana")).await);
        assert_eq!(account.email, "a@x.com");
        assert_eq!(store.session_user(&account.token).await.unwrap(), Some(account.profile.id));
    }

    #[tokio::test]
    async fn duplicate_email_or_username_conflicts() {
        let (_, store) = memory_store();
        let accounts = AccountService::new(store);
        assert_ok!(accounts.signup(form("a@x.com", "ana")).await);

        let err = assert_err!(accounts.signup(form("a@x.com", "other")).await);
        assert!(matches!(err, AppError::Conflict(_)));
        let err = assert_err!(accounts.signup(form("b@x.com", "ana")).await);
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn signup_rejects_missing_fields() {
        let (_, store) = memory_store();
        let accounts = AccountService::new(store);
        let mut incomplete = form("a@x.com", "ana");
        incomplete.name = Some("   ".to_string());
        assert!(matches!(accounts.signup(incomplete).await, Err(AppError::Validation(_))));
        assert!(matches!(
            accounts.signup(form("not-an-email", "ana")).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn profile_update_is_self_only_and_partial() {
        let (_, store) = memory_store();
        let a = signup(&store, "Ana").await;
        let b = signup(&store, "Ben").await;
        let accounts = AccountService::new(store);

        let patch = ProfilePatch {
            bio: Some("ghazals mostly".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            accounts.update_profile(a, b, patch.clone()).await,
            Err(AppError::Forbidden(_))
        ));

        let updated = assert_ok!(accounts.update_profile(a, a, patch).await);
        assert_eq!(updated.bio.as_deref(), Some("ghazals mostly"));
        assert_eq!(updated.name, "Ana");
    }
}
