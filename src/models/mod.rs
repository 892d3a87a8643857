// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

pub mod comment;
pub mod page;
pub mod post;
pub mod reaction;
pub mod statistics;
pub mod user;

pub use comment::{Comment, CommentView, NewComment};
pub use page::Page;
pub use post::{NewPost, Post, PostCounts, PostFilter, PostView, UpdatePost};
pub use reaction::{EdgeKind, ToggleAction};
pub use statistics::CommunityStats;
pub use user::{NewUser, UpdateUser, User, UserCounts, UserSort, UserSummary, UserView};
