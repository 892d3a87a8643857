// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::{follows, post_reactions};

/// Kind tag for user -> post edges stored in `post_reactions`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Like,
    Save,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Like => "like",
            EdgeKind::Save => "save",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "like" => Some(EdgeKind::Like),
            "save" => Some(EdgeKind::Save),
            _ => None,
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested direction of a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleAction {
    Add,
    Remove,
}

impl ToggleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToggleAction::Add => "add",
            ToggleAction::Remove => "remove",
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = post_reactions)]
pub struct NewPostReaction<'a> {
    pub user_id: i32,
    pub post_id: i32,
    pub kind: &'a str,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = follows)]
pub struct NewFollow {
    pub follower_id: i32,
    pub followee_id: i32,
    pub created_at: DateTime<Utc>,
}
