// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

use diesel::{allow_tables_to_appear_in_same_query, joinable, table};

table! {
    users (id) {
        id -> Integer,
        email -> Varchar,
        username -> Varchar,
        name -> Varchar,
        avatar_url -> Nullable<Varchar>,
        bio -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    sessions (token) {
        token -> Varchar,
        user_id -> Integer,
        created_at -> Timestamptz,
    }
}

table! {
    posts (id) {
        id -> Integer,
        author_id -> Integer,
        title -> Varchar,
        content -> Text,
        genre -> Varchar,
        mood -> Nullable<Varchar>,
        audio_url -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    comments (id) {
        id -> Integer,
        post_id -> Integer,
        author_id -> Integer,
        content -> Text,
        created_at -> Timestamptz,
    }
}

table! {
    post_reactions (user_id, post_id, kind) {
        user_id -> Integer,
        post_id -> Integer,
        kind -> Varchar,
        created_at -> Timestamptz,
    }
}

table! {
    follows (follower_id, followee_id) {
        follower_id -> Integer,
        followee_id -> Integer,
        created_at -> Timestamptz,
    }
}

joinable!(sessions -> users (user_id));
joinable!(posts -> users (author_id));
joinable!(comments -> posts (post_id));
joinable!(post_reactions -> posts (post_id));

allow_tables_to_appear_in_same_query!(
    users,
    sessions,
    posts,
    comments,
    post_reactions,
    follows,
);
