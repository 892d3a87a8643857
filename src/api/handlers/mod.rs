// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

pub mod accounts;
pub mod health;
pub mod metrics;
pub mod posts;
pub mod search;
pub mod stats;
pub mod users;
