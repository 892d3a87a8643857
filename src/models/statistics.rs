// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// Site-wide counters shown on the community page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityStats {
    pub total_poems: i64,
    pub active_poets: i64,
    pub new_this_week: i64,
}
