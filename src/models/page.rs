// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// Default page size for listings
pub const DEFAULT_LIMIT: i64 = 20;
/// Hard upper bound for any page size
pub const MAX_LIMIT: i64 = 200;

/// A clamped limit/offset window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    /// Build a page from raw request values, using `DEFAULT_LIMIT` when absent
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self::with_default(limit, offset, DEFAULT_LIMIT)
    }

    /// Build a page with an endpoint-specific default limit
    pub fn with_default(limit: Option<i64>, offset: Option<i64>, default_limit: i64) -> Self {
        Self {
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_LIMIT),
            offset: offset.unwrap_or(0).max(0),
        }
    }

    /// Page starting at zero with the given size
    pub fn first(limit: i64) -> Self {
        Self::new(Some(limit), Some(0))
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        let start = self.offset as usize;
        start..start.saturating_add(self.limit as usize)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_capped() {
        assert_eq!(Page::new(Some(300), None).limit, MAX_LIMIT);
        assert_eq!(Page::new(Some(0), None).limit, 1);
        assert_eq!(Page::new(None, None).limit, DEFAULT_LIMIT);
    }

    #[test]
    fn negative_offset_clamps_to_zero() {
        assert_eq!(Page::new(None, Some(-5)).offset, 0);
        assert_eq!(Page::new(Some(10), Some(30)).range(), 30..40);
    }
}
