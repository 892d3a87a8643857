// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::models::{EdgeKind, ToggleAction};

/// Counters exported at `/metrics`
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    posts_created: IntCounter,
    comments_created: IntCounter,
    edge_toggles: IntCounterVec,
    follow_toggles: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("verse".to_string()), None)?;

        let posts_created = IntCounter::new("posts_created_total", "Posts created")?;
        let comments_created = IntCounter::new("comments_created_total", "Comments created")?;
        let edge_toggles = IntCounterVec::new(
            Opts::new("edge_toggles_total", "Like/save toggles by kind and action"),
            &["kind", "action"],
        )?;
        let follow_toggles = IntCounterVec::new(
            Opts::new("follow_toggles_total", "Follow toggles by action"),
            &["action"],
        )?;

        registry.register(Box::new(posts_created.clone()))?;
        registry.register(Box::new(comments_created.clone()))?;
        registry.register(Box::new(edge_toggles.clone()))?;
        registry.register(Box::new(follow_toggles.clone()))?;

        Ok(Self {
            registry,
            posts_created,
            comments_created,
            edge_toggles,
            follow_toggles,
        })
    }

    pub fn post_created(&self) {
        self.posts_created.inc();
    }

    pub fn comment_created(&self) {
        self.comments_created.inc();
    }

    pub fn edge_toggled(&self, kind: EdgeKind, action: ToggleAction) {
        self.edge_toggles
            .with_label_values(&[kind.as_str(), action.as_str()])
            .inc();
    }

    pub fn follow_toggled(&self, action: ToggleAction) {
        self.follow_toggles.with_label_values(&[action.as_str()]).inc();
    }

    /// Render all registered metrics in the Prometheus text format
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_labelled_toggles() {
        let metrics = Metrics::new().unwrap();
        metrics.edge_toggled(EdgeKind::Like, ToggleAction::Add);
        metrics.post_created();

        let text = metrics.render().unwrap();
        assert!(text.contains("verse_edge_toggles_total{action=\"add\",kind=\"like\"} 1"));
        assert!(text.contains("verse_posts_created_total 1"));
    }
}
