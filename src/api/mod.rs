// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

mod handlers;
mod routes;

pub use routes::{ApiJson, ApiPath, ApiQuery};

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{IdentityResolver, SessionResolver};
use crate::config::Config;
use crate::metrics::Metrics;
use crate::services::{AccountService, ContentService, GraphService, RankingService, SearchService};
use crate::store::SocialStore;

/// Shared handles for every request
#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub content: ContentService,
    pub graph: GraphService,
    pub ranking: RankingService,
    pub search: SearchService,
    pub identity: Arc<dyn IdentityResolver>,
    pub metrics: Metrics,
    pub store: Arc<dyn SocialStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn SocialStore>, config: &Config) -> Result<Self> {
        Ok(Self {
            accounts: AccountService::new(store.clone()),
            content: ContentService::new(store.clone()),
            graph: GraphService::new(store.clone()),
            ranking: RankingService::new(store.clone()),
            search: SearchService::new(store.clone(), config.search.case_sensitive),
            identity: Arc::new(SessionResolver::new(store.clone())),
            metrics: Metrics::new()?,
            store,
        })
    }
}

impl FromRef<AppState> for Arc<dyn IdentityResolver> {
    fn from_ref(state: &AppState) -> Self {
        state.identity.clone()
    }
}

/// Build the HTTP router without binding a socket
pub fn router(state: AppState) -> Router {
    Router::new()
        // General routes
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::get_metrics))

        // Account routes
        .route("/auth/signup", post(handlers::accounts::signup))

        // Post routes
        .route("/posts", get(handlers::posts::list_posts).post(handlers::posts::create_post))
        .route("/posts/top", get(handlers::posts::top_posts))
        .route(
            "/posts/:id",
            get(handlers::posts::get_post)
                .put(handlers::posts::update_post)
                .delete(handlers::posts::delete_post),
        )
        .route("/posts/:id/like", post(handlers::posts::like_post))
        .route("/posts/:id/save", post(handlers::posts::save_post))
        .route(
            "/posts/:id/comments",
            get(handlers::posts::list_comments).post(handlers::posts::add_comment),
        )

        // User routes
        .route("/users", get(handlers::users::list_users))
        .route("/users/top", get(handlers::users::top_users))
        .route("/users/me/saved", get(handlers::users::saved_posts))
        .route("/users/:id", get(handlers::users::get_user).put(handlers::users::update_user))
        .route("/users/:id/follow", post(handlers::users::follow_user))
        .route("/users/:id/followers", get(handlers::users::get_followers))
        .route("/users/:id/following", get(handlers::users::get_following))

        // Discovery routes
        .route("/search", get(handlers::search::search))
        .route("/stats/community", get(handlers::stats::community_stats))

        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until `shutdown` resolves
pub async fn start_api_server(
    state: AppState,
    config: &Config,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let mut app = router(state);
    if config.api.enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    info!("Starting API server on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
