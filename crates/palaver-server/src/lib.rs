//! HTTP API server for palaver.
//!
//! Wraps the chat core in an axum router: bearer-token identity, REST
//! routes for conversation management, and the NDJSON streaming
//! endpoint.
//!
//! # Example
//!
//! ```ignore
//! use palaver_server::{Server, ServerConfig};
//!
//! let service = ChatService::new(store, client);
//! let config = ServerConfig::new()
//!     .with_bind_address("127.0.0.1:8080".parse()?);
//!
//! let server = Server::new(service, config);
//! server.run().await?;
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use auth::{AuthError, Identity, auth_middleware};
pub use config::{ApiToken, ServerConfig};
pub use error::{Result, ServerError};
pub use routes::{SubmitRequest, SubmitResponse, VoteRequest};
pub use state::AppState;

use std::net::SocketAddr;

use axum::{Router, http::HeaderValue, middleware};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use palaver_chat::ChatService;

/// The palaver HTTP server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a new server with the given chat service and configuration.
    pub fn new(chat: ChatService, config: ServerConfig) -> Self {
        Self {
            state: AppState::new(chat, config),
        }
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            // Health routes (no auth)
            .merge(routes::health_routes())
            .nest("/api/v1", self.api_routes())
            .layer(TraceLayer::new_for_http());

        if !self.state.config.cors_origins.is_empty() {
            let origins: Vec<HeaderValue> = self
                .state
                .config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(origins)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        router.with_state(self.state.clone())
    }

    /// API routes (v1). All require authentication.
    fn api_routes(&self) -> Router<AppState> {
        use axum::routing::{get, post};

        Router::new()
            .route(
                "/chats",
                post(routes::submit_handler).get(routes::list_handler),
            )
            .route("/chats/stream", get(routes::stream_handler))
            .route("/chats/{id}/messages", get(routes::messages_handler))
            .route("/chats/vote", post(routes::vote_handler))
            .route("/chats/delete", post(routes::delete_handler))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth::auth_middleware,
            ))
    }

    /// Run the server.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        self.run_on(addr).await
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        let router = self.router();

        info!("Starting server on {}", addr);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind: {e}")))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {e}")))?;

        Ok(())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}
