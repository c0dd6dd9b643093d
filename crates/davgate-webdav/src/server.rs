//! WebDAV server setup and lifecycle management.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use http::Response;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use davgate_core::config::{AppConfig, CorsConfig, ServerConfig};
use davgate_core::error::AppError;

use crate::cors::build_cors_layer;
use crate::dispatcher::Dispatcher;

/// Build the router: every path and method goes to the dispatcher.
pub fn build_router(dispatcher: Arc<Dispatcher>, cors: &CorsConfig) -> Router {
    let router = Router::new()
        .fallback(dispatch)
        .with_state(dispatcher)
        .layer(TraceLayer::new_for_http());

    if cors.enabled {
        router.layer(build_cors_layer(cors))
    } else {
        router
    }
}

async fn dispatch(State(dispatcher): State<Arc<Dispatcher>>, req: Request) -> Response<Body> {
    dispatcher.handle(req).await
}

/// WebDAV server configuration and state
#[derive(Debug)]
pub struct WebDavServer {
    /// Request dispatcher
    dispatcher: Arc<Dispatcher>,
    /// Listener configuration
    server: ServerConfig,
    /// Cross-origin settings
    cors: CorsConfig,
}

impl WebDavServer {
    /// Create a new WebDAV server
    pub fn new(dispatcher: Dispatcher, server: ServerConfig, cors: CorsConfig) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            server,
            cors,
        }
    }

    /// Build the dispatcher and server from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let dispatcher = Dispatcher::from_config(config)?;
        Ok(Self::new(
            dispatcher,
            config.server.clone(),
            config.cors.clone(),
        ))
    }

    /// The router this server runs.
    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.dispatcher), &self.cors)
    }

    /// Start the WebDAV server; returns once `cancel` flips to `true`.
    pub async fn start(&self, mut cancel: watch::Receiver<bool>) -> Result<(), AppError> {
        let addr = format!("{}:{}", self.server.host, self.server.port);

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::internal(format!("Failed to bind WebDAV server: {}", e)))?;

        tracing::info!(
            address = %addr,
            prefix = %self.server.prefix,
            multi_tenant = self.dispatcher.is_multi_tenant(),
            "WebDAV server listening"
        );

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            while cancel.changed().await.is_ok() {
                if *cancel.borrow() {
                    break;
                }
            }
        })
        .await
        .map_err(|e| AppError::internal(format!("WebDAV server error: {}", e)))?;

        tracing::info!("WebDAV server stopped");
        Ok(())
    }
}
