//! HTTP API server for the parley gateway

pub mod audio;
pub mod health;
pub mod rate_limit;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::config::{DEFAULT_MAX_BODY_BYTES, DEFAULT_PORT, ServerConfig};
use crate::pipeline::Pipeline;

/// Shared state for API handlers
pub struct ApiState {
    pub pipeline: Arc<Pipeline>,
    pub rate_limiter: Option<rate_limit::SharedLimiter>,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    pipeline: Arc<Pipeline>,
    host: String,
    port: u16,
    max_body_bytes: usize,
    requests_per_minute: Option<u32>,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            requests_per_minute: None,
        }
    }

    /// Apply the `[server]` section of the resolved configuration
    #[must_use]
    pub fn server_config(mut self, config: &ServerConfig) -> Self {
        self.host.clone_from(&config.host);
        self.port = config.port;
        self.max_body_bytes = config.max_body_bytes;
        self.requests_per_minute = config.requests_per_minute;
        self
    }

    /// Set the bind host
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the listen port
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the maximum accepted request body size
    #[must_use]
    pub const fn max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    /// Enable global rate limiting
    #[must_use]
    pub const fn requests_per_minute(mut self, rpm: Option<u32>) -> Self {
        self.requests_per_minute = rpm;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let rate_limiter = self.requests_per_minute.map(rate_limit::create_limiter);

        let state = Arc::new(ApiState {
            pipeline: self.pipeline,
            rate_limiter,
        });

        ApiServer {
            state,
            host: self.host,
            port: self.port,
            max_body_bytes: self.max_body_bytes,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    host: String,
    port: u16,
    max_body_bytes: usize,
}

impl ApiServer {
    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        router(self.state.clone(), self.max_body_bytes)
    }

    /// Run the API server until Ctrl-C or SIGTERM
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server on {addr}: {e}")))?;

        tracing::info!(
            addr = %addr,
            transcriber = self.state.pipeline.transcriber_name().unwrap_or("none"),
            model = %self.state.pipeline.generator_model(),
            synthesizer = self.state.pipeline.synthesizer_name(),
            "API server listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        tracing::info!("API server stopped");
        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

/// Assemble the full router around shared state
pub fn router(state: Arc<ApiState>, max_body_bytes: usize) -> Router {
    let router = Router::new()
        .merge(audio::router(state.clone()))
        .merge(health::router())
        .merge(health::ready_router(state.clone()));

    // Rate limiting (only when configured)
    let router = router.layer(axum::middleware::from_fn_with_state(
        state,
        rate_limit::rate_limit_middleware,
    ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
