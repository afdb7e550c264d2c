//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router: edge filter in front of the upstream forwarder
//! - Wire up middleware (request ID, tracing, filter)
//! - Start the ledger sweeper and the policy reload task
//! - Serve until shutdown is signalled

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware::from_fn_with_state, Router};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::EdgeConfig;
use crate::error::EdgeError;
use crate::http::middleware::edge_filter;
use crate::http::request::{UuidRequestId, X_REQUEST_ID};
use crate::http::upstream::{self, Upstream};
use crate::lifecycle::sweeper::LedgerSweeper;
use crate::security::EdgeFilter;

/// HTTP server for the edge guard.
pub struct HttpServer {
    router: Router,
    config: EdgeConfig,
    filter: Arc<EdgeFilter>,
}

impl HttpServer {
    /// Create a new HTTP server with an in-memory ledger.
    pub fn new(config: EdgeConfig) -> Result<Self, EdgeError> {
        let filter = Arc::new(EdgeFilter::new(&config.filter, config.runtime.mode));
        Self::with_filter(config, filter)
    }

    /// Create a server around an existing filter (custom ledger or clock).
    pub fn with_filter(config: EdgeConfig, filter: Arc<EdgeFilter>) -> Result<Self, EdgeError> {
        let upstream = config
            .upstream
            .url
            .as_deref()
            .map(|url| Upstream::new(url, Duration::from_secs(config.upstream.timeout_secs)))
            .transpose()?;

        match &config.upstream.url {
            Some(url) => tracing::info!(upstream = %url, "Forwarding admitted requests"),
            None => tracing::warn!("No upstream configured, admitted requests get 404"),
        }

        let router = build_router(filter.clone(), upstream);
        Ok(Self {
            router,
            config,
            filter,
        })
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Validated configs received on `config_updates` replace the filter
    /// policy. Returns once `shutdown` fires and in-flight requests finish.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<EdgeConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), EdgeError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            mode = ?self.filter.mode(),
            "HTTP server starting"
        );

        let sweeper = LedgerSweeper::new(
            self.filter.clone(),
            Duration::from_secs(self.config.filter.rate_limit.sweep_interval_secs),
        );
        tokio::spawn(sweeper.run(shutdown.resubscribe()));

        let filter = self.filter.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                apply_config_update(&filter, &config);
            }
        });

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// A clone of the fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn filter(&self) -> &Arc<EdgeFilter> {
        &self.filter
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &EdgeConfig {
        &self.config
    }
}

/// Swap in the filter policy of a reloaded config.
///
/// Returns `false` when the config asks for a different runtime mode, which
/// only takes effect on restart.
fn apply_config_update(filter: &EdgeFilter, config: &EdgeConfig) -> bool {
    let mode_kept = config.runtime.mode == filter.mode();
    if !mode_kept {
        tracing::warn!(
            requested = ?config.runtime.mode,
            active = ?filter.mode(),
            "Runtime mode cannot change without a restart, ignoring"
        );
    }
    filter.reload(&config.filter);
    mode_kept
}

/// Build the Axum router with all middleware layers.
///
/// Every path falls through to the upstream (or a 404). Layers run
/// outermost first: request ID, tracing, ID propagation, then the filter.
pub fn build_router(filter: Arc<EdgeFilter>, upstream: Option<Upstream>) -> Router {
    let router = match upstream {
        Some(upstream) => Router::new().fallback(upstream::forward).with_state(upstream),
        None => Router::new().fallback(upstream::not_found),
    };

    router
        .layer(from_fn_with_state(filter, edge_filter))
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
}
