//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Create the Axum router with one route per registered form
//! - Wire up the request pipeline (recovery, limits, request ID, logging,
//!   path resolution, CORS, tokens, rate limiting)
//! - Bind the server to a listener
//! - Coordinate graceful shutdown on signal or fatal error

use std::future::IntoFuture;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::{
    catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer,
};

use crate::config::schema::GatewayConfig;
use crate::http::handlers::{self, EndpointError, FormEndpoint};
use crate::http::middleware as stages;
use crate::routing::registry::{form_path, PathRegistry};
use crate::security::rate_limit::{FixedWindowLimiter, LimiterError};

/// Length of the fixed rate-limit window.
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Upper bound on a single request, including reading the body and
/// dispatching notifications.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How long in-flight requests may continue after a shutdown trigger.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Error building the server from a validated configuration.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Limiter(#[from] LimiterError),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

/// State injected into the pipeline stages.
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub registry: Arc<PathRegistry>,
    pub limiter: Arc<FixedWindowLimiter>,
}

/// HTTP server for the gateway.
pub struct Server {
    router: Router,
}

impl Server {
    /// Build the server: path registry, rate limiter, per-form endpoints,
    /// and the middleware pipeline. All shared state is frozen here,
    /// before the first connection is accepted.
    pub fn new(
        config: GatewayConfig,
        mailers: &dyn crate::notify::mailer::MailerFactory,
    ) -> Result<Self, SetupError> {
        let limiter = Arc::new(FixedWindowLimiter::new(
            config.rate_limit.per_ip_site_minute,
            RATE_LIMIT_WINDOW,
        )?);
        let registry = Arc::new(PathRegistry::from_config(&config));
        let max_body_bytes = config.max_body_bytes as usize;
        let config = Arc::new(config);

        let mut router = Router::new().route("/health", get(handlers::health));

        for site in &config.sites {
            tracing::debug!(site = %site.id, "registering handlers for site");

            for form in &site.forms {
                let path = form_path(&site.id, &form.id);

                tracing::debug!(site = %site.id, form = %form.id, path = %path, "registering handler for form");

                let endpoint = Arc::new(FormEndpoint::new(&site.id, form, path.clone(), mailers)?);

                router = router.route(
                    &path,
                    post(handlers::submit_form)
                        .options(handlers::form_preflight)
                        .with_state(endpoint),
                );
            }
        }

        let state = Arc::new(AppState {
            config: Arc::clone(&config),
            registry,
            limiter,
        });

        // Layers run bottom-up: the last layer added is the outermost.
        let router = router
            .layer(middleware::from_fn_with_state(Arc::clone(&state), stages::rate_limit))
            .layer(middleware::from_fn_with_state(Arc::clone(&state), stages::verify_token))
            .layer(middleware::from_fn_with_state(Arc::clone(&state), stages::enforce_cors))
            .layer(middleware::from_fn_with_state(Arc::clone(&state), stages::resolve_path))
            .layer(middleware::from_fn_with_state(Arc::clone(&state), stages::debug_headers))
            .layer(middleware::from_fn(stages::access_log))
            .layer(middleware::from_fn(stages::assign_request_id))
            .layer(RequestBodyLimitLayer::new(max_body_bytes))
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
            .layer(CatchPanicLayer::new());

        Ok(Self { router })
    }

    /// Serve requests until the listener fails or the task is dropped.
    /// Used by tests; production entry points go through [`Self::run`].
    pub async fn serve(self, listener: TcpListener) -> io::Result<()> {
        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app).await
    }

    /// Run the server until a stop signal or a fatal listener error,
    /// whichever fires first, then shut down gracefully within a bounded
    /// grace period.
    pub async fn run(self, listener: TcpListener) -> io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let serve = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });

        let mut task = tokio::spawn(serve.into_future());

        tokio::select! {
            () = shutdown_signal() => {
                tracing::info!("shutdown signal received");
            }
            result = &mut task => {
                // The server stopped on its own; that is always an error.
                return match result {
                    Ok(Ok(())) => Err(io::Error::other("server stopped unexpectedly")),
                    Ok(Err(err)) => Err(err),
                    Err(join_err) => Err(io::Error::other(join_err)),
                };
            }
        }

        let _ = shutdown_tx.send(());

        match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
            Ok(Ok(result)) => {
                tracing::info!("HTTP server stopped");
                result
            }
            Ok(Err(join_err)) => Err(io::Error::other(join_err)),
            Err(_) => {
                task.abort();
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "graceful shutdown exceeded the grace period",
                ))
            }
        }
    }
}

/// First-to-fire selection between SIGINT and SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => {}
        _ = terminate => {}
    }
}
