use agentgate_core::ClientFactory;
use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::apis;
use crate::session::{RegistryConfig, SessionRegistry};
use crate::streaming::FrameFormat;

/// Configuration for the HTTP server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Bind host (e.g., "0.0.0.0")
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Development mode: reusable listener for an external restart loop
    pub reload: bool,
    /// Session registry configuration
    pub registry: RegistryConfig,
    /// Wire layout of streamed frames
    pub frame_format: FrameFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            reload: false,
            registry: RegistryConfig::default(),
            frame_format: FrameFormat::Compat,
        }
    }
}

impl ServerConfig {
    /// Create a new server config bound to the given host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_reload(mut self, reload: bool) -> Self {
        self.reload = reload;
        self
    }

    /// Set the maximum number of live sessions
    pub fn with_max_sessions(mut self, max_sessions: Option<usize>) -> Self {
        self.registry.max_sessions = max_sessions;
        self
    }

    /// Add an `outcome` field to every streamed frame
    pub fn with_frame_outcome(mut self, enabled: bool) -> Self {
        self.frame_format = if enabled {
            FrameFormat::WithOutcome
        } else {
            FrameFormat::Compat
        };
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Application context shared by every handler
#[derive(Clone)]
pub struct ServerState {
    pub registry: Arc<SessionRegistry>,
    pub factory: Arc<dyn ClientFactory>,
    pub frame_format: FrameFormat,
}

impl ServerState {
    pub fn new(config: &ServerConfig, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new(factory.clone(), config.registry.clone())),
            factory,
            frame_format: config.frame_format,
        }
    }
}

/// All routes of the gateway
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(apis::handle_health))
        // Stateless
        .route("/query", post(apis::handle_query))
        // Sessions
        .route(
            "/sessions",
            post(apis::handle_create_session).get(apis::handle_list_sessions),
        )
        .route(
            "/sessions/{session_id}",
            get(apis::handle_get_session).delete(apis::handle_delete_session),
        )
        .route("/sessions/{session_id}/query", post(apis::handle_session_query))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Bind with SO_REUSEADDR so a watcher restarting the process reclaims the port instantly
fn bind_with_reuse(addr: SocketAddr) -> anyhow::Result<TcpListener> {
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;
    let std_listener: std::net::TcpListener = socket.into();
    Ok(TcpListener::from_std(std_listener)?)
}

async fn bind(config: &ServerConfig) -> anyhow::Result<TcpListener> {
    if !config.reload {
        return TcpListener::bind(config.address())
            .await
            .with_context(|| format!("failed to bind {}", config.address()));
    }

    let addr = tokio::net::lookup_host(config.address())
        .await?
        .next()
        .with_context(|| format!("no address for {}", config.address()))?;
    bind_with_reuse(addr).with_context(|| format!("failed to bind {}", addr))
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Start the HTTP server and run until a shutdown signal arrives.
/// Every live session is closed before returning.
pub async fn start_server(config: ServerConfig, factory: Arc<dyn ClientFactory>) -> anyhow::Result<()> {
    let state = ServerState::new(&config, factory);
    let registry = state.registry.clone();

    println!("✓ Session registry initialized");
    match config.registry.max_sessions {
        Some(max) => println!("  Max sessions: \x1b[1m{}\x1b[0m", max),
        None => println!("  Max sessions: \x1b[1munlimited\x1b[0m"),
    }
    println!(
        "  Frame format: \x1b[1m{}\x1b[0m",
        match config.frame_format {
            FrameFormat::Compat => "compat",
            FrameFormat::WithOutcome => "with outcome",
        }
    );
    println!();

    let listener = bind(&config).await?;
    let app = router(state);

    println!("Server starting on \x1b[1mhttp://{}\x1b[0m", config.address());
    if config.reload {
        println!("  Development mode: restart with \x1b[1mcargo watch -x run\x1b[0m, port is reusable");
    }
    println!("\nAvailable endpoints:");
    println!("  \x1b[1mGET    /health\x1b[0m                  - Health check");
    println!("  \x1b[1mPOST   /query\x1b[0m                   - Stateless query (SSE or JSON)");
    println!("  \x1b[1mPOST   /sessions\x1b[0m                - Create a session");
    println!("  \x1b[1mGET    /sessions\x1b[0m                - List sessions");
    println!("  \x1b[1mGET    /sessions/:id\x1b[0m            - Session info");
    println!("  \x1b[1mPOST   /sessions/:id/query\x1b[0m      - Query within a session");
    println!("  \x1b[1mDELETE /sessions/:id\x1b[0m            - Close a session");
    println!("\nPress Ctrl+C to stop\n");

    info!("HTTP server listening on {}", config.address());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down, closing sessions");
    registry.close_all().await;
    Ok(())
}
