//! HTTP server for livedir.
//!
//! Serves a directory over HTTP and reloads connected browsers when anything
//! in it changes:
//! - Static files from the served root, via tower-http
//! - HTML documents with a reload script injected
//! - A server-sent events stream at [`LIVE_RELOAD_PATH`]
//!
//! # Quick Start
//!
//! ```ignore
//! use livedir_server::{ServerConfig, run_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig {
//!         root: "site".into(),
//!         ..ServerConfig::default()
//!     };
//!
//!     run_server(config).await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser ──HTTP──► axum router (livedir-server)
//!                        │
//!                        ├─► GET /__livereload ──► ReloadStream ◄── Broadcaster
//!                        │                                              ▲
//!                        ├─► *.html ──► inject_reload ──► response      │ notify()
//!                        │                                              │
//!                        └─► everything else ──► ServeDir     DirectoryWatcher (livedir-watch)
//! ```

mod app;
mod error;
mod live_reload;
mod middleware;
mod state;
mod static_files;

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use livedir_watch::{DirectoryWatcher, WatchHandle};
use tokio::net::TcpListener;

pub use error::ServerError;
pub use livedir_config::InjectAnchor;
pub use live_reload::{
    Broadcaster, Client, ClientId, InjectionPolicy, LIVE_RELOAD_PATH, inject_reload,
};

use state::AppState;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on (0 picks a free port).
    pub port: u16,
    /// Served root directory.
    pub root: PathBuf,
    /// Quiet period before a reload is broadcast.
    pub debounce: Duration,
    /// Exclusion substrings for the watcher.
    pub exclude: Vec<String>,
    /// Reload snippet placement.
    pub injection: InjectionPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 9222,
            root: PathBuf::from("."),
            debounce: livedir_config::DEFAULT_DEBOUNCE,
            exclude: livedir_config::split_exclude(livedir_config::DEFAULT_EXCLUDE),
            injection: InjectionPolicy::default(),
        }
    }
}

/// Create server configuration from livedir config.
///
/// # Arguments
///
/// * `config` - Loaded livedir configuration
#[must_use]
pub fn server_config_from_config(config: &livedir_config::Config) -> ServerConfig {
    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        root: config.watch_resolved.root.clone(),
        debounce: config.watch_resolved.debounce,
        exclude: config.watch_resolved.exclude.clone(),
        injection: InjectionPolicy {
            anchor: config.reload.anchor,
            cache_bust: config.reload.cache_bust,
        },
    }
}

/// Running watcher plus the router that serves its root.
///
/// Watching stops when the app is dropped.
pub struct App {
    router: Router,
    broadcaster: Arc<Broadcaster>,
    _watch: WatchHandle,
}

impl App {
    /// Start watching the root and build the router.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory watcher cannot be started.
    pub fn new(config: &ServerConfig) -> Result<Self, ServerError> {
        let broadcaster = Arc::new(Broadcaster::new());

        let watch = DirectoryWatcher::new(&config.root, config.exclude.clone())
            .with_debounce(config.debounce)
            .start(Arc::clone(&broadcaster) as Arc<dyn livedir_watch::ReloadSink>)?;

        let state = Arc::new(AppState::new(
            config.root.clone(),
            Arc::clone(&broadcaster),
            config.injection,
        ));

        Ok(Self {
            router: app::create_router(state),
            broadcaster,
            _watch: watch,
        })
    }

    /// The application router.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// The reload broadcaster fed by the watcher.
    #[must_use]
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }
}

/// A bound server, ready to run.
pub struct Server {
    app: App,
    listener: TcpListener,
}

impl Server {
    /// Start the watcher and bind the listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the watcher cannot be started or the address
    /// cannot be bound.
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let app = App::new(config)?;

        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(Self { app, listener })
    }

    /// Address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if serving fails.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `shutdown` completes, then stop gracefully.
    ///
    /// Open reload streams are closed on shutdown so in-flight connections
    /// can drain.
    ///
    /// # Errors
    ///
    /// Returns an error if serving fails.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self { app, listener } = self;
        tracing::info!(address = %listener.local_addr()?, "Starting server");

        let broadcaster = Arc::clone(&app.broadcaster);
        axum::serve(listener, app.router())
            .with_graceful_shutdown(async move {
                shutdown.await;
                broadcaster.disconnect_all();
            })
            .await?;

        // Keep the watcher alive for the whole run.
        drop(app);
        Ok(())
    }
}

/// Run the server until Ctrl-C.
///
/// # Arguments
///
/// * `config` - Server configuration
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    Server::bind(&config).await?.run().await
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}
