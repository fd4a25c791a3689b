//! Serve command implementation.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};
use livedir_config::{CliSettings, Config, InjectAnchor, parse_duration, split_exclude};
use livedir_server::{Server, server_config_from_config};

use crate::error::CliError;
use crate::output::Output;

/// Where to inject the reload script.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum AnchorArg {
    /// Before the closing `</body>` tag.
    Body,
    /// After the opening `<head>` tag.
    Head,
}

impl From<AnchorArg> for InjectAnchor {
    fn from(arg: AnchorArg) -> Self {
        match arg {
            AnchorArg::Body => Self::BodyClose,
            AnchorArg::Head => Self::HeadOpen,
        }
    }
}

/// Arguments for serving a directory.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover livedir.toml).
    #[arg(short, long, env = "LIVEDIR_CONFIG")]
    config: Option<PathBuf>,

    /// Directory to serve and watch (default: current directory).
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Host to bind to (default: 127.0.0.1).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (default: 9222).
    #[arg(short, long)]
    port: Option<u16>,

    /// Quiet period before reloading, e.g. 100ms or 1s500ms (default: 100ms).
    #[arg(long, value_parser = parse_duration)]
    debounce: Option<Duration>,

    /// Comma-separated path substrings to ignore
    /// (default: .git,node_modules,.zig-cache).
    #[arg(long)]
    exclude: Option<String>,

    /// Open the browser on startup (default: enabled).
    #[arg(long, overrides_with = "no_open")]
    open: bool,

    /// Do not open the browser on startup.
    #[arg(long, overrides_with = "open")]
    no_open: bool,

    /// Where to inject the reload script (default: body).
    #[arg(long, value_enum)]
    inject_anchor: Option<AnchorArg>,

    /// Bust asset caches before each reload.
    #[arg(long)]
    cache_bust: bool,

    /// Enable verbose output (log watcher and reload activity).
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServeArgs {
    /// Start the server and run until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the watcher cannot start, or
    /// the address cannot be bound.
    pub(crate) async fn execute(self, output: &Output) -> Result<(), CliError> {
        let cli_settings = self.cli_settings();
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let server_config = server_config_from_config(&config);

        let server = Server::bind(&server_config).await?;
        let url = browser_url(server.local_addr()?);

        output.serving(&server_config.root, &url);
        output.info(&format!("Debounce: {:?}", server_config.debounce));
        output.info(&format!("Excluding: {}", server_config.exclude.join(", ")));

        if config.server.open_browser
            && let Err(e) = open::that_detached(&url)
        {
            output.warning(&format!("Failed to open browser: {e}"));
        }

        server.run().await?;
        Ok(())
    }

    /// Flags that override the configuration file.
    fn cli_settings(&self) -> CliSettings {
        CliSettings {
            host: self.host.clone(),
            port: self.port,
            root: self.dir.clone(),
            debounce: self.debounce,
            exclude: self.exclude.as_deref().map(split_exclude),
            open_browser: self.resolve_open_browser(),
            anchor: self.inject_anchor.map(InjectAnchor::from),
            cache_bust: self.cache_bust.then_some(true),
        }
    }

    /// Resolve `open_browser` from --open/--no-open flags.
    fn resolve_open_browser(&self) -> Option<bool> {
        self.no_open
            .then_some(false)
            .or(self.open.then_some(true))
    }
}

/// URL to open for a bound address.
///
/// Wildcard binds are opened through localhost.
fn browser_url(addr: SocketAddr) -> String {
    let host = match addr.ip() {
        ip if ip.is_unspecified() => "localhost".to_owned(),
        IpAddr::V4(ip) => ip.to_string(),
        IpAddr::V6(ip) => format!("[{ip}]"),
    };
    format!("http://{host}:{}/", addr.port())
}
