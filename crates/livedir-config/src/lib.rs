//! Configuration management for livedir.
//!
//! Parses `livedir.toml` with serde and discovers it in the current directory
//! or any parent. Every value has a default, so running without a config file
//! serves the current directory on port 9222.
//!
//! CLI flags are applied on top of the loaded file via [`CliSettings`].
//!
//! ## Example
//!
//! ```toml
//! [server]
//! host = "${LIVEDIR_HOST:-127.0.0.1}"
//! port = 9222
//! open_browser = false
//!
//! [watch]
//! root = "public"
//! debounce = "150ms"
//! exclude = [".git", "node_modules", ".cache"]
//!
//! [reload]
//! anchor = "head"
//! cache_bust = true
//! ```
//!
//! ## Environment Variable Expansion
//!
//! `server.host` and `watch.root` support `${VAR}` and `${VAR:-default}`.

mod duration;
mod expand;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

pub use duration::parse_duration;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "livedir.toml";

/// Exclusion substrings used when neither the config file nor the CLI set any.
pub const DEFAULT_EXCLUDE: &str = ".git,node_modules,.zig-cache";

/// Reload debounce used when neither the config file nor the CLI set one.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// CLI settings that override configuration file values.
///
/// Only `Some` values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override the served root directory.
    pub root: Option<PathBuf>,
    /// Override the reload debounce.
    pub debounce: Option<Duration>,
    /// Override the exclusion substrings.
    pub exclude: Option<Vec<String>>,
    /// Override browser auto-launch.
    pub open_browser: Option<bool>,
    /// Override the snippet injection anchor.
    pub anchor: Option<InjectAnchor>,
    /// Override asset cache busting in the reload script.
    pub cache_bust: Option<bool>,
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Watcher configuration as written in TOML.
    watch: WatchConfigRaw,
    /// Reload snippet configuration.
    pub reload: ReloadConfig,

    /// Resolved watcher configuration (set after loading).
    #[serde(skip)]
    pub watch_resolved: WatchConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// HTTP server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Open the served URL in the default browser on startup.
    pub open_browser: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 9222,
            open_browser: true,
        }
    }
}

/// Exclusion list as written in TOML: either `".git,dist"` or `[".git", "dist"]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExcludeRaw {
    Csv(String),
    List(Vec<String>),
}

/// Raw watcher configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct WatchConfigRaw {
    root: Option<String>,
    debounce: Option<String>,
    exclude: Option<ExcludeRaw>,
}

/// Resolved watcher configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Directory that is served and watched.
    pub root: PathBuf,
    /// Quiet period before a reload is broadcast.
    pub debounce: Duration,
    /// Path substrings ignored by the watcher.
    pub exclude: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            debounce: DEFAULT_DEBOUNCE,
            exclude: split_exclude(DEFAULT_EXCLUDE),
        }
    }
}

/// Where the reload snippet is spliced into HTML documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum InjectAnchor {
    /// Immediately before the first `</body>`.
    #[default]
    #[serde(rename = "body")]
    BodyClose,
    /// Immediately after the first opening `<head>` tag.
    #[serde(rename = "head")]
    HeadOpen,
}

/// Reload snippet configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Injection anchor.
    pub anchor: InjectAnchor,
    /// Rewrite asset query strings before reloading.
    pub cache_bust: bool,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`watch.root`").
        field: String,
        /// Error message (e.g., "${`SITE_DIR`} not set").
        message: String,
    },
    /// Duration that `humantime` cannot parse.
    #[error("Invalid duration '{input}': {message} (expected e.g. 100ms, 2s, 1m30s)")]
    InvalidDuration {
        /// Raw value as written.
        input: String,
        /// Parser error.
        message: String,
    },
}

/// Split a comma-separated exclusion list.
///
/// Entries are trimmed. Empty entries are kept; the watcher never matches
/// them, so `"a,,b"` behaves like `"a,b"`.
#[must_use]
pub fn split_exclude(csv: &str) -> Vec<String> {
    csv.split(',').map(|s| s.trim().to_owned()).collect()
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file. Otherwise searches
    /// for `livedir.toml` in the current directory and its parents, falling
    /// back to defaults when none is found.
    ///
    /// CLI settings are applied after path resolution and take precedence.
    ///
    /// # Errors
    ///
    /// Returns error if an explicit `config_path` doesn't exist, parsing fails
    /// or the final configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(open_browser) = settings.open_browser {
            self.server.open_browser = open_browser;
        }
        if let Some(root) = &settings.root {
            self.watch_resolved.root.clone_from(root);
        }
        if let Some(debounce) = settings.debounce {
            self.watch_resolved.debounce = debounce;
        }
        if let Some(exclude) = &settings.exclude {
            self.watch_resolved.exclude.clone_from(exclude);
        }
        if let Some(anchor) = settings.anchor {
            self.reload.anchor = anchor;
        }
        if let Some(cache_bust) = settings.cache_bust {
            self.reload.cache_bust = cache_bust;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config serving the current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::default_with_base(&cwd)
    }

    /// Create default config serving `base`.
    fn default_with_base(base: &Path) -> Self {
        Self {
            server: ServerConfig::default(),
            watch: WatchConfigRaw::default(),
            reload: ReloadConfig::default(),
            watch_resolved: WatchConfig {
                root: base.to_path_buf(),
                ..WatchConfig::default()
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_watch(config_dir)?;
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.is_empty() {
            return Err(ConfigError::Validation(
                "server.host cannot be empty".to_owned(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }

        if self.watch_resolved.debounce.is_zero() {
            return Err(ConfigError::Validation(
                "watch.debounce must be greater than 0".to_owned(),
            ));
        }

        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_env(&self.server.host, "server.host")?;

        if let Some(ref root) = self.watch.root {
            self.watch.root = Some(expand::expand_env(root, "watch.root")?);
        }

        Ok(())
    }

    /// Resolve the raw `[watch]` section against the config file directory.
    fn resolve_watch(&mut self, config_dir: &Path) -> Result<(), ConfigError> {
        let root = match self.watch.root.as_deref() {
            Some(root) => config_dir.join(root),
            None => config_dir.to_path_buf(),
        };

        let debounce = match self.watch.debounce.as_deref() {
            Some(raw) => parse_duration(raw)?,
            None => DEFAULT_DEBOUNCE,
        };

        let exclude = match &self.watch.exclude {
            Some(ExcludeRaw::Csv(csv)) => split_exclude(csv),
            Some(ExcludeRaw::List(list)) => list.clone(),
            None => split_exclude(DEFAULT_EXCLUDE),
        };

        self.watch_resolved = WatchConfig {
            root,
            debounce,
            exclude,
        };

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn resolved(toml: &str, config_dir: &Path) -> Config {
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_watch(config_dir).unwrap();
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/site"));
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9222);
        assert!(config.server.open_browser);
        assert_eq!(config.watch_resolved.root, PathBuf::from("/site"));
        assert_eq!(config.watch_resolved.debounce, Duration::from_millis(100));
        assert_eq!(
            config.watch_resolved.exclude,
            vec![".git", "node_modules", ".zig-cache"]
        );
        assert_eq!(config.reload.anchor, InjectAnchor::BodyClose);
        assert!(!config.reload.cache_bust);
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9222);
    }

    #[test]
    fn test_parse_server_config() {
        let toml = r#"
[server]
host = "0.0.0.0"
port = 8000
open_browser = false
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert!(!config.server.open_browser);
    }

    #[test]
    fn test_parse_reload_config() {
        let toml = r#"
[reload]
anchor = "head"
cache_bust = true
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.reload.anchor, InjectAnchor::HeadOpen);
        assert!(config.reload.cache_bust);
    }

    #[test]
    fn test_parse_unknown_anchor_fails() {
        let toml = r#"
[reload]
anchor = "footer"
"#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn test_resolve_watch_relative_root() {
        let toml = r#"
[watch]
root = "public"
debounce = "250ms"
"#;
        let config = resolved(toml, Path::new("/project"));
        assert_eq!(config.watch_resolved.root, PathBuf::from("/project/public"));
        assert_eq!(config.watch_resolved.debounce, Duration::from_millis(250));
    }

    #[test]
    fn test_resolve_watch_defaults_to_config_dir() {
        let config = resolved("", Path::new("/project"));
        assert_eq!(config.watch_resolved.root, PathBuf::from("/project"));
    }

    #[test]
    fn test_resolve_watch_absolute_root() {
        let toml = r#"
[watch]
root = "/var/www"
"#;
        let config = resolved(toml, Path::new("/project"));
        assert_eq!(config.watch_resolved.root, PathBuf::from("/var/www"));
    }

    #[test]
    fn test_resolve_watch_exclude_csv() {
        let toml = r#"
[watch]
exclude = ".git, dist ,"
"#;
        let config = resolved(toml, Path::new("/project"));
        assert_eq!(config.watch_resolved.exclude, vec![".git", "dist", ""]);
    }

    #[test]
    fn test_resolve_watch_exclude_list() {
        let toml = r#"
[watch]
exclude = ["target", ".cache"]
"#;
        let config = resolved(toml, Path::new("/project"));
        assert_eq!(config.watch_resolved.exclude, vec!["target", ".cache"]);
    }

    #[test]
    fn test_resolve_watch_invalid_debounce() {
        let toml = r#"
[watch]
debounce = "soon"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        let err = config.resolve_watch(Path::new("/project")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDuration { .. }));
    }

    #[test]
    fn test_split_exclude() {
        assert_eq!(split_exclude("a,b"), vec!["a", "b"]);
        assert_eq!(split_exclude(""), vec![""]);
        assert_eq!(split_exclude(" .git , node_modules"), vec![".git", "node_modules"]);
    }

    #[test]
    fn test_apply_cli_settings_overrides() {
        let mut config = Config::default_with_base(Path::new("/site"));
        let settings = CliSettings {
            host: Some("0.0.0.0".to_owned()),
            port: Some(3000),
            root: Some(PathBuf::from("dist")),
            debounce: Some(Duration::from_millis(20)),
            exclude: Some(vec!["tmp".to_owned()]),
            open_browser: Some(false),
            anchor: Some(InjectAnchor::HeadOpen),
            cache_bust: Some(true),
        };
        config.apply_cli_settings(&settings);

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert!(!config.server.open_browser);
        assert_eq!(
            config.watch_resolved,
            WatchConfig {
                root: PathBuf::from("dist"),
                debounce: Duration::from_millis(20),
                exclude: vec!["tmp".to_owned()],
            }
        );
        assert_eq!(config.reload.anchor, InjectAnchor::HeadOpen);
        assert!(config.reload.cache_bust);
    }

    #[test]
    fn test_apply_cli_settings_empty() {
        let mut config = Config::default_with_base(Path::new("/site"));
        config.apply_cli_settings(&CliSettings::default());

        assert_eq!(config.server.port, 9222);
        assert_eq!(config.watch_resolved, WatchConfig {
            root: PathBuf::from("/site"),
            ..WatchConfig::default()
        });
    }

    #[test]
    fn test_expand_env_vars_root() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("LIVEDIR_TEST_SITE", "build");
        }

        let toml = r#"
[watch]
root = "${LIVEDIR_TEST_SITE}/html"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.expand_env_vars().unwrap();
        config.resolve_watch(Path::new("/project")).unwrap();

        assert_eq!(
            config.watch_resolved.root,
            PathBuf::from("/project/build/html")
        );

        unsafe {
            std::env::remove_var("LIVEDIR_TEST_SITE");
        }
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(
            &path,
            "[server]\nport = 4000\n\n[watch]\nroot = \"www\"\n",
        )
        .unwrap();

        let config = Config::load(Some(&path), None).unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.watch_resolved.root, dir.path().join("www"));
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/livedir.toml")), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_rejects_zero_debounce_from_cli() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "").unwrap();

        let settings = CliSettings {
            debounce: Some(Duration::ZERO),
            ..CliSettings::default()
        };
        let err = Config::load(Some(&path), Some(&settings)).unwrap_err();
        assert!(err.to_string().contains("watch.debounce"));
    }

    #[test]
    fn test_validate_default_config_passes() {
        let config = Config::default_with_base(Path::new("/site"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_server_host_empty() {
        let mut config = Config::default_with_base(Path::new("/site"));
        config.server.host = String::new();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("server.host"));
    }

    #[test]
    fn test_validate_server_port_zero() {
        let mut config = Config::default_with_base(Path::new("/site"));
        config.server.port = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.port"));
    }
}
