//! Configuration for casinoscrape.
//!
//! Settings come from built-in defaults, then a config file (auto-discovered
//! by `prefer`, or given explicitly), then command-line overrides. The file
//! is split into sections:
//!
//! ```toml
//! [storage]
//! dir = "~/casino-data"
//! database = "casinos.db"
//!
//! [fetch]
//! attempts = 3
//! relay_url = ""          # empty disables the relay strategy
//!
//! [server]
//! bind = "0.0.0.0:3030"
//!
//! [[profiles]]
//! name = "mirror"
//! host_pattern = "mirror.example"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::scrapers::fetch::{
    DEFAULT_ALLORIGINS_URL, DEFAULT_CODETABS_URL, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY_MS,
};
use crate::scrapers::SelectorProfile;

/// Wait after a failed parse before retrying or giving up (seconds).
pub const DEFAULT_COURTESY_DELAY_SECS: u64 = 30;

/// Address for the relay/API server.
pub const DEFAULT_BIND: &str = "127.0.0.1:3030";

const APP_NAME: &str = "casinoscrape";

const DISCOVERED_EXTENSIONS: &[&str] = &["toml", "json"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub database_filename: String,
    /// User agent for relay requests.
    pub user_agent: String,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Attempts per fetch strategy.
    pub fetch_attempts: u32,
    pub fetch_retry_delay_ms: u64,
    /// Courtesy delay after a failed parse, in seconds.
    pub courtesy_delay_secs: u64,
    pub codetabs_url: String,
    pub allorigins_url: String,
    /// Our own relay endpoint. `None` disables that strategy.
    pub relay_url: Option<String>,
    pub bind: String,
    /// Extra selector profiles, consulted before the built-in ones.
    pub profiles: Vec<SelectorProfile>,
}

impl Default for Settings {
    fn default() -> Self {
        // Documents dir, then home, then cwd.
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME);

        Self {
            data_dir,
            database_filename: format!("{}.db", APP_NAME),
            user_agent: format!("{}/{}", APP_NAME, env!("CARGO_PKG_VERSION")),
            request_timeout: 30,
            fetch_attempts: DEFAULT_MAX_ATTEMPTS,
            fetch_retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            courtesy_delay_secs: DEFAULT_COURTESY_DELAY_SECS,
            codetabs_url: DEFAULT_CODETABS_URL.to_string(),
            allorigins_url: DEFAULT_ALLORIGINS_URL.to_string(),
            relay_url: Some(format!("http://{}/api/proxy", DEFAULT_BIND)),
            bind: DEFAULT_BIND.to_string(),
            profiles: Vec::new(),
        }
    }
}

impl Settings {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Data directory; relative paths resolve against the config file.
    pub dir: Option<String>,
    pub database: Option<String>,
}

/// `[fetch]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSection {
    pub user_agent: Option<String>,
    pub timeout_secs: Option<u64>,
    pub attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub courtesy_delay_secs: Option<u64>,
    pub codetabs_url: Option<String>,
    pub allorigins_url: Option<String>,
    pub relay_url: Option<String>,
}

/// `[server]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: Option<String>,
}

/// Parsed config file. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub storage: StorageSection,
    pub fetch: FetchSection,
    pub server: ServerSection,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<SelectorProfile>,

    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl ConfigFile {
    /// Look for `casinoscrape.toml` or `casinoscrape.json` in prefer's
    /// standard search paths (cwd, XDG config dirs, home, /etc, ...).
    pub async fn discover() -> Self {
        Self::discover_in(&prefer::discovery::get_search_paths()).await
    }

    /// First matching file in `search_paths`, in order. Nothing found or an
    /// unreadable file yields an empty config.
    async fn discover_in(search_paths: &[PathBuf]) -> Self {
        for dir in search_paths {
            for ext in DISCOVERED_EXTENSIONS {
                let path = dir.join(format!("{}.{}", APP_NAME, ext));
                if tokio::fs::metadata(&path).await.is_err() {
                    continue;
                }
                debug!("Using config file {}", path.display());
                return Self::read(&path).await.unwrap_or_else(|e| {
                    warn!("{}; using defaults", e);
                    Self::default()
                });
            }
        }
        debug!("No config file discovered");
        Self::default()
    }

    /// Read an explicit file. `.toml` is parsed as TOML, anything else as JSON.
    pub async fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

        if is_toml {
            toml::from_str(contents).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            })
        } else {
            serde_json::from_str(contents).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    /// Directory holding the config file, if it came from one.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
    }

    /// Overlay every value present in the file onto `settings`.
    pub fn apply(&self, settings: &mut Settings, base_dir: &Path) {
        let storage = &self.storage;
        if let Some(dir) = &storage.dir {
            settings.data_dir = resolve_path(dir, base_dir);
        }
        if let Some(database) = &storage.database {
            settings.database_filename = database.clone();
        }

        let fetch = &self.fetch;
        if let Some(user_agent) = &fetch.user_agent {
            settings.user_agent = user_agent.clone();
        }
        if let Some(timeout) = fetch.timeout_secs {
            settings.request_timeout = timeout;
        }
        if let Some(attempts) = fetch.attempts {
            settings.fetch_attempts = attempts.max(1);
        }
        if let Some(delay) = fetch.retry_delay_ms {
            settings.fetch_retry_delay_ms = delay;
        }
        if let Some(delay) = fetch.courtesy_delay_secs {
            settings.courtesy_delay_secs = delay;
        }
        if let Some(url) = &fetch.codetabs_url {
            settings.codetabs_url = url.clone();
        }
        if let Some(url) = &fetch.allorigins_url {
            settings.allorigins_url = url.clone();
        }
        if let Some(url) = &fetch.relay_url {
            settings.relay_url = Some(url.trim())
                .filter(|u| !u.is_empty())
                .map(str::to_string);
        }

        if let Some(bind) = &self.server.bind {
            settings.bind = bind.clone();
        }
        if !self.profiles.is_empty() {
            settings.profiles = self.profiles.clone();
        }
    }
}

/// Expand `~`; join relative paths onto `base_dir`.
fn resolve_path(raw: &str, base_dir: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(raw);
    let path = Path::new(expanded.as_ref());
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Command-line inputs that shape settings loading.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file; skips discovery.
    pub config_path: Option<PathBuf>,
    /// Resolve relative paths against the cwd instead of the config file.
    pub use_cwd: bool,
    /// `--data-dir`, applied last.
    pub data_dir: Option<PathBuf>,
}

pub async fn load_settings_with_options(options: LoadOptions) -> Settings {
    let config = match &options.config_path {
        Some(path) => ConfigFile::read(path).await.unwrap_or_else(|e| {
            warn!("{}; using defaults", e);
            ConfigFile::default()
        }),
        None => ConfigFile::discover().await,
    };

    let cwd = || std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = if options.use_cwd {
        cwd()
    } else {
        config.base_dir().unwrap_or_else(cwd)
    };

    let mut settings = Settings::default();
    config.apply(&mut settings, &base_dir);
    if let Some(data_dir) = options.data_dir {
        settings.data_dir = data_dir;
    }
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overrides() {
        let config: ConfigFile = serde_json::from_str(
            r#"{
                "storage": {"dir": "data"},
                "fetch": {"attempts": 0, "courtesy_delay_secs": 5, "relay_url": "  "},
                "profiles": [{"name": "mirror", "host_pattern": "mirror.test"}]
            }"#,
        )
        .unwrap();

        let mut settings = Settings::default();
        config.apply(&mut settings, Path::new("/srv/app"));

        assert_eq!(settings.data_dir, PathBuf::from("/srv/app/data"));
        assert_eq!(settings.fetch_attempts, 1);
        assert_eq!(settings.courtesy_delay_secs, 5);
        assert_eq!(settings.relay_url, None);
        assert_eq!(settings.bind, DEFAULT_BIND);
        assert_eq!(settings.profiles.len(), 1);
        assert_eq!(settings.profiles[0].logo, ".casino-logo");
    }

    #[test]
    fn test_toml_sections() {
        let config = ConfigFile::parse(
            "[storage]\ndatabase = \"other.db\"\n\n[server]\nbind = \"0.0.0.0:9000\"\n\n\
             [[profiles]]\nname = \"x\"\nhost_pattern = \"x.test\"\n",
            Path::new("casinoscrape.toml"),
        )
        .unwrap();
        assert_eq!(config.storage.database.as_deref(), Some("other.db"));
        assert_eq!(config.server.bind.as_deref(), Some("0.0.0.0:9000"));
        assert_eq!(config.profiles[0].name, "x");
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = ConfigFile::parse("{not json", Path::new("bad.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Json { .. }));
        assert!(err.to_string().contains("bad.json"));
    }

    #[tokio::test]
    async fn test_read_records_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("casinoscrape.json");
        std::fs::write(&path, r#"{"server": {"bind": "0.0.0.0:8080"}}"#).unwrap();

        let config = ConfigFile::read(&path).await.unwrap();
        assert_eq!(config.server.bind.as_deref(), Some("0.0.0.0:8080"));
        assert_eq!(config.base_dir().as_deref(), Some(dir.path()));
    }

    #[tokio::test]
    async fn test_discover_first_match_in_search_order() {
        let empty = tempfile::tempdir().unwrap();
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(
            first.path().join("casinoscrape.toml"),
            "[fetch]\nattempts = 5\n\n[[profiles]]\nname = \"mirror\"\nhost_pattern = \"m.test\"\n",
        )
        .unwrap();
        std::fs::write(second.path().join("casinoscrape.json"), r#"{"fetch": {"attempts": 9}}"#)
            .unwrap();

        let dirs = [
            empty.path().to_path_buf(),
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ];
        let config = ConfigFile::discover_in(&dirs).await;

        assert_eq!(config.fetch.attempts, Some(5));
        assert_eq!(config.profiles[0].name, "mirror");
        assert_eq!(config.base_dir().as_deref(), Some(first.path()));
    }

    #[tokio::test]
    async fn test_discover_nothing_is_default() {
        let empty = tempfile::tempdir().unwrap();
        let config = ConfigFile::discover_in(&[empty.path().to_path_buf()]).await;
        assert!(config.source_path.is_none());
        assert!(config.profiles.is_empty());
    }

    #[tokio::test]
    async fn test_explicit_data_dir_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("casinoscrape.toml");
        std::fs::write(&path, "[storage]\ndir = \"elsewhere\"\n").unwrap();

        let settings = load_settings_with_options(LoadOptions {
            config_path: Some(path),
            use_cwd: false,
            data_dir: Some(PathBuf::from("/tmp/cs")),
        })
        .await;
        assert_eq!(settings.database_path(), PathBuf::from("/tmp/cs/casinoscrape.db"));
    }
}
