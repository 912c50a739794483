use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

use nexus_project::AppKind;

const CONFIG_VERSION: u32 = 1;
const CONFIG_DIR_NAME: &str = "NEXUS";
const CONFIG_FILE_NAME: &str = "settings.json";

/// Default pause between connection polls.
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 3_000;
/// Default number of polls before giving up (90 s with the default interval).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize config {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to prepare directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("config lock poisoned")]
    Poisoned,
}

/// Platform location of `settings.json` (`~/.config/NEXUS`, `~/Library/Application Support/NEXUS`, `%APPDATA%\NEXUS`).
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NexusConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Parent directory new projects are created in.
    #[serde(default)]
    pub default_location: Option<PathBuf>,
    /// Manually chosen application paths, consulted before the install locations.
    #[serde(default)]
    pub app_overrides: BTreeMap<AppKind, PathBuf>,
    /// Per-project-type folder lists.
    #[serde(default)]
    pub custom_presets: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub resolve: ResolveConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

impl Default for NexusConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            default_location: None,
            app_overrides: BTreeMap::new(),
            custom_presets: BTreeMap::new(),
            resolve: ResolveConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl NexusConfig {
    pub fn sanitize(&mut self) {
        if self.version == 0 {
            self.version = CONFIG_VERSION;
        }
        if matches!(&self.default_location, Some(path) if path.as_os_str().is_empty()) {
            self.default_location = None;
        }
        self.custom_presets.retain(|_, folders| {
            folders.retain(|folder| !folder.trim().is_empty());
            !folders.is_empty()
        });
        self.resolve.sanitize();
        self.retry.sanitize();
    }

    /// Configured project location, falling back to `~/Movies`.
    /// 預設專案位置；未設定時為 `~/Movies`。
    pub fn default_location(&self) -> PathBuf {
        self.default_location.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("Movies")
        })
    }

    pub fn app_override(&self, app: AppKind) -> Option<&Path> {
        self.app_overrides.get(&app).map(PathBuf::as_path)
    }

    /// Stores (or clears with `None`) a manual application path.
    pub fn set_app_override(&mut self, app: AppKind, path: Option<PathBuf>) {
        match path {
            Some(path) if !path.as_os_str().is_empty() => {
                self.app_overrides.insert(app, path);
            }
            _ => {
                self.app_overrides.remove(&app);
            }
        }
    }

    pub fn custom_preset(&self, project_type: &str) -> Option<&[String]> {
        self.custom_presets.get(project_type).map(Vec::as_slice)
    }

    /// Stores a folder list for a project type; `None` restores the default (no preset).
    /// 儲存專案類型的自訂資料夾清單；`None` 代表還原。
    pub fn set_custom_preset(&mut self, project_type: impl Into<String>, folders: Option<Vec<String>>) {
        let project_type = project_type.into();
        match folders {
            Some(folders) => {
                self.custom_presets.insert(project_type, folders);
            }
            None => {
                self.custom_presets.remove(&project_type);
            }
        }
    }
}

/// Bridge settings for DaVinci Resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveConfig {
    /// Directory holding the `DaVinciResolveScript` module; platform default when unset.
    #[serde(default)]
    pub modules_dir: Option<PathBuf>,
    /// Interpreter used to host the bridge.
    #[serde(default = "default_python")]
    pub python: String,
    /// Seconds to wait for a single bridge reply.
    #[serde(default = "default_reply_timeout")]
    pub reply_timeout_secs: u64,
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_reply_timeout() -> u64 {
    20
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            modules_dir: None,
            python: default_python(),
            reply_timeout_secs: default_reply_timeout(),
        }
    }
}

impl ResolveConfig {
    fn sanitize(&mut self) {
        if self.python.trim().is_empty() {
            self.python = default_python();
        }
        if self.reply_timeout_secs == 0 {
            self.reply_timeout_secs = default_reply_timeout();
        }
        self.reply_timeout_secs = self.reply_timeout_secs.clamp(1, 600);
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }
}

/// Bounds of the connection retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_interval_ms() -> u64 {
    DEFAULT_RETRY_INTERVAL_MS
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_RETRY_INTERVAL_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryConfig {
    fn sanitize(&mut self) {
        if self.max_attempts == 0 {
            self.max_attempts = DEFAULT_MAX_ATTEMPTS;
        }
        if self.interval_ms == 0 {
            self.interval_ms = DEFAULT_RETRY_INTERVAL_MS;
        }
        self.interval_ms = self.interval_ms.min(60_000);
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    data: NexusConfig,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>, config: NexusConfig) -> Self {
        Self {
            path: path.into(),
            data: config,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            let mut data = NexusConfig::default();
            data.sanitize();
            return Ok(Self { path, data });
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let mut data: NexusConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
        data.sanitize();
        Ok(Self { path, data })
    }

    pub fn config(&self) -> &NexusConfig {
        &self.data
    }

    /// Applies `op` to a copy and keeps it only once it is on disk.
    /// 在副本上修改，寫入成功後才取代記憶體中的設定。
    pub fn update<F>(&mut self, op: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut NexusConfig),
    {
        let mut staged = self.data.clone();
        op(&mut staged);
        staged.sanitize();
        self.persist(&staged)?;
        self.data = staged;
        Ok(())
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.persist(&self.data)
    }

    fn persist(&self, data: &NexusConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let payload =
            serde_json::to_string_pretty(data).map_err(|source| ConfigError::Serialize {
                path: self.path.clone(),
                source,
            })?;

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, payload.as_bytes()).map_err(|source| ConfigError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })?;
        log::debug!("saved config to {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Process-wide handle to one config file.
/// 同一行程內共用的設定檔存取控制。
///
/// Every read-modify-write runs under a single lock so concurrent workers never
/// interleave their updates. Separate processes are not coordinated.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<Mutex<ConfigStore>>,
}

impl SharedConfig {
    pub fn new(store: ConfigStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        ConfigStore::load(path).map(Self::new)
    }

    /// Copy of the current configuration.
    pub fn snapshot(&self) -> Result<NexusConfig, ConfigError> {
        let guard = self.inner.lock().map_err(|_| ConfigError::Poisoned)?;
        Ok(guard.config().clone())
    }

    /// Applies `op` and persists, all inside the critical section.
    pub fn update<F>(&self, op: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut NexusConfig),
    {
        let mut guard = self.inner.lock().map_err(|_| ConfigError::Poisoned)?;
        guard.update(op)
    }

    pub fn path(&self) -> Result<PathBuf, ConfigError> {
        let guard = self.inner.lock().map_err(|_| ConfigError::Poisoned)?;
        Ok(guard.path().to_path_buf())
    }
}
