//! Call surface of a running DaVinci Resolve instance.
//! 與執行中的 DaVinci Resolve 溝通的呼叫介面。
//!
//! The trait mirrors the scripting API one call at a time. Failures carry a
//! [`BridgeErrorKind`] so callers decide about retries by value, never by message text.

mod host;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use host::{ResolveHost, ResolveHostConnector};

/// Structured reason a bridge call failed.
/// 橋接呼叫失敗的結構化原因。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeErrorKind {
    /// The application is not running.
    NotRunning,
    /// The application did not answer in time.
    NoResponse,
    /// The application answered and refused the operation (e.g. name collision).
    Rejected,
    /// The scripting module is not installed on this machine.
    Unavailable,
    Other,
}

impl BridgeErrorKind {
    /// Only transient non-readiness is worth another attempt.
    /// 只有暫時性的未就緒狀態值得重試。
    pub fn is_retryable(self) -> bool {
        matches!(self, BridgeErrorKind::NotRunning | BridgeErrorKind::NoResponse)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BridgeErrorKind::NotRunning => "not running",
            BridgeErrorKind::NoResponse => "no response",
            BridgeErrorKind::Rejected => "rejected",
            BridgeErrorKind::Unavailable => "unavailable",
            BridgeErrorKind::Other => "error",
        }
    }
}

impl fmt::Display for BridgeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bridge failure: a kind for programs, a message for people.
/// 橋接錯誤：種類供程式判斷，訊息供使用者閱讀。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct BridgeError {
    pub kind: BridgeErrorKind,
    pub message: String,
}

impl BridgeError {
    pub fn new(kind: BridgeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_running(message: impl Into<String>) -> Self {
        Self::new(BridgeErrorKind::NotRunning, message)
    }

    pub fn no_response(message: impl Into<String>) -> Self {
        Self::new(BridgeErrorKind::NoResponse, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(BridgeErrorKind::Rejected, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(BridgeErrorKind::Unavailable, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Prefixes the message while keeping the kind.
    pub fn context(mut self, context: impl fmt::Display) -> Self {
        self.message = format!("{context}: {}", self.message);
        self
    }
}

/// Opaque reference to a project object held by the bridge session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectRef(pub u64);

/// Opaque reference to a media-pool folder (bin) held by the bridge session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderRef(pub u64);

/// Media pool of a project together with its root bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPool {
    pub pool: u64,
    pub root: FolderRef,
}

/// Synchronous calls against a live application session.
/// 對執行中應用程式工作階段的同步呼叫。
pub trait ResolveBridge {
    /// Creates and opens a new project; refuses existing names.
    fn create_project(&mut self, name: &str) -> Result<ProjectRef, BridgeError>;
    fn get_media_pool(&mut self, project: ProjectRef) -> Result<MediaPool, BridgeError>;
    fn add_subfolder(
        &mut self,
        pool: &MediaPool,
        parent: FolderRef,
        name: &str,
    ) -> Result<FolderRef, BridgeError>;
    fn set_setting(
        &mut self,
        project: ProjectRef,
        key: &str,
        value: &str,
    ) -> Result<(), BridgeError>;
    /// Writes the named project as an archive; with `overwrite == false` an existing file is refused.
    fn export_project(&mut self, name: &str, path: &Path, overwrite: bool)
        -> Result<(), BridgeError>;
    fn import_project(&mut self, path: &Path) -> Result<(), BridgeError>;
    fn load_project(&mut self, name: &str) -> Result<ProjectRef, BridgeError>;
    /// Currently open project, if any.
    fn get_current_project(&mut self) -> Result<Option<ProjectRef>, BridgeError>;
    fn get_project_name(&mut self, project: ProjectRef) -> Result<String, BridgeError>;
}

/// Opens bridge sessions; each call is an independent reachability check.
/// 建立橋接工作階段；每次呼叫都會重新檢查是否可連線。
pub trait BridgeConnector {
    type Bridge: ResolveBridge;

    fn connect(&self) -> Result<Self::Bridge, BridgeError>;
}

/// Explicit bridge configuration injected into the connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Directory holding `DaVinciResolveScript`; platform default when `None`.
    pub modules_dir: Option<PathBuf>,
    pub python: String,
    pub reply_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            modules_dir: None,
            python: "python3".to_string(),
            reply_timeout: Duration::from_secs(20),
        }
    }
}

impl BridgeConfig {
    /// Configured module directory, or the install location for this platform.
    pub fn effective_modules_dir(&self) -> Option<PathBuf> {
        self.modules_dir.clone().or_else(default_modules_dir)
    }
}

/// Where Resolve installs its scripting modules.
pub fn default_modules_dir() -> Option<PathBuf> {
    if cfg!(target_os = "macos") {
        Some(PathBuf::from(
            "/Library/Application Support/Blackmagic Design/DaVinci Resolve/Developer/Scripting/Modules",
        ))
    } else if cfg!(target_os = "windows") {
        Some(PathBuf::from(
            r"C:\ProgramData\Blackmagic Design\DaVinci Resolve\Support\Developer\Scripting\Modules",
        ))
    } else if cfg!(target_os = "linux") {
        Some(PathBuf::from("/opt/resolve/Developer/Scripting/Modules"))
    } else {
        None
    }
}
