use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tree::{FolderPathError, TreePlan};

/// Characters rejected in project names (they are illegal in Windows file names).
/// 專案名稱禁止使用的字元（Windows 檔名不允許）。
pub const FORBIDDEN_NAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Editing applications a project can be bootstrapped into.
/// 可建立專案的剪輯應用程式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppKind {
    Resolve,
    Premiere,
    AfterEffects,
}

impl AppKind {
    pub const ALL: [AppKind; 3] = [AppKind::Resolve, AppKind::Premiere, AppKind::AfterEffects];

    /// Stable key used in configuration files.
    pub fn key(self) -> &'static str {
        match self {
            AppKind::Resolve => "resolve",
            AppKind::Premiere => "premiere",
            AppKind::AfterEffects => "after_effects",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            AppKind::Resolve => "DaVinci Resolve",
            AppKind::Premiere => "Adobe Premiere Pro",
            AppKind::AfterEffects => "Adobe After Effects",
        }
    }
}

impl fmt::Display for AppKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for AppKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "resolve" | "davinci" => Ok(AppKind::Resolve),
            "premiere" => Ok(AppKind::Premiere),
            "after_effects" | "after-effects" | "ae" => Ok(AppKind::AfterEffects),
            other => Err(format!("unknown application '{other}'")),
        }
    }
}

/// Technical delivery settings chosen for a project, kept as human labels.
/// 專案的技術規格（以使用者可讀標籤保存）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnicalSpec {
    #[serde(default)]
    pub resolution: String,
    #[serde(default)]
    pub fps: String,
    #[serde(default)]
    pub colorspace: String,
    #[serde(default)]
    pub samplerate: String,
}

/// A project as supplied by the caller, also serialised verbatim as the metadata sidecar.
/// 呼叫端提供的專案描述，同時作為 `project.json` 內容。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    pub name: String,
    #[serde(default)]
    pub client: String,
    pub location: PathBuf,
    #[serde(rename = "type", default)]
    pub project_type: String,
    #[serde(default)]
    pub folders: Vec<String>,
    #[serde(default)]
    pub spec: TechnicalSpec,
    pub created_at: DateTime<Local>,
    pub last_opened: DateTime<Local>,
}

impl ProjectDescriptor {
    pub fn new(name: impl Into<String>, location: impl Into<PathBuf>) -> Self {
        let now = Local::now();
        Self {
            name: name.into().trim().to_string(),
            client: String::new(),
            location: location.into(),
            project_type: String::new(),
            folders: Vec::new(),
            spec: TechnicalSpec::default(),
            created_at: now,
            last_opened: now,
        }
    }

    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = client.into();
        self
    }

    pub fn with_type(mut self, project_type: impl Into<String>) -> Self {
        self.project_type = project_type.into();
        self
    }

    pub fn with_folders<I, S>(mut self, folders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.folders = folders.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_spec(mut self, spec: TechnicalSpec) -> Self {
        self.spec = spec;
        self
    }

    /// Project root directory: `location/name`.
    /// 專案根目錄。
    pub fn root(&self) -> PathBuf {
        self.location.join(&self.name)
    }

    /// Checks the descriptor before any side effect takes place.
    /// 在任何副作用發生前檢查描述內容。
    pub fn validate(&self) -> Result<(), ValidationIssue> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationIssue::EmptyName);
        }
        let bad: Vec<char> = name
            .chars()
            .filter(|ch| FORBIDDEN_NAME_CHARS.contains(ch))
            .collect();
        if !bad.is_empty() {
            return Err(ValidationIssue::ForbiddenCharacters(bad));
        }
        if name.chars().any(char::is_control) {
            return Err(ValidationIssue::ControlCharacters);
        }
        if self.location.as_os_str().is_empty() {
            return Err(ValidationIssue::EmptyLocation);
        }
        if !self.location.exists() {
            return Err(ValidationIssue::MissingLocation(self.location.clone()));
        }
        Ok(())
    }

    /// Builds the creation plan for this project's folder list.
    pub fn folder_plan(&self) -> Result<TreePlan, ValidationIssue> {
        if self.folders.is_empty() {
            return Err(ValidationIssue::NoFolders);
        }
        TreePlan::from_paths(&self.folders).map_err(ValidationIssue::InvalidFolder)
    }

    /// Canonical (unversioned) file for the given extension, e.g. `Name.drp`.
    pub fn canonical_file(&self, extension: &str) -> PathBuf {
        self.root().join(format!("{}.{}", self.name, extension))
    }

    pub fn touch(&mut self) {
        self.last_opened = Local::now();
    }
}

/// Chooses the folder list: explicit folders win, otherwise the configured preset.
/// 決定資料夾清單：明確指定者優先，其次為設定中的自訂預設。
pub fn resolve_folders(explicit: &[String], preset: Option<&[String]>) -> Vec<String> {
    if !explicit.is_empty() {
        return explicit.to_vec();
    }
    preset.map(<[String]>::to_vec).unwrap_or_default()
}

/// Reasons a project is rejected before anything touches the disk.
/// 專案在寫入磁碟前被拒絕的原因。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationIssue {
    #[error("project name is empty")]
    EmptyName,
    #[error("project name contains forbidden characters: {}", format_chars(.0))]
    ForbiddenCharacters(Vec<char>),
    #[error("project name contains control characters")]
    ControlCharacters,
    #[error("project location is empty")]
    EmptyLocation,
    #[error("project location does not exist: {}", .0.display())]
    MissingLocation(PathBuf),
    #[error("no folders to create")]
    NoFolders,
    #[error(transparent)]
    InvalidFolder(FolderPathError),
}

fn format_chars(chars: &[char]) -> String {
    chars
        .iter()
        .map(|ch| ch.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
