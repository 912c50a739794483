use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use nexus_nle::resolve::ARCHIVE_EXTENSION;
use nexus_project::ProjectDescriptor;

use crate::error::VersionError;
use crate::naming::{version_file_name, version_label, VersionPattern};

/// Project whose history is managed: a folder, a name and a document extension.
/// 版本紀錄所屬的專案。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTarget {
    pub folder: PathBuf,
    pub name: String,
    pub extension: String,
}

impl VersionTarget {
    pub fn new(folder: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            name: name.into(),
            extension: ARCHIVE_EXTENSION.to_string(),
        }
    }

    pub fn from_project(project: &ProjectDescriptor) -> Self {
        Self::new(project.root(), project.name.clone())
    }

    /// The unversioned document the application edits, e.g. `Promo.drp`.
    pub fn canonical_file(&self) -> PathBuf {
        self.folder.join(format!("{}.{}", self.name, self.extension))
    }

    pub fn version_path(&self, version: u32) -> PathBuf {
        self.folder
            .join(version_file_name(&self.name, version, &self.extension))
    }

    pub fn pattern(&self) -> Result<VersionPattern, VersionError> {
        Ok(VersionPattern::new(&self.name, &self.extension)?)
    }
}

/// One version file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSnapshot {
    pub version: u32,
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    pub modified: DateTime<Local>,
    pub label: String,
}

/// Scans the project folder for version files, newest first.
/// 掃描專案資料夾中的版本檔，依版本由新到舊排序。
///
/// Nothing is cached; every call reflects the folder as it is now. A missing
/// folder has no versions.
pub fn discover_versions(target: &VersionTarget) -> Result<Vec<VersionSnapshot>, VersionError> {
    let pattern = target.pattern()?;
    let entries = match fs::read_dir(&target.folder) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(VersionError::Scan {
                path: target.folder.clone(),
                source,
            })
        }
    };

    let mut versions = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| VersionError::Scan {
            path: target.folder.clone(),
            source,
        })?;
        let file_name = entry.file_name();
        let Some(version) = file_name.to_str().and_then(|name| pattern.parse(name)) else {
            continue;
        };
        let path = entry.path();
        let metadata = entry.metadata().map_err(|source| VersionError::Metadata {
            path: path.clone(),
            source,
        })?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata
            .modified()
            .map(DateTime::<Local>::from)
            .unwrap_or_else(|_| Local::now());
        versions.push(VersionSnapshot {
            version,
            path,
            size: metadata.len(),
            modified,
            label: version_label(version),
        });
    }
    versions.sort_by(|a, b| b.version.cmp(&a.version));
    Ok(versions)
}

/// Next free version number: highest existing plus one. Gaps are never reused.
/// 下一個版本號：現有最大值加一，不回填空缺。
pub fn next_version(versions: &[VersionSnapshot]) -> Result<u32, VersionError> {
    match versions.iter().map(|snapshot| snapshot.version).max() {
        None => Ok(1),
        Some(highest) => highest
            .checked_add(1)
            .ok_or(VersionError::Exhausted(highest)),
    }
}

/// Checks that `path` is one of `target`'s version files and returns its number.
pub fn version_of(target: &VersionTarget, path: &Path) -> Result<u32, VersionError> {
    let pattern = target.pattern()?;
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| pattern.parse(name))
        .ok_or_else(|| VersionError::NotAVersion(path.to_path_buf()))
}
