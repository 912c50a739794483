//! Smart snapshot and restore.
//! 智慧快照與還原。
//!
//! A snapshot prefers the live state of the running application and falls back to
//! copying the canonical file. A restore always takes a snapshot first, so history
//! only ever grows.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use nexus_nle::ResolveBridge;

use crate::error::VersionError;
use crate::history::{discover_versions, next_version, version_of, VersionTarget};

/// Where a snapshot's bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    /// Exported from the open document in the running application.
    Live,
    /// Copied from the canonical file on disk.
    Copied,
}

impl fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotSource::Live => f.write_str("live state"),
            SnapshotSource::Copied => f.write_str("file copy"),
        }
    }
}

/// Result of a successful snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotOutcome {
    pub version: u32,
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    pub source: SnapshotSource,
    /// Set when the application had a different document open.
    pub note: Option<String>,
}

impl SnapshotOutcome {
    pub fn message(&self) -> String {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut message = format!(
            "snapshot saved: {file_name} ({:.1} MB, {})",
            self.size as f64 / (1024.0 * 1024.0),
            self.source
        );
        if let Some(note) = &self.note {
            message.push_str("; ");
            message.push_str(note);
        }
        message
    }
}

/// Result of a successful restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub restored_from: PathBuf,
    pub canonical: PathBuf,
    /// Backup of the pre-restore state, when a canonical file existed.
    pub backup: Option<SnapshotOutcome>,
}

impl RestoreOutcome {
    /// The running application keeps its in-memory copy; the operator must reload.
    pub fn message(&self) -> String {
        let name = |path: &Path| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        let mut message = format!(
            "{} restored to {}",
            name(&self.restored_from),
            name(&self.canonical)
        );
        if let Some(backup) = &self.backup {
            message.push_str(&format!(" (previous state kept as {})", name(&backup.path)));
        }
        message.push_str("; reload it in Resolve via File > Import Project");
        message
    }
}

/// Writes the next version of `target`.
/// 建立下一個版本快照。
///
/// With a bridge whose open document carries this project's name, the live state
/// is exported. Otherwise, or if that export fails, the canonical file is copied.
/// When a different document is open the copy still happens and the outcome
/// carries a note; that copy may be older than what the operator sees on screen.
pub fn create_snapshot(
    target: &VersionTarget,
    bridge: Option<&mut dyn ResolveBridge>,
) -> Result<SnapshotOutcome, VersionError> {
    let version = next_version(&discover_versions(target)?)?;
    let path = target.version_path(version);

    let mut note = None;
    if let Some(bridge) = bridge {
        match open_document_name(bridge) {
            Ok(Some(open)) if open == target.name => {
                match bridge.export_project(&target.name, &path, false) {
                    Ok(()) => {
                        log::info!("snapshot {} exported from live document", path.display());
                        return finish(version, path, SnapshotSource::Live, None);
                    }
                    Err(err) => {
                        log::warn!("live export of '{}' failed, copying instead: {err}", open);
                        discard_partial(&path);
                    }
                }
            }
            Ok(Some(open)) => {
                log::warn!(
                    "Resolve has '{open}' open instead of '{}'; copying the canonical file",
                    target.name
                );
                note = Some(format!(
                    "Resolve has '{open}' open, so the saved file was copied instead"
                ));
            }
            Ok(None) => log::info!("no document open in Resolve; copying the canonical file"),
            Err(err) => log::debug!("bridge not usable for snapshot: {err}"),
        }
    }

    let canonical = target.canonical_file();
    if !canonical.is_file() {
        return Err(VersionError::CanonicalMissing(canonical));
    }
    copy_new(&canonical, &path)?;
    log::info!("snapshot {} copied from {}", path.display(), canonical.display());
    finish(version, path, SnapshotSource::Copied, note)
}

/// Replaces the canonical file with `version_file` after snapshotting the current state.
/// 先快照目前狀態，再以指定版本覆寫主檔。
///
/// If the backup cannot be taken nothing is overwritten.
pub fn restore_version(
    target: &VersionTarget,
    version_file: &Path,
    bridge: Option<&mut dyn ResolveBridge>,
) -> Result<RestoreOutcome, VersionError> {
    version_of(target, version_file)?;
    if !version_file.is_file() {
        return Err(VersionError::VersionMissing(version_file.to_path_buf()));
    }

    let canonical = target.canonical_file();
    let backup = if canonical.exists() {
        let backup = create_snapshot(target, bridge)
            .map_err(|err| VersionError::BackupFailed(Box::new(err)))?;
        Some(backup)
    } else {
        None
    };

    fs::copy(version_file, &canonical).map_err(|source| VersionError::Copy {
        from: version_file.to_path_buf(),
        to: canonical.clone(),
        source,
    })?;
    log::info!("restored {} over {}", version_file.display(), canonical.display());
    Ok(RestoreOutcome {
        restored_from: version_file.to_path_buf(),
        canonical,
        backup,
    })
}

fn open_document_name(
    bridge: &mut dyn ResolveBridge,
) -> Result<Option<String>, nexus_nle::BridgeError> {
    match bridge.get_current_project()? {
        Some(project) => bridge.get_project_name(project).map(Some),
        None => Ok(None),
    }
}

/// Copies without ever replacing an existing file.
fn copy_new(from: &Path, to: &Path) -> Result<(), VersionError> {
    let copy_err = |source: io::Error| VersionError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };
    let mut reader = File::open(from).map_err(copy_err)?;
    let mut writer = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(to)
        .map_err(copy_err)?;
    io::copy(&mut reader, &mut writer).map_err(copy_err)?;
    Ok(())
}

// The version number was free before the export, so anything there now is ours.
fn discard_partial(path: &Path) {
    if path.exists() {
        if let Err(err) = fs::remove_file(path) {
            log::warn!("could not remove partial export {}: {err}", path.display());
        }
    }
}

fn finish(
    version: u32,
    path: PathBuf,
    source: SnapshotSource,
    note: Option<String>,
) -> Result<SnapshotOutcome, VersionError> {
    let size = fs::metadata(&path)
        .map_err(|source| VersionError::Metadata {
            path: path.clone(),
            source,
        })?
        .len();
    Ok(SnapshotOutcome {
        version,
        path,
        size,
        source,
        note,
    })
}
