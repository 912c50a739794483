use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by snapshot discovery, creation and restore.
/// 版本快照相關錯誤。
#[derive(Debug, Error)]
pub enum VersionError {
    #[error("invalid version pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("failed to scan {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read metadata for {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} not found; open the project in Resolve and snapshot from there", .0.display())]
    CanonicalMissing(PathBuf),
    #[error("{} is not a version file of this project", .0.display())]
    NotAVersion(PathBuf),
    #[error("version file {} does not exist", .0.display())]
    VersionMissing(PathBuf),
    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no version number left after V{0}")]
    Exhausted(u32),
    #[error("backup before restore failed: {0}")]
    BackupFailed(#[source] Box<VersionError>),
}
