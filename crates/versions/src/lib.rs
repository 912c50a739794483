//! Version history of a project's canonical document.
//! 專案主檔的版本紀錄：命名、探索、配號、快照與還原。

mod error;
pub mod history;
pub mod naming;
pub mod snapshot;

pub use error::VersionError;
pub use history::{discover_versions, next_version, version_of, VersionSnapshot, VersionTarget};
pub use naming::{version_file_name, version_label, VersionPattern};
pub use snapshot::{
    create_snapshot, restore_version, RestoreOutcome, SnapshotOutcome, SnapshotSource,
};
