use std::fs;
use std::path::{Path, PathBuf};

use nexus_nle::{BridgeError, BridgeErrorKind, FolderRef, MediaPool, ProjectRef, ResolveBridge};
use nexus_versions::{
    create_snapshot, discover_versions, restore_version, SnapshotSource, VersionError,
    VersionTarget,
};
use tempfile::tempdir;

/// Running application with one open document whose live state is `payload`.
struct OpenDocument {
    name: Option<String>,
    payload: Vec<u8>,
    fail_export: bool,
    exports: usize,
}

impl OpenDocument {
    fn named(name: &str, payload: &[u8]) -> Self {
        Self {
            name: Some(name.to_string()),
            payload: payload.to_vec(),
            fail_export: false,
            exports: 0,
        }
    }
}

impl ResolveBridge for OpenDocument {
    fn create_project(&mut self, _name: &str) -> Result<ProjectRef, BridgeError> {
        Err(BridgeError::rejected("unused"))
    }

    fn get_media_pool(&mut self, _project: ProjectRef) -> Result<MediaPool, BridgeError> {
        Err(BridgeError::rejected("unused"))
    }

    fn add_subfolder(
        &mut self,
        _pool: &MediaPool,
        _parent: FolderRef,
        _name: &str,
    ) -> Result<FolderRef, BridgeError> {
        Err(BridgeError::rejected("unused"))
    }

    fn set_setting(&mut self, _: ProjectRef, _: &str, _: &str) -> Result<(), BridgeError> {
        Err(BridgeError::rejected("unused"))
    }

    fn export_project(&mut self, _name: &str, path: &Path, overwrite: bool) -> Result<(), BridgeError> {
        if self.fail_export {
            // Leaves a truncated file behind, like an interrupted export would.
            fs::write(path, b"partial").unwrap();
            return Err(BridgeError::new(BridgeErrorKind::Other, "disk full"));
        }
        assert!(!overwrite);
        assert!(!path.exists(), "export must never overwrite");
        fs::write(path, &self.payload).unwrap();
        self.exports += 1;
        Ok(())
    }

    fn import_project(&mut self, _path: &Path) -> Result<(), BridgeError> {
        Ok(())
    }

    fn load_project(&mut self, _name: &str) -> Result<ProjectRef, BridgeError> {
        Ok(ProjectRef(1))
    }

    fn get_current_project(&mut self) -> Result<Option<ProjectRef>, BridgeError> {
        Ok(self.name.as_ref().map(|_| ProjectRef(1)))
    }

    fn get_project_name(&mut self, _project: ProjectRef) -> Result<String, BridgeError> {
        self.name
            .clone()
            .ok_or_else(|| BridgeError::new(BridgeErrorKind::Other, "no project"))
    }
}

/// Bridge that is never reachable.
struct Offline;

impl ResolveBridge for Offline {
    fn create_project(&mut self, _: &str) -> Result<ProjectRef, BridgeError> {
        Err(BridgeError::not_running("offline"))
    }
    fn get_media_pool(&mut self, _: ProjectRef) -> Result<MediaPool, BridgeError> {
        Err(BridgeError::not_running("offline"))
    }
    fn add_subfolder(&mut self, _: &MediaPool, _: FolderRef, _: &str) -> Result<FolderRef, BridgeError> {
        Err(BridgeError::not_running("offline"))
    }
    fn set_setting(&mut self, _: ProjectRef, _: &str, _: &str) -> Result<(), BridgeError> {
        Err(BridgeError::not_running("offline"))
    }
    fn export_project(&mut self, _: &str, _: &Path, _: bool) -> Result<(), BridgeError> {
        Err(BridgeError::not_running("offline"))
    }
    fn import_project(&mut self, _: &Path) -> Result<(), BridgeError> {
        Err(BridgeError::not_running("offline"))
    }
    fn load_project(&mut self, _: &str) -> Result<ProjectRef, BridgeError> {
        Err(BridgeError::not_running("offline"))
    }
    fn get_current_project(&mut self) -> Result<Option<ProjectRef>, BridgeError> {
        Err(BridgeError::not_running("offline"))
    }
    fn get_project_name(&mut self, _: ProjectRef) -> Result<String, BridgeError> {
        Err(BridgeError::not_running("offline"))
    }
}

fn project_with_canonical(contents: &[u8]) -> (tempfile::TempDir, VersionTarget) {
    let dir = tempdir().unwrap();
    let target = VersionTarget::new(dir.path(), "Promo");
    fs::write(target.canonical_file(), contents).unwrap();
    (dir, target)
}

fn version_count(target: &VersionTarget) -> usize {
    discover_versions(target).unwrap().len()
}

#[test]
fn offline_snapshot_copies_canonical_file() {
    let (_dir, target) = project_with_canonical(b"on disk");
    let outcome = create_snapshot(&target, Some(&mut Offline)).unwrap();
    assert_eq!(outcome.version, 1);
    assert_eq!(outcome.source, SnapshotSource::Copied);
    assert_eq!(outcome.size, 7);
    assert!(outcome.note.is_none());
    assert_eq!(fs::read(target.folder.join("Promo_V001.drp")).unwrap(), b"on disk");
}

#[test]
fn matching_open_document_is_exported_live() {
    let (_dir, target) = project_with_canonical(b"stale");
    let mut bridge = OpenDocument::named("Promo", b"live state");
    let outcome = create_snapshot(&target, Some(&mut bridge)).unwrap();
    assert_eq!(outcome.source, SnapshotSource::Live);
    assert_eq!(bridge.exports, 1);
    assert_eq!(fs::read(&outcome.path).unwrap(), b"live state");
}

#[test]
fn live_export_works_without_canonical_file() {
    let dir = tempdir().unwrap();
    let target = VersionTarget::new(dir.path(), "Promo");
    let mut bridge = OpenDocument::named("Promo", b"live");
    let outcome = create_snapshot(&target, Some(&mut bridge)).unwrap();
    assert_eq!(outcome.source, SnapshotSource::Live);
}

// Intentional risk: with another document open in Resolve, the snapshot silently
// falls back to the canonical file, which can be older than the live session.
#[test]
fn different_open_document_copies_possibly_stale_file_with_note() {
    let (_dir, target) = project_with_canonical(b"stale on disk");
    let mut bridge = OpenDocument::named("Other Job", b"unsaved live edits");
    let outcome = create_snapshot(&target, Some(&mut bridge)).unwrap();

    assert_eq!(outcome.source, SnapshotSource::Copied);
    assert_eq!(bridge.exports, 0);
    assert!(outcome.note.as_deref().unwrap().contains("Other Job"));
    assert_eq!(fs::read(&outcome.path).unwrap(), b"stale on disk");
    assert!(outcome.message().contains("Other Job"));
}

#[test]
fn failed_live_export_falls_back_to_copy() {
    let (_dir, target) = project_with_canonical(b"on disk");
    let mut bridge = OpenDocument::named("Promo", b"live");
    bridge.fail_export = true;
    let outcome = create_snapshot(&target, Some(&mut bridge)).unwrap();
    assert_eq!(outcome.source, SnapshotSource::Copied);
    assert_eq!(fs::read(&outcome.path).unwrap(), b"on disk");
}

#[test]
fn snapshot_without_canonical_file_is_not_found() {
    let dir = tempdir().unwrap();
    let target = VersionTarget::new(dir.path(), "Promo");
    let err = create_snapshot(&target, None).unwrap_err();
    assert!(matches!(err, VersionError::CanonicalMissing(path) if path == target.canonical_file()));
    assert_eq!(version_count(&target), 0);
}

#[test]
fn numbering_continues_after_deleted_middle_version() {
    let (_dir, target) = project_with_canonical(b"x");
    for _ in 0..3 {
        create_snapshot(&target, None).unwrap();
    }
    fs::remove_file(target.version_path(2)).unwrap();
    let outcome = create_snapshot(&target, None).unwrap();
    assert_eq!(outcome.version, 4);
}

#[test]
fn snapshot_refuses_to_wrap_version_numbers() {
    let (_dir, target) = project_with_canonical(b"x");
    fs::write(target.version_path(u32::MAX), b"last").unwrap();
    let err = create_snapshot(&target, None).unwrap_err();
    assert!(matches!(err, VersionError::Exhausted(u32::MAX)));
    assert_eq!(version_count(&target), 1);
}

#[test]
fn every_restore_adds_exactly_one_backup_first() {
    let (_dir, target) = project_with_canonical(b"v0");
    let first = create_snapshot(&target, None).unwrap();
    fs::write(target.canonical_file(), b"v1").unwrap();
    let second = create_snapshot(&target, None).unwrap();

    let picks: [&PathBuf; 4] = [&first.path, &second.path, &first.path, &first.path];
    for (round, pick) in picks.into_iter().enumerate() {
        let before = version_count(&target);
        let current = fs::read(target.canonical_file()).unwrap();

        let outcome = restore_version(&target, pick, None).unwrap();

        assert_eq!(version_count(&target), before + 1, "round {round}");
        let backup = outcome.backup.as_ref().expect("canonical existed, so a backup was taken");
        assert_eq!(fs::read(&backup.path).unwrap(), current);
        assert_eq!(
            fs::read(target.canonical_file()).unwrap(),
            fs::read(pick).unwrap()
        );
        assert!(outcome.message().contains("Import Project"));
    }
}

#[test]
fn failed_backup_leaves_canonical_untouched() {
    let (_dir, target) = project_with_canonical(b"current");
    let old = create_snapshot(&target, None).unwrap();
    fs::write(target.canonical_file(), b"newer").unwrap();
    // Occupy the next version number with a directory so the backup copy fails.
    fs::create_dir(target.version_path(2)).unwrap();

    let err = restore_version(&target, &old.path, None).unwrap_err();
    assert!(matches!(err, VersionError::BackupFailed(_)));
    assert_eq!(fs::read(target.canonical_file()).unwrap(), b"newer");
}

#[test]
fn restore_rejects_files_that_are_not_versions() {
    let (_dir, target) = project_with_canonical(b"current");
    let stray = target.folder.join("notes.drp");
    fs::write(&stray, b"?").unwrap();
    let err = restore_version(&target, &stray, None).unwrap_err();
    assert!(matches!(err, VersionError::NotAVersion(_)));
    assert_eq!(version_count(&target), 0);
}
