use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::descriptor::{ProjectDescriptor, ValidationIssue};
use crate::tree::{NodeFactory, TreeBuildError, TreeSummary};
use crate::util::write_atomic;

/// File name of the metadata sidecar written at the project root.
/// 寫在專案根目錄的中繼資料檔名。
pub const METADATA_FILE: &str = "project.json";

/// Node factory backed by the local filesystem; handles are directory paths.
/// 以本機檔案系統實作的節點工廠，控制代碼即為目錄路徑。
#[derive(Debug, Default, Clone, Copy)]
pub struct FsNodeFactory;

impl NodeFactory for FsNodeFactory {
    type Handle = PathBuf;
    type Error = io::Error;

    fn create_child(&mut self, parent: &PathBuf, name: &str) -> io::Result<PathBuf> {
        let path = parent.join(name);
        // create_dir_all is a no-op for existing directories.
        fs::create_dir_all(&path)?;
        Ok(path)
    }
}

/// Result of laying a project out on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldReport {
    pub root: PathBuf,
    pub metadata: PathBuf,
    pub summary: TreeSummary,
}

/// Errors raised while laying out a project on disk.
/// 建立專案資料夾結構時可能發生的錯誤。
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("invalid project: {0}")]
    Validation(#[from] ValidationIssue),
    #[error("failed to create project root {path}: {source}")]
    CreateRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("folder synthesis failed: {0}")]
    Tree(#[from] TreeBuildError<io::Error>),
    #[error("failed to serialize project metadata: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write project metadata {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Validates the project, creates its folder tree and writes `project.json`.
/// 驗證專案、建立資料夾樹並寫入 `project.json`。
///
/// Validation runs first and touches nothing. A failure during folder creation
/// leaves the directories created so far; re-running is safe.
pub fn scaffold_project(project: &ProjectDescriptor) -> Result<ScaffoldReport, ProjectError> {
    project.validate()?;
    let plan = project.folder_plan()?;

    let root = project.root();
    fs::create_dir_all(&root).map_err(|source| ProjectError::CreateRoot {
        path: root.clone(),
        source,
    })?;

    let summary = plan.realize(&mut FsNodeFactory, root.clone())?;
    let metadata = write_metadata(project, &root)?;
    log::info!(
        "scaffolded {} ({} folders) at {}",
        project.name,
        summary.created.len(),
        root.display()
    );

    Ok(ScaffoldReport {
        root,
        metadata,
        summary,
    })
}

/// Writes the descriptor as pretty UTF-8 JSON into `root/project.json`.
pub fn write_metadata(project: &ProjectDescriptor, root: &Path) -> Result<PathBuf, ProjectError> {
    let path = root.join(METADATA_FILE);
    let payload = serde_json::to_vec_pretty(project)?;
    write_atomic(&path, &payload).map_err(|source| ProjectError::Metadata {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Reads a previously written sidecar back.
pub fn read_metadata(root: &Path) -> Result<ProjectDescriptor, ProjectError> {
    let path = root.join(METADATA_FILE);
    let contents = fs::read_to_string(&path).map_err(|source| ProjectError::Metadata {
        path: path.clone(),
        source,
    })?;
    Ok(serde_json::from_str(&contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample(location: &Path) -> ProjectDescriptor {
        ProjectDescriptor::new("Launch", location)
            .with_client("ACME")
            .with_type("광고")
            .with_folders(["01_FOOTAGE/RAW", "01_FOOTAGE/SELECTS", "02_AUDIO/SFX"])
    }

    #[test]
    fn scaffold_creates_tree_and_sidecar() {
        let dir = tempdir().unwrap();
        let project = sample(dir.path());
        let report = scaffold_project(&project).unwrap();

        assert_eq!(report.summary.created.len(), 5);
        assert!(report.root.join("01_FOOTAGE/RAW").is_dir());
        assert!(report.root.join("01_FOOTAGE/SELECTS").is_dir());
        assert!(report.root.join("02_AUDIO/SFX").is_dir());

        let stored = read_metadata(&report.root).unwrap();
        assert_eq!(stored, project);
        let raw = fs::read_to_string(&report.metadata).unwrap();
        assert!(raw.contains("광고"), "non-ASCII text is kept verbatim");
    }

    #[test]
    fn scaffold_is_idempotent() {
        let dir = tempdir().unwrap();
        let project = sample(dir.path());
        scaffold_project(&project).unwrap();
        fs::write(project.root().join("01_FOOTAGE/RAW/clip.mov"), b"x").unwrap();

        let again = scaffold_project(&project).unwrap();
        assert_eq!(again.summary.created.len(), 5);
        assert!(project.root().join("01_FOOTAGE/RAW/clip.mov").exists());
    }

    #[test]
    fn validation_failure_has_no_side_effects() {
        let dir = tempdir().unwrap();
        let project = ProjectDescriptor::new("bad|name", dir.path()).with_folders(["A"]);
        let err = scaffold_project(&project).unwrap_err();
        assert!(matches!(
            err,
            ProjectError::Validation(ValidationIssue::ForbiddenCharacters(_))
        ));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn creation_failure_keeps_partial_structure() {
        let dir = tempdir().unwrap();
        let project = ProjectDescriptor::new("Partial", dir.path()).with_folders(["A/B", "C/D"]);
        fs::create_dir_all(project.root()).unwrap();
        // A plain file where a directory is expected blocks "C".
        fs::write(project.root().join("C"), b"").unwrap();

        let err = scaffold_project(&project).unwrap_err();
        match err {
            ProjectError::Tree(tree) => {
                assert_eq!(tree.path, "C");
                assert_eq!(tree.created, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(project.root().join("A/B").is_dir());
        assert!(!project.root().join(METADATA_FILE).exists());
    }
}
