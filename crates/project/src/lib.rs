//! Project description, folder-tree synthesis and on-disk scaffolding for NEXUS.
//! NEXUS 的專案描述、資料夾樹建構與磁碟結構建立。

mod util;

pub mod descriptor;
pub mod detect;
pub mod scaffold;
pub mod tree;

pub use descriptor::{
    resolve_folders, AppKind, ProjectDescriptor, TechnicalSpec, ValidationIssue,
    FORBIDDEN_NAME_CHARS,
};
pub use detect::detect_project_apps;
pub use scaffold::{
    read_metadata, scaffold_project, write_metadata, FsNodeFactory, ProjectError, ScaffoldReport,
    METADATA_FILE,
};
pub use tree::{
    FolderPath, FolderPathError, NodeFactory, PlannedNode, TreeBuildError, TreePlan, TreeSummary,
};
pub use util::write_atomic;
