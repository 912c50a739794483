use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Capability every backend exposes to the tree builder.
/// 各後端提供給樹狀建構器的節點建立能力。
///
/// Handles are opaque to the builder: a directory path, a script variable name,
/// or a folder object living inside a remote application session.
pub trait NodeFactory {
    type Handle: Clone;
    type Error;

    /// Creates `name` beneath `parent` and returns the handle of the new node.
    /// 在 `parent` 底下建立 `name` 並回傳新節點的控制代碼。
    fn create_child(&mut self, parent: &Self::Handle, name: &str)
        -> Result<Self::Handle, Self::Error>;
}

/// Relative slash-delimited folder path, split into non-empty segments.
/// 以斜線分隔的相對資料夾路徑（僅含非空片段）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderPath {
    segments: Vec<String>,
}

impl FolderPath {
    /// Parses `raw`, dropping empty segments produced by stray slashes.
    /// Segments are kept verbatim; surrounding whitespace is rejected, not trimmed.
    /// 解析路徑字串，忽略多餘斜線造成的空片段；片段前後有空白則拒絕。
    pub fn parse(raw: &str) -> Result<Self, FolderPathError> {
        let segments: Vec<String> = raw
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        if let Some(padded) = segments.iter().find(|s| s.trim() != s.as_str()) {
            return Err(FolderPathError::Padded {
                path: raw.to_string(),
                segment: padded.clone(),
            });
        }
        if segments.is_empty() {
            return Err(FolderPathError::Empty(raw.to_string()));
        }
        if let Some(bad) = segments.iter().find(|s| *s == "." || *s == "..") {
            return Err(FolderPathError::RelativeSegment {
                path: raw.to_string(),
                segment: bad.clone(),
            });
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Rejections raised while parsing folder paths.
/// 解析資料夾路徑時的錯誤。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FolderPathError {
    #[error("folder path '{0}' has no segments")]
    Empty(String),
    #[error("folder path '{path}' contains relative segment '{segment}'")]
    RelativeSegment { path: String, segment: String },
    #[error("folder path '{path}' has leading or trailing whitespace in segment '{segment}'")]
    Padded { path: String, segment: String },
}

/// One node the plan will create, in creation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedNode {
    /// Cumulative path from the root, e.g. `01_FOOTAGE/RAW`.
    pub path: String,
    /// Last segment of `path`.
    pub name: String,
    /// Index of the parent inside the plan; `None` for top-level nodes.
    pub parent: Option<usize>,
}

/// Deduplicated creation sequence for an ordered list of folder paths.
/// 將有序路徑清單轉換為去重後的建立順序。
///
/// Every ancestor precedes its descendants and each cumulative prefix appears once,
/// no matter how many input paths share it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreePlan {
    nodes: Vec<PlannedNode>,
}

impl TreePlan {
    /// Parses every input before anything is created, so a malformed entry has no side effects.
    /// 先完整解析所有輸入，格式錯誤時不會產生任何副作用。
    pub fn from_paths<I, S>(paths: I) -> Result<Self, FolderPathError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parsed = paths
            .into_iter()
            .map(|raw| FolderPath::parse(raw.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut index: HashMap<String, usize> = HashMap::new();
        let mut nodes = Vec::new();
        for folder in &parsed {
            let mut cumulative = String::new();
            let mut parent = None;
            for segment in folder.segments() {
                if !cumulative.is_empty() {
                    cumulative.push('/');
                }
                cumulative.push_str(segment);
                let position = match index.get(&cumulative) {
                    Some(&existing) => existing,
                    None => {
                        nodes.push(PlannedNode {
                            path: cumulative.clone(),
                            name: segment.clone(),
                            parent,
                        });
                        index.insert(cumulative.clone(), nodes.len() - 1);
                        nodes.len() - 1
                    }
                };
                parent = Some(position);
            }
        }
        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[PlannedNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Issues `create_child` for each planned node, parent before child.
    /// 依父先子後的順序呼叫 `create_child`。
    ///
    /// The first failure aborts the run. Nodes created before it are left in place;
    /// backends check for existence, so a later re-run converges.
    pub fn realize<F>(
        &self,
        factory: &mut F,
        root: F::Handle,
    ) -> Result<TreeSummary, TreeBuildError<F::Error>>
    where
        F: NodeFactory,
    {
        let mut handles: Vec<F::Handle> = Vec::with_capacity(self.nodes.len());
        let mut created = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let parent = match node.parent {
                Some(position) => &handles[position],
                None => &root,
            };
            let handle = factory
                .create_child(parent, &node.name)
                .map_err(|source| TreeBuildError {
                    path: node.path.clone(),
                    created: created.len(),
                    source,
                })?;
            log::debug!("created node {}", node.path);
            handles.push(handle);
            created.push(node.path.clone());
        }
        Ok(TreeSummary { created })
    }
}

/// Paths created by a successful synthesis run, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeSummary {
    pub created: Vec<String>,
}

/// Creation failure that aborted a synthesis run.
/// 中止建構流程的節點建立錯誤。
#[derive(Debug, Error)]
#[error("failed to create '{path}' after {created} node(s)")]
pub struct TreeBuildError<E> {
    pub path: String,
    pub created: usize,
    #[source]
    pub source: E,
}

impl<E> TreeBuildError<E> {
    pub fn into_source(self) -> E {
        self.source
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Records every creation; optionally fails on a given path.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingFactory {
        pub calls: Vec<(String, String)>,
        pub fail_on: Option<String>,
    }

    impl NodeFactory for RecordingFactory {
        type Handle = String;
        type Error = String;

        fn create_child(&mut self, parent: &String, name: &str) -> Result<String, String> {
            let path = if parent.is_empty() {
                name.to_string()
            } else {
                format!("{parent}/{name}")
            };
            if self.fail_on.as_deref() == Some(path.as_str()) {
                return Err(format!("refused {path}"));
            }
            self.calls.push((parent.clone(), name.to_string()));
            Ok(path)
        }
    }

    #[test]
    fn shared_prefix_is_created_once() {
        let plan = TreePlan::from_paths(["A/B", "A/C"]).unwrap();
        let mut factory = RecordingFactory::default();
        let summary = plan.realize(&mut factory, String::new()).unwrap();

        assert_eq!(summary.created, vec!["A", "A/B", "A/C"]);
        assert_eq!(
            factory.calls,
            vec![
                (String::new(), "A".to_string()),
                ("A".to_string(), "B".to_string()),
                ("A".to_string(), "C".to_string()),
            ]
        );
    }

    #[test]
    fn duplicates_and_order_do_not_change_node_count() {
        let forward = TreePlan::from_paths(["A/B", "A/C"]).unwrap();
        let reversed = TreePlan::from_paths(["A/C", "A/B", "A/C", "A"]).unwrap();
        assert_eq!(forward.len(), 3);
        assert_eq!(reversed.len(), 3);
        // Ancestor always precedes descendants.
        assert_eq!(reversed.nodes()[0].path, "A");
    }

    #[test]
    fn parents_reference_earlier_nodes() {
        let plan = TreePlan::from_paths(["01_FOOTAGE/RAW", "02_AUDIO/SFX", "01_FOOTAGE/SELECTS"])
            .unwrap();
        for (position, node) in plan.nodes().iter().enumerate() {
            if let Some(parent) = node.parent {
                assert!(parent < position);
                assert!(node.path.starts_with(&plan.nodes()[parent].path));
            }
        }
        let paths: Vec<_> = plan.nodes().iter().map(|n| n.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "01_FOOTAGE",
                "01_FOOTAGE/RAW",
                "02_AUDIO",
                "02_AUDIO/SFX",
                "01_FOOTAGE/SELECTS"
            ]
        );
    }

    #[test]
    fn stray_slashes_are_ignored() {
        let plan = TreePlan::from_paths(["/A//B/"]).unwrap();
        let paths: Vec<_> = plan.nodes().iter().map(|n| n.path.as_str()).collect();
        assert_eq!(paths, vec!["A", "A/B"]);
    }

    #[test]
    fn malformed_entry_rejects_whole_plan() {
        let err = TreePlan::from_paths(["A/B", "//"]).unwrap_err();
        assert_eq!(err, FolderPathError::Empty("//".into()));

        let err = TreePlan::from_paths(["A/../B"]).unwrap_err();
        assert!(matches!(err, FolderPathError::RelativeSegment { .. }));
    }

    #[test]
    fn padded_segments_are_rejected_not_trimmed() {
        let err = TreePlan::from_paths(["A /B"]).unwrap_err();
        assert_eq!(
            err,
            FolderPathError::Padded {
                path: "A /B".into(),
                segment: "A ".into(),
            }
        );
        assert!(TreePlan::from_paths(["A/ "]).is_err());

        let plan = TreePlan::from_paths(["Raw Footage/Day 1"]).unwrap();
        assert_eq!(plan.nodes()[1].path, "Raw Footage/Day 1");
    }

    #[test]
    fn failure_aborts_remaining_creations() {
        let plan = TreePlan::from_paths(["A/B", "A/C", "D"]).unwrap();
        let mut factory = RecordingFactory {
            fail_on: Some("A/C".into()),
            ..Default::default()
        };
        let err = plan.realize(&mut factory, String::new()).unwrap_err();
        assert_eq!(err.path, "A/C");
        assert_eq!(err.created, 2);
        assert_eq!(factory.calls.len(), 2);
        assert_eq!(err.into_source(), "refused A/C");
    }
}
