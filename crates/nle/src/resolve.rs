//! Project bootstrap and archive import against a live Resolve session.
//! 在執行中的 Resolve 建立專案與匯入封存檔。

use std::path::{Path, PathBuf};

use nexus_project::{NodeFactory, TechnicalSpec, TreePlan, TreeSummary};

use crate::bridge::{BridgeError, FolderRef, MediaPool, ResolveBridge};
use crate::techspec::{apply_settings, SettingsReport};

/// Archive extension Resolve uses for exported projects.
pub const ARCHIVE_EXTENSION: &str = "drp";

/// Node factory that creates media-pool bins through the bridge.
/// 透過橋接建立媒體池資料夾（bin）的節點工廠。
pub struct ResolveBinFactory<'a, B: ResolveBridge + ?Sized> {
    bridge: &'a mut B,
    pool: MediaPool,
}

impl<'a, B: ResolveBridge + ?Sized> ResolveBinFactory<'a, B> {
    pub fn new(bridge: &'a mut B, pool: MediaPool) -> Self {
        Self { bridge, pool }
    }
}

impl<B: ResolveBridge + ?Sized> NodeFactory for ResolveBinFactory<'_, B> {
    type Handle = FolderRef;
    type Error = BridgeError;

    fn create_child(&mut self, parent: &FolderRef, name: &str) -> Result<FolderRef, BridgeError> {
        self.bridge.add_subfolder(&self.pool, *parent, name)
    }
}

/// What a successful Resolve bootstrap produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveSetupOutcome {
    pub project: String,
    pub bins: TreeSummary,
    pub settings: SettingsReport,
    /// Exported archive, when an export directory was given and the export succeeded.
    pub archive: Option<PathBuf>,
    /// Why the export was skipped or failed; the bootstrap itself still succeeded.
    pub archive_note: Option<String>,
}

impl ResolveSetupOutcome {
    pub fn message(&self) -> String {
        let mut message = format!(
            "Resolve project '{}' created with {} bin(s)",
            self.project,
            self.bins.created.len()
        );
        let failed = self.settings.failures().count();
        if failed > 0 {
            message.push_str(&format!("; {failed} setting(s) not applied"));
        }
        if let Some(archive) = &self.archive {
            message.push_str(&format!(
                "; archive saved to {} (File > Import Project)",
                archive.display()
            ));
        }
        if let Some(note) = &self.archive_note {
            message.push_str(&format!("; {note}"));
        }
        message
    }
}

/// Creates the project, its bin tree and technical settings in a running Resolve.
/// 在執行中的 Resolve 建立專案、bin 樹與技術設定。
///
/// The project name must be free: an existing project is a terminal `Rejected`.
/// Bins are created parent-first and the first refusal aborts. Settings are
/// best-effort. With `export_dir`, the fresh project is also exported as
/// `<name>.drp` so it can be imported later without the bridge.
pub fn setup_resolve_project<B: ResolveBridge + ?Sized>(
    bridge: &mut B,
    name: &str,
    plan: &TreePlan,
    spec: &TechnicalSpec,
    export_dir: Option<&Path>,
) -> Result<ResolveSetupOutcome, BridgeError> {
    let project = bridge.create_project(name)?;
    let pool = bridge.get_media_pool(project)?;

    let bins = plan
        .realize(&mut ResolveBinFactory::new(bridge, pool), pool.root)
        .map_err(|err| {
            let path = err.path.clone();
            err.into_source().context(format!("bin '{path}'"))
        })?;

    let settings = apply_settings(bridge, project, spec);

    let (archive, archive_note) = match export_dir {
        Some(dir) => {
            let path = dir.join(format!("{name}.{ARCHIVE_EXTENSION}"));
            match bridge.export_project(name, &path, false) {
                Ok(()) => (Some(path), None),
                Err(err) => {
                    log::warn!("archive export of '{name}' failed: {err}");
                    (None, Some(format!("archive not exported ({err})")))
                }
            }
        }
        None => (None, None),
    };

    log::info!(
        "resolve project '{name}' ready with {} bins",
        bins.created.len()
    );
    Ok(ResolveSetupOutcome {
        project: name.to_string(),
        bins,
        settings,
        archive,
        archive_note,
    })
}

/// Imports an archive into the running application and opens it by file stem.
/// 將封存檔匯入執行中的應用程式，並以檔名開啟。
pub fn import_archive<B: ResolveBridge + ?Sized>(
    bridge: &mut B,
    archive: &Path,
) -> Result<String, BridgeError> {
    let name = archive
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| {
            BridgeError::rejected(format!("cannot derive project name from {}", archive.display()))
        })?
        .to_string();
    bridge.import_project(archive)?;
    bridge.load_project(&name)?;
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::mock::MockBridge;
    use crate::bridge::BridgeErrorKind;
    use tempfile::tempdir;

    fn spec() -> TechnicalSpec {
        TechnicalSpec {
            resolution: "FHD (1920×1080)".into(),
            fps: "23.976".into(),
            colorspace: "Rec. 709".into(),
            samplerate: "48 kHz".into(),
        }
    }

    #[test]
    fn bootstrap_creates_bins_once_and_applies_settings() {
        let dir = tempdir().unwrap();
        let mut bridge = MockBridge::default();
        let plan = TreePlan::from_paths(["A/B", "A/C"]).unwrap();

        let outcome =
            setup_resolve_project(&mut bridge, "Promo", &plan, &spec(), Some(dir.path())).unwrap();

        assert_eq!(outcome.bins.created, vec!["A", "A/B", "A/C"]);
        assert_eq!(bridge.bins.len(), 3);
        let (a_parent, _) = &bridge.bins[0];
        let (b_parent, _) = &bridge.bins[1];
        assert_ne!(a_parent, b_parent, "B hangs below A, not the root");
        assert_eq!(bridge.settings["timelineResolutionWidth"], "1920");
        assert_eq!(bridge.settings["timelineFrameRate"], "23.976");
        assert!(outcome.settings.is_complete());
        assert_eq!(outcome.archive, Some(dir.path().join("Promo.drp")));
        assert!(outcome.message().contains("3 bin(s)"));
    }

    #[test]
    fn existing_project_is_rejected_without_bins() {
        let mut bridge = MockBridge::with_open_project("Promo");
        let plan = TreePlan::from_paths(["A"]).unwrap();
        let err = setup_resolve_project(&mut bridge, "Promo", &plan, &spec(), None).unwrap_err();
        assert_eq!(err.kind, BridgeErrorKind::Rejected);
        assert!(bridge.bins.is_empty());
    }

    #[test]
    fn refused_bin_aborts_with_context() {
        let mut bridge = MockBridge::refusing_bin("C");
        let plan = TreePlan::from_paths(["A/B", "A/C", "D"]).unwrap();
        let err = setup_resolve_project(&mut bridge, "Promo", &plan, &spec(), None).unwrap_err();
        assert_eq!(err.kind, BridgeErrorKind::Rejected);
        assert!(err.message.starts_with("bin 'A/C'"));
        assert_eq!(bridge.bins.len(), 2);
        assert!(bridge.settings.is_empty());
    }

    #[test]
    fn failed_export_is_noted_not_fatal() {
        let dir = tempdir().unwrap();
        let mut bridge = MockBridge::failing_export();
        let plan = TreePlan::from_paths(["A"]).unwrap();
        let outcome =
            setup_resolve_project(&mut bridge, "Promo", &plan, &spec(), Some(dir.path())).unwrap();
        assert!(outcome.archive.is_none());
        assert!(outcome.archive_note.is_some());
    }

    #[test]
    fn import_loads_by_file_stem() {
        let mut bridge = MockBridge::default();
        let name = import_archive(&mut bridge, Path::new("/tmp/Promo_V004.drp")).unwrap();
        assert_eq!(name, "Promo_V004");
        assert_eq!(bridge.imports, vec![PathBuf::from("/tmp/Promo_V004.drp")]);
        assert_eq!(bridge.current.as_ref().map(|(_, n)| n.as_str()), Some("Promo_V004"));
    }
}
