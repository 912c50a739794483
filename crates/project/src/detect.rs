use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::descriptor::AppKind;

/// Infers which applications a project folder is used with, from the files it holds.
/// 依專案資料夾中的檔案推斷使用了哪些剪輯軟體。
///
/// * Resolve: `<name>.drp` or any `<name>_V*.drp`
/// * Premiere: `<name>*.prproj`
/// * After Effects: `<name>*.aep`
pub fn detect_project_apps(root: &Path, name: &str) -> BTreeSet<AppKind> {
    let mut apps = BTreeSet::new();
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) => {
            log::debug!("cannot scan {}: {err}", root.display());
            return apps;
        }
    };

    let canonical_drp = format!("{name}.drp");
    let versioned_prefix = format!("{name}_V");
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if file_name == canonical_drp
            || (file_name.starts_with(&versioned_prefix) && file_name.ends_with(".drp"))
        {
            apps.insert(AppKind::Resolve);
        } else if file_name.starts_with(name) && file_name.ends_with(".prproj") {
            apps.insert(AppKind::Premiere);
        } else if file_name.starts_with(name) && file_name.ends_with(".aep") {
            apps.insert(AppKind::AfterEffects);
        }
    }
    apps
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn detects_each_application_from_its_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Show_V002.drp"), b"").unwrap();
        fs::write(dir.path().join("Show_cut2.prproj"), b"").unwrap();
        fs::write(dir.path().join("Other.aep"), b"").unwrap();

        let apps = detect_project_apps(dir.path(), "Show");
        assert_eq!(
            apps.into_iter().collect::<Vec<_>>(),
            vec![AppKind::Resolve, AppKind::Premiere]
        );
    }

    #[test]
    fn missing_folder_detects_nothing() {
        let dir = tempdir().unwrap();
        assert!(detect_project_apps(&dir.path().join("absent"), "Show").is_empty());
    }
}
