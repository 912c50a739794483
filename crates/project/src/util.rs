use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Replaces `path` in one rename so readers never see a half-written sidecar or script.
/// 先寫入同目錄暫存檔再 rename，讀取端不會看到寫到一半的檔案。
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staging = staging_path(path);
    let result = fs::write(&staging, data).and_then(|()| fs::rename(&staging, path));
    if result.is_err() {
        let _ = fs::remove_file(&staging);
    }
    result
}

// `project.json` stages as `project.json.tmp`, leaving other files of the same stem alone.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("nexus"));
    name.push(".tmp");
    path.with_file_name(name)
}
