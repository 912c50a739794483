use regex::Regex;

/// Zero-padded version label, e.g. `V007`.
/// 補零的版本標籤。
pub fn version_label(version: u32) -> String {
    format!("V{version:03}")
}

/// Durable on-disk name of a version file: `{project}_V{NNN}.{ext}`.
/// 版本檔在磁碟上的固定命名。
pub fn version_file_name(project: &str, version: u32, extension: &str) -> String {
    format!("{project}_{}.{extension}", version_label(version))
}

/// Matcher for one project's version files.
/// 比對單一專案版本檔名的樣式。
///
/// Matching ignores case; the project name is otherwise taken literally.
#[derive(Debug, Clone)]
pub struct VersionPattern {
    regex: Regex,
}

impl VersionPattern {
    pub fn new(project: &str, extension: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!(
            r"(?i)^{}_V(\d+)\.{}$",
            regex::escape(project),
            regex::escape(extension)
        ))?;
        Ok(Self { regex })
    }

    /// Version number encoded in `file_name`, if it belongs to this project.
    pub fn parse(&self, file_name: &str) -> Option<u32> {
        let captures = self.regex.captures(file_name)?;
        let version: u32 = captures.get(1)?.as_str().parse().ok()?;
        (version > 0).then_some(version)
    }
}
