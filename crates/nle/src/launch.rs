//! Locating and starting the editing applications.
//! （尋找並啟動剪輯應用程式。）
//!
//! Commands are described by a serialisable [`LaunchSpec`]. Bounded runs go through
//! [`execute`], which polls the child and kills it once the timeout elapses;
//! application launches are fire-and-forget through [`spawn_detached`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use nexus_project::AppKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Newest release year probed first.
const NEWEST_ADOBE_YEAR: u16 = 2026;
const OLDEST_ADOBE_YEAR: u16 = 2022;

/// Errors raised while locating or running an application.
/// （尋找或執行應用程式時的錯誤。）
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{0} is not installed (set a manual path with `nexus config set-app`)")]
    NotFound(AppKind),
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read process output: {0}")]
    Output(std::io::Error),
    #[error("failed to poll process status: {0}")]
    Poll(std::io::Error),
    #[error("failed to terminate process: {0}")]
    Kill(std::io::Error),
}

/// Serializable command description.
/// （可序列化的指令描述。）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout_ms: None,
        }
    }

    pub fn push_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Bounds [`execute`]; the child is killed once the timeout elapses.
    /// （設定逾時，逾時後終止子程序。）
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let millis = timeout.as_millis().clamp(1, u128::from(u64::MAX)) as u64;
        self.timeout_ms = Some(millis);
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

/// Result of a bounded command run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchResult {
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
}

impl LaunchResult {
    pub fn success(&self) -> bool {
        !self.timed_out && matches!(self.exit_code, Some(0))
    }
}

/// Runs the command to completion, capturing output.
/// （執行指令直到結束並擷取輸出。）
pub fn execute(spec: &LaunchSpec) -> Result<LaunchResult, LaunchError> {
    let mut command = spec.command();
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let start = Instant::now();
    let mut child = command.spawn().map_err(|source| LaunchError::Spawn {
        program: spec.program.clone(),
        source,
    })?;

    let mut timed_out = false;
    let output = match spec.timeout_ms.map(Duration::from_millis) {
        Some(timeout) => loop {
            if child.try_wait().map_err(LaunchError::Poll)?.is_some() {
                break child.wait_with_output().map_err(LaunchError::Output)?;
            }
            if start.elapsed() >= timeout {
                child.kill().map_err(LaunchError::Kill)?;
                timed_out = true;
                break child.wait_with_output().map_err(LaunchError::Output)?;
            }
            thread::sleep(Duration::from_millis(15));
        },
        None => child.wait_with_output().map_err(LaunchError::Output)?,
    };

    Ok(LaunchResult {
        exit_code: output.status.code(),
        stdout: output.stdout,
        stderr: output.stderr,
        timed_out,
    })
}

/// Starts the command without waiting for it. A reaper thread collects the exit status.
/// （啟動指令後立即返回，不等待結束。）
pub fn spawn_detached(spec: &LaunchSpec) -> Result<(), LaunchError> {
    let mut child = spec
        .command()
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| LaunchError::Spawn {
            program: spec.program.clone(),
            source,
        })?;
    log::debug!("spawned {} (pid {})", spec.program, child.id());
    thread::spawn(move || {
        let _ = child.wait();
    });
    Ok(())
}

/// Install-location families the locator knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Other
        }
    }
}

/// Standard install locations for `app`, newest release first.
/// （依新到舊列出標準安裝位置。）
pub fn install_candidates(app: AppKind, platform: Platform) -> Vec<PathBuf> {
    let years = (OLDEST_ADOBE_YEAR..=NEWEST_ADOBE_YEAR).rev();
    match (app, platform) {
        (AppKind::Resolve, Platform::MacOs) => {
            vec![PathBuf::from("/Applications/DaVinci Resolve/DaVinci Resolve.app")]
        }
        (AppKind::Resolve, Platform::Windows) => vec![PathBuf::from(
            r"C:\Program Files\Blackmagic Design\DaVinci Resolve\Resolve.exe",
        )],
        (AppKind::Resolve, Platform::Other) => vec![PathBuf::from("/opt/resolve/bin/resolve")],
        (AppKind::Premiere, Platform::MacOs) => years
            .map(|y| {
                PathBuf::from(format!(
                    "/Applications/Adobe Premiere Pro {y}/Adobe Premiere Pro {y}.app"
                ))
            })
            .collect(),
        (AppKind::Premiere, Platform::Windows) => years
            .map(|y| {
                PathBuf::from(format!(
                    r"C:\Program Files\Adobe\Adobe Premiere Pro {y}\Adobe Premiere Pro.exe"
                ))
            })
            .collect(),
        (AppKind::AfterEffects, Platform::MacOs) => years
            .map(|y| {
                PathBuf::from(format!(
                    "/Applications/Adobe After Effects {y}/Adobe After Effects {y}.app"
                ))
            })
            .collect(),
        (AppKind::AfterEffects, Platform::Windows) => years
            .map(|y| {
                PathBuf::from(format!(
                    r"C:\Program Files\Adobe\Adobe After Effects {y}\Support Files\AfterFX.exe"
                ))
            })
            .collect(),
        (AppKind::Premiere | AppKind::AfterEffects, Platform::Other) => Vec::new(),
    }
}

/// Finds installed applications: manual overrides first, then standard locations.
/// （尋找已安裝的應用程式：先看手動設定，再看標準位置。）
#[derive(Debug, Clone)]
pub struct AppLocator {
    overrides: BTreeMap<AppKind, PathBuf>,
    platform: Platform,
}

impl AppLocator {
    pub fn new(overrides: BTreeMap<AppKind, PathBuf>) -> Self {
        Self {
            overrides,
            platform: Platform::current(),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// An override only counts when the path exists.
    pub fn locate(&self, app: AppKind) -> Option<PathBuf> {
        if let Some(path) = self.overrides.get(&app) {
            if path.exists() {
                return Some(path.clone());
            }
            log::warn!("manual path for {app} does not exist: {}", path.display());
        }
        install_candidates(app, self.platform)
            .into_iter()
            .find(|candidate| candidate.exists())
    }

    /// Command that opens the application bundle or executable at `path`.
    pub fn open_spec(&self, path: &Path) -> LaunchSpec {
        let target = path.to_string_lossy().into_owned();
        match self.platform {
            Platform::MacOs => LaunchSpec::new("open").push_arg(target),
            Platform::Windows | Platform::Other => LaunchSpec::new(target),
        }
    }

    /// Executable inside an After Effects install that accepts `-r <script>`.
    pub fn after_effects_binary(&self, app_path: &Path) -> Option<PathBuf> {
        match self.platform {
            Platform::MacOs => {
                let entries = fs::read_dir(app_path.join("Contents").join("MacOS")).ok()?;
                entries
                    .filter_map(Result::ok)
                    .map(|entry| entry.path())
                    .find(|path| {
                        path.file_name()
                            .and_then(|name| name.to_str())
                            .is_some_and(|name| name.starts_with("After Effects"))
                    })
            }
            Platform::Windows | Platform::Other => {
                app_path.is_file().then(|| app_path.to_path_buf())
            }
        }
    }
}

/// Starts an application and returns immediately.
/// （啟動應用程式並立即返回。）
pub trait AppLauncher {
    fn launch(&self, app: AppKind) -> Result<(), LaunchError>;
}

/// Launcher backed by real processes.
#[derive(Debug, Clone)]
pub struct SystemLauncher {
    locator: AppLocator,
}

impl SystemLauncher {
    pub fn new(locator: AppLocator) -> Self {
        Self { locator }
    }
}

impl AppLauncher for SystemLauncher {
    fn launch(&self, app: AppKind) -> Result<(), LaunchError> {
        let path = self.locator.locate(app).ok_or(LaunchError::NotFound(app))?;
        log::info!("launching {app} from {}", path.display());
        spawn_detached(&self.locator.open_spec(&path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn adobe_candidates_run_newest_first() {
        let candidates = install_candidates(AppKind::Premiere, Platform::MacOs);
        assert_eq!(candidates.len(), 5);
        assert!(candidates[0].to_string_lossy().contains("2026"));
        assert!(candidates[4].to_string_lossy().contains("2022"));
    }

    #[test]
    fn existing_override_wins() {
        let dir = tempdir().unwrap();
        let manual = dir.path().join("Resolve.app");
        fs::create_dir(&manual).unwrap();
        let locator = AppLocator::new(BTreeMap::from([(AppKind::Resolve, manual.clone())]));
        assert_eq!(locator.locate(AppKind::Resolve), Some(manual));
    }

    #[test]
    fn missing_override_is_ignored() {
        let dir = tempdir().unwrap();
        let locator = AppLocator::new(BTreeMap::from([(
            AppKind::Premiere,
            dir.path().join("gone.app"),
        )]))
        .with_platform(Platform::Other);
        assert_eq!(locator.locate(AppKind::Premiere), None);
    }

    #[test]
    fn macos_opens_through_open() {
        let locator = AppLocator::new(BTreeMap::new()).with_platform(Platform::MacOs);
        let spec = locator.open_spec(Path::new("/Applications/X.app"));
        assert_eq!(spec.program, "open");
        assert_eq!(spec.args, vec!["/Applications/X.app"]);
    }

    #[test]
    fn after_effects_binary_found_inside_bundle() {
        let dir = tempdir().unwrap();
        let macos = dir.path().join("Contents").join("MacOS");
        fs::create_dir_all(&macos).unwrap();
        fs::write(macos.join("After Effects"), b"").unwrap();
        let locator = AppLocator::new(BTreeMap::new()).with_platform(Platform::MacOs);
        assert_eq!(
            locator.after_effects_binary(dir.path()),
            Some(macos.join("After Effects"))
        );
    }

    #[test]
    fn launcher_reports_missing_app() {
        let launcher =
            SystemLauncher::new(AppLocator::new(BTreeMap::new()).with_platform(Platform::Other));
        let err = launcher.launch(AppKind::AfterEffects).unwrap_err();
        assert!(matches!(err, LaunchError::NotFound(AppKind::AfterEffects)));
    }

    #[cfg(unix)]
    #[test]
    fn execute_captures_output() {
        let spec = LaunchSpec::new("sh").with_args(["-c", "printf nexus"]);
        let result = execute(&spec).unwrap();
        assert!(result.success());
        assert_eq!(result.stdout, b"nexus");
    }

    #[cfg(unix)]
    #[test]
    fn execute_kills_on_timeout() {
        let spec = LaunchSpec::new("sh")
            .with_args(["-c", "sleep 2"])
            .with_timeout(Duration::from_millis(100));
        let result = execute(&spec).unwrap();
        assert!(result.timed_out);
        assert!(!result.success());
    }

    #[test]
    fn spawn_failure_is_reported() {
        let err = spawn_detached(&LaunchSpec::new("nexus-no-such-program")).unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }));
    }
}
