use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    BridgeConfig, BridgeConnector, BridgeError, BridgeErrorKind, FolderRef, MediaPool, ProjectRef,
    ResolveBridge,
};

const HOST_SCRIPT: &str = include_str!("resolve_host.py");

/// One line written by the host script.
#[derive(Debug, Deserialize)]
struct HostReply {
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    kind: Option<BridgeErrorKind>,
    #[serde(default)]
    message: Option<String>,
}

impl HostReply {
    fn into_result(self) -> Result<Value, BridgeError> {
        if self.ok {
            Ok(self.value)
        } else {
            Err(BridgeError::new(
                self.kind.unwrap_or(BridgeErrorKind::Other),
                self.message.unwrap_or_else(|| "bridge call failed".to_string()),
            ))
        }
    }
}

/// Live session with Resolve, relayed through a Python host process.
/// 透過 Python 代理行程與 Resolve 建立的即時工作階段。
///
/// The scripting module location reaches the host through its own `PYTHONPATH`;
/// this process's environment is left alone.
pub struct ResolveHost {
    child: Child,
    stdin: Option<ChildStdin>,
    replies: Receiver<String>,
    reply_timeout: Duration,
}

impl ResolveHost {
    /// Checks that the scripting module directory exists without starting anything.
    /// 僅檢查腳本模組目錄是否存在，不啟動任何行程。
    pub fn probe(config: &BridgeConfig) -> Result<PathBuf, BridgeError> {
        let modules = config.effective_modules_dir().ok_or_else(|| {
            BridgeError::unavailable("Resolve scripting is not supported on this platform")
        })?;
        if !modules.is_dir() {
            return Err(BridgeError::unavailable(format!(
                "Resolve scripting modules not found: {}",
                modules.display()
            )));
        }
        Ok(modules)
    }

    /// Starts the host and waits for its handshake.
    pub fn connect(config: &BridgeConfig) -> Result<Self, BridgeError> {
        let modules = Self::probe(config)?;
        let mut child = Command::new(&config.python)
            .arg("-c")
            .arg(HOST_SCRIPT)
            .env("PYTHONPATH", join_python_path(&modules))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| {
                BridgeError::unavailable(format!(
                    "failed to start bridge interpreter '{}': {err}",
                    config.python
                ))
            })?;

        let stdin = child.stdin.take();
        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                return Err(BridgeError::unavailable("bridge host stdout unavailable"));
            }
        };

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        let mut host = Self {
            child,
            stdin,
            replies: rx,
            reply_timeout: config.reply_timeout,
        };
        host.next_reply()?;
        log::debug!("resolve bridge host ready (modules at {})", modules.display());
        Ok(host)
    }

    fn call(&mut self, op: &str, args: Value) -> Result<Value, BridgeError> {
        let request = json!({ "op": op, "args": args });
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| BridgeError::no_response("bridge host input closed"))?;
        writeln!(stdin, "{request}")
            .and_then(|_| stdin.flush())
            .map_err(|err| BridgeError::no_response(format!("bridge host went away: {err}")))?;
        self.next_reply()
    }

    fn next_reply(&mut self) -> Result<Value, BridgeError> {
        let line = match self.replies.recv_timeout(self.reply_timeout) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => {
                return Err(BridgeError::no_response(format!(
                    "no reply within {:?}",
                    self.reply_timeout
                )))
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(BridgeError::no_response("bridge host exited"))
            }
        };
        let reply: HostReply = serde_json::from_str(&line).map_err(|err| {
            BridgeError::new(
                BridgeErrorKind::Other,
                format!("malformed bridge reply: {err}"),
            )
        })?;
        reply.into_result()
    }
}

impl Drop for ResolveHost {
    fn drop(&mut self) {
        // Closing stdin ends the host loop; kill covers a host stuck inside Resolve.
        self.stdin.take();
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn join_python_path(modules: &Path) -> std::ffi::OsString {
    let mut value = modules.as_os_str().to_os_string();
    if let Some(existing) = std::env::var_os("PYTHONPATH") {
        if !existing.is_empty() {
            value.push(if cfg!(windows) { ";" } else { ":" });
            value.push(existing);
        }
    }
    value
}

fn handle_of(value: &Value) -> Result<u64, BridgeError> {
    value
        .as_u64()
        .ok_or_else(|| BridgeError::new(BridgeErrorKind::Other, format!("expected handle, got {value}")))
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl ResolveBridge for ResolveHost {
    fn create_project(&mut self, name: &str) -> Result<ProjectRef, BridgeError> {
        let value = self.call("create_project", json!({ "name": name }))?;
        handle_of(&value).map(ProjectRef)
    }

    fn get_media_pool(&mut self, project: ProjectRef) -> Result<MediaPool, BridgeError> {
        let value = self.call("get_media_pool", json!({ "project": project.0 }))?;
        serde_json::from_value(value).map_err(|err| {
            BridgeError::new(BridgeErrorKind::Other, format!("malformed media pool: {err}"))
        })
    }

    fn add_subfolder(
        &mut self,
        pool: &MediaPool,
        parent: FolderRef,
        name: &str,
    ) -> Result<FolderRef, BridgeError> {
        let value = self.call(
            "add_subfolder",
            json!({ "pool": pool.pool, "parent": parent.0, "name": name }),
        )?;
        handle_of(&value).map(FolderRef)
    }

    fn set_setting(
        &mut self,
        project: ProjectRef,
        key: &str,
        value: &str,
    ) -> Result<(), BridgeError> {
        self.call(
            "set_setting",
            json!({ "project": project.0, "key": key, "value": value }),
        )
        .map(drop)
    }

    fn export_project(
        &mut self,
        name: &str,
        path: &Path,
        overwrite: bool,
    ) -> Result<(), BridgeError> {
        self.call(
            "export_project",
            json!({ "name": name, "path": path_arg(path), "overwrite": overwrite }),
        )
        .map(drop)
    }

    fn import_project(&mut self, path: &Path) -> Result<(), BridgeError> {
        self.call("import_project", json!({ "path": path_arg(path) }))
            .map(drop)
    }

    fn load_project(&mut self, name: &str) -> Result<ProjectRef, BridgeError> {
        let value = self.call("load_project", json!({ "name": name }))?;
        handle_of(&value).map(ProjectRef)
    }

    fn get_current_project(&mut self) -> Result<Option<ProjectRef>, BridgeError> {
        let value = self.call("get_current_project", Value::Null)?;
        if value.is_null() {
            return Ok(None);
        }
        handle_of(&value).map(|handle| Some(ProjectRef(handle)))
    }

    fn get_project_name(&mut self, project: ProjectRef) -> Result<String, BridgeError> {
        let value = self.call("get_project_name", json!({ "project": project.0 }))?;
        value.as_str().map(str::to_string).ok_or_else(|| {
            BridgeError::new(BridgeErrorKind::Other, "project name is not a string")
        })
    }
}

/// Connector that starts a fresh [`ResolveHost`] per session.
#[derive(Debug, Clone, Default)]
pub struct ResolveHostConnector {
    config: BridgeConfig,
}

impl ResolveHostConnector {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

impl BridgeConnector for ResolveHostConnector {
    type Bridge = ResolveHost;

    fn connect(&self) -> Result<ResolveHost, BridgeError> {
        ResolveHost::connect(&self.config)
    }
}
