//! ExtendScript setup scripts for Premiere Pro and After Effects.
//! （為 Premiere Pro 與 After Effects 產生 ExtendScript 設定腳本。）
//!
//! The emitter never talks to the application. It records one statement per
//! created node, so statement order is creation order. The finished script is
//! written beside the project and handed to the application when possible.

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nexus_project::{write_atomic, AppKind, NodeFactory, ProjectDescriptor, TreePlan};
use thiserror::Error;

use crate::launch::{self, AppLocator, LaunchSpec, Platform};

const ROOT_HANDLE: &str = "root";
const OSASCRIPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Scripting dialect of the target application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptDialect {
    Premiere,
    AfterEffects,
}

impl ScriptDialect {
    pub fn app(self) -> AppKind {
        match self {
            ScriptDialect::Premiere => AppKind::Premiere,
            ScriptDialect::AfterEffects => AppKind::AfterEffects,
        }
    }

    /// Script file written at the project root.
    pub fn script_file_name(self) -> &'static str {
        match self {
            ScriptDialect::Premiere => "_setup_premiere.jsx",
            ScriptDialect::AfterEffects => "_setup_ae.jsx",
        }
    }

    /// Project document extension the script saves to.
    pub fn project_extension(self) -> &'static str {
        match self {
            ScriptDialect::Premiere => "prproj",
            ScriptDialect::AfterEffects => "aep",
        }
    }

    fn variable_prefix(self) -> char {
        match self {
            ScriptDialect::Premiere => 'b',
            ScriptDialect::AfterEffects => 'f',
        }
    }

    fn manual_instruction(self) -> &'static str {
        match self {
            ScriptDialect::Premiere => "open Premiere Pro and run it via File > Scripts > Browse",
            ScriptDialect::AfterEffects => {
                "open After Effects and run it via File > Scripts > Run Script File"
            }
        }
    }
}

/// Escapes `value` for use inside a double-quoted script string.
pub fn escape_script_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Node factory that accumulates script statements instead of creating anything.
/// （累積腳本敘述的節點工廠，本身不建立任何東西。）
#[derive(Debug, Clone)]
pub struct ScriptEmitter {
    dialect: ScriptDialect,
    counter: usize,
    statements: Vec<String>,
}

impl ScriptEmitter {
    pub fn new(dialect: ScriptDialect) -> Self {
        Self {
            dialect,
            counter: 0,
            statements: Vec::new(),
        }
    }

    /// Handle that stands for the document root.
    pub fn root() -> String {
        ROOT_HANDLE.to_string()
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }
}

impl NodeFactory for ScriptEmitter {
    type Handle = String;
    type Error = Infallible;

    fn create_child(&mut self, parent: &String, name: &str) -> Result<String, Infallible> {
        self.counter += 1;
        let variable = format!("{}{}", self.dialect.variable_prefix(), self.counter);
        let name = escape_script_string(name);
        match self.dialect {
            ScriptDialect::Premiere => self
                .statements
                .push(format!("var {variable} = {parent}.createBin(\"{name}\");")),
            ScriptDialect::AfterEffects => {
                self.statements
                    .push(format!("var {variable} = mkFolder(\"{name}\");"));
                if parent != ROOT_HANDLE {
                    self.statements
                        .push(format!("{variable}.parentFolder = {parent};"));
                }
            }
        }
        Ok(variable)
    }
}

/// Assembles the full setup script: new project, bin tree, save to `save_path`.
/// （組合完整腳本：建立專案、建立 bin 樹、存檔。）
pub fn render_script(
    dialect: ScriptDialect,
    project_name: &str,
    plan: &TreePlan,
    save_path: &Path,
) -> String {
    let mut emitter = ScriptEmitter::new(dialect);
    // Infallible factory.
    let _ = plan.realize(&mut emitter, ScriptEmitter::root());

    let save_path = escape_script_string(&save_path.to_string_lossy().replace('\\', "/"));
    let title = escape_script_string(project_name);
    let mut lines = vec![
        format!("// NEXUS setup for {}", dialect.app()),
        format!("// Project: {title}"),
        String::new(),
    ];
    match dialect {
        ScriptDialect::Premiere => {
            lines.push(format!("app.newProject(\"{save_path}\");"));
            lines.push(format!("var {ROOT_HANDLE} = app.project.rootItem;"));
            lines.push(String::new());
            lines.extend(emitter.statements.iter().cloned());
            lines.push(String::new());
            lines.push("app.project.save();".to_string());
            lines.push(format!("$.writeln(\"NEXUS: {title} ready\");"));
        }
        ScriptDialect::AfterEffects => {
            lines.push("app.newProject();".to_string());
            lines.push(String::new());
            lines.push(
                "function mkFolder(name) { return app.project.items.addFolder(name); }"
                    .to_string(),
            );
            lines.push(String::new());
            lines.extend(emitter.statements.iter().cloned());
            lines.push(String::new());
            lines.push(format!("var saveFile = new File(\"{save_path}\");"));
            lines.push("app.project.save(saveFile);".to_string());
            lines.push(format!("alert(\"NEXUS: {title} ready\");"));
        }
    }
    let mut script = lines.join("\n");
    script.push('\n');
    script
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to write script {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes the setup script for `dialect` into the project root and returns its path.
pub fn write_setup_script(
    project: &ProjectDescriptor,
    plan: &TreePlan,
    dialect: ScriptDialect,
) -> Result<PathBuf, ScriptError> {
    let path = project.root().join(dialect.script_file_name());
    let save_path = project.canonical_file(dialect.project_extension());
    let script = render_script(dialect, &project.name, plan, &save_path);
    write_atomic(&path, script.as_bytes()).map_err(|source| ScriptError::Write {
        path: path.clone(),
        source,
    })?;
    log::debug!("wrote {}", path.display());
    Ok(path)
}

/// How the script reached the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptDelivery {
    /// The running application executed it.
    Executed,
    /// The application was started with the script queued.
    Launched,
    /// Automatic delivery was not possible; the operator runs it.
    Manual(String),
}

/// Outcome of an Adobe bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSetupOutcome {
    pub script: PathBuf,
    pub project_file: PathBuf,
    pub delivery: ScriptDelivery,
}

impl ScriptSetupOutcome {
    pub fn message(&self) -> String {
        let file_name = |path: &Path| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        match &self.delivery {
            ScriptDelivery::Executed => {
                format!("bins created, saved to {}", file_name(&self.project_file))
            }
            ScriptDelivery::Launched => format!(
                "application starting; the script saves {}",
                file_name(&self.project_file)
            ),
            ScriptDelivery::Manual(instruction) => {
                format!("script written to {}; {instruction}", file_name(&self.script))
            }
        }
    }
}

/// Writes the script and tries to hand it to the application.
/// Delivery problems are reported as [`ScriptDelivery::Manual`], never as errors.
/// （寫出腳本並嘗試交給應用程式；傳遞失敗只會改為手動指示。）
pub fn create_script_project(
    project: &ProjectDescriptor,
    plan: &TreePlan,
    dialect: ScriptDialect,
    locator: &AppLocator,
) -> Result<ScriptSetupOutcome, ScriptError> {
    let script = write_setup_script(project, plan, dialect)?;
    let delivery = deliver(dialect, &script, locator);
    Ok(ScriptSetupOutcome {
        script,
        project_file: project.canonical_file(dialect.project_extension()),
        delivery,
    })
}

fn deliver(dialect: ScriptDialect, script: &Path, locator: &AppLocator) -> ScriptDelivery {
    let manual = || ScriptDelivery::Manual(dialect.manual_instruction().to_string());
    let Some(app_path) = locator.locate(dialect.app()) else {
        return manual();
    };
    match dialect {
        ScriptDialect::Premiere => {
            if locator.platform() != Platform::MacOs {
                return manual();
            }
            let Some(app_name) = app_path.file_stem().map(|s| s.to_string_lossy().into_owned())
            else {
                return manual();
            };
            let tell = format!(
                "tell application \"{}\" to do script \"{}\"",
                escape_script_string(&app_name),
                escape_script_string(&script.to_string_lossy())
            );
            let spec = LaunchSpec::new("osascript")
                .with_args(["-e", tell.as_str()])
                .with_timeout(OSASCRIPT_TIMEOUT);
            match launch::execute(&spec) {
                Ok(result) if result.success() => ScriptDelivery::Executed,
                Ok(result) => {
                    log::warn!(
                        "osascript delivery failed: {}",
                        String::from_utf8_lossy(&result.stderr).trim()
                    );
                    manual()
                }
                Err(err) => {
                    log::warn!("osascript delivery failed: {err}");
                    manual()
                }
            }
        }
        ScriptDialect::AfterEffects => {
            let Some(binary) = locator.after_effects_binary(&app_path) else {
                return manual();
            };
            let spec = LaunchSpec::new(binary.to_string_lossy())
                .push_arg("-r")
                .push_arg(script.to_string_lossy());
            match launch::spawn_detached(&spec) {
                Ok(()) => ScriptDelivery::Launched,
                Err(err) => {
                    log::warn!("could not start After Effects: {err}");
                    manual()
                }
            }
        }
    }
}
