//! Backends that realise project trees inside editing applications.
//! 在剪輯應用程式內建立專案樹的後端。

pub mod bridge;
pub mod launch;
pub mod resolve;
pub mod script;
pub mod techspec;
pub mod worker;

pub use bridge::{
    BridgeConfig, BridgeConnector, BridgeError, BridgeErrorKind, FolderRef, MediaPool, ProjectRef,
    ResolveBridge, ResolveHost, ResolveHostConnector,
};
pub use launch::{AppLauncher, AppLocator, LaunchError, LaunchSpec, Platform, SystemLauncher};
pub use resolve::{import_archive, setup_resolve_project, ResolveBinFactory, ResolveSetupOutcome};
pub use script::{
    create_script_project, render_script, write_setup_script, ScriptDelivery, ScriptDialect,
    ScriptEmitter, ScriptError, ScriptSetupOutcome,
};
pub use techspec::{apply_settings, resolve_settings, SettingsReport};
pub use worker::{RetryPolicy, WorkerEvent, WorkerHandle, WorkerPhase, WorkerReport};
