use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use nexus_nle::{
    import_archive, setup_resolve_project, worker, AppLauncher, AppLocator, BridgeConfig,
    BridgeConnector, BridgeError, ResolveBridge, ResolveHostConnector, RetryPolicy,
    ScriptDialect, SystemLauncher, WorkerEvent,
};
use nexus_project::{
    detect_project_apps, read_metadata, resolve_folders, scaffold_project, AppKind,
    ProjectDescriptor, TechnicalSpec, TreePlan,
};
use nexus_settings::{default_config_path, NexusConfig, SharedConfig};
use nexus_versions::{
    create_snapshot, discover_versions, restore_version, version_file_name, VersionTarget,
};

#[derive(Parser)]
#[command(
    name = "nexus",
    about = "Bootstrap editing projects across Resolve, Premiere and After Effects",
    author,
    version
)]
struct Cli {
    /// 設定檔路徑。 / Settings file (defaults to the platform config directory).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// 顯示除錯訊息。 / Log debug output.
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// 只顯示警告與錯誤。 / Only log warnings and errors.
    #[arg(long, short, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 建立專案資料夾並設定剪輯軟體。 / Create a project folder tree and set up editing applications.
    Create(CreateArgs),
    /// 在 Resolve 建立專案與 bin（必要時啟動並等待）。 / Build the Resolve project for an existing folder, launching Resolve if needed.
    Connect(ConnectArgs),
    /// 列出版本快照。 / List version snapshots.
    Versions(ProjectArgs),
    /// 建立下一個版本快照。 / Save the next version snapshot.
    Snapshot(ProjectArgs),
    /// 以指定版本還原主檔。 / Restore a version over the project file.
    Restore(RestoreArgs),
    /// 將 .drp 匯入執行中的 Resolve。 / Import a .drp archive into the running Resolve.
    Import(ImportArgs),
    /// 偵測專案使用的剪輯軟體。 / Show which applications a project folder uses.
    Detect(ProjectArgs),
    /// 檢視或修改設定。 / Show or change settings.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args)]
struct ProjectArgs {
    /// 專案名稱。 / Project name.
    name: String,
    /// 專案所在的上層資料夾；預設為設定值。 / Parent folder of the project; defaults to the configured location.
    #[arg(long, short, value_name = "DIR")]
    location: Option<PathBuf>,
}

#[derive(Args)]
struct CreateArgs {
    #[command(flatten)]
    project: ProjectArgs,
    /// 客戶名稱。 / Client name.
    #[arg(long, default_value = "")]
    client: String,
    /// 專案類型（用於自訂資料夾預設）。 / Project type, used to pick a custom folder preset.
    #[arg(long = "type", value_name = "TYPE", default_value = "")]
    project_type: String,
    /// 要建立的資料夾，可重複。 / Folder path to create; repeatable.
    #[arg(long = "folder", value_name = "PATH")]
    folders: Vec<String>,
    /// 解析度標籤，例如 "FHD (1920×1080)"。 / Resolution label, e.g. "FHD (1920×1080)".
    #[arg(long, default_value = "")]
    resolution: String,
    /// 影格率。 / Frame rate, passed through verbatim.
    #[arg(long, default_value = "")]
    fps: String,
    /// 色彩空間標籤。 / Colour space label.
    #[arg(long, default_value = "")]
    colorspace: String,
    /// 取樣率標籤。 / Sample rate label.
    #[arg(long, default_value = "")]
    samplerate: String,
    /// 在 Resolve 建立專案與 bin。 / Create the project and bins in DaVinci Resolve.
    #[arg(long)]
    resolve: bool,
    /// 產生 Premiere Pro 設定腳本。 / Generate the Premiere Pro setup script.
    #[arg(long)]
    premiere: bool,
    /// 產生 After Effects 設定腳本。 / Generate the After Effects setup script.
    #[arg(long)]
    after_effects: bool,
    /// Resolve 未執行時不自動啟動。 / Do not launch Resolve and wait when it is not running.
    #[arg(long)]
    no_launch: bool,
}

#[derive(Args)]
struct ConnectArgs {
    #[command(flatten)]
    project: ProjectArgs,
    /// Resolve 未執行時不自動啟動。 / Do not launch Resolve and wait when it is not running.
    #[arg(long)]
    no_launch: bool,
}

#[derive(Args)]
struct RestoreArgs {
    #[command(flatten)]
    project: ProjectArgs,
    /// 版本（V003、3 或檔案路徑）。 / Version to restore: a label (V003), a number or a file path.
    version: String,
}

#[derive(Args)]
struct ImportArgs {
    /// 要匯入的 .drp 檔。 / Archive to import.
    #[arg(value_name = "FILE")]
    archive: PathBuf,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// 顯示目前設定。 / Print the current settings as JSON.
    Show,
    /// 設定新專案的預設位置。 / Set where new projects are created.
    SetLocation {
        #[arg(value_name = "DIR")]
        path: PathBuf,
    },
    /// 設定或清除應用程式路徑。 / Set an application path manually; omit the path to clear it.
    SetApp {
        /// resolve、premiere 或 after-effects。 / resolve, premiere or after-effects.
        app: AppKind,
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
    /// 設定或清除專案類型的資料夾預設。 / Set the folder preset of a project type; no folders clears it.
    SetPreset {
        #[arg(value_name = "TYPE")]
        project_type: String,
        #[arg(value_name = "FOLDER")]
        folders: Vec<String>,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Cli {
        config,
        verbose,
        quiet,
        command,
    } = Cli::parse();
    init_logging(verbose, quiet);

    let config_path = config.unwrap_or_else(default_config_path);
    let settings = SharedConfig::load(&config_path)
        .with_context(|| format!("failed to load settings {}", config_path.display()))?;

    match command {
        Commands::Create(args) => execute_create(args, &settings),
        Commands::Connect(args) => execute_connect(args, &settings),
        Commands::Versions(args) => list_versions(args, &settings),
        Commands::Snapshot(args) => execute_snapshot(args, &settings),
        Commands::Restore(args) => execute_restore(args, &settings),
        Commands::Import(args) => execute_import(args, &settings),
        Commands::Detect(args) => execute_detect(args, &settings),
        Commands::Config(command) => execute_config(command, &settings),
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn execute_create(args: CreateArgs, settings: &SharedConfig) -> Result<()> {
    let config = settings.snapshot()?;
    let location = project_location(args.project.location, &config);
    let folders = resolve_folders(&args.folders, config.custom_preset(&args.project_type));
    let project = ProjectDescriptor::new(args.project.name, location)
        .with_client(args.client)
        .with_type(args.project_type)
        .with_folders(folders)
        .with_spec(TechnicalSpec {
            resolution: args.resolution,
            fps: args.fps,
            colorspace: args.colorspace,
            samplerate: args.samplerate,
        });

    let report = scaffold_project(&project)?;
    println!(
        "Created {} ({} folder(s), metadata in {})",
        report.root.display(),
        report.summary.created.len(),
        report.metadata.display()
    );

    let plan = project.folder_plan()?;
    let locator = AppLocator::new(config.app_overrides.clone());
    for (enabled, dialect) in [
        (args.premiere, ScriptDialect::Premiere),
        (args.after_effects, ScriptDialect::AfterEffects),
    ] {
        if enabled {
            let outcome = nexus_nle::create_script_project(&project, &plan, dialect, &locator)?;
            println!("{}: {}", dialect.app(), outcome.message());
        }
    }
    if args.resolve {
        bootstrap_resolve(&project, plan, &config, args.no_launch)?;
    }
    Ok(())
}

fn execute_connect(args: ConnectArgs, settings: &SharedConfig) -> Result<()> {
    let config = settings.snapshot()?;
    let root = project_location(args.project.location, &config).join(&args.project.name);
    let mut project = read_metadata(&root)
        .with_context(|| format!("no NEXUS project at {}", root.display()))?;
    let plan = project.folder_plan()?;
    bootstrap_resolve(&project, plan, &config, args.no_launch)?;

    project.touch();
    nexus_project::write_metadata(&project, &root)?;
    Ok(())
}

/// Tries once; a not-ready Resolve is launched and polled in the foreground.
fn bootstrap_resolve(
    project: &ProjectDescriptor,
    plan: TreePlan,
    config: &NexusConfig,
    no_launch: bool,
) -> Result<()> {
    let connector = connector(config);
    let name = project.name.clone();
    let spec = project.spec.clone();
    let export_dir = project.root();
    let attempt = move || -> Result<String, BridgeError> {
        let mut bridge = connector.connect()?;
        setup_resolve_project(&mut bridge, &name, &plan, &spec, Some(&export_dir))
            .map(|outcome| outcome.message())
    };

    let err = match attempt() {
        Ok(message) => {
            println!("{}: {message}", AppKind::Resolve);
            return Ok(());
        }
        Err(err) if err.is_retryable() && !no_launch => err,
        Err(err) => bail!("{} setup failed: {err}", AppKind::Resolve),
    };

    println!("{} is not ready ({err}); launching and waiting", AppKind::Resolve);
    let launcher = SystemLauncher::new(AppLocator::new(config.app_overrides.clone()));
    let policy = RetryPolicy {
        interval: config.retry.interval(),
        max_attempts: config.retry.max_attempts,
    };
    let handle = worker::spawn(move || launcher.launch(AppKind::Resolve), attempt, policy);
    for event in handle.events().iter() {
        match event {
            WorkerEvent::Status(status) => println!("  {status}"),
            WorkerEvent::Finished(_) => break,
        }
    }
    let report = handle.wait();
    if !report.success() {
        bail!("{} setup {}: {}", AppKind::Resolve, report.phase, report.message);
    }
    println!("{}: {}", AppKind::Resolve, report.message);
    Ok(())
}

fn list_versions(args: ProjectArgs, settings: &SharedConfig) -> Result<()> {
    let target = version_target(args, settings)?;
    let versions = discover_versions(&target)?;
    if versions.is_empty() {
        println!("No versions of {} yet.", target.name);
        return Ok(());
    }
    for snapshot in versions {
        println!(
            "{}  {}  {:>8.1} MB  {}",
            snapshot.label,
            snapshot.modified.format("%Y-%m-%d %H:%M"),
            snapshot.size as f64 / (1024.0 * 1024.0),
            snapshot.path.display()
        );
    }
    Ok(())
}

fn execute_snapshot(args: ProjectArgs, settings: &SharedConfig) -> Result<()> {
    let config = settings.snapshot()?;
    let target = version_target(args, settings)?;
    let mut bridge = try_connect(&config);
    let outcome = create_snapshot(&target, bridge.as_mut().map(as_dyn))?;
    println!("{}", outcome.message());
    Ok(())
}

fn execute_restore(args: RestoreArgs, settings: &SharedConfig) -> Result<()> {
    let config = settings.snapshot()?;
    let version = args.version;
    let target = version_target(args.project, settings)?;
    let version_file = resolve_version_file(&target, &version)?;
    let mut bridge = try_connect(&config);
    let outcome = restore_version(&target, &version_file, bridge.as_mut().map(as_dyn))?;
    if let Some(backup) = &outcome.backup {
        println!("{}", backup.message());
    }
    println!("{}", outcome.message());
    Ok(())
}

fn execute_import(args: ImportArgs, settings: &SharedConfig) -> Result<()> {
    let config = settings.snapshot()?;
    if !args.archive.is_file() {
        bail!("archive {} does not exist", args.archive.display());
    }
    let mut bridge = connector(&config).connect()?;
    let name = import_archive(&mut bridge, &args.archive)?;
    println!("'{name}' imported into {}", AppKind::Resolve);
    Ok(())
}

fn execute_detect(args: ProjectArgs, settings: &SharedConfig) -> Result<()> {
    let config = settings.snapshot()?;
    let root = project_location(args.location, &config).join(&args.name);
    let apps = detect_project_apps(&root, &args.name);
    if apps.is_empty() {
        println!("No application files found in {}", root.display());
    }
    for app in apps {
        println!("{app}");
    }
    Ok(())
}

fn execute_config(command: ConfigCommand, settings: &SharedConfig) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let config = settings.snapshot()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommand::SetLocation { path } => {
            if !path.is_dir() {
                bail!("{} is not a directory", path.display());
            }
            settings.update(|config| config.default_location = Some(path.clone()))?;
            println!("Default location set to {}", path.display());
        }
        ConfigCommand::SetApp { app, path } => {
            if let Some(path) = &path {
                if !path.exists() {
                    bail!("{} does not exist", path.display());
                }
            }
            let cleared = path.is_none();
            settings.update(|config| config.set_app_override(app, path))?;
            if cleared {
                println!("Manual path for {app} cleared");
            } else {
                println!("Manual path for {app} saved");
            }
        }
        ConfigCommand::SetPreset {
            project_type,
            folders,
        } => {
            if !folders.is_empty() {
                TreePlan::from_paths(&folders)?;
            }
            let count = folders.len();
            let label = project_type.clone();
            settings.update(|config| {
                config.set_custom_preset(project_type, (!folders.is_empty()).then_some(folders))
            })?;
            if count == 0 {
                println!("Preset for '{label}' cleared");
            } else {
                println!("Preset for '{label}' saved ({count} folder(s))");
            }
        }
    }
    Ok(())
}

fn project_location(explicit: Option<PathBuf>, config: &NexusConfig) -> PathBuf {
    explicit.unwrap_or_else(|| config.default_location())
}

fn version_target(args: ProjectArgs, settings: &SharedConfig) -> Result<VersionTarget> {
    let config = settings.snapshot()?;
    let root = project_location(args.location, &config).join(&args.name);
    Ok(VersionTarget::new(root, args.name))
}

/// Accepts `V003`, `3` or a path to a version file.
fn resolve_version_file(target: &VersionTarget, version: &str) -> Result<PathBuf> {
    let trimmed = version.trim();
    let digits = trimmed
        .strip_prefix('V')
        .or_else(|| trimmed.strip_prefix('v'))
        .unwrap_or(trimmed);
    if let Ok(number) = digits.parse::<u32>() {
        let found = discover_versions(target)?
            .into_iter()
            .find(|snapshot| snapshot.version == number);
        return match found {
            Some(snapshot) => Ok(snapshot.path),
            None => bail!(
                "{} not found in {}",
                version_file_name(&target.name, number, &target.extension),
                target.folder.display()
            ),
        };
    }
    let path = Path::new(trimmed);
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    Err(anyhow!("unknown version '{version}'"))
}

fn connector(config: &NexusConfig) -> ResolveHostConnector {
    ResolveHostConnector::new(BridgeConfig {
        modules_dir: config.resolve.modules_dir.clone(),
        python: config.resolve.python.clone(),
        reply_timeout: config.resolve.reply_timeout(),
    })
}

/// Bridge for opportunistic use; any failure just means "no live session".
fn try_connect(config: &NexusConfig) -> Option<nexus_nle::ResolveHost> {
    match connector(config).connect() {
        Ok(bridge) => Some(bridge),
        Err(err) => {
            log::debug!("Resolve bridge not available: {err}");
            None
        }
    }
}

fn as_dyn(bridge: &mut nexus_nle::ResolveHost) -> &mut dyn ResolveBridge {
    bridge
}
