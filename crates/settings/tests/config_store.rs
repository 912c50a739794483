use nexus_project::AppKind;
use nexus_settings::{
    ConfigStore, NexusConfig, SharedConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_INTERVAL_MS,
};
use std::fs;
use std::path::PathBuf;
use std::thread;
use tempfile::tempdir;

#[test]
fn load_missing_file_returns_defaults() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");

    let store = ConfigStore::load(&path).expect("load defaults");
    let config = store.config();
    assert_eq!(config.retry.interval_ms, DEFAULT_RETRY_INTERVAL_MS);
    assert_eq!(config.retry.max_attempts, DEFAULT_MAX_ATTEMPTS);
    assert_eq!(config.resolve.python, "python3");
    assert!(config.app_overrides.is_empty());
    assert!(config.default_location().ends_with("Movies"));
    assert!(!path.exists(), "loading must not create the file");
}

#[test]
fn update_persists_and_reloads() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("nested").join("settings.json");

    let mut store = ConfigStore::new(path.clone(), NexusConfig::default());
    store
        .update(|config| {
            config.default_location = Some(PathBuf::from("/srv/projects"));
            config.set_app_override(AppKind::Premiere, Some(PathBuf::from("/opt/premiere")));
            config.set_custom_preset("MV", Some(vec!["01_FOOTAGE/RAW".into()]));
        })
        .expect("save");

    let reloaded = ConfigStore::load(&path).expect("reload");
    let config = reloaded.config();
    assert_eq!(config.default_location(), PathBuf::from("/srv/projects"));
    assert_eq!(
        config.app_override(AppKind::Premiere),
        Some(PathBuf::from("/opt/premiere").as_path())
    );
    assert_eq!(
        config.custom_preset("MV"),
        Some(&["01_FOOTAGE/RAW".to_string()][..])
    );

    let raw = fs::read_to_string(&path).expect("raw");
    assert!(raw.contains("\"premiere\""));
}

#[test]
fn clearing_overrides_and_presets() {
    let mut config = NexusConfig::default();
    config.set_app_override(AppKind::Resolve, Some(PathBuf::from("/x")));
    config.set_app_override(AppKind::Resolve, None);
    assert!(config.app_override(AppKind::Resolve).is_none());

    config.set_custom_preset("MV", Some(vec!["A".into()]));
    config.set_custom_preset("MV", None);
    assert!(config.custom_preset("MV").is_none());
}

#[test]
fn sanitize_repairs_invalid_values() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");
    fs::write(
        &path,
        r#"{
            "version": 0,
            "default_location": "",
            "custom_presets": { "MV": ["  ", ""], "Docu": ["A/B"] },
            "resolve": { "python": " ", "reply_timeout_secs": 0 },
            "retry": { "interval_ms": 500, "max_attempts": 0 }
        }"#,
    )
    .expect("seed");

    let store = ConfigStore::load(&path).expect("load");
    let config = store.config();
    assert_eq!(config.version, 1);
    assert!(config.default_location.is_none());
    assert!(config.custom_preset("MV").is_none());
    assert!(config.custom_preset("Docu").is_some());
    assert_eq!(config.resolve.python, "python3");
    assert_eq!(config.resolve.reply_timeout_secs, 20);
    assert_eq!(config.retry.interval_ms, 500);
    assert_eq!(config.retry.max_attempts, DEFAULT_MAX_ATTEMPTS);
}

#[test]
fn malformed_file_is_reported() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");
    fs::write(&path, "{ not json").expect("seed");
    let err = ConfigStore::load(&path).unwrap_err();
    assert!(err.to_string().contains("failed to parse config"));
}

#[test]
fn shared_updates_do_not_lose_writes() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");
    let shared = SharedConfig::load(&path).expect("load");

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let shared = shared.clone();
            thread::spawn(move || {
                for round in 0..5 {
                    shared
                        .update(|config| {
                            config.set_custom_preset(
                                format!("type-{worker}-{round}"),
                                Some(vec!["A".into()]),
                            );
                        })
                        .expect("update");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread should join");
    }

    assert_eq!(shared.snapshot().expect("snapshot").custom_presets.len(), 40);
    let reloaded = ConfigStore::load(&path).expect("reload");
    assert_eq!(reloaded.config().custom_presets.len(), 40);
}

#[test]
fn failed_save_keeps_previous_state_in_memory() {
    let temp = tempdir().expect("tempdir");
    let blocker = temp.path().join("not-a-dir");
    fs::write(&blocker, "file").expect("seed");
    let shared = SharedConfig::new(ConfigStore::new(
        blocker.join("settings.json"),
        NexusConfig::default(),
    ));

    let result = shared.update(|config| {
        config.set_custom_preset("MV", Some(vec!["FOOTAGE".into()]));
    });

    assert!(result.is_err());
    assert!(shared.snapshot().expect("snapshot").custom_presets.is_empty());
}
