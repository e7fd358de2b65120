use lifetrack_core::{
    listener, App, AppConfig, EventName, MemoryMount, MountView, Preferences, StartupError,
    StoreName,
};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[test]
fn default_config_starts_with_the_meal_module() {
    let app = App::start(AppConfig::default()).expect("startup");
    let registry = app.registry();

    assert_eq!(registry.current_module().as_deref(), Some("meal"));
    assert_eq!(
        registry.module_names(),
        vec!["meal", "workout", "prayer", "memorization", "habitChain", "todo", "routine"]
    );
}

#[test]
fn unknown_default_module_does_not_block_startup() {
    let mount = Arc::new(MemoryMount::new());
    let config = AppConfig {
        default_module: "yemek".into(),
        ..AppConfig::default()
    };
    let app = App::start_with_mount(config, mount.clone()).expect("startup");

    assert_eq!(app.registry().current_module(), None);
    match mount.view() {
        MountView::Error(panel) => assert_eq!(panel.module, "yemek"),
        other => panic!("expected error panel, got {other:?}"),
    }
    app.registry().switch_module("todo");
    assert_eq!(app.registry().current_module().as_deref(), Some("todo"));
}

#[test]
fn unreadable_database_fails_with_actionable_message() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let config = AppConfig {
        db_path: Some(path),
        ..AppConfig::default()
    };
    let err = App::start(config).err().expect("startup must fail");
    assert!(matches!(err, StartupError::StorageUnavailable(_)));
    assert!(err.user_message().contains("could not open its database"));
}

#[test]
fn preferences_default_and_change_events() {
    let app = App::start(AppConfig::default()).unwrap();
    assert_eq!(app.preferences().unwrap(), Preferences::default());

    let themes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&themes);
    app.bus().on(
        EventName::ThemeChanged,
        listener(move |args| {
            sink.lock().unwrap().push(args.to_vec());
            Ok(())
        }),
    );

    assert!(app.set_theme("light").unwrap());
    assert!(!app.set_theme("light").unwrap());
    assert!(app.set_view("weekly").unwrap());
    app.set_notifications(true).unwrap();

    let prefs = app.preferences().unwrap();
    assert_eq!(prefs.theme, "light");
    assert_eq!(prefs.view, "weekly");
    assert!(prefs.notifications);
    assert_eq!(*themes.lock().unwrap(), vec![vec![json!("light")]]);
}

#[test]
fn modules_share_one_store_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        db_path: Some(dir.path().join("lifetrack.sqlite3")),
        default_module: "todo".into(),
        ..AppConfig::default()
    };

    {
        let app = App::start(config.clone()).unwrap();
        let mut todo = serde_json::Map::new();
        todo.insert("title".into(), Value::from("Buy milk"));
        app.store().add(StoreName::Todo, todo).unwrap();
        app.shutdown();
        assert_eq!(app.registry().current_module(), None);
        assert!(app.bus().event_names().is_empty());
    }

    let app = App::start(config).unwrap();
    assert_eq!(app.store().count(StoreName::Todo).unwrap(), 1);
    assert_eq!(app.registry().current_module().as_deref(), Some("todo"));
}
