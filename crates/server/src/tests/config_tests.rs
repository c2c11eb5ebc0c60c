use super::*;

use std::{
    collections::HashMap,
    env, fs,
    time::{SystemTime, UNIX_EPOCH},
};

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_to_demo_database_in_data_dir() {
    let settings = load_settings_from(None, env_from(&[]));
    assert_eq!(settings.mode, Mode::Demo);
    assert_eq!(settings.server_bind, "127.0.0.1:5230");
    assert_eq!(settings.embed_failure_policy, FailurePolicy::Conceal);
    assert_eq!(settings.database_url(), "sqlite://./data/memos_demo.db");
}

#[test]
fn unknown_mode_falls_back_to_demo() {
    assert_eq!(Mode::parse("staging"), Mode::Demo);
    assert_eq!(Mode::parse(" PROD "), Mode::Prod);
    assert!(Mode::Dev.is_dev());
    assert!(!Mode::Prod.is_dev());
}

#[test]
fn file_values_apply_and_env_overrides_them() {
    let file = r#"
        mode = "dev"
        bind_addr = "0.0.0.0:8081"
        data_dir = "/srv/memos/"
        embed_show_errors = "true"
        utc_offset_minutes = "480"
    "#;
    let settings = load_settings_from(
        Some(file),
        env_from(&[("MEMOS_MODE", "prod"), ("MEMOS_UTC_OFFSET_MINUTES", "-300")]),
    );

    assert_eq!(settings.mode, Mode::Prod);
    assert_eq!(settings.server_bind, "0.0.0.0:8081");
    assert_eq!(settings.embed_failure_policy, FailurePolicy::ShowError);
    assert_eq!(settings.utc_offset_minutes, -300);
    assert_eq!(settings.database_url(), "sqlite:///srv/memos/memos_prod.db");
}

#[test]
fn failure_policy_key_takes_the_policy_name() {
    let settings = load_settings_from(Some(r#"embed_failure_policy = "show_error""#), env_from(&[]));
    assert_eq!(settings.embed_failure_policy, FailurePolicy::ShowError);

    let settings = load_settings_from(
        Some(r#"embed_failure_policy = "show_error""#),
        env_from(&[("MEMOS_EMBED_FAILURE_POLICY", "conceal")]),
    );
    assert_eq!(settings.embed_failure_policy, FailurePolicy::Conceal);

    let settings = load_settings_from(
        None,
        env_from(&[("MEMOS_EMBED_SHOW_ERRORS", "1"), ("MEMOS_EMBED_FAILURE_POLICY", "loud")]),
    );
    assert_eq!(settings.embed_failure_policy, FailurePolicy::ShowError);
}

#[test]
fn explicit_database_url_wins_over_data_dir() {
    let settings = load_settings_from(
        None,
        env_from(&[("MEMOS_DATA", "/tmp/x"), ("DATABASE_URL", "sqlite::memory:")]),
    );
    assert_eq!(settings.database_url(), "sqlite::memory:");
}

#[test]
fn malformed_file_and_values_are_ignored() {
    let settings = load_settings_from(
        Some("this is = = not toml"),
        env_from(&[("MEMOS_UTC_OFFSET_MINUTES", "east")]),
    );
    assert_eq!(settings.utc_offset_minutes, 0);
    assert_eq!(settings.mode, Mode::Demo);
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
    assert_eq!(
        normalize_database_url("sqlite:./data/test.db"),
        "sqlite://./data/test.db"
    );
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
}

#[test]
fn creates_parent_dir_for_sqlite_url() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();

    let temp_root = env::temp_dir().join(format!("memo_embed_server_test_{suffix}"));
    let db_path = temp_root.join("data").join("memos_dev.db");

    prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare db url");
    assert!(temp_root.join("data").exists());

    fs::remove_dir_all(temp_root).expect("cleanup");
}

#[tokio::test]
async fn prepared_database_url_creates_openable_sqlite_file() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();

    let temp_root = env::temp_dir().join(format!("memo_embed_server_open_test_{suffix}"));
    let db_path = temp_root.join("nested").join("memos_demo.db");

    let prepared = prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare");
    let storage = storage::Storage::new(&prepared).await.expect("open sqlite");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should be created: {}",
        db_path.display()
    );

    fs::remove_dir_all(temp_root).expect("cleanup");
}
