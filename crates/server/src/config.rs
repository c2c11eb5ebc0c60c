use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use embed_core::FailurePolicy;
use serde::{de::IntoDeserializer, Deserialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Demo,
    Dev,
    Prod,
}

impl Mode {
    /// Unknown modes fall back to `demo`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dev" => Self::Dev,
            "prod" => Self::Prod,
            _ => Self::Demo,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::Dev => "dev",
            Self::Prod => "prod",
        }
    }

    pub fn is_dev(self) -> bool {
        self != Self::Prod
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub mode: Mode,
    pub server_bind: String,
    pub data_dir: PathBuf,
    /// Overrides the mode-derived database location.
    pub database_url: Option<String>,
    pub embed_failure_policy: FailurePolicy,
    pub utc_offset_minutes: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: Mode::Demo,
            server_bind: "127.0.0.1:5230".into(),
            data_dir: PathBuf::from("./data"),
            database_url: None,
            embed_failure_policy: FailurePolicy::Conceal,
            utc_offset_minutes: 0,
        }
    }
}

impl Settings {
    pub fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }
        let data_dir = self.data_dir.to_string_lossy().replace('\\', "/");
        let data_dir = data_dir.trim_end_matches('/');
        format!("sqlite://{data_dir}/memos_{}.db", self.mode.as_str())
    }
}

pub fn load_settings() -> Settings {
    let file = fs::read_to_string("server.toml").ok();
    load_settings_from(file.as_deref(), |key| std::env::var(key).ok())
}

/// Defaults, then `server.toml` keys, then environment variables.
pub fn load_settings_from(file: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        match toml::from_str::<HashMap<String, String>>(raw) {
            Ok(file_cfg) => apply(&mut settings, |key| file_cfg.get(key).cloned(), FILE_KEYS),
            Err(error) => warn!(%error, "ignoring unreadable server.toml"),
        }
    }

    apply(&mut settings, env, ENV_KEYS);
    settings
}

struct Keys {
    mode: &'static str,
    bind_addr: &'static str,
    data_dir: &'static str,
    database_url: &'static str,
    embed_show_errors: &'static str,
    embed_failure_policy: &'static str,
    utc_offset_minutes: &'static str,
}

const FILE_KEYS: Keys = Keys {
    mode: "mode",
    bind_addr: "bind_addr",
    data_dir: "data_dir",
    database_url: "database_url",
    embed_show_errors: "embed_show_errors",
    embed_failure_policy: "embed_failure_policy",
    utc_offset_minutes: "utc_offset_minutes",
};

const ENV_KEYS: Keys = Keys {
    mode: "MEMOS_MODE",
    bind_addr: "MEMOS_ADDR",
    data_dir: "MEMOS_DATA",
    database_url: "DATABASE_URL",
    embed_show_errors: "MEMOS_EMBED_SHOW_ERRORS",
    embed_failure_policy: "MEMOS_EMBED_FAILURE_POLICY",
    utc_offset_minutes: "MEMOS_UTC_OFFSET_MINUTES",
};

fn apply(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>, keys: Keys) {
    if let Some(v) = lookup(keys.mode) {
        settings.mode = Mode::parse(&v);
    }
    if let Some(v) = lookup(keys.bind_addr) {
        settings.server_bind = v;
    }
    if let Some(v) = lookup(keys.data_dir) {
        settings.data_dir = PathBuf::from(v);
    }
    if let Some(v) = lookup(keys.database_url) {
        if !v.trim().is_empty() {
            settings.database_url = Some(v);
        }
    }
    if let Some(v) = lookup(keys.embed_show_errors) {
        settings.embed_failure_policy = if parse_flag(&v) {
            FailurePolicy::ShowError
        } else {
            FailurePolicy::Conceal
        };
    }
    if let Some(v) = lookup(keys.embed_failure_policy) {
        match parse_failure_policy(&v) {
            Ok(policy) => settings.embed_failure_policy = policy,
            Err(error) => warn!(value = %v, %error, "ignoring unknown embed failure policy"),
        }
    }
    if let Some(v) = lookup(keys.utc_offset_minutes) {
        match v.trim().parse::<i32>() {
            Ok(parsed) => settings.utc_offset_minutes = parsed,
            Err(error) => warn!(value = %v, %error, "ignoring invalid utc offset"),
        }
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Accepts the serialized policy names, `conceal` and `show_error`.
fn parse_failure_policy(raw: &str) -> Result<FailurePolicy, serde::de::value::Error> {
    FailurePolicy::deserialize(raw.trim().into_deserializer())
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url();
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
