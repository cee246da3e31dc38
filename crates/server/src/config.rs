use std::{fmt::Display, fs, str::FromStr};

use admission::AdmissionSettings;
use call_backend::{MAX_CREDENTIAL_TTL_SECONDS, MAX_MEMBERS_PAGE_SIZE};
use toml::{Table, Value};
use tracing::warn;

const SETTINGS_FILE: &str = "server.toml";
pub const DEV_CREDENTIAL_SECRET: &str = "devsecret";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub credential_api_key: String,
    pub credential_api_secret: String,
    pub credential_ttl_seconds: i64,
    pub group_capacity: usize,
    pub members_page_size: usize,
    pub call_type: String,
    pub lock_join_grants: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8443".into(),
            credential_api_key: "devkey".into(),
            credential_api_secret: DEV_CREDENTIAL_SECRET.into(),
            credential_ttl_seconds: 3600,
            group_capacity: 8,
            members_page_size: MAX_MEMBERS_PAGE_SIZE,
            call_type: "default".into(),
            lock_join_grants: true,
        }
    }
}

impl Settings {
    pub fn admission(&self) -> AdmissionSettings {
        AdmissionSettings {
            group_capacity: self.group_capacity,
            members_page_size: self.members_page_size,
            credential_ttl_seconds: self.credential_ttl_seconds,
        }
    }
}

pub fn load_settings() -> Settings {
    let file = fs::read_to_string(SETTINGS_FILE).ok();
    resolve_settings(file.as_deref(), |name| std::env::var(name).ok())
}

/// Layers defaults, then the settings file, then environment variables.
/// For each setting the `APP__` variable wins over the bare one.
fn resolve_settings(file: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        match toml::from_str::<Table>(raw) {
            Ok(table) => apply_file(&mut settings, &table),
            Err(error) => warn!(%error, file = SETTINGS_FILE, "ignoring unreadable settings file"),
        }
    }

    if let Some(v) = last_set(&env, &["SERVER_BIND", "APP__BIND_ADDR"]) {
        settings.server_bind = v;
    }
    let key_vars = ["STREAM_API_KEY", "CREDENTIAL_API_KEY", "APP__CREDENTIAL_API_KEY"];
    if let Some(v) = last_set(&env, &key_vars) {
        settings.credential_api_key = v;
    }
    let secret_vars = [
        "STREAM_API_SECRET",
        "CREDENTIAL_API_SECRET",
        "APP__CREDENTIAL_API_SECRET",
    ];
    if let Some(v) = last_set(&env, &secret_vars) {
        settings.credential_api_secret = v;
    }
    if let Some(v) = last_set(&env, &["CALL_TYPE", "APP__CALL_TYPE"]) {
        settings.call_type = v;
    }
    if let Some(ttl) = parse_env::<i64>(
        "APP__CREDENTIAL_TTL_SECONDS",
        env("APP__CREDENTIAL_TTL_SECONDS"),
    ) {
        apply_ttl(&mut settings, "APP__CREDENTIAL_TTL_SECONDS", ttl);
    }
    if let Some(v) = parse_env("APP__GROUP_CAPACITY", env("APP__GROUP_CAPACITY")) {
        settings.group_capacity = v;
    }
    if let Some(v) = parse_env("APP__MEMBERS_PAGE_SIZE", env("APP__MEMBERS_PAGE_SIZE")) {
        settings.members_page_size = v;
    }
    if let Some(raw) = env("APP__LOCK_JOIN_GRANTS") {
        match parse_flag(&raw) {
            Some(flag) => settings.lock_join_grants = flag,
            None => warn!(value = %raw, "ignoring invalid APP__LOCK_JOIN_GRANTS"),
        }
    }

    settings.members_page_size = settings.members_page_size.clamp(1, MAX_MEMBERS_PAGE_SIZE);
    settings
}

/// Value of the last variable in `names` that is set.
fn last_set(env: &impl Fn(&str) -> Option<String>, names: &[&str]) -> Option<String> {
    names.iter().filter_map(|name| env(name)).last()
}

/// Applies each key of the settings file on its own, so one bad value only
/// costs that setting.
fn apply_file(settings: &mut Settings, table: &Table) {
    for (key, value) in table {
        let applied = match key.as_str() {
            "bind_addr" => text(value).map(|v| settings.server_bind = v),
            "credential_api_key" => text(value).map(|v| settings.credential_api_key = v),
            "credential_api_secret" => text(value).map(|v| settings.credential_api_secret = v),
            "call_type" => text(value).map(|v| settings.call_type = v),
            "credential_ttl_seconds" => value
                .as_integer()
                .map(|ttl| apply_ttl(settings, "credential_ttl_seconds", ttl)),
            "group_capacity" => count(value).map(|v| settings.group_capacity = v),
            "members_page_size" => count(value).map(|v| settings.members_page_size = v),
            "lock_join_grants" => value.as_bool().map(|v| settings.lock_join_grants = v),
            _ => {
                warn!(%key, file = SETTINGS_FILE, "ignoring unknown setting");
                continue;
            }
        };
        if applied.is_none() {
            warn!(%key, %value, file = SETTINGS_FILE, "ignoring invalid setting");
        }
    }
}

fn text(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn count(value: &Value) -> Option<usize> {
    value.as_integer().and_then(|n| usize::try_from(n).ok())
}

fn apply_ttl(settings: &mut Settings, source: &str, ttl: i64) {
    if (1..=MAX_CREDENTIAL_TTL_SECONDS).contains(&ttl) {
        settings.credential_ttl_seconds = ttl;
    } else {
        warn!(
            %source,
            ttl,
            max = MAX_CREDENTIAL_TTL_SECONDS,
            "ignoring out-of-range credential ttl"
        );
    }
}

fn parse_env<T>(name: &str, raw: Option<String>) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = raw?;
    match raw.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            warn!(%name, value = %raw, %error, "ignoring invalid setting");
            None
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
