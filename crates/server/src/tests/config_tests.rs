use super::{parse_flag, resolve_settings, Settings, MAX_CREDENTIAL_TTL_SECONDS};

use std::collections::HashMap;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}

#[test]
fn defaults_apply_without_file_or_env() {
    let settings = resolve_settings(None, env_from(&[]));
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.server_bind, "127.0.0.1:8443");
    assert_eq!(settings.group_capacity, 8);
    assert_eq!(settings.members_page_size, 100);
    assert!(settings.lock_join_grants);
}

#[test]
fn settings_file_overrides_defaults() {
    let file = r#"
        bind_addr = "0.0.0.0:9000"
        group_capacity = 4
        call_type = "audio_room"
        lock_join_grants = false
    "#;
    let settings = resolve_settings(Some(file), env_from(&[]));
    assert_eq!(settings.server_bind, "0.0.0.0:9000");
    assert_eq!(settings.group_capacity, 4);
    assert_eq!(settings.call_type, "audio_room");
    assert!(!settings.lock_join_grants);
    assert_eq!(settings.credential_ttl_seconds, 3600);
}

#[test]
fn env_overrides_file_and_app_prefix_wins() {
    let file = r#"credential_api_key = "from-file""#;
    let settings = resolve_settings(
        Some(file),
        env_from(&[
            ("STREAM_API_KEY", "bare"),
            ("APP__CREDENTIAL_API_KEY", "prefixed"),
            ("SERVER_BIND", "127.0.0.1:1"),
        ]),
    );
    assert_eq!(settings.credential_api_key, "prefixed");
    assert_eq!(settings.server_bind, "127.0.0.1:1");
}

#[test]
fn bare_secret_name_is_honoured() {
    let settings = resolve_settings(None, env_from(&[("STREAM_API_SECRET", "s3cret")]));
    assert_eq!(settings.credential_api_secret, "s3cret");
}

#[test]
fn invalid_numbers_are_ignored() {
    let settings = resolve_settings(
        None,
        env_from(&[
            ("APP__GROUP_CAPACITY", "lots"),
            ("APP__CREDENTIAL_TTL_SECONDS", " 120 "),
            ("APP__LOCK_JOIN_GRANTS", "maybe"),
        ]),
    );
    assert_eq!(settings.group_capacity, 8);
    assert_eq!(settings.credential_ttl_seconds, 120);
    assert!(settings.lock_join_grants);
}

#[test]
fn page_size_is_clamped() {
    let high = resolve_settings(None, env_from(&[("APP__MEMBERS_PAGE_SIZE", "500")]));
    assert_eq!(high.members_page_size, 100);

    let zero = resolve_settings(Some("members_page_size = 0"), env_from(&[]));
    assert_eq!(zero.members_page_size, 1);
}

#[test]
fn unparsable_file_falls_back_to_defaults() {
    let settings = resolve_settings(Some("group_capacity = = 4"), env_from(&[]));
    assert_eq!(settings, Settings::default());
}

#[test]
fn bad_file_value_keeps_the_other_keys() {
    let file = r#"
        credential_api_secret = "prod-secret"
        group_capacity = -1
        members_page_size = "ten"
        call_type = "audio_room"
    "#;
    let settings = resolve_settings(Some(file), env_from(&[]));
    assert_eq!(settings.credential_api_secret, "prod-secret");
    assert_eq!(settings.call_type, "audio_room");
    assert_eq!(settings.group_capacity, 8);
    assert_eq!(settings.members_page_size, 100);
}

#[test]
fn unknown_file_keys_are_ignored() {
    let file = r#"
        database_url = "sqlite://x.db"
        group_capacity = 3
    "#;
    let settings = resolve_settings(Some(file), env_from(&[]));
    assert_eq!(settings.group_capacity, 3);
}

#[test]
fn out_of_range_ttl_is_ignored() {
    let huge = resolve_settings(
        Some("credential_ttl_seconds = 10_000_000_000_000_000"),
        env_from(&[]),
    );
    assert_eq!(huge.credential_ttl_seconds, 3600);

    let env_huge = resolve_settings(
        Some("credential_ttl_seconds = 600"),
        env_from(&[("APP__CREDENTIAL_TTL_SECONDS", "9223372036854775807")]),
    );
    assert_eq!(env_huge.credential_ttl_seconds, 600);

    let zero = resolve_settings(None, env_from(&[("APP__CREDENTIAL_TTL_SECONDS", "0")]));
    assert_eq!(zero.credential_ttl_seconds, 3600);

    let longest_ttl = MAX_CREDENTIAL_TTL_SECONDS.to_string();
    let longest = resolve_settings(
        None,
        env_from(&[("APP__CREDENTIAL_TTL_SECONDS", longest_ttl.as_str())]),
    );
    assert_eq!(longest.credential_ttl_seconds, MAX_CREDENTIAL_TTL_SECONDS);
}

#[test]
fn parses_common_flag_spellings() {
    assert_eq!(parse_flag("TRUE"), Some(true));
    assert_eq!(parse_flag(" on "), Some(true));
    assert_eq!(parse_flag("0"), Some(false));
    assert_eq!(parse_flag("no"), Some(false));
    assert_eq!(parse_flag(""), None);
}

#[test]
fn admission_settings_follow_server_settings() {
    let settings = resolve_settings(None, env_from(&[("APP__GROUP_CAPACITY", "3")]));
    let admission = settings.admission();
    assert_eq!(admission.group_capacity, 3);
    assert_eq!(admission.members_page_size, 100);
}
