//! Client settings from an optional RON file, environment and flags.
//!
//! Flags and environment variables arrive through clap as [`Overrides`] and
//! win over the file. A missing file means defaults; a malformed one is
//! logged and ignored. Zero durations are replaced by the defaults.
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracker_engine::ClientSettings;
use tracker_logging::{tracker_info, tracker_warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct FileConfig {
    pub api_base_url: Option<String>,
    pub ws_url: Option<String>,
    pub api_token: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub reconnect_backoff_ms: Option<u64>,
    pub reconnect_backoff_max_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub api_base_url: Option<String>,
    pub ws_url: Option<String>,
    pub api_token: Option<String>,
}

pub(crate) fn load_file_config(path: &Path) -> FileConfig {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return FileConfig::default();
        }
        Err(err) => {
            tracker_warn!("Failed to read config from {:?}: {}", path, err);
            return FileConfig::default();
        }
    };

    match ron::from_str(&content) {
        Ok(config) => {
            tracker_info!("Loaded config from {:?}", path);
            config
        }
        Err(err) => {
            tracker_warn!("Failed to parse config from {:?}: {}", path, err);
            FileConfig::default()
        }
    }
}

pub(crate) fn resolve_settings(file: FileConfig, overrides: Overrides) -> ClientSettings {
    let defaults = ClientSettings::default();

    ClientSettings {
        api_base_url: overrides
            .api_base_url
            .or(file.api_base_url)
            .unwrap_or(defaults.api_base_url),
        ws_url: overrides.ws_url.or(file.ws_url).unwrap_or(defaults.ws_url),
        api_token: overrides.api_token.or(file.api_token),
        connect_timeout: positive(
            "connect_timeout_secs",
            file.connect_timeout_secs.map(Duration::from_secs),
            defaults.connect_timeout,
        ),
        request_timeout: positive(
            "request_timeout_secs",
            file.request_timeout_secs.map(Duration::from_secs),
            defaults.request_timeout,
        ),
        poll_interval: positive(
            "poll_interval_ms",
            file.poll_interval_ms.map(Duration::from_millis),
            defaults.poll_interval,
        ),
        reconnect_backoff: positive(
            "reconnect_backoff_ms",
            file.reconnect_backoff_ms.map(Duration::from_millis),
            defaults.reconnect_backoff,
        ),
        reconnect_backoff_max: positive(
            "reconnect_backoff_max_ms",
            file.reconnect_backoff_max_ms.map(Duration::from_millis),
            defaults.reconnect_backoff_max,
        ),
    }
}

fn positive(key: &str, value: Option<Duration>, fallback: Duration) -> Duration {
    match value {
        Some(value) if value.is_zero() => {
            tracker_warn!("{} must be greater than zero; using {:?}", key, fallback);
            fallback
        }
        Some(value) => value,
        None => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_file_config(&dir.path().join("absent.ron"));

        assert_eq!(config, FileConfig::default());
        assert_eq!(
            resolve_settings(config, Overrides::default()),
            ClientSettings::default()
        );
    }

    #[test]
    fn file_values_apply_and_flags_win() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("migration-watch.ron");
        fs::write(
            &path,
            r#"(
                api_base_url: Some("https://api.example.test"),
                ws_url: Some("wss://push.example.test/ws"),
                poll_interval_ms: Some(500),
            )"#,
        )
        .unwrap();

        let overrides = Overrides {
            ws_url: Some("ws://127.0.0.1:9000/ws".to_string()),
            api_token: Some("abc".to_string()),
            ..Overrides::default()
        };
        let settings = resolve_settings(load_file_config(&path), overrides);

        assert_eq!(settings.api_base_url, "https://api.example.test");
        assert_eq!(settings.ws_url, "ws://127.0.0.1:9000/ws");
        assert_eq!(settings.api_token.as_deref(), Some("abc"));
        assert_eq!(settings.poll_interval, Duration::from_millis(500));
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn zero_durations_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zeros.ron");
        fs::write(
            &path,
            r#"(
                poll_interval_ms: Some(0),
                reconnect_backoff_ms: Some(0),
                reconnect_backoff_max_ms: Some(0),
                request_timeout_secs: Some(0),
                connect_timeout_secs: Some(3),
            )"#,
        )
        .unwrap();

        let settings = resolve_settings(load_file_config(&path), Overrides::default());
        let defaults = ClientSettings::default();

        assert_eq!(settings.poll_interval, Duration::from_millis(2000));
        assert_eq!(settings.reconnect_backoff, defaults.reconnect_backoff);
        assert_eq!(settings.reconnect_backoff_max, defaults.reconnect_backoff_max);
        assert_eq!(settings.request_timeout, defaults.request_timeout);
        assert_eq!(settings.connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ron");
        fs::write(&path, "(api_base_url: 42").unwrap();

        assert_eq!(load_file_config(&path), FileConfig::default());
    }
}
