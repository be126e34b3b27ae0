use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::{anyhow, Context};
use serde::Deserialize;
use shared::domain::ClientIdentity;
use url::Url;

use crate::{channel::ChannelSettings, edit_session::EditTimings};

pub const DEFAULT_SETTINGS_FILE: &str = "editwatch.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_url: String,
    pub channel_path: String,
    pub topic: String,
    pub client_identity: Option<String>,
    pub broadcast_period_ms: u64,
    pub transition_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".into(),
            channel_path: "/ws".into(),
            topic: "event-editing".into(),
            client_identity: None,
            broadcast_period_ms: 1800,
            transition_delay_ms: 300,
        }
    }
}

impl Settings {
    pub fn websocket_url(&self) -> anyhow::Result<Url> {
        let server_url = self.server_url.trim_end_matches('/');
        let ws_base = if server_url.starts_with("https://") {
            server_url.replacen("https://", "wss://", 1)
        } else if server_url.starts_with("http://") {
            server_url.replacen("http://", "ws://", 1)
        } else {
            return Err(anyhow!("server_url must start with http:// or https://"));
        };
        let path = if self.channel_path.starts_with('/') {
            self.channel_path.clone()
        } else {
            format!("/{}", self.channel_path)
        };
        Url::parse(&format!("{ws_base}{path}"))
            .with_context(|| format!("invalid notification channel url: {ws_base}{path}"))
    }

    pub fn identity(&self) -> ClientIdentity {
        self.client_identity
            .as_deref()
            .map(str::trim)
            .filter(|identity| !identity.is_empty())
            .map(ClientIdentity::new)
            .unwrap_or_else(ClientIdentity::random)
    }

    pub fn channel_settings(&self) -> anyhow::Result<ChannelSettings> {
        Ok(ChannelSettings {
            url: self.websocket_url()?,
            topic: self.topic.clone(),
            identity: self.identity(),
        })
    }

    pub fn timings(&self) -> EditTimings {
        EditTimings {
            broadcast_period: Duration::from_millis(self.broadcast_period_ms.max(1)),
            transition_delay: Duration::from_millis(self.transition_delay_ms),
        }
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE))
}

pub fn load_settings_from(path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            apply_overrides(&mut settings, |key| {
                file_cfg.get(key).map(|value| match value {
                    toml::Value::String(v) => v.clone(),
                    other => other.to_string(),
                })
            });
        }
    }

    apply_overrides(&mut settings, |key| {
        std::env::var(format!("APP__{}", key.to_ascii_uppercase())).ok()
    });

    settings
}

fn apply_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("server_url") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("channel_path") {
        settings.channel_path = v;
    }
    if let Some(v) = lookup("topic") {
        settings.topic = v;
    }
    if let Some(v) = lookup("client_identity") {
        settings.client_identity = Some(v);
    }
    if let Some(v) = lookup("broadcast_period_ms") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.broadcast_period_ms = parsed;
        }
    }
    if let Some(v) = lookup("transition_delay_ms") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.transition_delay_ms = parsed;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    #[test]
    fn derives_websocket_url_from_server_url() {
        let settings = Settings {
            server_url: "https://planner.example.org/".into(),
            channel_path: "notify".into(),
            ..Settings::default()
        };
        assert_eq!(
            settings.websocket_url().expect("url").as_str(),
            "wss://planner.example.org/notify"
        );
    }

    #[test]
    fn rejects_server_url_without_http_scheme() {
        let settings = Settings {
            server_url: "planner.example.org".into(),
            ..Settings::default()
        };
        assert!(settings.websocket_url().is_err());
    }

    #[test]
    fn blank_identity_falls_back_to_random() {
        let settings = Settings {
            client_identity: Some("   ".into()),
            ..Settings::default()
        };
        let first = settings.identity();
        let second = settings.identity();
        assert!(!first.as_str().is_empty());
        assert_ne!(first, second);
    }

    #[test]
    fn file_values_override_defaults_and_bad_numbers_are_ignored() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("editwatch_settings_test_{suffix}.toml"));
        fs::write(
            &path,
            "topic = \"sprint-board\"\nbroadcast_period_ms = 900\ntransition_delay_ms = \"soon\"\n",
        )
        .expect("write settings");

        let settings = load_settings_from(&path);
        assert_eq!(settings.topic, "sprint-board");
        assert_eq!(settings.broadcast_period_ms, 900);
        assert_eq!(settings.transition_delay_ms, 300);
        assert_eq!(settings.timings().broadcast_period, Duration::from_millis(900));

        fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let settings = load_settings_from(Path::new("/nonexistent/editwatch.toml"));
        assert_eq!(settings.channel_path, "/ws");
        assert_eq!(settings.timings(), EditTimings::default());
    }
}
