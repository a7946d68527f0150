use crate::domain::models::TimerSettings;
use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use url::Url;

const APP_JSON: &str = "app.json";
const TIMER_JSON: &str = "timer.json";
const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api";
const SCHEMA_VERSION: u64 = 1;

pub const API_BASE_URL_ENV: &str = "FOCUSROOM_API_BASE_URL";
pub const API_TOKEN_ENV: &str = "FOCUSROOM_API_TOKEN";

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigBundle {
    pub app: serde_json::Value,
    pub timer: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: Url,
    pub token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TimerFile {
    schema: u64,
    #[serde(flatten)]
    settings: TimerSettings,
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    let mut timer = serde_json::to_value(TimerSettings::default()).unwrap_or_default();
    if let Some(object) = timer.as_object_mut() {
        object.insert("schema".to_string(), serde_json::json!(SCHEMA_VERSION));
    }

    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": SCHEMA_VERSION,
                "appName": "Focusroom",
                "apiBaseUrl": DEFAULT_API_BASE_URL
            }),
        ),
        (TIMER_JSON, timer),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            write_config(&path, &value)?;
        }
    }
    Ok(())
}

fn write_config(path: &Path, value: &serde_json::Value) -> Result<(), InfraError> {
    let formatted = serde_json::to_string_pretty(value)?;
    fs::write(path, format!("{formatted}\n"))?;
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SCHEMA_VERSION {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_configs(config_dir: &Path) -> Result<ConfigBundle, InfraError> {
    Ok(ConfigBundle {
        app: read_config(&config_dir.join(APP_JSON))?,
        timer: read_config(&config_dir.join(TIMER_JSON))?,
    })
}

pub fn read_timer_settings(config_dir: &Path) -> Result<TimerSettings, InfraError> {
    let raw = read_config(&config_dir.join(TIMER_JSON))?;
    let file: TimerFile = serde_json::from_value(raw)?;
    file.settings
        .validate()
        .map_err(InfraError::InvalidSettings)?;
    Ok(file.settings)
}

pub fn save_timer_settings(config_dir: &Path, settings: &TimerSettings) -> Result<(), InfraError> {
    settings.validate().map_err(InfraError::InvalidSettings)?;
    let file = TimerFile {
        schema: SCHEMA_VERSION,
        settings: settings.clone(),
    };
    write_config(&config_dir.join(TIMER_JSON), &serde_json::to_value(file)?)
}

pub fn read_api_base_url(config_dir: &Path) -> Result<String, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    Ok(app
        .get("apiBaseUrl")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_API_BASE_URL)
        .to_string())
}

pub fn load_api_config(config_dir: &Path) -> Result<ApiConfig, InfraError> {
    load_api_config_from_lookup(config_dir, |key| std::env::var(key).ok())
}

pub fn load_api_config_from_lookup<F>(config_dir: &Path, lookup: F) -> Result<ApiConfig, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw_base_url = match optional_lookup_value(&lookup, API_BASE_URL_ENV) {
        Some(value) => value,
        None => read_api_base_url(config_dir)?,
    };
    let base_url = Url::parse(&raw_base_url).map_err(|error| {
        InfraError::InvalidConfig(format!("invalid api base url '{raw_base_url}': {error}"))
    })?;
    if base_url.cannot_be_a_base() {
        return Err(InfraError::InvalidConfig(format!(
            "api base url cannot be a base: {raw_base_url}"
        )));
    }

    Ok(ApiConfig {
        base_url,
        token: optional_lookup_value(&lookup, API_TOKEN_ENV),
    })
}

fn optional_lookup_value<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_CONFIG_DIR: AtomicUsize = AtomicUsize::new(0);

    struct TempConfigDir {
        path: PathBuf,
    }

    impl TempConfigDir {
        fn new() -> Self {
            let sequence = NEXT_CONFIG_DIR.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "focusroom-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp config dir");
            Self { path }
        }
    }

    impl Drop for TempConfigDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn defaults_are_written_and_loadable() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");
        let bundle = load_configs(&dir.path).expect("load configs");
        assert_eq!(bundle.app["appName"], "Focusroom");
        assert_eq!(bundle.timer["focusDurationMinutes"], 25);

        let settings = read_timer_settings(&dir.path).expect("read settings");
        assert_eq!(settings, TimerSettings::default());
    }

    #[test]
    fn existing_files_are_not_overwritten() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");
        let custom = TimerSettings {
            focus_duration_minutes: 45,
            auto_start_breaks: false,
            ..TimerSettings::default()
        };
        save_timer_settings(&dir.path, &custom).expect("save settings");
        ensure_default_configs(&dir.path).expect("ensure again");
        assert_eq!(read_timer_settings(&dir.path).expect("read"), custom);
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let dir = TempConfigDir::new();
        fs::write(dir.path.join(APP_JSON), r#"{"schema": 2}"#).expect("write app");
        fs::write(dir.path.join(TIMER_JSON), r#"{"schema": 1}"#).expect("write timer");
        match load_configs(&dir.path) {
            Err(InfraError::InvalidConfig(message)) => assert!(message.contains("unsupported schema")),
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_settings_are_not_saved() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");
        let invalid = TimerSettings {
            long_break_minutes: 45,
            ..TimerSettings::default()
        };
        assert!(matches!(
            save_timer_settings(&dir.path, &invalid),
            Err(InfraError::InvalidSettings(_))
        ));
        assert_eq!(read_timer_settings(&dir.path).expect("read"), TimerSettings::default());
    }

    #[test]
    fn api_config_prefers_environment_over_file() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");

        let from_file = load_api_config_from_lookup(&dir.path, |_| None).expect("file config");
        assert_eq!(from_file.base_url.as_str(), "http://127.0.0.1:8000/api");
        assert_eq!(from_file.token, None);

        let from_env = load_api_config_from_lookup(&dir.path, |key| match key {
            API_BASE_URL_ENV => Some("https://learn.example.com/v2/".to_string()),
            API_TOKEN_ENV => Some("  token-123  ".to_string()),
            _ => None,
        })
        .expect("env config");
        assert_eq!(from_env.base_url.as_str(), "https://learn.example.com/v2/");
        assert_eq!(from_env.token.as_deref(), Some("token-123"));
    }

    #[test]
    fn api_config_rejects_invalid_url() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");
        let result = load_api_config_from_lookup(&dir.path, |key| match key {
            API_BASE_URL_ENV => Some("not a url".to_string()),
            _ => None,
        });
        assert!(matches!(result, Err(InfraError::InvalidConfig(_))));
    }
}
