// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{error::Error, path::PathBuf, str::FromStr};

use tokio::fs;

use calsync_core::{APP_NAME, Config as CoreConfig, default_state_dir, get_config_dir};

const CALSYNC_CONFIG_ENV: &str = "CALSYNC_CONFIG";
const CALSYNC_DEV_ENV: &str = "CALSYNC_DEV";

const CALSYNC_DEV_VALID_TRUE: &[&str] = &["1", "true", "yes"];
const CALSYNC_DEV_VALID_FALSE: &[&str] = &["0", "false", "no"];

/// Reads the configuration from `path`, `$CALSYNC_CONFIG`, or the user's
/// configuration directory, in that order.
#[tracing::instrument]
pub async fn parse_config(path: Option<PathBuf>) -> Result<(CoreConfig, Config), Box<dyn Error>> {
    let path = if let Some(path) = path {
        path
    } else if let Ok(env_path) = std::env::var(CALSYNC_CONFIG_ENV) {
        PathBuf::from(env_path)
    } else {
        if let Some(true) = is_dev_mode() {
            return Err(format!(
                "Development environment detected ({CALSYNC_DEV_ENV} is set): config must be explicitly specified via --config or {CALSYNC_CONFIG_ENV} environment variable",
            ).into());
        }
        let config = get_config_dir()?.join(format!("{APP_NAME}/config.toml"));
        if !config.exists() {
            return Err(format!("No config found at: {}", config.display()).into());
        }
        config
    };

    let raw = fs::read_to_string(&path)
        .await
        .map_err(|e| format!("Failed to read config file at {}: {}", path.display(), e))?
        .parse::<ConfigRaw>()?;

    let mut core = raw.core;
    if core.state_dir.is_none() {
        core.state_dir = Some(default_state_dir()?);
    }
    core.normalize()?;
    if let Some(dir) = &core.state_dir {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| format!("Failed to create state directory {}: {}", dir.display(), e))?;
    }

    Ok((core, raw.cli))
}

/// Settings of the command-line interface itself.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// How many events `events` lists at most.
    #[serde(default = "default_max_events")]
    pub max_events: usize,

    /// Days ahead `events` looks by default.
    #[serde(default = "default_days")]
    pub days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_events: default_max_events(),
            days: default_days(),
        }
    }
}

const fn default_max_events() -> usize {
    128
}

const fn default_days() -> i64 {
    7
}

#[derive(Debug, serde::Deserialize)]
struct ConfigRaw {
    core: CoreConfig,

    #[serde(default)]
    cli: Config,
}

impl FromStr for ConfigRaw {
    type Err = Box<dyn Error>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

fn is_dev_mode() -> Option<bool> {
    if let Ok(val) = std::env::var(CALSYNC_DEV_ENV) {
        let lower = val.to_lowercase();
        if CALSYNC_DEV_VALID_TRUE.contains(&lower.as_str()) {
            Some(true)
        } else if CALSYNC_DEV_VALID_FALSE.contains(&lower.as_str()) {
            Some(false)
        } else {
            tracing::warn!(
                "Unrecognized value for {}: '{}'. Expected one of: {}. Treating as unset.",
                CALSYNC_DEV_ENV,
                val,
                format!(
                    "true: {}, false: {}",
                    CALSYNC_DEV_VALID_TRUE.join(", "),
                    CALSYNC_DEV_VALID_FALSE.join(", ")
                )
            );
            None
        }
    } else {
        None
    }
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::OnceLock;
    use tempfile::TempDir;
    use tokio::sync::Mutex;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn write_config(dir: &TempDir, name: &str, zone: &str) -> PathBuf {
        let state_dir = dir.path().join(format!("{name}_state"));
        let path = dir.path().join(format!("{name}.toml"));
        let content = format!(
            r#"
[core]
state_dir = "{}"
timezone = "{zone}"
user_emails = ["me@example.com"]
"#,
            state_dir.to_str().unwrap().replace('\\', "/")
        );
        fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn cli_flag_overrides_env_var() {
        let temp_dir = TempDir::new().unwrap();
        let flag_path = write_config(&temp_dir, "flag", "Europe/Berlin");
        let env_path = write_config(&temp_dir, "env", "Asia/Tokyo");

        {
            let _guard = env_lock().lock().await;
            unsafe {
                std::env::remove_var(CALSYNC_DEV_ENV);
                std::env::set_var(CALSYNC_CONFIG_ENV, env_path.to_str().unwrap());
            }

            let (config, _) = parse_config(Some(flag_path)).await.unwrap();

            assert_eq!(config.timezone.as_deref(), Some("Europe/Berlin"));

            unsafe {
                std::env::remove_var(CALSYNC_CONFIG_ENV);
            }
        }
    }

    #[tokio::test]
    async fn env_var_is_used_without_flag() {
        let temp_dir = TempDir::new().unwrap();
        let env_path = write_config(&temp_dir, "env", "Asia/Tokyo");

        {
            let _guard = env_lock().lock().await;
            unsafe {
                std::env::remove_var(CALSYNC_DEV_ENV);
                std::env::set_var(CALSYNC_CONFIG_ENV, env_path.to_str().unwrap());
            }

            let (config, cli) = parse_config(None).await.unwrap();

            assert_eq!(config.timezone.as_deref(), Some("Asia/Tokyo"));
            assert_eq!(config.user_emails, vec!["me@example.com".to_string()]);
            assert_eq!(cli.max_events, 128);
            assert_eq!(cli.days, 7);

            unsafe {
                std::env::remove_var(CALSYNC_CONFIG_ENV);
            }
        }
    }

    #[tokio::test]
    async fn dev_mode_requires_explicit_config() {
        let _guard = env_lock().lock().await;
        unsafe {
            std::env::remove_var(CALSYNC_CONFIG_ENV);
            std::env::set_var(CALSYNC_DEV_ENV, "yes");
        }

        let result = parse_config(None).await;

        unsafe {
            std::env::remove_var(CALSYNC_DEV_ENV);
        }
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Development environment detected"));
    }

    #[tokio::test]
    async fn state_dir_is_created() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(&temp_dir, "state", "UTC");

        let (config, _) = parse_config(Some(path)).await.unwrap();

        let state_dir = config.state_dir.clone().unwrap();
        assert!(state_dir.is_dir());
        assert_eq!(config.database_path(), Some(state_dir.join("calsync.db")));
    }

    #[tokio::test]
    async fn cli_table_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        let state_dir = temp_dir.path().join("state");
        let content = format!(
            r#"
[core]
state_dir = "{}"
sync_throttle_secs = 60

[cli]
max_events = 10
"#,
            state_dir.to_str().unwrap().replace('\\', "/")
        );
        fs::write(&path, content).unwrap();

        let (config, cli) = parse_config(Some(path)).await.unwrap();

        assert_eq!(config.sync_throttle_secs, 60);
        assert_eq!(cli.max_events, 10);
        assert_eq!(cli.days, 7);
    }

    #[tokio::test]
    async fn unknown_zone_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(&temp_dir, "zone", "Mars/Olympus");

        assert!(parse_config(Some(path)).await.is_err());
    }
}
