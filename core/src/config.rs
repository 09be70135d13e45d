// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::error::Error;
use std::path::{Path, PathBuf};

use calsync_caldav::AuthMethod;
use jiff::tz::TimeZone;

use crate::recurrence::Limits;

/// The name of the application.
pub const APP_NAME: &str = "calsync";

/// File name of the store inside the state directory.
const DATABASE_FILE: &str = "calsync.db";

/// Configuration of an [`Agenda`](crate::Agenda).
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// Directory holding the store. The store lives in memory when unset.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    /// IANA name of the zone used for floating times, e.g. `Europe/Berlin`.
    /// Detected from the system when unset.
    #[serde(default)]
    pub timezone: Option<String>,

    /// Seconds between two checks of the same calendar.
    #[serde(default = "default_sync_throttle_secs")]
    pub sync_throttle_secs: i64,

    /// Most occurrences stored per series.
    #[serde(default = "default_max_occurrences")]
    pub max_occurrences: usize,

    /// How many years ahead open-ended series are expanded.
    #[serde(default = "default_horizon_years")]
    pub horizon_years: i16,

    /// Addresses of the user, to recognize events they organize.
    #[serde(default)]
    pub user_emails: Vec<String>,

    /// Log a summary of every DAV exchange.
    #[serde(default)]
    pub debug: bool,

    /// Credentials by the name sources refer to them with.
    #[serde(default)]
    pub credentials: HashMap<String, AuthMethod>,

    /// Owner of every calendar the agenda touches.
    #[serde(default = "default_user_id")]
    pub user_id: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_dir: None,
            timezone: None,
            sync_throttle_secs: default_sync_throttle_secs(),
            max_occurrences: default_max_occurrences(),
            horizon_years: default_horizon_years(),
            user_emails: Vec::new(),
            debug: false,
            credentials: HashMap::new(),
            user_id: default_user_id(),
        }
    }
}

impl Config {
    /// Normalize the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the state directory cannot be expanded or the zone
    /// is unknown.
    pub fn normalize(&mut self) -> Result<(), Box<dyn Error>> {
        if let Some(dir) = &self.state_dir {
            self.state_dir = Some(
                expand_path(dir).map_err(|e| format!("Failed to expand state directory path: {e}"))?,
            );
        }

        if let Some(name) = &self.timezone {
            TimeZone::get(name).map_err(|e| format!("Unknown time zone '{name}': {e}"))?;
        }

        if self.sync_throttle_secs < 0 {
            return Err("sync_throttle_secs must not be negative".into());
        }
        Ok(())
    }

    /// Location of the store, `None` for an in-memory store.
    #[must_use]
    pub fn database_path(&self) -> Option<PathBuf> {
        self.state_dir.as_ref().map(|dir| dir.join(DATABASE_FILE))
    }

    /// The zone floating times are read in.
    #[must_use]
    pub fn time_zone(&self) -> TimeZone {
        let name = match &self.timezone {
            Some(name) => name.clone(),
            None => match iana_time_zone::get_timezone() {
                Ok(name) => name,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to detect time zone, using UTC");
                    return TimeZone::UTC;
                }
            },
        };
        TimeZone::get(&name).unwrap_or_else(|e| {
            tracing::warn!(tzid = name, error = %e, "unknown time zone, using UTC");
            TimeZone::UTC
        })
    }

    /// Bounds for expanding series.
    #[must_use]
    pub fn limits(&self) -> Limits {
        Limits {
            max_occurrences: self.max_occurrences.max(1),
            horizon_years: self.horizon_years.max(1),
        }
    }
}

const fn default_sync_throttle_secs() -> i64 {
    10
}

const fn default_max_occurrences() -> usize {
    999
}

const fn default_horizon_years() -> i16 {
    20
}

const fn default_user_id() -> i64 {
    1
}

/// Default state directory, e.g. `$XDG_STATE_HOME/calsync`.
///
/// # Errors
///
/// Returns an error if the platform has no state directory for the user.
pub fn default_state_dir() -> Result<PathBuf, Box<dyn Error>> {
    Ok(get_state_dir()?.join(APP_NAME))
}

/// Handle tilde (~) and environment variables in the path
///
/// # Errors
///
/// Returns an error if the path is not valid UTF-8 or a referenced directory
/// is unknown.
pub fn expand_path(path: &Path) -> Result<PathBuf, Box<dyn Error>> {
    if path.is_absolute() {
        return Ok(path.to_owned());
    }

    let path = path.to_str().ok_or("Invalid path")?;

    // Handle tilde and home directory
    let home_prefixes: &[&str] = if cfg!(unix) {
        &["~/", "$HOME/", "${HOME}/"]
    } else {
        &[r"~\", "~/", r"%UserProfile%\", r"%UserProfile%/"]
    };
    for prefix in home_prefixes {
        if let Some(stripped) = path.strip_prefix(prefix) {
            return Ok(get_home_dir()?.join(stripped));
        }
    }

    // Handle config directories
    let config_prefixes: &[&str] = if cfg!(unix) {
        &["$XDG_CONFIG_HOME/", "${XDG_CONFIG_HOME}/"]
    } else {
        &[r"%LOCALAPPDATA%\", "%LOCALAPPDATA%/"]
    };
    for prefix in config_prefixes {
        if let Some(stripped) = path.strip_prefix(prefix) {
            return Ok(get_config_dir()?.join(stripped));
        }
    }

    Ok(path.into())
}

fn get_home_dir() -> Result<PathBuf, Box<dyn Error>> {
    dirs::home_dir().ok_or("User-specific home directory not found".into())
}

/// User configuration directory, e.g. `$XDG_CONFIG_HOME`.
///
/// # Errors
///
/// Returns an error if the platform has no configuration directory for the user.
pub fn get_config_dir() -> Result<PathBuf, Box<dyn Error>> {
    #[cfg(unix)]
    let config_dir = xdg::BaseDirectories::new().get_config_home();
    #[cfg(windows)]
    let config_dir = dirs::config_dir();
    config_dir.ok_or("User-specific config directory not found".into())
}

fn get_state_dir() -> Result<PathBuf, Box<dyn Error>> {
    #[cfg(unix)]
    let state_dir = xdg::BaseDirectories::new().get_state_home();
    #[cfg(windows)]
    let state_dir = dirs::data_dir();
    state_dir.ok_or("User-specific state directory not found".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config: Config = serde_json::from_str(r#"{ "user_emails": ["ann@example.com"] }"#).unwrap();

        assert_eq!(config.sync_throttle_secs, 10);
        assert_eq!(config.limits(), Limits::default());
        assert_eq!(config.user_id, 1);
        assert_eq!(config.user_emails, vec!["ann@example.com".to_string()]);
        assert_eq!(config.database_path(), None);
    }

    #[test]
    fn credentials_deserialize_by_type() {
        let config: Config = serde_json::from_str(
            r#"{ "credentials": { "work": { "type": "basic", "username": "ann", "password": "pw" } } }"#,
        )
        .unwrap();

        assert_eq!(
            config.credentials.get("work"),
            Some(&AuthMethod::Basic {
                username: "ann".to_string(),
                password: "pw".to_string(),
            })
        );
    }

    #[test]
    fn normalize_rejects_unknown_zone() {
        let mut config = Config {
            timezone: Some("Mars/Olympus".to_string()),
            ..Config::default()
        };

        assert!(config.normalize().is_err());
    }

    #[test]
    fn configured_zone_is_used() {
        let config = Config {
            timezone: Some("Asia/Tokyo".to_string()),
            ..Config::default()
        };

        assert_eq!(config.time_zone().iana_name(), Some("Asia/Tokyo"));
    }

    #[test]
    fn database_lives_in_state_dir() {
        let config = Config {
            state_dir: Some(PathBuf::from("/var/lib/calsync")),
            ..Config::default()
        };

        assert_eq!(
            config.database_path(),
            Some(PathBuf::from("/var/lib/calsync/calsync.db"))
        );
    }

    #[test]
    fn expand_path_home_env() {
        let home = get_home_dir().unwrap();
        let home_prefixes: &[&str] = if cfg!(unix) {
            &["~", "$HOME", "${HOME}"]
        } else {
            &[r"~", r"%UserProfile%"]
        };
        for prefix in home_prefixes {
            let result = expand_path(&PathBuf::from(format!("{prefix}/Documents"))).unwrap();
            assert_eq!(result, home.join("Documents"));
            assert!(result.is_absolute());
        }
    }

    #[test]
    fn expand_path_keeps_absolute_and_relative() {
        let absolute = PathBuf::from("/etc/calsync");
        let relative = PathBuf::from("relative/path");

        assert_eq!(expand_path(&absolute).unwrap(), absolute);
        assert_eq!(expand_path(&relative).unwrap(), relative);
    }
}
