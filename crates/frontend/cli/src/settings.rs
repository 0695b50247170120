use pad_core::logging::{LogCategory, LogConfig, LogLevel, DEFAULT_RATE_LIMIT};
use pad_core::timing::DEFAULT_CLOCK_HZ;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("cannot read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("cannot encode settings: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("cannot open log file {path}: {source}")]
    LogFile { path: PathBuf, source: io::Error },
    #[error("clock_hz must be non-zero")]
    InvalidClock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: LogLevel,
    /// Per-category overrides; absent categories follow `level`.
    pub categories: HashMap<LogCategory, LogLevel>,
    pub file: Option<PathBuf>,
    pub rate_limit: usize,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            categories: HashMap::new(),
            file: None,
            rate_limit: DEFAULT_RATE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Clock of the simulated board; bus timings are scaled from it.
    pub clock_hz: u32,
    pub genesis_alternate_mode: bool,
    /// Player number reported by the SNES driver (1..=4).
    pub snes_player: u8,
    pub logging: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            clock_hz: DEFAULT_CLOCK_HZ,
            genesis_alternate_mode: false,
            snes_player: 1,
            logging: LogSettings::default(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self =
            serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the simulated board cannot run with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.clock_hz == 0 {
            return Err(SettingsError::InvalidClock);
        }
        Ok(())
    }

    /// Load settings, falling back to defaults on error
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("{}. Using defaults.", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Push the logging section into the global [`LogConfig`].
    pub fn apply(&self) -> Result<(), SettingsError> {
        self.validate()?;
        let config = LogConfig::global();
        config.set_global_level(self.logging.level);
        for category in LogCategory::ALL {
            let level = self
                .logging
                .categories
                .get(&category)
                .copied()
                .unwrap_or(LogLevel::Off);
            config.set_level(category, level);
        }
        config.set_rate_limit(self.logging.rate_limit);

        match &self.logging.file {
            Some(path) => config
                .set_log_file(path.clone())
                .map_err(|source| SettingsError::LogFile {
                    path: path.clone(),
                    source,
                })?,
            None => config.clear_log_file(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("padprobe-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.clock_hz, 16_000_000);
        assert!(!settings.genesis_alternate_mode);
        assert_eq!(settings.snes_player, 1);
        assert_eq!(settings.logging.level, LogLevel::Warn);
        assert_eq!(settings.logging.rate_limit, DEFAULT_RATE_LIMIT);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: Settings = serde_json::from_str(
            r#"{ "genesis_alternate_mode": true, "logging": { "categories": { "joybus": "trace" } } }"#,
        )
        .expect("parse");
        assert!(settings.genesis_alternate_mode);
        assert_eq!(settings.clock_hz, DEFAULT_CLOCK_HZ);
        assert_eq!(settings.logging.level, LogLevel::Warn);
        assert_eq!(
            settings.logging.categories.get(&LogCategory::Joybus),
            Some(&LogLevel::Trace)
        );
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path("roundtrip");
        let mut settings = Settings::default();
        settings.clock_hz = 8_000_000;
        settings
            .logging
            .categories
            .insert(LogCategory::Pak, LogLevel::Debug);
        settings.save(&path).expect("save");

        let loaded = Settings::load(&path).expect("load");
        assert_eq!(loaded, settings);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let path = temp_path("does-not-exist");
        let _ = fs::remove_file(&path);
        assert!(matches!(
            Settings::load(&path),
            Err(SettingsError::Read { .. })
        ));
        assert_eq!(Settings::load_or_default(&path), Settings::default());
    }

    #[test]
    fn test_bad_json_is_a_parse_error() {
        let path = temp_path("bad");
        fs::write(&path, "{ not json").expect("write");
        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
        assert!(err.to_string().contains("invalid settings"));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_zero_clock_is_rejected() {
        let path = temp_path("zero-clock");
        fs::write(&path, r#"{"clock_hz":0}"#).expect("write");
        assert!(matches!(
            Settings::load(&path),
            Err(SettingsError::InvalidClock)
        ));
        assert_eq!(Settings::load_or_default(&path), Settings::default());
        let _ = fs::remove_file(&path);

        let settings = Settings {
            clock_hz: 0,
            ..Settings::default()
        };
        assert!(matches!(settings.apply(), Err(SettingsError::InvalidClock)));
    }
}
