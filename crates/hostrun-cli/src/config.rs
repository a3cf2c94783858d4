//! Configuration loading and types

use std::path::{Path, PathBuf};
use std::time::Duration;

use hostrun_core::{DispatchConfig, DispatchMode};
use serde::{Deserialize, Serialize};

/// Top-level configuration for hostrun
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Dispatch settings
    #[serde(default)]
    pub dispatch: DispatchSettings,
    /// Logging settings
    #[serde(default)]
    pub log: LogSettings,
    /// File the configuration came from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Timeouts and concurrency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// Connect plus authentication limit per host, in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Whole-task limit per host, in seconds; `0` disables it
    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: Option<u64>,
    /// Concurrent channel cap, 0 for unbounded
    #[serde(default)]
    pub max_parallel: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            task_timeout_secs: default_task_timeout(),
            max_parallel: 0,
        }
    }
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_task_timeout() -> Option<u64> {
    Some(600)
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Log line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Command-line overrides for dispatch settings
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub connect_timeout_secs: Option<u64>,
    pub task_timeout_secs: Option<u64>,
    pub max_parallel: Option<usize>,
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Load from `HOSTRUN_CONFIG` or the default paths, or use defaults
    ///
    /// # Errors
    /// Returns error if a config file exists but cannot be read or parsed
    pub fn load_default() -> eyre::Result<Self> {
        if let Ok(path) = std::env::var("HOSTRUN_CONFIG") {
            return Self::load(Path::new(&path));
        }

        let paths = [
            Some(PathBuf::from("hostrun.toml")),
            Some(PathBuf::from("/etc/hostrun/hostrun.toml")),
            dirs::config_dir().map(|p| p.join("hostrun/hostrun.toml")),
        ];

        for path in paths.into_iter().flatten() {
            if path.exists() {
                return Self::load(&path);
            }
        }

        Ok(Config::default())
    }

    /// Resolve the dispatcher configuration, applying command-line overrides
    #[must_use]
    pub fn dispatch_config(&self, mode: DispatchMode, overrides: Overrides) -> DispatchConfig {
        let connect_timeout = overrides
            .connect_timeout_secs
            .unwrap_or(self.dispatch.connect_timeout_secs);
        let task_timeout = overrides
            .task_timeout_secs
            .or(self.dispatch.task_timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        let max_parallel = overrides.max_parallel.unwrap_or(self.dispatch.max_parallel);

        DispatchConfig::default()
            .with_mode(mode)
            .with_connect_timeout(Duration::from_secs(connect_timeout))
            .with_task_timeout(task_timeout)
            .with_max_parallel(max_parallel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        let dispatch = config.dispatch_config(DispatchMode::Sequential, Overrides::default());

        assert_eq!(config.log.level, "warn");
        assert_eq!(config.log.format, LogFormat::Text);
        assert_eq!(dispatch.connect_timeout, Duration::from_secs(30));
        assert_eq!(dispatch.task_timeout, Some(Duration::from_secs(600)));
        assert_eq!(dispatch.max_parallel, None);
    }

    #[test]
    fn test_task_timeout_defaults_when_file_omits_it() {
        let config: Config = toml::from_str("[dispatch]\nconnect_timeout_secs = 10\n").unwrap();
        assert_eq!(config.dispatch.task_timeout_secs, Some(600));

        let disabled: Config = toml::from_str("[dispatch]\ntask_timeout_secs = 0\n").unwrap();
        let dispatch = disabled.dispatch_config(DispatchMode::Sequential, Overrides::default());
        assert_eq!(dispatch.task_timeout, None);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            b"[dispatch]\ntask_timeout_secs = 120\nmax_parallel = 16\n\n[log]\nformat = \"json\"\n",
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.source.as_deref(), Some(file.path()));
        assert_eq!(config.dispatch.connect_timeout_secs, 30);
        assert_eq!(config.log.level, "warn");
        assert_eq!(config.log.format, LogFormat::Json);

        let dispatch = config.dispatch_config(DispatchMode::Concurrent, Overrides::default());
        assert_eq!(dispatch.mode, DispatchMode::Concurrent);
        assert_eq!(dispatch.task_timeout, Some(Duration::from_secs(120)));
        assert_eq!(dispatch.max_parallel, Some(16));
    }

    #[test]
    fn test_overrides_win() {
        let config: Config = toml::from_str("[dispatch]\nmax_parallel = 16\n").unwrap();
        let dispatch = config.dispatch_config(
            DispatchMode::Concurrent,
            Overrides {
                connect_timeout_secs: Some(5),
                task_timeout_secs: Some(0),
                max_parallel: Some(0),
            },
        );

        assert_eq!(dispatch.connect_timeout, Duration::from_secs(5));
        assert_eq!(dispatch.task_timeout, None);
        assert_eq!(dispatch.max_parallel, None);
    }

    #[test]
    fn test_invalid_file_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"[dispatch]\nmax_parallel = \"lots\"\n").unwrap();

        assert!(Config::load(file.path()).is_err());
    }
}
