//! Arena configuration loaded from TOML.

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use strictly_chess::{MatchConfig, SideChoice, TimeControl, DEFAULT_OPPONENT_NAME};
use tracing::instrument;

/// Engine command that selects the in-process random mover.
pub const BUILTIN_ENGINE: &str = "builtin";

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "strictly_chess.toml";

/// Starting time on each clock: a named preset or raw seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TimeSetting {
    /// Named preset.
    Preset(TimeControl),
    /// Custom number of seconds.
    Seconds(u32),
}

impl TimeSetting {
    /// Seconds on each clock.
    pub fn seconds(self) -> u32 {
        match self {
            TimeSetting::Preset(tc) => tc.seconds(),
            TimeSetting::Seconds(s) => s,
        }
    }
}

impl Default for TimeSetting {
    fn default() -> Self {
        TimeSetting::Preset(TimeControl::default())
    }
}

impl fmt::Display for TimeSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeSetting::Preset(tc) => write!(f, "{tc}"),
            TimeSetting::Seconds(s) => write!(f, "{s}"),
        }
    }
}

impl FromStr for TimeSetting {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(tc) = s.parse::<TimeControl>() {
            return Ok(TimeSetting::Preset(tc));
        }
        match s.trim().parse::<u32>() {
            Ok(seconds) if seconds > 0 => Ok(TimeSetting::Seconds(seconds)),
            _ => Err(ConfigError::new(format!(
                "Invalid time control {s:?}: expected bullet, blitz, rapid, classic or a number of seconds"
            ))),
        }
    }
}

impl From<TimeSetting> for String {
    fn from(setting: TimeSetting) -> Self {
        setting.to_string()
    }
}

impl TryFrom<String> for TimeSetting {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Settings for running matches.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// Engine command line, or `builtin`.
    #[serde(default = "default_engine")]
    engine: String,

    /// Display name of the engine.
    #[serde(default = "default_opponent_name")]
    opponent_name: String,

    /// Starting time on each clock.
    #[serde(default)]
    time_control: TimeSetting,

    /// Side the human asks for.
    #[serde(default)]
    side: SideChoice,

    /// Where tracing output goes.
    #[serde(default = "default_log_file")]
    log_file: PathBuf,

    /// Print match events as JSON lines.
    #[serde(default)]
    json_events: bool,

    /// Fixed seed for side coin flips and commentary draws.
    #[serde(default)]
    seed: Option<u64>,
}

fn default_engine() -> String {
    "stockfish".to_string()
}

fn default_opponent_name() -> String {
    DEFAULT_OPPONENT_NAME.to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("strictly_chess.log")
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            opponent_name: default_opponent_name(),
            time_control: TimeSetting::default(),
            side: SideChoice::default(),
            log_file: default_log_file(),
            json_events: false,
            seed: None,
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Engine command line.
    pub engine: Option<String>,
    /// Starting time.
    pub time_control: Option<TimeSetting>,
    /// Requested side.
    pub side: Option<SideChoice>,
    /// Engine display name.
    pub opponent_name: Option<String>,
    /// Log file path.
    pub log_file: Option<PathBuf>,
    /// Emit JSON events.
    pub json_events: bool,
}

impl ArenaConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))
    }

    /// Loads `path` if it exists, defaults otherwise.
    ///
    /// Runs before tracing is installed, so the returned [`ConfigSource`]
    /// is logged by the caller.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<(Self, ConfigSource), ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            let config = Self::from_file(path)?;
            Ok((config, ConfigSource::File(path.to_path_buf())))
        } else {
            Ok((Self::default(), ConfigSource::Defaults))
        }
    }

    /// Applies command-line overrides.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(engine) = overrides.engine {
            self.engine = engine;
        }
        if let Some(tc) = overrides.time_control {
            self.time_control = tc;
        }
        if let Some(side) = overrides.side {
            self.side = side;
        }
        if let Some(name) = overrides.opponent_name {
            self.opponent_name = name;
        }
        if let Some(log_file) = overrides.log_file {
            self.log_file = log_file;
        }
        self.json_events |= overrides.json_events;
        self
    }

    /// Engine command split into program and arguments.
    pub fn engine_command(&self) -> Vec<String> {
        self.engine.split_whitespace().map(|s| s.to_string()).collect()
    }

    /// Whether the in-process engine was selected.
    pub fn uses_builtin_engine(&self) -> bool {
        self.engine.trim().eq_ignore_ascii_case(BUILTIN_ENGINE)
    }

    /// Match settings for a fresh start.
    pub fn match_config(&self) -> MatchConfig {
        MatchConfig::new(self.time_control.seconds(), self.side)
    }
}

/// Where a configuration came from.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ConfigSource {
    /// Read from this file.
    #[display("{}", _0.display())]
    File(PathBuf),
    /// No file found; built-in defaults.
    #[display("defaults")]
    Defaults,
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
