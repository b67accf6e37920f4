//! Display options for the actionable callback.
//!
//! Options are resolved once, before any event fires, and handed to the
//! renderer as an immutable struct. Sources are merged with the usual
//! precedence:
//!
//! 1. Default values (lowest priority)
//! 2. Options file (TOML, YAML, or JSON)
//! 3. Environment variables (highest priority)
//!
//! # Options File Format (TOML)
//!
//! ```toml
//! # Show unchanged "ok" result lines (default: false)
//! display_ok_hosts = false
//!
//! # Accepted for compatibility; skipped results are never displayed
//! display_skipped_hosts = false
//!
//! # Route failure and unreachable output to stderr
//! display_failed_stderr = false
//!
//! # Print the failing task's source location at low verbosity
//! show_task_path_on_failure = false
//!
//! # Echo task arguments in banners (unless the task is no_log)
//! display_args_to_stdout = false
//!
//! # Verbosity level (0-4)
//! verbosity = 0
//!
//! # Colored output (also gated by NO_COLOR and tty detection)
//! use_colors = true
//! ```
//!
//! # Environment Variables
//!
//! - `ACTIONABLE_DISPLAY_OK_HOSTS` - Show unchanged-ok lines (true/false)
//! - `ACTIONABLE_DISPLAY_SKIPPED_HOSTS` - Accepted, see above
//! - `ACTIONABLE_DISPLAY_FAILED_STDERR` - Failures to stderr (true/false)
//! - `ACTIONABLE_SHOW_TASK_PATH_ON_FAILURE` - Task path on failure
//! - `ACTIONABLE_DISPLAY_ARGS_TO_STDOUT` - Echo task args in banners
//! - `ACTIONABLE_VERBOSITY` - Verbosity level (0-4)
//! - `NO_COLOR` - Standard variable, disables colors when set

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Display options for the actionable callback.
///
/// All fields default to the quietest setting: nothing but changes and
/// failures is shown, everything goes to stdout, colors follow the terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionableOptions {
    /// Show unchanged "ok" result lines.
    pub display_ok_hosts: bool,

    /// Accepted for compatibility with the common callback option set.
    /// Skipped results are never displayed regardless of this value; its
    /// only observable effect is that enabling it together with
    /// `display_ok_hosts` makes task banners print at task start instead
    /// of being deferred to the first displayed result.
    pub display_skipped_hosts: bool,

    /// Route failure and unreachable output to stderr instead of stdout.
    pub display_failed_stderr: bool,

    /// Print the failing task's source location when verbosity is below 2.
    pub show_task_path_on_failure: bool,

    /// Echo task arguments in banners. Security-sensitive: honored only
    /// when the task itself is not `no_log`.
    pub display_args_to_stdout: bool,

    /// Verbosity level (0-4, clamped).
    pub verbosity: u8,

    /// Whether to use colored output. The display layer additionally gates
    /// this on `NO_COLOR` and on stdout being a terminal.
    pub use_colors: bool,
}

impl Default for ActionableOptions {
    fn default() -> Self {
        Self {
            display_ok_hosts: false,
            display_skipped_hosts: false,
            display_failed_stderr: false,
            show_task_path_on_failure: false,
            display_args_to_stdout: false,
            verbosity: 0,
            use_colors: true,
        }
    }
}

impl ActionableOptions {
    /// Create options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a file, then overlay environment variables.
    ///
    /// This is the full-precedence entry point an embedding runtime calls
    /// at startup.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut options = Self::from_path(path)?;
        options.apply_env();
        Ok(options)
    }

    /// Load options from a TOML, YAML, or JSON file.
    ///
    /// The format is chosen by file extension; unknown extensions are tried
    /// as TOML first, then YAML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| Error::OptionsRead {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let mut options: Self = match extension {
            "toml" => toml::from_str(&content).map_err(|e| Error::OptionsParse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?,
            "yml" | "yaml" => serde_yaml::from_str(&content).map_err(|e| Error::OptionsParse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?,
            "json" => serde_json::from_str(&content).map_err(|e| Error::OptionsParse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?,
            _ => toml::from_str(&content)
                .or_else(|_| serde_yaml::from_str(&content))
                .map_err(|e: serde_yaml::Error| Error::OptionsParse {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?,
        };

        options.verbosity = options.verbosity.min(4);
        debug!(path = %path.display(), "loaded actionable options file");
        Ok(options)
    }

    /// Build options from defaults plus environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut options = Self::default();
        options.apply_env();
        options
    }

    /// Overlay `ACTIONABLE_*` environment variables onto these options.
    ///
    /// Unparseable values are logged and skipped rather than failing the
    /// run; display configuration is never worth aborting over.
    pub fn apply_env(&mut self) {
        if let Some(val) = env_bool("ACTIONABLE_DISPLAY_OK_HOSTS") {
            self.display_ok_hosts = val;
        }
        if let Some(val) = env_bool("ACTIONABLE_DISPLAY_SKIPPED_HOSTS") {
            self.display_skipped_hosts = val;
        }
        if let Some(val) = env_bool("ACTIONABLE_DISPLAY_FAILED_STDERR") {
            self.display_failed_stderr = val;
        }
        if let Some(val) = env_bool("ACTIONABLE_SHOW_TASK_PATH_ON_FAILURE") {
            self.show_task_path_on_failure = val;
        }
        if let Some(val) = env_bool("ACTIONABLE_DISPLAY_ARGS_TO_STDOUT") {
            self.display_args_to_stdout = val;
        }

        if let Ok(val) = env::var("ACTIONABLE_VERBOSITY") {
            match val.parse::<u8>() {
                Ok(level) => self.verbosity = level.min(4),
                Err(_) => warn!(value = %val, "ignoring unparseable ACTIONABLE_VERBOSITY"),
            }
        }

        // Standard NO_COLOR convention: any value disables colors.
        if env::var("NO_COLOR").is_ok() {
            self.use_colors = false;
        }
    }

    /// Set an option by name, as a runtime resolving string-valued plugin
    /// configuration would.
    pub fn set_option(&mut self, option: &str, value: &str) -> Result<()> {
        let invalid = || Error::InvalidOption {
            option: option.to_string(),
            value: value.to_string(),
        };

        match option {
            "display_ok_hosts" => self.display_ok_hosts = parse_bool(value).ok_or_else(invalid)?,
            "display_skipped_hosts" => {
                self.display_skipped_hosts = parse_bool(value).ok_or_else(invalid)?;
            }
            "display_failed_stderr" => {
                self.display_failed_stderr = parse_bool(value).ok_or_else(invalid)?;
            }
            "show_task_path_on_failure" => {
                self.show_task_path_on_failure = parse_bool(value).ok_or_else(invalid)?;
            }
            "display_args_to_stdout" => {
                self.display_args_to_stdout = parse_bool(value).ok_or_else(invalid)?;
            }
            "verbosity" => {
                self.verbosity = value.parse::<u8>().map_err(|_| invalid())?.min(4);
            }
            "use_colors" => self.use_colors = parse_bool(value).ok_or_else(invalid)?,
            _ => return Err(invalid()),
        }
        Ok(())
    }

    /// Set the verbosity level with bounds checking.
    pub fn set_verbosity(&mut self, level: u8) {
        self.verbosity = level.min(4);
    }

    /// Builder-style verbosity setter.
    #[must_use]
    pub fn with_verbosity(mut self, level: u8) -> Self {
        self.set_verbosity(level);
        self
    }
}

/// Parse a boolean option value the way the callback config layer does:
/// `"true"`/`"1"` are true, `"false"`/`"0"` are false, anything else is
/// unrecognized.
fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn env_bool(name: &str) -> Option<bool> {
    let val = env::var(name).ok()?;
    let parsed = parse_bool(&val);
    if parsed.is_none() {
        warn!(var = name, value = %val, "ignoring unparseable boolean option");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_quiet() {
        let options = ActionableOptions::default();
        assert!(!options.display_ok_hosts);
        assert!(!options.display_skipped_hosts);
        assert!(!options.display_failed_stderr);
        assert!(!options.show_task_path_on_failure);
        assert!(!options.display_args_to_stdout);
        assert_eq!(options.verbosity, 0);
        assert!(options.use_colors);
    }

    #[test]
    fn set_option_accepts_known_names() {
        let mut options = ActionableOptions::default();
        options.set_option("display_ok_hosts", "true").unwrap();
        options.set_option("display_failed_stderr", "1").unwrap();
        options.set_option("verbosity", "3").unwrap();
        assert!(options.display_ok_hosts);
        assert!(options.display_failed_stderr);
        assert_eq!(options.verbosity, 3);
    }

    #[test]
    fn set_option_rejects_bad_values() {
        let mut options = ActionableOptions::default();
        assert!(options.set_option("display_ok_hosts", "maybe").is_err());
        assert!(options.set_option("verbosity", "lots").is_err());
        assert!(options.set_option("no_such_option", "true").is_err());
    }

    #[test]
    fn verbosity_is_clamped() {
        let mut options = ActionableOptions::default();
        options.set_verbosity(9);
        assert_eq!(options.verbosity, 4);

        options.set_option("verbosity", "200").unwrap();
        assert_eq!(options.verbosity, 4);
    }

    #[test]
    fn parse_bool_recognizes_the_usual_spellings() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let options: ActionableOptions =
            toml::from_str("display_ok_hosts = true\nverbosity = 2\n").unwrap();
        assert!(options.display_ok_hosts);
        assert_eq!(options.verbosity, 2);
        assert!(!options.display_failed_stderr);
        assert!(options.use_colors);
    }
}
