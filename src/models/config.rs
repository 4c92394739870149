//! Configuration types.
//!
//! Every tunable that shapes how Slurm output is requested, parsed and
//! rendered lives here and is passed explicitly to the component that needs
//! it. Values are layered: built-in defaults, `/etc/slurpy/config.toml`, the
//! user config file, then `SLURPY_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub system: SystemConfig,

    pub format: FormatConfig,

    pub display: DisplayConfig,

    pub behavior: BehaviorConfig,
}

/// System configuration for paths and external commands
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Path to directory containing Slurm binaries (sacct, squeue, scancel).
    /// If empty or not set, auto-detected via PATH
    pub slurm_bin_path: Option<PathBuf>,

    /// Seconds to wait for any external command before giving up
    pub command_timeout: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            slurm_bin_path: None,
            command_timeout: 60,
        }
    }
}

/// How output is requested from and parsed out of the Slurm tools
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Width requested for every column; each field then occupies
    /// `field_width + 1` characters including its separator
    pub field_width: usize,

    /// Columns requested from `sacct --format`
    pub sacct_keys: Vec<String>,

    /// Columns requested from `squeue --Format`
    pub squeue_keys: Vec<String>,

    /// Columns holding `YYYY-MM-DDTHH:MM:SS` timestamps
    pub time_keys: Vec<String>,

    /// Rewrite the `T` in timestamps
    pub reformat_times: bool,

    /// Replacement for the `T` separator
    pub time_separator: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

const DEFAULT_SACCT_KEYS: &[&str] = &[
    "JobID",
    "JobName",
    "State",
    "Submit",
    "Start",
    "Elapsed",
    "AveVMSize",
    "MaxVMSize",
    "ReqMem",
    "AveDiskRead",
    "AveDiskWrite",
    "Partition",
    "NodeList",
];

const DEFAULT_SQUEUE_KEYS: &[&str] = &[
    "JobID",
    "Name",
    "UserName",
    "Partition",
    "State",
    "TimeUsed",
    "TimeLeft",
    "NumNodes",
    "StartTime",
    "ReasonList",
];

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            field_width: 50,
            sacct_keys: strings(DEFAULT_SACCT_KEYS),
            squeue_keys: strings(DEFAULT_SQUEUE_KEYS),
            time_keys: strings(&["Submit", "Start", "End", "START_TIME", "SUBMIT_TIME"]),
            reformat_times: true,
            time_separator: " ".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Literal placed between columns, before the spacing
    pub separator: String,

    /// Spaces after the separator
    pub spacing: usize,

    /// `sacct` columns shown when not verbose (empty = all)
    pub columns: Vec<String>,

    /// `squeue` columns shown when not verbose (empty = all)
    pub queue_columns: Vec<String>,

    /// Row count for `--head`/`--tail` given without a value
    pub default_rows: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            separator: ",".to_string(),
            spacing: 1,
            columns: strings(&[
                "JobID",
                "JobName",
                "State",
                "Submit",
                "Start",
                "Elapsed",
                "Partition",
            ]),
            queue_columns: Vec::new(),
            default_rows: 10,
        }
    }
}

impl DisplayConfig {
    /// The full string placed between two rendered fields.
    #[must_use]
    pub fn column_separator(&self) -> String {
        format!("{}{}", self.separator, " ".repeat(self.spacing))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Require confirmation before cancelling jobs
    pub confirm_cancel: bool,

    /// Watch refresh interval in seconds
    pub watch_interval: u64,

    /// Redraw watch frames in place instead of appending them
    pub clear_screen: bool,

    /// States counted by the summary report, in report order
    pub summary_states: Vec<String>,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            confirm_cancel: true,
            watch_interval: 10,
            clear_screen: true,
            summary_states: strings(&[
                "PENDING",
                "RUNNING",
                "COMPLETED",
                "FAILED",
                "CANCELLED",
                "TIMEOUT",
            ]),
        }
    }
}

/// Minimum allowed watch interval / command timeout in seconds
const MIN_INTERVAL: u64 = 1;

/// Numeric fields that require a lower bound.
#[derive(Clone, Copy)]
enum BoundedField {
    CommandTimeout,
    FieldWidth,
    WatchInterval,
}

impl BoundedField {
    /// Returns the config path for error messages (e.g., "system.command_timeout").
    const fn as_str(self) -> &'static str {
        match self {
            Self::CommandTimeout => "system.command_timeout",
            Self::FieldWidth => "format.field_width",
            Self::WatchInterval => "behavior.watch_interval",
        }
    }
}

/// Validate that a value meets the minimum requirement.
/// In non-strict mode, corrects invalid values to the default and adds a warning.
/// In strict mode, returns an error for invalid values.
fn validate_minimum<T>(
    value: &mut T,
    field: BoundedField,
    min: T,
    default: T,
    strict: bool,
    warnings: &mut Vec<String>,
) -> Result<(), String>
where
    T: PartialOrd + Copy + std::fmt::Display,
{
    if *value < min {
        let field_name = field.as_str();
        let msg = format!("{field_name} must be at least {min}, got {value}");
        if strict {
            return Err(msg);
        }
        warnings.push(format!("{msg} - using default ({default})"));
        *value = default;
    }
    Ok(())
}

/// Reset an empty key list to its default.
fn validate_keys(
    keys: &mut Vec<String>,
    field: &str,
    default: &[&str],
    strict: bool,
    warnings: &mut Vec<String>,
) -> Result<(), String> {
    if keys.iter().all(|k| k.trim().is_empty()) {
        let msg = format!("{field} must name at least one column");
        if strict {
            return Err(msg);
        }
        warnings.push(format!("{msg} - using default"));
        *keys = strings(default);
    }
    Ok(())
}

impl Config {
    /// Validate configuration values.
    /// Returns a list of warnings for invalid values that were corrected to defaults.
    /// If `strict` is true, returns Err instead of correcting values.
    pub fn validate(&mut self, strict: bool) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();
        let defaults = Self::default();

        validate_minimum(
            &mut self.system.command_timeout,
            BoundedField::CommandTimeout,
            MIN_INTERVAL,
            defaults.system.command_timeout,
            strict,
            &mut warnings,
        )?;

        validate_minimum(
            &mut self.format.field_width,
            BoundedField::FieldWidth,
            1,
            defaults.format.field_width,
            strict,
            &mut warnings,
        )?;

        validate_minimum(
            &mut self.behavior.watch_interval,
            BoundedField::WatchInterval,
            MIN_INTERVAL,
            defaults.behavior.watch_interval,
            strict,
            &mut warnings,
        )?;

        validate_keys(
            &mut self.format.sacct_keys,
            "format.sacct_keys",
            DEFAULT_SACCT_KEYS,
            strict,
            &mut warnings,
        )?;

        validate_keys(
            &mut self.format.squeue_keys,
            "format.squeue_keys",
            DEFAULT_SQUEUE_KEYS,
            strict,
            &mut warnings,
        )?;

        Ok(warnings)
    }

    /// Get the user config file path, respecting XDG_CONFIG_HOME
    ///
    /// Resolution order:
    /// 1. $XDG_CONFIG_HOME/slurpy/config.toml (if XDG_CONFIG_HOME is set)
    /// 2. $HOME/.config/slurpy/config.toml (if HOME is set)
    /// 3. dirs::config_dir()/slurpy/config.toml (fallback using dirs crate)
    /// 4. None if no config directory can be determined
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
            && !xdg_config.is_empty()
        {
            return Some(PathBuf::from(xdg_config).join("slurpy/config.toml"));
        }

        if let Some(home) = std::env::var_os("HOME") {
            return Some(PathBuf::from(home).join(".config/slurpy/config.toml"));
        }

        dirs::config_dir().map(|dir| dir.join("slurpy/config.toml"))
    }

    /// Load configuration from files and environment.
    /// Returns the config and any warnings encountered during loading.
    ///
    /// # Errors
    /// Only in strict mode (`SLURPY_STRICT_CONFIG=1`): any parse, read,
    /// override or validation problem is returned as an error.
    pub fn load() -> Result<(Self, Vec<String>), String> {
        let mut config = Self::default();
        let mut warnings = Vec::new();
        let strict = Self::is_strict_mode();

        config.load_file("/etc/slurpy/config.toml", strict, &mut warnings)?;

        if let Some(user_path) = Self::user_config_path() {
            config.load_file(&user_path.to_string_lossy(), strict, &mut warnings)?;
        }

        config.apply_env_overrides(strict, &mut warnings)?;

        warnings.extend(config.validate(strict)?);

        Ok((config, warnings))
    }

    /// Check if strict config mode is enabled via SLURPY_STRICT_CONFIG
    fn is_strict_mode() -> bool {
        std::env::var("SLURPY_STRICT_CONFIG")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// Merge a config file, collecting warnings on parse errors but not on missing files.
    fn load_file(
        &mut self,
        path: &str,
        strict: bool,
        warnings: &mut Vec<String>,
    ) -> Result<(), String> {
        match std::fs::read_to_string(path) {
            Ok(content) => match self.overlay(&content) {
                Ok(()) => {
                    tracing::debug!("loaded config file '{}'", path);
                }
                Err(e) => {
                    let msg = format!("Failed to parse config file '{}': {}", path, e);
                    if strict {
                        return Err(msg);
                    }
                    warnings.push(msg);
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File not found is expected and not an error
            }
            Err(e) => {
                let msg = format!("Could not read config file '{}': {}", path, e);
                if strict {
                    return Err(msg);
                }
                warnings.push(msg);
            }
        }
        Ok(())
    }

    /// Apply only the keys present in `content` on top of the current values.
    ///
    /// The current config is left untouched when `content` does not parse or
    /// does not fit the schema.
    fn overlay(&mut self, content: &str) -> Result<(), String> {
        let layer: toml::Table = content.parse().map_err(|e: toml::de::Error| e.to_string())?;
        let toml::Value::Table(mut base) =
            toml::Value::try_from(&*self).map_err(|e| e.to_string())?
        else {
            return Err("configuration does not serialize to a table".to_string());
        };
        merge_tables(&mut base, layer);
        *self = toml::Value::Table(base)
            .try_into()
            .map_err(|e: toml::de::Error| e.to_string())?;
        Ok(())
    }

    fn apply_env_overrides(
        &mut self,
        strict: bool,
        warnings: &mut Vec<String>,
    ) -> Result<(), String> {
        if let Ok(val) = std::env::var("SLURPY_SLURM_PATH")
            && !val.is_empty()
        {
            let path = PathBuf::from(&val);
            if path.is_dir() {
                self.system.slurm_bin_path = Some(path);
            } else {
                env_error(strict, warnings, "SLURPY_SLURM_PATH", &val, "not a valid directory")?;
            }
        }

        if let Ok(val) = std::env::var("SLURPY_COMMAND_TIMEOUT") {
            match val.parse::<u64>() {
                Ok(secs) => self.system.command_timeout = secs,
                Err(_) => env_error(
                    strict,
                    warnings,
                    "SLURPY_COMMAND_TIMEOUT",
                    &val,
                    "expected a positive integer (seconds)",
                )?,
            }
        }

        if let Ok(val) = std::env::var("SLURPY_WATCH_INTERVAL") {
            match val.parse::<u64>() {
                Ok(secs) => self.behavior.watch_interval = secs,
                Err(_) => env_error(
                    strict,
                    warnings,
                    "SLURPY_WATCH_INTERVAL",
                    &val,
                    "expected a positive integer (seconds)",
                )?,
            }
        }

        if let Ok(val) = std::env::var("SLURPY_FIELD_WIDTH") {
            match val.parse::<usize>() {
                Ok(width) => self.format.field_width = width,
                Err(_) => env_error(
                    strict,
                    warnings,
                    "SLURPY_FIELD_WIDTH",
                    &val,
                    "expected a positive integer",
                )?,
            }
        }

        if std::env::var("SLURPY_NO_CONFIRM").is_ok() {
            self.behavior.confirm_cancel = false;
        }

        Ok(())
    }
}

/// Recursively overwrite `base` with every key set in `layer`.
fn merge_tables(base: &mut toml::Table, layer: toml::Table) {
    for (key, value) in layer {
        if let toml::Value::Table(layer) = value {
            if let Some(toml::Value::Table(section)) = base.get_mut(&key) {
                merge_tables(section, layer);
                continue;
            }
            base.insert(key, toml::Value::Table(layer));
        } else {
            base.insert(key, value);
        }
    }
}

/// Report an environment variable error, failing if strict mode is enabled
fn env_error(
    strict: bool,
    warnings: &mut Vec<String>,
    var_name: &str,
    value: &str,
    reason: &str,
) -> Result<(), String> {
    let msg = format!("Invalid value '{}' for {}: {}", value, var_name, reason);
    if strict {
        return Err(msg);
    }
    warnings.push(format!("{msg} - using default"));
    Ok(())
}
