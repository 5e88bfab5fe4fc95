//! Instance configuration.
//!
//! An [`InstanceConfig`] names the instance and carries the system
//! parameters applied between instance creation and initialization. Unset
//! fields leave the engine default in place.

use std::ffi::CString;
use std::path::{Path, PathBuf};

use jetbind_sys::Param;
use serde::{Deserialize, Serialize};

use crate::error::{JetError, JetResult};

/// Value of one system parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Integer-valued parameter.
    Integer(usize),
    /// String-valued parameter.
    Text(String),
}

/// Configuration for creating an engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstanceConfig {
    /// Unique instance name.
    pub name: String,

    /// Name shown in engine diagnostics.
    pub display_name: Option<String>,

    /// Directory for the checkpoint file.
    pub system_path: Option<PathBuf>,

    /// Directory for transaction log files.
    pub log_file_path: Option<PathBuf>,

    /// Path of the temporary database.
    pub temp_path: Option<PathBuf>,

    /// Three-character prefix for log and checkpoint files.
    pub base_name: Option<String>,

    /// Maximum number of sessions.
    pub max_sessions: Option<usize>,

    /// Maximum number of open tables.
    pub max_open_tables: Option<usize>,

    /// Maximum number of open cursors.
    pub max_cursors: Option<usize>,

    /// Maximum number of version store pages.
    pub max_ver_pages: Option<usize>,

    /// Size of each log file in kilobytes.
    pub log_file_size: Option<usize>,

    /// Reuse log files once they are no longer needed.
    pub circular_log: Option<bool>,

    /// Run crash recovery on initialization.
    pub recovery: Option<bool>,

    /// Create missing directories for the paths above.
    pub create_path_if_not_exist: Option<bool>,

    /// Maximum database cache size in pages.
    pub cache_size_max: Option<usize>,

    /// Database page size in bytes.
    pub database_page_size: Option<usize>,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            name: "jetbind".to_string(),
            display_name: None,
            system_path: None,
            log_file_path: None,
            temp_path: None,
            base_name: None,
            max_sessions: None,
            max_open_tables: None,
            max_cursors: None,
            max_ver_pages: None,
            log_file_size: None,
            circular_log: None,
            recovery: None,
            create_path_if_not_exist: None,
            cache_size_max: None,
            database_page_size: None,
        }
    }
}

impl InstanceConfig {
    /// Creates a configuration for an instance called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parses a configuration from JSON.
    pub fn from_json_str(json: &str) -> JetResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| JetError::config(format!("invalid instance configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> JetResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| JetError::config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    /// Serializes the configuration as pretty-printed JSON.
    pub fn to_json_string(&self) -> JetResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| JetError::config(e.to_string()))
    }

    /// Sets the display name.
    #[must_use]
    pub fn display_name(mut self, value: impl Into<String>) -> Self {
        self.display_name = Some(value.into());
        self
    }

    /// Sets the system (checkpoint) directory.
    #[must_use]
    pub fn system_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.system_path = Some(path.into());
        self
    }

    /// Sets the log file directory.
    #[must_use]
    pub fn log_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file_path = Some(path.into());
        self
    }

    /// Sets the temporary database path.
    #[must_use]
    pub fn temp_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.temp_path = Some(path.into());
        self
    }

    /// Puts system, log and temp files under one directory.
    #[must_use]
    pub fn directory(self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.system_path(dir)
            .log_file_path(dir)
            .temp_path(dir.join("tmp.edb"))
    }

    /// Sets the log file prefix.
    #[must_use]
    pub fn base_name(mut self, value: impl Into<String>) -> Self {
        self.base_name = Some(value.into());
        self
    }

    /// Sets the maximum number of sessions.
    #[must_use]
    pub fn max_sessions(mut self, value: usize) -> Self {
        self.max_sessions = Some(value);
        self
    }

    /// Sets the maximum number of open tables.
    #[must_use]
    pub fn max_open_tables(mut self, value: usize) -> Self {
        self.max_open_tables = Some(value);
        self
    }

    /// Sets the maximum number of open cursors.
    #[must_use]
    pub fn max_cursors(mut self, value: usize) -> Self {
        self.max_cursors = Some(value);
        self
    }

    /// Sets the maximum number of version store pages.
    #[must_use]
    pub fn max_ver_pages(mut self, value: usize) -> Self {
        self.max_ver_pages = Some(value);
        self
    }

    /// Sets the log file size in kilobytes.
    #[must_use]
    pub fn log_file_size(mut self, value: usize) -> Self {
        self.log_file_size = Some(value);
        self
    }

    /// Enables or disables circular logging.
    #[must_use]
    pub fn circular_log(mut self, value: bool) -> Self {
        self.circular_log = Some(value);
        self
    }

    /// Enables or disables crash recovery.
    #[must_use]
    pub fn recovery(mut self, value: bool) -> Self {
        self.recovery = Some(value);
        self
    }

    /// Creates missing directories on initialization.
    #[must_use]
    pub fn create_path_if_not_exist(mut self, value: bool) -> Self {
        self.create_path_if_not_exist = Some(value);
        self
    }

    /// Sets the maximum cache size in pages.
    #[must_use]
    pub fn cache_size_max(mut self, value: usize) -> Self {
        self.cache_size_max = Some(value);
        self
    }

    /// Sets the database page size in bytes.
    #[must_use]
    pub fn database_page_size(mut self, value: usize) -> Self {
        self.database_page_size = Some(value);
        self
    }

    /// Checks that every string can be handed to the engine.
    pub fn validate(&self) -> JetResult<()> {
        if self.name.is_empty() {
            return Err(JetError::config("instance name must not be empty"));
        }
        check_text("name", &self.name)?;
        if let Some(display) = &self.display_name {
            check_text("display_name", display)?;
        }
        if let Some(base) = &self.base_name {
            if base.len() != 3 {
                return Err(JetError::config(format!(
                    "base_name must be exactly three characters, got {base:?}"
                )));
            }
        }
        if let Some(size) = self.database_page_size {
            if !matches!(size, 2048 | 4096 | 8192 | 16384 | 32768) {
                return Err(JetError::config(format!(
                    "database_page_size must be 2, 4, 8, 16 or 32 KiB, got {size}"
                )));
            }
        }
        for (param, value) in self.parameters() {
            if let ParamValue::Text(text) = value {
                check_text(param_name(param), &text)?;
            }
        }
        Ok(())
    }

    /// The system parameters this configuration sets, in the order they are
    /// applied.
    pub fn parameters(&self) -> Vec<(Param, ParamValue)> {
        let mut params = Vec::new();
        let mut text = |param, value: Option<String>| {
            if let Some(value) = value {
                params.push((param, ParamValue::Text(value)));
            }
        };
        text(Param::SystemPath, self.system_path.as_deref().map(dir_string));
        text(Param::LogFilePath, self.log_file_path.as_deref().map(dir_string));
        text(
            Param::TempPath,
            self.temp_path.as_ref().map(|p| p.to_string_lossy().into_owned()),
        );
        text(Param::BaseName, self.base_name.clone());
        text(
            Param::Recovery,
            self.recovery.map(|on| (if on { "on" } else { "off" }).to_string()),
        );

        let integers = [
            (Param::MaxSessions, self.max_sessions),
            (Param::MaxOpenTables, self.max_open_tables),
            (Param::MaxCursors, self.max_cursors),
            (Param::MaxVerPages, self.max_ver_pages),
            (Param::LogFileSize, self.log_file_size),
            (Param::CircularLog, self.circular_log.map(usize::from)),
            (
                Param::CreatePathIfNotExist,
                self.create_path_if_not_exist.map(usize::from),
            ),
            (Param::CacheSizeMax, self.cache_size_max),
            (Param::DatabasePageSize, self.database_page_size),
        ];
        params.extend(
            integers
                .into_iter()
                .filter_map(|(param, value)| value.map(|v| (param, ParamValue::Integer(v)))),
        );
        params
    }

    pub(crate) fn name_cstring(&self) -> JetResult<CString> {
        to_cstring("name", &self.name)
    }

    pub(crate) fn display_name_cstring(&self) -> JetResult<Option<CString>> {
        self.display_name
            .as_deref()
            .map(|d| to_cstring("display_name", d))
            .transpose()
    }
}

/// Directory parameters must end with a separator.
fn dir_string(path: &Path) -> String {
    let mut s = path.to_string_lossy().into_owned();
    if !s.ends_with(std::path::MAIN_SEPARATOR) && !s.ends_with('/') {
        s.push(std::path::MAIN_SEPARATOR);
    }
    s
}

fn param_name(param: Param) -> &'static str {
    match param {
        Param::SystemPath => "system_path",
        Param::TempPath => "temp_path",
        Param::LogFilePath => "log_file_path",
        Param::BaseName => "base_name",
        _ => "parameter",
    }
}

fn check_text(field: &'static str, value: &str) -> JetResult<()> {
    if value.contains('\0') {
        return Err(JetError::config(format!("{field} contains a NUL byte")));
    }
    Ok(())
}

/// Converts a name to the engine's NUL-terminated form.
pub(crate) fn to_cstring(field: &'static str, value: &str) -> JetResult<CString> {
    CString::new(value)
        .map_err(|_| JetError::invalid_argument(format!("{field} contains a NUL byte: {value:?}")))
}
