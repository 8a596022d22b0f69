//! Configuration loading via `ortho-config` and launch file parsing.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::time::Duration;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::launch::LaunchConfigInput;
use crate::resolver::PoolPreference;
use crate::template::TemplateContext;
use crate::wait::ResolveScheduler;

const APP_NAME: &str = "stackreach";

/// OpenStack settings derived from environment variables, configuration
/// files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "OS",
    discovery(
        app_name = "stackreach",
        env_var = "STACKREACH_CONFIG_PATH",
        config_file_name = "stackreach.toml",
        dotfile_name = ".stackreach.toml",
        project_file_name = "stackreach.toml"
    )
)]
pub struct OpenStackConfig {
    /// Base URL of the Nova compute API, including the project path when
    /// the deployment requires one.
    pub compute_endpoint: String,
    /// Keystone token sent as `X-Auth-Token`.
    pub auth_token: String,
    /// Comma separated pool names searched first when resolving addresses.
    #[ortho_config(default = "public,private".to_owned())]
    pub pool_preference: String,
    /// Delay before the second resolution attempt, in milliseconds.
    #[ortho_config(default = 500)]
    pub poll_interval_ms: u64,
    /// Upper bound on resolution attempts; unbounded when unset.
    pub max_attempts: Option<u32>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl OpenStackConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigLoadError> {
        if value.trim().is_empty() {
            return Err(ConfigLoadError::MissingField(format!(
                "missing {}: set {} or add {} to stackreach.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigLoadError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigLoadError> {
        Self::load_from_iter([OsString::from(APP_NAME)])
            .map_err(|err| ConfigLoadError::Parse(err.to_string()))
    }

    /// Checks that the fields needed to reach the compute API are present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigLoadError::MissingField`] naming the environment
    /// variable and TOML key to set, or [`ConfigLoadError::Invalid`] when
    /// the poll interval is zero.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        Self::require_field(
            &self.compute_endpoint,
            &FieldMetadata::new(
                "compute API endpoint",
                "OS_COMPUTE_ENDPOINT",
                "compute_endpoint",
            ),
        )?;
        Self::require_field(
            &self.auth_token,
            &FieldMetadata::new("authentication token", "OS_AUTH_TOKEN", "auth_token"),
        )?;
        if self.poll_interval_ms == 0 {
            return Err(ConfigLoadError::Invalid(String::from(
                "poll_interval_ms must be greater than zero",
            )));
        }
        Ok(())
    }

    /// Parsed pool preference order.
    #[must_use]
    pub fn pools(&self) -> PoolPreference {
        let pools = PoolPreference::parse(&self.pool_preference);
        if pools.pools().is_empty() {
            PoolPreference::default()
        } else {
            pools
        }
    }

    /// Retry policy built from the polling settings.
    #[must_use]
    pub fn scheduler(&self) -> ResolveScheduler {
        let scheduler =
            ResolveScheduler::new().with_initial_delay(Duration::from_millis(self.poll_interval_ms));
        match self.max_attempts {
            Some(attempts) => scheduler.with_max_attempts(attempts),
            None => scheduler,
        }
    }
}

/// Contents of a launch file: the raw launch settings plus user variables
/// available to `{{user `name`}}` templates.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct LaunchFile {
    /// Raw launch settings from the `[launch]` table.
    pub launch: LaunchConfigInput,
    /// Values from the `[variables]` table.
    pub variables: BTreeMap<String, String>,
}

impl LaunchFile {
    /// Builds a template context exposing the file's variables.
    #[must_use]
    pub fn template_context(&self) -> TemplateContext {
        self.variables
            .iter()
            .fold(TemplateContext::new(), |context, (name, value)| {
                context.with_user_variable(name.clone(), value.clone())
            })
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigLoadError {
    /// A required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// A field holds an unusable value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
    /// A file could not be read.
    #[error("failed to read {path}: {message}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying error message.
        message: String,
    },
    /// A launch file is not valid TOML.
    #[error("failed to parse launch file {path}: {message}")]
    LaunchFile {
        /// Path of the launch file.
        path: String,
        /// Decoder error message.
        message: String,
    },
}

impl From<ortho_config::OrthoError> for ConfigLoadError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

/// Reads and decodes a TOML launch file.
///
/// # Errors
///
/// Returns [`ConfigLoadError::Io`] when the file cannot be read and
/// [`ConfigLoadError::LaunchFile`] when it is not valid TOML.
pub fn load_launch_file(path: &Utf8Path) -> Result<LaunchFile, ConfigLoadError> {
    let contents = read_to_string_ambient(path)?;
    ortho_config::toml::from_str(&contents).map_err(|err| ConfigLoadError::LaunchFile {
        path: path.to_string(),
        message: err.to_string(),
    })
}

/// Reads an already-decrypted private key from disk.
///
/// # Errors
///
/// Returns [`ConfigLoadError::Io`] when the file cannot be read.
pub fn read_private_key(path: &Utf8Path) -> Result<String, ConfigLoadError> {
    read_to_string_ambient(path)
}

fn read_to_string_ambient(path: &Utf8Path) -> Result<String, ConfigLoadError> {
    let io_error = |message: String| ConfigLoadError::Io {
        path: path.to_string(),
        message,
    };
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| io_error(String::from("path is missing a file name")))?;

    let dir =
        Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| io_error(err.to_string()))?;
    dir.read_to_string(file_name)
        .map_err(|err| io_error(err.to_string()))
}
