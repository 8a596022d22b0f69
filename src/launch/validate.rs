//! Defaulting, templating and validation of raw launch input.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::template::TemplateExpander;

use super::{
    DEFAULT_FLOATING_IP_POOL, DEFAULT_SSH_PORT, DEFAULT_SSH_TIMEOUT, DEFAULT_SSH_USERNAME,
    LaunchConfig, LaunchConfigInput, parse_duration,
};

/// A single problem found in the launch input.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{message}")]
pub struct ConfigError {
    /// Input field the problem relates to.
    pub field: &'static str,
    /// Human-readable description.
    pub message: String,
}

impl ConfigError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Every problem found in one validation pass, reported together.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("invalid launch configuration: {}", Joined(.0))]
pub struct ConfigErrors(pub Vec<ConfigError>);

struct Joined<'a>(&'a [ConfigError]);

impl fmt::Display for Joined<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, error) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

/// Outcome of [`validate`]: the normalised config plus all errors found.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidationReport {
    /// Normalised configuration. Not usable when `errors` is non-empty.
    pub config: LaunchConfig,
    /// Problems found, in check order.
    pub errors: Vec<ConfigError>,
}

impl ValidationReport {
    /// Returns `true` when no problems were found.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Releases the config only when validation found no problems.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigErrors`] holding every problem when any were found.
    pub fn into_result(self) -> Result<LaunchConfig, ConfigErrors> {
        if self.errors.is_empty() {
            Ok(self.config)
        } else {
            Err(ConfigErrors(self.errors))
        }
    }
}

/// Applies defaults, expands templates and checks required fields.
///
/// Defaults are applied first (username, port, timeout, then floating IP
/// pool), followed by required-field checks, template expansion of
/// `source_image`, `flavor`, `ssh_username` and `ssh_timeout`, security
/// group normalisation and finally timeout parsing. Checking never stops
/// at the first problem.
#[must_use]
pub fn validate(input: &LaunchConfigInput, expander: &impl TemplateExpander) -> ValidationReport {
    let raw = with_defaults(input);
    let mut errors = Vec::new();

    require(&raw.source_image, "source_image", SOURCE_IMAGE_REQUIRED, &mut errors);
    require(&raw.flavor, "flavor", FLAVOR_REQUIRED, &mut errors);
    require(&raw.ssh_username, "ssh_username", SSH_USERNAME_REQUIRED, &mut errors);

    let source_image = expand_required(
        expander,
        "source_image",
        SOURCE_IMAGE_REQUIRED,
        &raw.source_image,
        &mut errors,
    );
    let flavor = expand_required(expander, "flavor", FLAVOR_REQUIRED, &raw.flavor, &mut errors);
    let ssh_username = expand_required(
        expander,
        "ssh_username",
        SSH_USERNAME_REQUIRED,
        &raw.ssh_username,
        &mut errors,
    );
    let raw_timeout = expand_field(expander, "ssh_timeout", &raw.ssh_timeout, &mut errors)
        .unwrap_or_else(|| raw.ssh_timeout.clone());

    let security_groups = raw.security_groups.normalize();

    let ssh_timeout = parse_duration(&raw_timeout).unwrap_or_else(|err| {
        errors.push(ConfigError::new(
            "ssh_timeout",
            format!("Failed parsing ssh_timeout: {err}"),
        ));
        Duration::ZERO
    });

    let floating_ip = Some(raw.floating_ip).filter(|address| !address.is_empty());

    debug!(
        errors = errors.len(),
        security_groups = security_groups.len(),
        "validated launch configuration"
    );

    ValidationReport {
        config: LaunchConfig {
            source_image,
            flavor,
            ssh_username,
            ssh_port: raw.ssh_port,
            ssh_timeout,
            openstack_provider: raw.openstack_provider,
            use_floating_ip: raw.use_floating_ip,
            floating_ip_pool: raw.floating_ip_pool,
            floating_ip,
            security_groups,
        },
        errors,
    }
}

const SOURCE_IMAGE_REQUIRED: &str = "A source_image must be specified";
const FLAVOR_REQUIRED: &str = "A flavor must be specified";
const SSH_USERNAME_REQUIRED: &str = "An ssh_username must be specified";

fn with_defaults(input: &LaunchConfigInput) -> LaunchConfigInput {
    let mut raw = input.clone();
    if raw.ssh_username.is_empty() {
        raw.ssh_username = DEFAULT_SSH_USERNAME.to_owned();
    }
    if raw.ssh_port == 0 {
        raw.ssh_port = DEFAULT_SSH_PORT;
    }
    if raw.ssh_timeout.is_empty() {
        raw.ssh_timeout = DEFAULT_SSH_TIMEOUT.to_owned();
    }
    if raw.use_floating_ip && raw.floating_ip_pool.is_empty() {
        raw.floating_ip_pool = DEFAULT_FLOATING_IP_POOL.to_owned();
    }
    raw
}

fn require(value: &str, field: &'static str, message: &str, errors: &mut Vec<ConfigError>) {
    if value.is_empty() {
        errors.push(ConfigError::new(field, message));
    }
}

fn expand_field(
    expander: &impl TemplateExpander,
    field: &'static str,
    value: &str,
    errors: &mut Vec<ConfigError>,
) -> Option<String> {
    match expander.expand(value) {
        Ok(expanded) => Some(expanded),
        Err(err) => {
            errors.push(ConfigError::new(
                field,
                format!("Error processing {field}: {err}"),
            ));
            None
        }
    }
}

/// Expands a required field and rejects values that expand to nothing.
///
/// Empty raw values were already reported by [`require`], and failed
/// expansions by [`expand_field`], so each field gets at most one error.
fn expand_required(
    expander: &impl TemplateExpander,
    field: &'static str,
    message: &str,
    value: &str,
    errors: &mut Vec<ConfigError>,
) -> String {
    match expand_field(expander, field, value, errors) {
        Some(expanded) => {
            if expanded.is_empty() && !value.is_empty() {
                errors.push(ConfigError::new(field, message));
            }
            expanded
        }
        None => value.to_owned(),
    }
}
