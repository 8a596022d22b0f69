//! Launch parameters for a new instance: the raw input surface, its
//! canonical validated form, and the validator connecting the two.
//!
//! Raw input arrives as loosely typed data (a TOML template, for example)
//! and is turned into a [`LaunchConfig`] exactly once by [`validate`]. The
//! untyped `security_groups` field never travels past the validator.

mod duration;
mod validate;

use std::time::Duration;

use serde::Deserialize;
use serde::de::IgnoredAny;

pub use duration::{DurationParseError, parse_duration};
pub use validate::{ConfigError, ConfigErrors, ValidationReport, validate};

/// Username applied when `ssh_username` is left empty.
pub const DEFAULT_SSH_USERNAME: &str = "root";

/// Port applied when `ssh_port` is absent or zero.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Raw timeout applied when `ssh_timeout` is left empty.
pub const DEFAULT_SSH_TIMEOUT: &str = "5m";

/// Pool used for floating IP allocation when none is configured.
pub const DEFAULT_FLOATING_IP_POOL: &str = "public";

/// Launch parameters exactly as supplied by the user.
///
/// Every field is optional at this stage; defaults and required-field
/// checks are applied by [`validate`].
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct LaunchConfigInput {
    /// Image the instance boots from.
    pub source_image: String,
    /// Instance size or class identifier.
    pub flavor: String,
    /// Textual SSH timeout such as `5m` or `1h30m`.
    pub ssh_timeout: String,
    /// User to connect as.
    pub ssh_username: String,
    /// SSH port; zero means unset.
    pub ssh_port: u16,
    /// Provider label carried through untouched.
    pub openstack_provider: String,
    /// Whether a floating IP should be associated with the instance.
    pub use_floating_ip: bool,
    /// Pool to allocate the floating IP from.
    pub floating_ip_pool: String,
    /// Pre-allocated floating IP to associate instead of allocating one.
    pub floating_ip: String,
    /// Security group membership as a single name or a list of names.
    pub security_groups: SecurityGroupsInput,
}

/// Shape of the `security_groups` field at the input boundary.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SecurityGroupsInput {
    /// Field not supplied.
    #[default]
    Absent,
    /// A single group name.
    Single(String),
    /// An ordered list of group names.
    Multiple(Vec<String>),
    /// Any other shape; normalises to no groups.
    Unsupported(IgnoredAny),
}

impl SecurityGroupsInput {
    /// Converts the raw shape into canonical group references, preserving
    /// input order and duplicates.
    #[must_use]
    pub fn normalize(&self) -> Vec<SecurityGroupRef> {
        match self {
            Self::Single(name) => vec![SecurityGroupRef::new(name.as_str())],
            Self::Multiple(names) => names
                .iter()
                .map(|name| SecurityGroupRef::new(name.as_str()))
                .collect(),
            Self::Absent | Self::Unsupported(_) => Vec::new(),
        }
    }
}

/// Reference to a security group by name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SecurityGroupRef {
    /// Group name as known to the provider.
    pub name: String,
}

impl SecurityGroupRef {
    /// Creates a reference to the named group.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Canonical launch parameters produced by [`validate`].
///
/// The value is read-only once built. A config returned alongside a
/// non-empty error list must not be used.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LaunchConfig {
    pub(crate) source_image: String,
    pub(crate) flavor: String,
    pub(crate) ssh_username: String,
    pub(crate) ssh_port: u16,
    pub(crate) ssh_timeout: Duration,
    pub(crate) openstack_provider: String,
    pub(crate) use_floating_ip: bool,
    pub(crate) floating_ip_pool: String,
    pub(crate) floating_ip: Option<String>,
    pub(crate) security_groups: Vec<SecurityGroupRef>,
}

impl LaunchConfig {
    /// Image the instance boots from.
    #[must_use]
    pub fn source_image(&self) -> &str {
        &self.source_image
    }

    /// Instance size or class identifier.
    #[must_use]
    pub fn flavor(&self) -> &str {
        &self.flavor
    }

    /// User to connect as over SSH.
    #[must_use]
    pub fn ssh_username(&self) -> &str {
        &self.ssh_username
    }

    /// Port the SSH daemon listens on.
    #[must_use]
    pub const fn ssh_port(&self) -> u16 {
        self.ssh_port
    }

    /// Overall budget for reaching the instance.
    #[must_use]
    pub const fn ssh_timeout(&self) -> Duration {
        self.ssh_timeout
    }

    /// Provider label from the input, possibly empty.
    #[must_use]
    pub fn openstack_provider(&self) -> &str {
        &self.openstack_provider
    }

    /// Whether a floating IP must be associated before connecting.
    #[must_use]
    pub const fn use_floating_ip(&self) -> bool {
        self.use_floating_ip
    }

    /// Pool floating IPs are allocated from.
    #[must_use]
    pub fn floating_ip_pool(&self) -> &str {
        &self.floating_ip_pool
    }

    /// Pre-allocated floating IP, when one was supplied.
    #[must_use]
    pub fn floating_ip(&self) -> Option<&str> {
        self.floating_ip.as_deref()
    }

    /// Security groups in input order.
    #[must_use]
    pub fn security_groups(&self) -> &[SecurityGroupRef] {
        &self.security_groups
    }
}
