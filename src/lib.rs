//! Core library for the Stackreach provisioning helper.
//!
//! The crate validates launch parameters for OpenStack instances, works out
//! which address an SSH client should connect to once an instance exists
//! (associating a floating IP when requested), and prepares the key-based
//! credentials for that session. Address resolution is a single attempt per
//! call; [`ResolveScheduler`] supplies the retry loop around it.

pub mod config;
pub mod launch;
pub mod openstack;
pub mod provider;
pub mod resolver;
pub mod ssh;
pub mod state;
pub mod template;
pub mod test_support;
pub mod wait;

pub use config::{ConfigLoadError, LaunchFile, OpenStackConfig, load_launch_file, read_private_key};
pub use launch::{
    ConfigError, ConfigErrors, LaunchConfig, LaunchConfigInput, SecurityGroupRef,
    SecurityGroupsInput, ValidationReport, validate,
};
pub use openstack::{OpenStackClient, OpenStackError};
pub use provider::{AddressRecord, FloatingIpTarget, InstanceHandle, ProviderFuture, ProviderQuery};
pub use resolver::{AddressError, AddressResolver, PoolPreference, ResolvedAddress};
pub use ssh::{AuthConfigError, SessionAuth, build_session_config};
pub use state::PipelineState;
pub use template::{TemplateContext, TemplateError, TemplateExpander};
pub use wait::{FailureCause, ResolveFailure, ResolveScheduler};
