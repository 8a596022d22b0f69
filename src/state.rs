//! Typed state shared by the provisioning steps.
//!
//! Steps run one after another on a single task, so the state is passed by
//! mutable reference rather than guarded by locks.

use std::fmt;

use crate::provider::InstanceHandle;
use crate::resolver::ResolvedAddress;

/// Values exchanged between provisioning steps.
#[derive(Clone, Default, Eq, PartialEq)]
pub struct PipelineState {
    instance: Option<InstanceHandle>,
    private_key: Option<String>,
    floating_ip: Option<String>,
    resolved_address: Option<ResolvedAddress>,
}

impl PipelineState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a state holding the snapshot returned when the instance was
    /// created.
    #[must_use]
    pub fn with_instance(instance: InstanceHandle) -> Self {
        Self {
            instance: Some(instance),
            ..Self::default()
        }
    }

    /// Stores the private key used for SSH sessions.
    #[must_use]
    pub fn with_private_key(mut self, private_key: impl Into<String>) -> Self {
        self.private_key = Some(private_key.into());
        self
    }

    /// Current instance snapshot.
    #[must_use]
    pub const fn instance(&self) -> Option<&InstanceHandle> {
        self.instance.as_ref()
    }

    /// Private key material, when one has been stored.
    #[must_use]
    pub fn private_key(&self) -> Option<&str> {
        self.private_key.as_deref()
    }

    /// Floating IP already associated with the instance.
    #[must_use]
    pub fn floating_ip(&self) -> Option<&str> {
        self.floating_ip.as_deref()
    }

    /// Address published by a successful resolution.
    #[must_use]
    pub const fn resolved_address(&self) -> Option<&ResolvedAddress> {
        self.resolved_address.as_ref()
    }

    pub(crate) fn replace_instance(&mut self, instance: InstanceHandle) -> Option<InstanceHandle> {
        self.instance.replace(instance)
    }

    pub(crate) fn record_floating_ip(&mut self, address: String) {
        self.floating_ip = Some(address);
    }

    pub(crate) fn publish_resolved_address(&mut self, address: ResolvedAddress) {
        self.resolved_address = Some(address);
    }
}

impl fmt::Debug for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineState")
            .field("instance", &self.instance)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("floating_ip", &self.floating_ip)
            .field("resolved_address", &self.resolved_address)
            .finish()
    }
}
