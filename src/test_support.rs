//! Test support utilities shared across unit and integration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::provider::{FloatingIpTarget, InstanceHandle, ProviderFuture, ProviderQuery};

/// Error returned by [`ScriptedProvider`] when a scripted failure is
/// replayed or no response was queued.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("scripted provider failure: {0}")]
pub struct ScriptedProviderError(pub String);

/// Records a single call made through [`ScriptedProvider`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProviderCall {
    /// `instance_by_id` was called with this identifier.
    InstanceById(String),
    /// `associate_floating_ip` was called.
    AssociateFloatingIp {
        /// Instance identifier passed by the caller.
        instance_id: String,
        /// Requested address or pool.
        target: FloatingIpTarget,
    },
    /// `list_instances` was called.
    ListInstances,
}

#[derive(Debug, Default)]
struct Script {
    snapshots: VecDeque<Result<InstanceHandle, ScriptedProviderError>>,
    associations: VecDeque<Result<String, ScriptedProviderError>>,
    listing: Vec<InstanceHandle>,
    calls: Vec<ProviderCall>,
}

/// Provider double that replays queued responses in FIFO order.
///
/// When no snapshot is queued, `instance_by_id` returns an instance with
/// no addresses, modelling a provider that never assigns one. Clones share
/// the same script and call log.
#[derive(Clone, Debug, Default)]
pub struct ScriptedProvider {
    script: Arc<Mutex<Script>>,
}

impl ScriptedProvider {
    /// Creates a provider with nothing queued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a snapshot for the next `instance_by_id` call.
    pub fn push_snapshot(&self, snapshot: InstanceHandle) {
        self.script().snapshots.push_back(Ok(snapshot));
    }

    /// Queues a failure for the next `instance_by_id` call.
    pub fn push_snapshot_failure(&self, message: &str) {
        self.script()
            .snapshots
            .push_back(Err(ScriptedProviderError(message.to_owned())));
    }

    /// Queues the address returned by the next association.
    pub fn push_association(&self, address: &str) {
        self.script().associations.push_back(Ok(address.to_owned()));
    }

    /// Queues a failure for the next association.
    pub fn push_association_failure(&self, message: &str) {
        self.script()
            .associations
            .push_back(Err(ScriptedProviderError(message.to_owned())));
    }

    /// Sets the instances returned by `list_instances`.
    pub fn set_listing(&self, instances: Vec<InstanceHandle>) {
        self.script().listing = instances;
    }

    /// Returns a snapshot of all calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.script().calls.clone()
    }
}

impl ProviderQuery for ScriptedProvider {
    type Error = ScriptedProviderError;

    fn instance_by_id<'a>(&'a self, id: &'a str) -> ProviderFuture<'a, InstanceHandle, Self::Error> {
        let response = {
            let mut script = self.script();
            script.calls.push(ProviderCall::InstanceById(id.to_owned()));
            script
                .snapshots
                .pop_front()
                .unwrap_or_else(|| Ok(InstanceHandle::new(id)))
        };
        Box::pin(async move { response })
    }

    fn associate_floating_ip<'a>(
        &'a self,
        instance_id: &'a str,
        target: &'a FloatingIpTarget,
    ) -> ProviderFuture<'a, String, Self::Error> {
        let response = {
            let mut script = self.script();
            script.calls.push(ProviderCall::AssociateFloatingIp {
                instance_id: instance_id.to_owned(),
                target: target.clone(),
            });
            script.associations.pop_front().unwrap_or_else(|| {
                Err(ScriptedProviderError(String::from(
                    "no association response queued",
                )))
            })
        };
        Box::pin(async move { response })
    }

    fn list_instances(&self) -> ProviderFuture<'_, Vec<InstanceHandle>, Self::Error> {
        let response = {
            let mut script = self.script();
            script.calls.push(ProviderCall::ListInstances);
            script.listing.clone()
        };
        Box::pin(async move { Ok(response) })
    }
}
