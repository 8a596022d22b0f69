//! Determines the address at which a launched instance accepts SSH.
//!
//! [`AddressResolver::resolve`] performs exactly one attempt: it either
//! associates a floating IP, picks an address from the current snapshot, or
//! refreshes the snapshot and reports that no address is available yet.
//! Waiting between attempts is left to the caller (see
//! [`crate::wait::ResolveScheduler`]).

use std::fmt;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::launch::LaunchConfig;
use crate::provider::{AddressRecord, FloatingIpTarget, InstanceHandle, ProviderQuery};
use crate::state::PipelineState;

/// Pools consulted first when no preference is configured.
pub const DEFAULT_POOL_PREFERENCE: [&str; 2] = ["public", "private"];

/// Host and port at which an instance can be reached.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedAddress {
    host: String,
    port: u16,
}

impl ResolvedAddress {
    /// Creates an address from its parts.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or IP literal.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ResolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Ordered list of pool names to search for an address.
///
/// Pools missing from the list are searched afterwards in name order, so
/// the iteration order is identical for every attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PoolPreference(Vec<String>);

impl PoolPreference {
    /// Creates a preference from pool names in priority order.
    #[must_use]
    pub fn new(pools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(pools.into_iter().map(Into::into).collect())
    }

    /// Parses a comma separated list such as `public,private`, skipping
    /// blank entries.
    #[must_use]
    pub fn parse(list: &str) -> Self {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|pool| !pool.is_empty()),
        )
    }

    /// Preferred pool names.
    #[must_use]
    pub fn pools(&self) -> &[String] {
        &self.0
    }

    /// Pools of `instance` in search order.
    #[must_use]
    pub fn ordered_pools<'a>(
        &'a self,
        instance: &'a InstanceHandle,
    ) -> Vec<(&'a str, &'a [AddressRecord])> {
        let preferred = self.0.iter().filter_map(|name| {
            instance
                .pool(name)
                .map(|records| (name.as_str(), records))
        });
        let remaining = instance
            .addresses
            .iter()
            .filter(|(name, _)| !self.0.contains(*name))
            .map(|(name, records)| (name.as_str(), records.as_slice()));
        preferred.chain(remaining).collect()
    }

    /// First usable address of `instance` in search order.
    #[must_use]
    pub fn first_usable<'a>(
        &'a self,
        instance: &'a InstanceHandle,
    ) -> Option<(&'a str, &'a AddressRecord)> {
        self.ordered_pools(instance)
            .into_iter()
            .find_map(|(pool, records)| {
                records
                    .iter()
                    .find(|record| record.is_usable())
                    .map(|record| (pool, record))
            })
    }
}

impl Default for PoolPreference {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_PREFERENCE)
    }
}

/// Outcome of a resolution attempt that did not produce an address.
#[derive(Debug, Error)]
pub enum AddressError<E>
where
    E: std::error::Error + 'static,
{
    /// The provider rejected the floating IP association.
    #[error("failed to associate floating IP from {target} with instance {instance_id}")]
    AllocationFailed {
        /// Instance the association was requested for.
        instance_id: String,
        /// Address or pool that was requested.
        target: FloatingIpTarget,
        /// Provider error.
        #[source]
        source: E,
    },
    /// No pool holds a usable address yet; the attempt may be retried.
    #[error("instance {instance_id} has no usable address yet")]
    NotYetAvailable {
        /// Instance that was inspected.
        instance_id: String,
    },
    /// Refreshing the instance snapshot failed.
    #[error("failed to refresh instance {instance_id}")]
    ProviderQuery {
        /// Instance being refreshed.
        instance_id: String,
        /// Provider error.
        #[source]
        source: E,
    },
    /// The pipeline state does not hold an instance snapshot.
    #[error("no instance snapshot available to resolve")]
    MissingInstance,
}

impl<E> AddressError<E>
where
    E: std::error::Error + 'static,
{
    /// Returns `true` when the caller may wait and try again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NotYetAvailable { .. })
    }
}

/// Resolves reachable addresses for launched instances.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AddressResolver {
    pools: PoolPreference,
}

impl AddressResolver {
    /// Creates a resolver searching pools in the given order.
    #[must_use]
    pub const fn new(pools: PoolPreference) -> Self {
        Self { pools }
    }

    /// Pool search order used by this resolver.
    #[must_use]
    pub const fn pool_preference(&self) -> &PoolPreference {
        &self.pools
    }

    /// Performs one resolution attempt.
    ///
    /// When a floating IP is requested, a previously associated address is
    /// returned as is. Otherwise the explicit `floating_ip` (or, failing
    /// that, a fresh address from `floating_ip_pool`) is associated and
    /// returned directly. Without a floating IP the cached snapshot is
    /// searched; if it holds no usable address the
    /// snapshot is refreshed once and [`AddressError::NotYetAvailable`] is
    /// returned. Successful results are published to `state`.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::AllocationFailed`] or
    /// [`AddressError::ProviderQuery`] for fatal provider failures,
    /// [`AddressError::NotYetAvailable`] when the caller should retry, and
    /// [`AddressError::MissingInstance`] when `state` holds no snapshot.
    pub async fn resolve<P>(
        &self,
        state: &mut PipelineState,
        config: &LaunchConfig,
        provider: &P,
    ) -> Result<ResolvedAddress, AddressError<P::Error>>
    where
        P: ProviderQuery + Sync,
    {
        let instance_id = state
            .instance()
            .map(|instance| instance.id.clone())
            .ok_or(AddressError::MissingInstance)?;

        if config.use_floating_ip() {
            if let Some(address) = state.floating_ip().map(str::to_owned) {
                return Ok(publish(state, ResolvedAddress::new(address, config.ssh_port())));
            }
            let target = floating_ip_target(config);
            let address = match provider.associate_floating_ip(&instance_id, &target).await {
                Ok(address) => address,
                Err(source) => {
                    warn!(instance_id = %instance_id, %target, error = %source, "floating IP association failed");
                    return Err(AddressError::AllocationFailed {
                        instance_id,
                        target,
                        source,
                    });
                }
            };
            info!(instance_id = %instance_id, floating_ip = %address, "associated floating IP");
            state.record_floating_ip(address.clone());
            return Ok(publish(state, ResolvedAddress::new(address, config.ssh_port())));
        }

        let found = state
            .instance()
            .and_then(|instance| self.pools.first_usable(instance))
            .map(|(pool, record)| (pool.to_owned(), record.addr.clone()));
        if let Some((pool, host)) = found {
            info!(instance_id = %instance_id, pool = %pool, host = %host, "resolved instance address");
            return Ok(publish(state, ResolvedAddress::new(host, config.ssh_port())));
        }

        let fresh = match provider.instance_by_id(&instance_id).await {
            Ok(fresh) => fresh,
            Err(source) => {
                warn!(instance_id = %instance_id, error = %source, "instance refresh failed");
                return Err(AddressError::ProviderQuery {
                    instance_id,
                    source,
                });
            }
        };
        debug!(instance_id = %instance_id, status = %fresh.status, "refreshed instance snapshot");
        state.replace_instance(fresh);
        Err(AddressError::NotYetAvailable { instance_id })
    }
}

fn floating_ip_target(config: &LaunchConfig) -> FloatingIpTarget {
    config.floating_ip().map_or_else(
        || FloatingIpTarget::Pool(config.floating_ip_pool().to_owned()),
        |address| FloatingIpTarget::Address(address.to_owned()),
    )
}

fn publish(state: &mut PipelineState, address: ResolvedAddress) -> ResolvedAddress {
    state.publish_resolved_address(address.clone());
    address
}

#[cfg(test)]
mod tests;
