//! Provider query abstraction consumed by the address resolver.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// One address assigned to an instance within a pool.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AddressRecord {
    /// Address text as reported by the provider; may be empty while the
    /// provider is still assigning it.
    pub addr: String,
    /// IP version when the provider reports one.
    pub version: Option<u8>,
    /// Provider-specific kind such as `fixed` or `floating`.
    pub kind: Option<String>,
}

impl AddressRecord {
    /// Creates a record with only an address.
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            version: None,
            kind: None,
        }
    }

    /// Returns `true` when the record carries a non-empty address.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.addr.trim().is_empty()
    }
}

/// Point-in-time snapshot of an instance and its addresses.
///
/// Snapshots are replaced wholesale when refreshed, never edited in place.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InstanceHandle {
    /// Provider identifier for the instance.
    pub id: String,
    /// Provider status string (for example `ACTIVE` or `BUILD`).
    pub status: String,
    /// Addresses grouped by pool name.
    pub addresses: BTreeMap<String, Vec<AddressRecord>>,
}

impl InstanceHandle {
    /// Creates a snapshot with no addresses.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Adds or replaces the records for `pool`.
    #[must_use]
    pub fn with_pool(
        mut self,
        pool: impl Into<String>,
        records: impl IntoIterator<Item = AddressRecord>,
    ) -> Self {
        self.addresses
            .insert(pool.into(), records.into_iter().collect());
        self
    }

    /// Sets the reported status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Returns the records for `pool`, if the pool is present.
    #[must_use]
    pub fn pool(&self, pool: &str) -> Option<&[AddressRecord]> {
        self.addresses.get(pool).map(Vec::as_slice)
    }
}

/// What to associate with an instance when a floating IP is requested.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FloatingIpTarget {
    /// An address that has already been allocated.
    Address(String),
    /// A pool to allocate a fresh address from.
    Pool(String),
}

impl fmt::Display for FloatingIpTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(address) => write!(f, "address {address}"),
            Self::Pool(pool) => write!(f, "pool {pool}"),
        }
    }
}

/// Future returned by provider operations.
pub type ProviderFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Queries the cloud provider makes available to the resolver.
pub trait ProviderQuery {
    /// Provider specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetches a fresh snapshot of the instance.
    fn instance_by_id<'a>(&'a self, id: &'a str) -> ProviderFuture<'a, InstanceHandle, Self::Error>;

    /// Associates a floating IP with the instance, allocating one from the
    /// pool when needed, and returns the associated address.
    fn associate_floating_ip<'a>(
        &'a self,
        instance_id: &'a str,
        target: &'a FloatingIpTarget,
    ) -> ProviderFuture<'a, String, Self::Error>;

    /// Lists every instance visible to the caller.
    fn list_instances(&self) -> ProviderFuture<'_, Vec<InstanceHandle>, Self::Error>;
}
