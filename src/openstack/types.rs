//! Wire types for the Nova compute API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::provider::{AddressRecord, InstanceHandle};

/// Body of `GET /servers/{id}`.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ServerEnvelope {
    pub server: Server,
}

/// Body of `GET /servers/detail`.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ServerList {
    #[serde(default)]
    pub servers: Vec<Server>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct Server {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub addresses: BTreeMap<String, Vec<ServerAddress>>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ServerAddress {
    #[serde(default)]
    pub addr: String,
    pub version: Option<u8>,
    #[serde(rename = "OS-EXT-IPS:type")]
    pub kind: Option<String>,
}

impl From<Server> for InstanceHandle {
    fn from(server: Server) -> Self {
        let addresses = server
            .addresses
            .into_iter()
            .map(|(pool, entries)| {
                let records = entries
                    .into_iter()
                    .map(|record| AddressRecord {
                        addr: record.addr,
                        version: record.version,
                        kind: record.kind,
                    })
                    .collect();
                (pool, records)
            })
            .collect();
        Self {
            id: server.id,
            status: server.status,
            addresses,
        }
    }
}

/// Request body for `POST /os-floating-ips`.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct AllocateFloatingIpRequest<'a> {
    pub pool: &'a str,
}

/// Body returned by `POST /os-floating-ips`.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct FloatingIpEnvelope {
    pub floating_ip: FloatingIp,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct FloatingIp {
    pub ip: String,
}

/// Request body for the `addFloatingIp` server action.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct AddFloatingIpAction<'a> {
    #[serde(rename = "addFloatingIp")]
    pub add_floating_ip: AddFloatingIp<'a>,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct AddFloatingIp<'a> {
    pub address: &'a str,
}
