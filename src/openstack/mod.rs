//! OpenStack Nova implementation of [`ProviderQuery`].

mod error;
mod types;

use std::sync::LazyLock;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::OpenStackConfig;
use crate::provider::{FloatingIpTarget, InstanceHandle, ProviderFuture, ProviderQuery};
use types::{
    AddFloatingIp, AddFloatingIpAction, AllocateFloatingIpRequest, FloatingIpEnvelope,
    ServerEnvelope, ServerList,
};

pub use error::OpenStackError;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const AUTH_HEADER: &str = "X-Auth-Token";

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Client for the subset of the compute API used during address resolution.
#[derive(Clone)]
pub struct OpenStackClient {
    endpoint: String,
    auth_token: String,
}

impl std::fmt::Debug for OpenStackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenStackClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl OpenStackClient {
    /// Constructs a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`OpenStackError::Config`] when the configuration fails
    /// validation.
    pub fn new(config: &OpenStackConfig) -> Result<Self, OpenStackError> {
        config.validate()?;
        Ok(Self::with_endpoint(&config.compute_endpoint, &config.auth_token))
    }

    /// Constructs a client without validating its inputs.
    #[must_use]
    pub fn with_endpoint(endpoint: &str, auth_token: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            auth_token: auth_token.to_owned(),
        }
    }

    /// Base URL requests are issued against.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        HTTP_CLIENT
            .request(method, url)
            .header(AUTH_HEADER, &self.auth_token)
            .timeout(HTTP_TIMEOUT)
    }

    async fn send(request: RequestBuilder, url: &str) -> Result<Response, OpenStackError> {
        let response = request
            .send()
            .await
            .map_err(|err| OpenStackError::Transport {
                url: url.to_owned(),
                message: err.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(OpenStackError::Api {
            status: status.as_u16(),
            url: url.to_owned(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, OpenStackError> {
        let url = self.url(path);
        debug!(%url, "querying compute API");
        let response = Self::send(self.request(Method::GET, &url), &url).await?;
        decode(response, &url).await
    }

    async fn fetch_server(&self, id: &str) -> Result<InstanceHandle, OpenStackError> {
        let envelope: ServerEnvelope = self.get_json(&format!("servers/{id}")).await?;
        Ok(envelope.server.into())
    }

    async fn fetch_servers(&self) -> Result<Vec<InstanceHandle>, OpenStackError> {
        let list: ServerList = self.get_json("servers/detail").await?;
        Ok(list.servers.into_iter().map(InstanceHandle::from).collect())
    }

    async fn allocate_floating_ip(&self, pool: &str) -> Result<String, OpenStackError> {
        let url = self.url("os-floating-ips");
        debug!(%url, pool, "allocating floating IP");
        let request = self
            .request(Method::POST, &url)
            .json(&AllocateFloatingIpRequest { pool });
        let response = Self::send(request, &url).await?;
        let envelope: FloatingIpEnvelope = decode(response, &url).await?;
        Ok(envelope.floating_ip.ip)
    }

    async fn add_floating_ip(&self, instance_id: &str, address: &str) -> Result<(), OpenStackError> {
        let url = self.url(&format!("servers/{instance_id}/action"));
        debug!(%url, address, "associating floating IP");
        let request = self
            .request(Method::POST, &url)
            .json(&AddFloatingIpAction {
                add_floating_ip: AddFloatingIp { address },
            });
        Self::send(request, &url).await.map(|_| ())
    }

    async fn associate(
        &self,
        instance_id: &str,
        target: &FloatingIpTarget,
    ) -> Result<String, OpenStackError> {
        let address = match target {
            FloatingIpTarget::Address(address) => address.clone(),
            FloatingIpTarget::Pool(pool) => self.allocate_floating_ip(pool).await?,
        };
        self.add_floating_ip(instance_id, &address).await?;
        Ok(address)
    }
}

async fn decode<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, OpenStackError> {
    let body = response
        .text()
        .await
        .map_err(|err| OpenStackError::Transport {
            url: url.to_owned(),
            message: err.to_string(),
        })?;
    serde_json::from_str(&body).map_err(|err| OpenStackError::Decode {
        url: url.to_owned(),
        message: err.to_string(),
    })
}

impl ProviderQuery for OpenStackClient {
    type Error = OpenStackError;

    fn instance_by_id<'a>(&'a self, id: &'a str) -> ProviderFuture<'a, InstanceHandle, Self::Error> {
        Box::pin(self.fetch_server(id))
    }

    fn associate_floating_ip<'a>(
        &'a self,
        instance_id: &'a str,
        target: &'a FloatingIpTarget,
    ) -> ProviderFuture<'a, String, Self::Error> {
        Box::pin(self.associate(instance_id, target))
    }

    fn list_instances(&self) -> ProviderFuture<'_, Vec<InstanceHandle>, Self::Error> {
        Box::pin(self.fetch_servers())
    }
}
