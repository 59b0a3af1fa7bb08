use crate::directory::NodeRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long a candidate node gets to answer a probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Asks a candidate node which domain it considers most relevant for a
/// given client.
#[async_trait]
pub trait Prober: Send + Sync {
    /// `None` on any timeout, transport error, or malformed answer; a probe
    /// failure is never fatal to the resolution it belongs to.
    async fn probe(&self, node: &NodeRecord, client_ip: &str) -> Option<String>;
}

#[derive(Serialize)]
struct ProbeRequest<'a> {
    ip: &'a str,
}

#[derive(Deserialize)]
struct ProbeResponse {
    domain: String,
}

/// Probes nodes over their HTTPS `/relevant` endpoint.
pub struct HttpProber {
    client: reqwest::Client,
    domain_suffix: String,
}

impl HttpProber {
    /// The suffix must be the same one the resolver uses for its default
    /// endpoints; [`EdgeResolver::probing_http`](crate::resolver::EdgeResolver::probing_http)
    /// builds both from one configuration value.
    pub fn new(domain_suffix: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(PROBE_TIMEOUT).build()?;
        Ok(Self { client, domain_suffix: domain_suffix.into() })
    }

    fn probe_url(&self, node: &NodeRecord) -> String {
        format!("https://{}.{}/relevant", node.address, self.domain_suffix)
    }

    async fn read_domain(node_address: u32, response: reqwest::Response) -> Option<String> {
        if !response.status().is_success() {
            tracing::debug!(node = node_address, status = %response.status(), "probe rejected");
            return None;
        }
        match response.json::<ProbeResponse>().await {
            Ok(body) => Some(body.domain),
            Err(e) => {
                tracing::debug!(node = node_address, error = %e, "malformed probe answer");
                None
            }
        }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, node: &NodeRecord, client_ip: &str) -> Option<String> {
        let request = self.client.get(self.probe_url(node)).json(&ProbeRequest { ip: client_ip });
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(node = node.address, error = %e, "probe request failed");
                return None;
            }
        };
        Self::read_domain(node.address, response).await
    }
}
