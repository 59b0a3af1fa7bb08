use async_trait::async_trait;
use std::{net::Ipv4Addr, sync::Arc};

/// A node entry as stored in the external registry.
#[derive(Clone, Debug, PartialEq)]
pub struct RegistryNode {
    /// The node's network address, encoded as an unsigned integer.
    pub address: u32,

    /// Whether the node is marked live in the registry.
    pub active: bool,

    /// The node's registered public key, when it has one.
    pub key: Option<String>,
}

/// Read-only access to the external node registry.
#[async_trait]
pub trait NodeRegistry: Send + Sync {
    /// List every node entry in the registry.
    async fn list_all_nodes(&self) -> Result<Vec<RegistryNode>, RegistryError>;

    /// Look up a single node by its integer address.
    async fn node_by_address(&self, address: u32) -> Result<RegistryNode, RegistryError>;
}

/// An error when reading from the node registry.
///
/// Registry failures are fatal to the resolution attempt that triggered
/// them; there is no local cache to fall back to.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    #[error("no node registered at address {0}")]
    UnknownAddress(u32),
}

/// A geographic position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Best-effort IP geolocation.
#[async_trait]
pub trait GeoLookup: Send + Sync {
    /// `None` when the address cannot be located; never an error.
    async fn lookup(&self, ip: &str) -> Option<Location>;
}

/// A geolocation source that never answers, forcing random node ordering.
pub struct NoGeoLookup;

#[async_trait]
impl GeoLookup for NoGeoLookup {
    async fn lookup(&self, _ip: &str) -> Option<Location> {
        None
    }
}

/// An edge node, decoded and enriched from its registry entry.
#[derive(Clone, Debug)]
pub struct NodeRecord {
    /// The on-registry integer form of the address.
    pub address: u32,

    /// The same address in dotted IPv4 form.
    pub dotted_address: Ipv4Addr,

    /// Whether the node is marked live in the registry.
    pub active: bool,

    /// The node's registered public key, when it has one.
    pub key: Option<String>,

    /// Where the node itself is located, when geolocation answers.
    pub location: Option<Location>,
}

/// Adapter over the external registry that decodes addresses and enriches
/// nodes with their own geolocation.
pub struct NodeDirectory {
    registry: Arc<dyn NodeRegistry>,
    geo: Arc<dyn GeoLookup>,
}

impl NodeDirectory {
    pub fn new(registry: Arc<dyn NodeRegistry>, geo: Arc<dyn GeoLookup>) -> Self {
        Self { registry, geo }
    }

    /// Fetch every live node from the registry.
    pub async fn list_active_nodes(&self) -> Result<Vec<NodeRecord>, RegistryError> {
        let nodes = self.registry.list_all_nodes().await?;
        let mut records = Vec::with_capacity(nodes.len());
        for node in nodes {
            if !node.active {
                continue;
            }
            records.push(self.decorate(node).await);
        }
        Ok(records)
    }

    /// Fetch a single node by its integer address.
    pub async fn node_by_address(&self, address: u32) -> Result<NodeRecord, RegistryError> {
        let node = self.registry.node_by_address(address).await?;
        Ok(self.decorate(node).await)
    }

    async fn decorate(&self, node: RegistryNode) -> NodeRecord {
        let RegistryNode { address, active, key } = node;
        let dotted_address = Ipv4Addr::from(address);
        let location = self.geo.lookup(&dotted_address.to_string()).await;
        NodeRecord { address, dotted_address, active, key, location }
    }
}
