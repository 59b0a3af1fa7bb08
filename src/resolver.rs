use crate::{
    directory::{GeoLookup, Location, NodeDirectory, NodeRecord, RegistryError},
    probe::{HttpProber, Prober},
};
use rand::seq::SliceRandom;
use std::{collections::HashSet, sync::Arc};

/// Configuration for an [`EdgeResolver`].
///
/// The allow-list and domain suffix are operational data and always come
/// from the caller, never from compiled-in constants.
#[derive(Clone, Debug)]
pub struct ResolverConfig {
    /// Known-good node addresses; everything else in the registry is
    /// ignored as untrusted.
    pub allowed: HashSet<u32>,

    /// Suffix appended to a node's integer address to form its default
    /// endpoint host, as in `wss://<address>.<suffix>`.
    pub domain_suffix: String,
}

/// Picks the edge node a client should connect to.
pub struct EdgeResolver {
    config: ResolverConfig,
    directory: NodeDirectory,
    geo: Arc<dyn GeoLookup>,
    prober: Option<Arc<dyn Prober>>,
}

impl EdgeResolver {
    /// A resolver that returns the best-ordered candidate without network
    /// confirmation.
    pub fn new(config: ResolverConfig, directory: NodeDirectory, geo: Arc<dyn GeoLookup>) -> Self {
        Self { config, directory, geo, prober: None }
    }

    /// A resolver that confirms candidates over the network before
    /// answering.
    pub fn probing(
        config: ResolverConfig,
        directory: NodeDirectory,
        geo: Arc<dyn GeoLookup>,
        prober: Arc<dyn Prober>,
    ) -> Self {
        Self { config, directory, geo, prober: Some(prober) }
    }

    /// A probing resolver whose prober targets the same domain suffix as
    /// the default endpoints, so probes and fallbacks can never disagree.
    pub fn probing_http(
        config: ResolverConfig,
        directory: NodeDirectory,
        geo: Arc<dyn GeoLookup>,
    ) -> Result<Self, reqwest::Error> {
        let prober = Arc::new(HttpProber::new(config.domain_suffix.clone())?);
        Ok(Self { config, directory, geo, prober: Some(prober) })
    }

    /// Resolve the endpoint URL the client should connect to.
    ///
    /// Candidates are the allow-listed live nodes, ordered by distance from
    /// the client when its location is known and uniformly at random
    /// otherwise. A probing resolver with a client IP then walks the
    /// candidates in order and short-circuits on the first probe answer;
    /// once at least one candidate exists, resolution cannot fail, because
    /// the first candidate's default endpoint backstops every probe path.
    pub async fn resolve_endpoint(&self, client_ip: Option<&str>) -> Result<String, ResolveError> {
        let nodes = self.directory.list_active_nodes().await?;
        let mut candidates: Vec<NodeRecord> =
            nodes.into_iter().filter(|node| self.config.allowed.contains(&node.address)).collect();
        if candidates.is_empty() {
            return Err(ResolveError::NoAvailableNode);
        }

        let client_location = match client_ip {
            Some(ip) => self.geo.lookup(ip).await,
            None => None,
        };
        order_candidates(&mut candidates, client_location);

        let fallback = self.default_endpoint(&candidates[0]);
        let (Some(prober), Some(ip)) = (self.prober.as_deref(), client_ip) else {
            return Ok(fallback);
        };

        for node in &candidates {
            if let Some(domain) = prober.probe(node, ip).await {
                return Ok(format!("wss://{domain}"));
            }
        }
        tracing::warn!(endpoint = %fallback, "no candidate answered a probe, using default endpoint");
        Ok(fallback)
    }

    fn default_endpoint(&self, node: &NodeRecord) -> String {
        format!("wss://{}.{}", node.address, self.config.domain_suffix)
    }
}

/// An error when resolving an endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("no allow-listed node is available")]
    NoAvailableNode,
}

fn order_candidates(candidates: &mut [NodeRecord], client: Option<Location>) {
    match client {
        Some(client) => candidates.sort_by(|a, b| {
            distance_from(client, a).total_cmp(&distance_from(client, b))
        }),
        None => candidates.shuffle(&mut rand::thread_rng()),
    }
}

fn distance_from(client: Location, node: &NodeRecord) -> f64 {
    match node.location {
        Some(location) => haversine_km(client, location),
        // nodes we cannot locate sort last
        None => f64::INFINITY,
    }
}

/// Great-circle distance between two coordinates, in kilometers.
fn haversine_km(a: Location, b: Location) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let phi_a = a.latitude.to_radians();
    let phi_b = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();
    let h = (d_phi / 2.0).sin().powi(2)
        + phi_a.cos() * phi_b.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}
