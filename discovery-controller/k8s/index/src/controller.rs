use crate::{
    cache::{Cache, CacheEvent, SharedCache},
    metrics::IndexMetrics,
    node,
    pod::{PodIndex, SharedPodIndex},
    service,
};
use discovery_controller_core::{parse_hostname, spiffe_identity, Locality, Service};
use discovery_controller_k8s_api::{self as k8s, ApiSource, Source, Watch};
use std::{collections::BTreeSet, net::IpAddr, sync::Arc, time::Duration};
use tokio::{sync::broadcast, task::JoinSet};
use tracing::{debug, info, info_span, trace, Instrument};

/// Configures a [`Controller`].
#[derive(Clone, Debug)]
pub struct Config {
    /// Limits discovery to a single namespace. When unset, all namespaces are watched.
    pub namespace: Option<String>,

    /// How often each resource is fully relisted.
    pub resync: Duration,

    /// The cluster's DNS domain, e.g. `cluster.local`.
    pub domain_suffix: String,

    /// The mesh identity trust domain.
    pub trust_domain: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cluster domain suffix must not be empty")]
    EmptyDomainSuffix,

    #[error("invalid cluster domain suffix: {0:?}")]
    InvalidDomainSuffix(String),

    #[error("identity trust domain must not be empty")]
    EmptyTrustDomain,

    #[error("resync interval must be greater than zero")]
    ZeroResync,

    #[error("invalid namespace: {0:?}")]
    InvalidNamespace(String),
}

/// Provides event streams for each watched resource.
#[derive(Clone)]
pub struct Sources {
    pub services: Arc<dyn Source<k8s::Service>>,
    pub endpoints: Arc<dyn Source<k8s::Endpoints>>,
    pub pods: Arc<dyn Source<k8s::Pod>>,
    pub nodes: Arc<dyn Source<k8s::Node>>,
}

/// Indexes cluster resources to answer service discovery queries.
///
/// Queries only read from in-memory caches and never block on the Kubernetes API. Because each
/// resource is watched independently, joins across resources may briefly observe, e.g., a pod
/// before its node; such lookups simply find nothing.
#[derive(Clone)]
pub struct Controller {
    config: Arc<Config>,
    sources: Sources,
    metrics: IndexMetrics,
    pub(crate) services: SharedCache<k8s::Service>,
    pub(crate) endpoints: SharedCache<k8s::Endpoints>,
    pub(crate) pods: SharedPodIndex,
    pub(crate) nodes: SharedCache<k8s::Node>,
}

// === impl Config ===

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domain_suffix.is_empty() {
            return Err(ConfigError::EmptyDomainSuffix);
        }
        // Hostnames built from the suffix must parse back into their parts.
        if self.domain_suffix.split('.').any(str::is_empty) {
            return Err(ConfigError::InvalidDomainSuffix(self.domain_suffix.clone()));
        }
        if self.trust_domain.is_empty() {
            return Err(ConfigError::EmptyTrustDomain);
        }
        if self.resync.is_zero() {
            return Err(ConfigError::ZeroResync);
        }
        if let Some(ns) = self.namespace.as_deref() {
            if !is_dns_label(ns) {
                return Err(ConfigError::InvalidNamespace(ns.to_string()));
            }
        }
        Ok(())
    }
}

/// Namespace names must be RFC 1123 labels.
fn is_dns_label(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 63
        && s
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        && !s.starts_with('-')
        && !s.ends_with('-')
}

// === impl Sources ===

impl Sources {
    /// Watches resources through the Kubernetes API.
    ///
    /// Services, endpoints and pods are limited to `namespace` when it is set. Nodes are always
    /// watched cluster-wide.
    pub fn from_client(client: k8s::Client, namespace: Option<&str>) -> Self {
        Self {
            services: Arc::new(ApiSource::<k8s::Service>::scoped(client.clone(), namespace)),
            endpoints: Arc::new(ApiSource::<k8s::Endpoints>::scoped(
                client.clone(),
                namespace,
            )),
            pods: Arc::new(ApiSource::<k8s::Pod>::scoped(client.clone(), namespace)),
            nodes: Arc::new(ApiSource::<k8s::Node>::all(client)),
        }
    }
}

// === impl Controller ===

impl Controller {
    pub fn new(config: Config, sources: Sources) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            sources,
            metrics: IndexMetrics::default(),
            services: Cache::shared(),
            endpoints: Cache::shared(),
            pods: PodIndex::shared(),
            nodes: Cache::shared(),
        })
    }

    /// Records index updates with the given metrics.
    pub fn with_metrics(mut self, metrics: IndexMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Watches cluster resources, updating the index until `shutdown` is signaled.
    ///
    /// Each resource is watched and indexed on its own task. Every `Config::resync` interval, each
    /// watch is restarted so that its cache is reconciled against a full listing.
    pub async fn run(&self, shutdown: drain::Watch) {
        let resync = self.config.resync;
        let mut tasks = JoinSet::new();

        let services = Watch::new(self.sources.services.clone(), resync)
            .instrument(info_span!("services"))
            .into_stream();
        tasks.spawn(
            kubert::index::namespaced(IndexMetrics::instrument(&self.metrics, self.services.clone()), services)
                .instrument(info_span!("services")),
        );

        let endpoints = Watch::new(self.sources.endpoints.clone(), resync)
            .instrument(info_span!("endpoints"))
            .into_stream();
        tasks.spawn(
            kubert::index::namespaced(IndexMetrics::instrument(&self.metrics, self.endpoints.clone()), endpoints)
                .instrument(info_span!("endpoints")),
        );

        let pods = Watch::new(self.sources.pods.clone(), resync)
            .instrument(info_span!("pods"))
            .into_stream();
        tasks.spawn(
            kubert::index::namespaced(IndexMetrics::instrument(&self.metrics, self.pods.clone()), pods)
                .instrument(info_span!("pods")),
        );

        let nodes = Watch::new(self.sources.nodes.clone(), resync)
            .instrument(info_span!("nodes"))
            .into_stream();
        tasks.spawn(
            kubert::index::cluster(IndexMetrics::instrument(&self.metrics, self.nodes.clone()), nodes)
                .instrument(info_span!("nodes")),
        );

        info!(
            namespace = self.config.namespace.as_deref().unwrap_or("*"),
            resync = ?resync,
            "Watching cluster resources"
        );

        let release = shutdown.signaled().await;
        debug!("Stopping watches");
        release.release_after(tasks.shutdown()).await;
        info!("Stopped");
    }

    /// Indicates whether every watched resource has been fully listed.
    pub fn has_synced(&self) -> bool {
        self.services.read().has_synced()
            && self.endpoints.read().has_synced()
            && self.pods.read().pods().has_synced()
            && self.nodes.read().has_synced()
    }

    /// Lists all services, in no particular order.
    pub fn services(&self) -> Vec<Service> {
        let services = self.services.read().list();
        services
            .iter()
            .filter_map(|svc| service::convert(svc, &self.config.domain_suffix))
            .collect()
    }

    /// Looks up a service by its hostname.
    pub fn get_service(&self, hostname: &str) -> Option<Service> {
        let host = parse_hostname(hostname)?;
        let svc = self.services.read().get(&host.namespace, &host.name)?;
        service::convert(&svc, &self.config.domain_suffix)
    }

    /// Resolves the `region/zone` of the node running the pod with address `addr`.
    ///
    /// Returns `None` unless the pod and its node are both known and the node has both a region
    /// and a zone label.
    pub fn resolve_az(&self, addr: IpAddr) -> Option<String> {
        let pod = self.pods.read().by_addr(addr)?;
        self.pod_locality(&pod).map(|l| l.to_string())
    }

    /// Resolves the SPIFFE identities of the pods backing a service's endpoints.
    ///
    /// When `port_names` is not empty, only endpoint subsets exposing at least one of the named
    /// ports are considered. Endpoint addresses that do not map to a known pod, and pods without a
    /// service account, are skipped.
    pub fn resolve_identities(&self, hostname: &str, port_names: &[&str]) -> BTreeSet<String> {
        let mut identities = BTreeSet::new();
        let Some(host) = parse_hostname(hostname) else {
            debug!(%hostname, "Not a service hostname");
            return identities;
        };
        let Some(endpoints) = self.endpoints.read().get(&host.namespace, &host.name) else {
            trace!(%hostname, "No endpoints");
            return identities;
        };

        let pods = self.pods.read();
        for subset in endpoints.subsets.iter().flatten() {
            if !subset_exposes(subset, port_names) {
                continue;
            }
            for addr in subset.addresses.iter().flatten() {
                let Some(pod) = endpoint_ip(addr).and_then(|ip| pods.by_addr(ip)) else {
                    trace!(ip = %addr.ip, "No pod for endpoint");
                    continue;
                };
                if let Some(identity) = self.pod_identity(&pod) {
                    identities.insert(identity);
                }
            }
        }
        identities
    }

    /// Subscribes to changes in the service cache.
    pub fn watch_services(&self) -> broadcast::Receiver<CacheEvent> {
        self.services.read().subscribe()
    }

    /// Subscribes to changes in the endpoints cache.
    pub fn watch_endpoints(&self) -> broadcast::Receiver<CacheEvent> {
        self.endpoints.read().subscribe()
    }

    pub(crate) fn pod_locality(&self, pod: &k8s::Pod) -> Option<Locality> {
        let node_name = pod
            .spec
            .as_ref()?
            .node_name
            .as_deref()
            .filter(|n| !n.is_empty())?;
        let node = self.nodes.read().get("", node_name)?;
        node::locality(&node)
    }

    pub(crate) fn pod_identity(&self, pod: &k8s::Pod) -> Option<String> {
        let namespace = pod.metadata.namespace.as_deref()?;
        let spec = pod.spec.as_ref()?;
        #[allow(deprecated)]
        let sa = spec
            .service_account_name
            .as_deref()
            .or(spec.service_account.as_deref())
            .filter(|sa| !sa.is_empty())?;
        Some(spiffe_identity(&self.config.trust_domain, namespace, sa))
    }
}

/// Indicates whether an endpoint subset exposes any of `port_names`. An empty list of names
/// matches every subset.
pub(crate) fn subset_exposes(subset: &k8s::EndpointSubset, port_names: &[&str]) -> bool {
    port_names.is_empty()
        || subset
            .ports
            .iter()
            .flatten()
            .any(|p| p.name.as_deref().is_some_and(|n| port_names.contains(&n)))
}

pub(crate) fn endpoint_ip(addr: &k8s::EndpointAddress) -> Option<IpAddr> {
    match addr.ip.parse() {
        Ok(ip) => Some(ip),
        Err(error) => {
            debug!(ip = %addr.ip, %error, "Invalid endpoint address");
            None
        }
    }
}
