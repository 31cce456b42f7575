use crate::{Locality, Protocol};
use std::{collections::BTreeMap, net::IpAddr, num::NonZeroU16, sync::Arc};

/// A cluster service, addressed by its hostname.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Service {
    pub hostname: String,
    pub name: String,
    pub namespace: String,

    /// The service's cluster-internal address. Unset for headless and external-name services.
    pub address: Option<IpAddr>,

    /// The DNS name that an `ExternalName` service aliases.
    pub external_name: Option<String>,

    pub ports: Vec<ServicePort>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ServicePort {
    /// The port's name. May be empty for single-port services.
    pub name: String,
    pub port: NonZeroU16,
    pub protocol: Protocol,
}

/// A network endpoint serving a service port.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub address: IpAddr,
    pub port: NonZeroU16,
    pub service_port: ServicePort,
}

/// A single endpoint of a service, along with what is known about the workload behind it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceInstance {
    pub endpoint: Endpoint,
    pub service: Arc<Service>,

    /// The labels of the pod serving the endpoint. Empty when the pod is not known.
    pub labels: BTreeMap<String, String>,

    pub locality: Option<Locality>,

    /// The SPIFFE identity of the pod serving the endpoint, if it runs with a service account.
    pub identity: Option<String>,
}

// === impl Service ===

impl Service {
    pub fn port_by_name(&self, name: &str) -> Option<&ServicePort> {
        self.ports.iter().find(|p| p.name == name)
    }

    pub fn is_external(&self) -> bool {
        self.external_name.is_some()
    }
}
