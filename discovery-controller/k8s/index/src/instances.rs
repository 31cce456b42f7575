use crate::{
    controller::{endpoint_ip, Controller},
    service,
};
use discovery_controller_core::{parse_hostname, Endpoint, Locality, Service, ServiceInstance};
use discovery_controller_k8s_api::{self as k8s, Labels, ResourceExt, Selector};
use std::{net::IpAddr, num::NonZeroU16, sync::Arc};
use tracing::{debug, trace};

/// What is known about the pod behind an endpoint address.
#[derive(Debug, Default)]
struct Workload {
    labels: Labels,
    locality: Option<Locality>,
    identity: Option<String>,
}

impl Controller {
    /// Lists the instances of a service.
    ///
    /// An instance is emitted for each endpoint port that maps to a named service port. When
    /// `port_names` is not empty, only the named ports are considered. When `selectors` is not
    /// empty, only endpoints whose pod labels match at least one selector are included; endpoints
    /// whose pod is unknown have no labels.
    pub fn instances(
        &self,
        hostname: &str,
        port_names: &[&str],
        selectors: &[Selector],
    ) -> Vec<ServiceInstance> {
        let Some(host) = parse_hostname(hostname) else {
            debug!(%hostname, "Not a service hostname");
            return Vec::new();
        };
        let Some(svc) = self.services.read().get(&host.namespace, &host.name) else {
            trace!(%hostname, "No service");
            return Vec::new();
        };
        let Some(endpoints) = self.endpoints.read().get(&host.namespace, &host.name) else {
            trace!(%hostname, "No endpoints");
            return Vec::new();
        };
        let Some(svc) = service::convert(&svc, &self.config().domain_suffix) else {
            return Vec::new();
        };

        self.collect_instances(Arc::new(svc), &endpoints, |_| true, port_names, selectors)
    }

    /// Lists the instances, across all services, whose endpoint address is one of `addrs`.
    ///
    /// Endpoints without a corresponding service are ignored.
    pub fn host_instances(&self, addrs: &[IpAddr]) -> Vec<ServiceInstance> {
        if addrs.is_empty() {
            return Vec::new();
        }

        let all_endpoints = self.endpoints.read().list();
        let mut instances = Vec::new();
        for endpoints in all_endpoints.iter() {
            let hosted = endpoints
                .subsets
                .iter()
                .flatten()
                .flat_map(|s| s.addresses.iter().flatten())
                .filter_map(endpoint_ip)
                .any(|ip| addrs.contains(&ip));
            if !hosted {
                continue;
            }

            let namespace = endpoints.namespace().unwrap_or_default();
            let name = endpoints.name_unchecked();
            let Some(svc) = self.services.read().get(&namespace, &name) else {
                trace!(%namespace, %name, "Endpoints without a service");
                continue;
            };
            let Some(svc) = service::convert(&svc, &self.config().domain_suffix) else {
                continue;
            };

            instances.extend(self.collect_instances(
                Arc::new(svc),
                endpoints,
                |ip| addrs.contains(&ip),
                &[],
                &[],
            ));
        }
        instances
    }

    fn collect_instances(
        &self,
        svc: Arc<Service>,
        endpoints: &k8s::Endpoints,
        include: impl Fn(IpAddr) -> bool,
        port_names: &[&str],
        selectors: &[Selector],
    ) -> Vec<ServiceInstance> {
        let mut instances = Vec::new();
        for subset in endpoints.subsets.iter().flatten() {
            let ports = subset
                .ports
                .iter()
                .flatten()
                .filter_map(|port| {
                    let name = port.name.as_deref().unwrap_or_default();
                    if !port_names.is_empty() && !port_names.contains(&name) {
                        return None;
                    }
                    let service_port = svc.port_by_name(name)?.clone();
                    let number = u16::try_from(port.port).ok().and_then(NonZeroU16::new)?;
                    Some((number, service_port))
                })
                .collect::<Vec<_>>();
            if ports.is_empty() {
                continue;
            }

            for ip in subset.addresses.iter().flatten().filter_map(endpoint_ip) {
                if !include(ip) {
                    continue;
                }
                let workload = self.workload(ip);
                if !selectors.is_empty() && !selectors.iter().any(|s| s.matches(&workload.labels))
                {
                    trace!(%ip, "Endpoint does not match selectors");
                    continue;
                }

                for (port, service_port) in ports.iter() {
                    instances.push(ServiceInstance {
                        endpoint: Endpoint {
                            address: ip,
                            port: *port,
                            service_port: service_port.clone(),
                        },
                        service: svc.clone(),
                        labels: workload.labels.as_ref().clone(),
                        locality: workload.locality.clone(),
                        identity: workload.identity.clone(),
                    });
                }
            }
        }
        instances
    }

    fn workload(&self, ip: IpAddr) -> Workload {
        let Some(pod) = self.pods.read().by_addr(ip) else {
            return Workload::default();
        };
        Workload {
            labels: Labels::from_meta(&pod.metadata),
            locality: self.pod_locality(&pod),
            identity: self.pod_identity(&pod),
        }
    }
}
