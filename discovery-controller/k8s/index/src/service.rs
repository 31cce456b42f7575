use discovery_controller_core::{service_hostname, Protocol, Service, ServicePort};
use discovery_controller_k8s_api::{self as k8s, ResourceExt};
use std::{net::IpAddr, num::NonZeroU16};
use tracing::debug;

/// Builds the discovery view of a Kubernetes `Service`.
///
/// Returns `None` for services without a spec. Ports that cannot be represented are omitted.
pub(crate) fn convert(svc: &k8s::Service, domain: &str) -> Option<Service> {
    let namespace = svc.namespace()?;
    let name = svc.name_unchecked();
    let Some(spec) = svc.spec.as_ref() else {
        debug!(%namespace, %name, "Service has no spec");
        return None;
    };

    let external_name = if spec.type_.as_deref() == Some("ExternalName") {
        spec.external_name.clone().filter(|n| !n.is_empty())
    } else {
        None
    };

    let address = match spec.cluster_ip.as_deref() {
        None | Some("") | Some("None") => None,
        Some(ip) => match ip.parse::<IpAddr>() {
            Ok(ip) => Some(ip),
            Err(error) => {
                debug!(%namespace, %name, %ip, %error, "Invalid cluster IP");
                None
            }
        },
    };

    let ports = spec
        .ports
        .iter()
        .flatten()
        .filter_map(|port| {
            let converted = convert_port(port);
            if converted.is_none() {
                debug!(%namespace, %name, port = port.port, "Ignoring invalid service port");
            }
            converted
        })
        .collect();

    Some(Service {
        hostname: service_hostname(&name, &namespace, domain),
        name,
        namespace,
        address,
        external_name,
        ports,
    })
}

fn convert_port(port: &k8s::ServicePort) -> Option<ServicePort> {
    let number = u16::try_from(port.port).ok().and_then(NonZeroU16::new)?;
    let name = port.name.clone().unwrap_or_default();
    let protocol = Protocol::infer(port.protocol.as_deref(), &name);
    Some(ServicePort {
        name,
        port: number,
        protocol,
    })
}
