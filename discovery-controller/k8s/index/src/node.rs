//! Node -> Locality

use discovery_controller_core::Locality;
use discovery_controller_k8s_api::{self as k8s, Labels};

/// Reads a node's region and zone from its topology labels.
///
/// The deprecated `failure-domain.beta.kubernetes.io` labels are used when the current ones are
/// not set. Empty label values count as unset. A node missing either its region or its zone has
/// no locality.
pub(crate) fn locality(node: &k8s::Node) -> Option<Locality> {
    let labels = Labels::from_meta(&node.metadata);
    let region = label(&labels, k8s::REGION_LABEL, k8s::LEGACY_REGION_LABEL)?;
    let zone = label(&labels, k8s::ZONE_LABEL, k8s::LEGACY_ZONE_LABEL)?;
    Some(Locality {
        region: region.to_string(),
        zone: zone.to_string(),
    })
}

fn label<'l>(labels: &'l Labels, key: &str, legacy: &str) -> Option<&'l str> {
    let get = |k: &str| labels.get(k).filter(|v| !v.is_empty());
    get(key).or_else(|| get(legacy))
}
