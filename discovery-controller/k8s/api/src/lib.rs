#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod labels;
pub mod watch;

pub use self::{
    labels::{Labels, Selector},
    watch::{ApiSource, Event, EventStream, Source, Watch},
};
pub use k8s_openapi::{
    api::core::v1::{
        EndpointAddress, EndpointPort, EndpointSubset, Endpoints, Node, NodeSpec, Pod, PodSpec,
        PodStatus, Service, ServicePort, ServiceSpec,
    },
    ClusterResourceScope, NamespaceResourceScope,
};
pub use kube::{
    api::{Api, ObjectMeta},
    runtime::watcher,
    Client, Resource, ResourceExt,
};

/// Node label holding the node's availability zone.
pub const ZONE_LABEL: &str = "topology.kubernetes.io/zone";

/// Node label holding the node's region.
pub const REGION_LABEL: &str = "topology.kubernetes.io/region";

/// Deprecated zone label, still set by older cloud providers.
pub const LEGACY_ZONE_LABEL: &str = "failure-domain.beta.kubernetes.io/zone";

/// Deprecated region label, still set by older cloud providers.
pub const LEGACY_REGION_LABEL: &str = "failure-domain.beta.kubernetes.io/region";
