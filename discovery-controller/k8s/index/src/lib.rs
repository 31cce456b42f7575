//! Indexes Kubernetes Services, Endpoints, Pods and Nodes to answer service discovery queries.
//!
//! Each resource kind is watched independently and applied to its own cache, which is updated
//! through [`kubert::index`]. Pods are additionally indexed by IP address so that endpoint
//! addresses can be joined with the pods, nodes and service accounts behind them.
//!
//! The [`Controller`] owns the caches. Its query methods are synchronous and only read from
//! memory: a lookup that cannot be satisfied (an unknown hostname, an address whose pod has not
//! been observed, a node without topology labels) simply returns nothing.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod cache;
mod controller;
mod instances;
mod metrics;
mod node;
mod pod;
mod service;


pub use self::{
    cache::{Cache, CacheEvent, ObjectKey, SharedCache},
    controller::{Config, ConfigError, Controller, Sources},
    metrics::{IndexMetrics, SizedIndex},
    pod::{AddressIndex, PodIndex, SharedPodIndex},
};
