//! Domain types for mesh service discovery.
//!
//! Nothing in this crate knows about the Kubernetes API. The types here describe what the
//! discovery index produces: services addressed by a stable hostname, the instances backing them,
//! the locality of those instances and the SPIFFE identities they present.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod hostname;
mod identity;
mod locality;
mod protocol;
mod service;

pub use self::{
    hostname::{parse_hostname, service_hostname, ServiceHostname},
    identity::spiffe_identity,
    locality::Locality,
    protocol::Protocol,
    service::{Endpoint, Service, ServiceInstance, ServicePort},
};
