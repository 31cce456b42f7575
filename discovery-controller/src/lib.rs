#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use discovery_controller_core as core;
pub use discovery_controller_k8s_api as k8s;
pub use discovery_controller_k8s_index as index;

mod args;

pub use self::args::Args;
