//! Service hostnames follow the cluster DNS convention: `<name>.<namespace>.svc.<domain>`.

use std::fmt;

const SVC: &str = "svc";

/// The components of a service hostname.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ServiceHostname {
    pub name: String,
    pub namespace: String,
    pub domain: String,
}

/// Formats the hostname of the service `name` in `namespace` for the cluster domain `domain`
/// (e.g. `cluster.local`).
pub fn service_hostname(name: &str, namespace: &str, domain: &str) -> String {
    format!("{name}.{namespace}.{SVC}.{domain}")
}

/// Parses a hostname produced by [`service_hostname`].
///
/// Returns `None` when the hostname does not name a cluster service.
pub fn parse_hostname(hostname: &str) -> Option<ServiceHostname> {
    let mut parts = hostname.splitn(4, '.');
    let name = parts.next().filter(|s| !s.is_empty())?;
    let namespace = parts.next().filter(|s| !s.is_empty())?;
    if parts.next()? != SVC {
        return None;
    }
    let domain = parts.next()?;
    if domain.is_empty() || domain.split('.').any(str::is_empty) {
        return None;
    }

    Some(ServiceHostname {
        name: name.to_string(),
        namespace: namespace.to_string(),
        domain: domain.to_string(),
    })
}

// === impl ServiceHostname ===

impl fmt::Display for ServiceHostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{SVC}.{}", self.name, self.namespace, self.domain)
    }
}

impl std::str::FromStr for ServiceHostname {
    type Err = InvalidHostname;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hostname(s).ok_or(InvalidHostname(()))
    }
}

/// Indicates that a hostname does not name a cluster service.
#[derive(Debug, PartialEq, Eq)]
pub struct InvalidHostname(());

impl fmt::Display for InvalidHostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("hostname must be formatted as <name>.<namespace>.svc.<domain>")
    }
}

impl std::error::Error for InvalidHostname {}
