use std::fmt;

/// The region and zone that a workload runs in.
///
/// Both parts are always known; a workload with only a zone or only a region has no locality.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Locality {
    pub region: String,
    pub zone: String,
}

// === impl Locality ===

impl fmt::Display for Locality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.zone)
    }
}
