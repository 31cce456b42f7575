//! Pods are indexed both by name and by IP address.
//!
//! Endpoints and proxies only know workloads by address, so every join from an address to a pod's
//! metadata goes through the [`AddressIndex`]. The address index is updated by the same event that
//! updates the pod cache, under the same lock.

use crate::{
    cache::{Cache, CacheEvent, ObjectKey},
    metrics::SizedIndex,
};
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use discovery_controller_k8s_api::{self as k8s, ResourceExt};
use kubert::index::NamespacedRemoved;
use parking_lot::RwLock;
use std::{net::IpAddr, sync::Arc};
use tracing::{debug, instrument, trace};

pub type SharedPodIndex = Arc<RwLock<PodIndex>>;

/// Caches pods along with an index of their IP addresses.
#[derive(Debug, Default)]
pub struct PodIndex {
    pods: Cache<k8s::Pod>,
    addresses: AddressIndex,
}

/// Maps pod IPs to the pod that most recently claimed them.
#[derive(Debug, Default)]
pub struct AddressIndex {
    by_ip: HashMap<IpAddr, ObjectKey>,
}

// === impl PodIndex ===

impl PodIndex {
    pub fn shared() -> SharedPodIndex {
        Arc::new(RwLock::new(Self::default()))
    }

    pub fn pods(&self) -> &Cache<k8s::Pod> {
        &self.pods
    }

    pub fn addresses(&self) -> &AddressIndex {
        &self.addresses
    }

    /// Finds the pod that owns `addr`.
    ///
    /// Returns `None` if the address is unknown or if its pod has since been removed.
    pub fn by_addr(&self, addr: IpAddr) -> Option<Arc<k8s::Pod>> {
        let key = self.addresses.lookup(addr)?;
        self.pods.get_key(key)
    }

    #[instrument(skip_all, fields(%key))]
    fn apply_pod(&mut self, key: ObjectKey, pod: k8s::Pod) {
        let ip = pod_ip(&pod);
        let prior_ip = self
            .pods
            .insert(key.clone(), pod)
            .and_then(|prior| pod_ip(&prior));

        if let Some(prior_ip) = prior_ip {
            if Some(prior_ip) != ip {
                self.addresses.unset(prior_ip, &key);
            }
        }
        if let Some(ip) = ip {
            self.addresses.set(ip, key);
        }
    }

    #[instrument(skip_all, fields(%key))]
    fn delete_pod(&mut self, key: &ObjectKey) -> bool {
        let Some(pod) = self.pods.remove(key) else {
            trace!("Unknown pod");
            return false;
        };
        if let Some(ip) = pod_ip(&pod) {
            self.addresses.unset(ip, key);
        }
        debug!("Removed pod");
        true
    }
}

impl SizedIndex for PodIndex {
    fn size(&self) -> usize {
        self.pods.len()
    }
}

impl kubert::index::IndexNamespacedResource<k8s::Pod> for PodIndex {
    fn apply(&mut self, pod: k8s::Pod) {
        let key = ObjectKey::of(&pod);
        self.apply_pod(key.clone(), pod);
        self.pods.notify(CacheEvent::Applied(key));
    }

    fn delete(&mut self, namespace: String, name: String) {
        let key = ObjectKey::new(namespace, name);
        if self.delete_pod(&key) {
            self.pods.notify(CacheEvent::Deleted(key));
        }
    }

    fn reset(&mut self, pods: Vec<k8s::Pod>, _removed: NamespacedRemoved) {
        // Addresses are only released by their current owner, so removing defunct pods never
        // clobbers an address that a listed pod has claimed.
        let listed = pods.iter().map(ObjectKey::of).collect::<HashSet<_>>();
        let stale = self
            .pods
            .keys()
            .filter(|key| !listed.contains(*key))
            .cloned()
            .collect::<Vec<_>>();
        for key in stale.iter() {
            self.delete_pod(key);
        }

        for pod in pods.into_iter() {
            let key = ObjectKey::of(&pod);
            self.apply_pod(key, pod);
        }

        self.pods.mark_synced();
        self.pods.notify(CacheEvent::Reset);
    }
}

// === impl AddressIndex ===

impl AddressIndex {
    pub fn lookup(&self, addr: IpAddr) -> Option<&ObjectKey> {
        self.by_ip.get(&addr)
    }

    pub fn len(&self) -> usize {
        self.by_ip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_ip.is_empty()
    }

    /// Points `addr` at `pod`, replacing any prior owner.
    fn set(&mut self, addr: IpAddr, pod: ObjectKey) {
        if let Some(prior) = self.by_ip.get(&addr) {
            if *prior != pod {
                debug!(%addr, %prior, owner = %pod, "Address reassigned");
            }
        }
        self.by_ip.insert(addr, pod);
    }

    /// Removes `addr` if, and only if, it is still owned by `pod`.
    fn unset(&mut self, addr: IpAddr, pod: &ObjectKey) {
        if self.by_ip.get(&addr) == Some(pod) {
            trace!(%addr, "Released address");
            self.by_ip.remove(&addr);
        } else {
            trace!(%addr, "Address owned by another pod");
        }
    }
}

/// Reads a pod's primary IP from its status.
///
/// Pods that have not been scheduled, or that use the host network before an IP is reported, have
/// no address.
pub(crate) fn pod_ip(pod: &k8s::Pod) -> Option<IpAddr> {
    let ip = pod.status.as_ref()?.pod_ip.as_deref()?;
    match ip.parse() {
        Ok(ip) => Some(ip),
        Err(error) => {
            debug!(pod = %pod.name_unchecked(), %ip, %error, "Invalid pod IP");
            None
        }
    }
}
