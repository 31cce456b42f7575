use crate::metrics::SizedIndex;
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use discovery_controller_k8s_api::{self as k8s, ResourceExt};
use kubert::index::{ClusterRemoved, NamespacedRemoved};
use parking_lot::RwLock;
use std::{fmt, sync::Arc};
use tokio::sync::broadcast;
use tracing::{debug, trace};

pub type SharedCache<K> = Arc<RwLock<Cache<K>>>;

/// Identifies a cached object. Cluster-scoped objects have an empty namespace.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

/// Published by a cache as it changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheEvent {
    Applied(ObjectKey),
    Deleted(ObjectKey),

    /// The cache was replaced by a full listing of the resource.
    Reset,
}

/// A snapshot of every known object of one resource kind.
///
/// Objects are stored behind `Arc`s so that readers can hold onto them after releasing the lock.
#[derive(Debug)]
pub struct Cache<K> {
    objects: HashMap<ObjectKey, Arc<K>>,
    synced: bool,
    events: broadcast::Sender<CacheEvent>,
}

// === impl ObjectKey ===

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn cluster(name: impl Into<String>) -> Self {
        Self::new(String::new(), name)
    }

    pub(crate) fn of<K: ResourceExt>(obj: &K) -> Self {
        Self::new(obj.namespace().unwrap_or_default(), obj.name_unchecked())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            self.name.fmt(f)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

// === impl Cache ===

impl<K> Default for Cache<K> {
    fn default() -> Self {
        Self {
            objects: HashMap::default(),
            synced: false,
            events: broadcast::channel(Self::EVENTS_CAPACITY).0,
        }
    }
}

impl<K> Cache<K> {
    const EVENTS_CAPACITY: usize = 1024;

    pub fn shared() -> SharedCache<K> {
        Arc::new(RwLock::new(Self::default()))
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<Arc<K>> {
        self.get_key(&ObjectKey::new(namespace, name))
    }

    pub fn get_key(&self, key: &ObjectKey) -> Option<Arc<K>> {
        self.objects.get(key).cloned()
    }

    /// Lists all cached objects, in no particular order.
    pub fn list(&self) -> Vec<Arc<K>> {
        self.objects.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Indicates whether the cache has been populated by a full listing of the resource.
    pub fn has_synced(&self) -> bool {
        self.synced
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Stores an object, returning the object it replaced.
    pub(crate) fn insert(&mut self, key: ObjectKey, obj: K) -> Option<Arc<K>> {
        self.objects.insert(key, Arc::new(obj))
    }

    pub(crate) fn remove(&mut self, key: &ObjectKey) -> Option<Arc<K>> {
        self.objects.remove(key)
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &ObjectKey> {
        self.objects.keys()
    }

    pub(crate) fn mark_synced(&mut self) {
        if !self.synced {
            debug!(objects = self.objects.len(), "Synced");
        }
        self.synced = true;
    }

    pub(crate) fn notify(&self, event: CacheEvent) {
        // There may not be any subscribers.
        let _ = self.events.send(event);
    }
}

impl<K: ResourceExt> Cache<K> {
    fn apply_resource(&mut self, resource: K) {
        let key = ObjectKey::of(&resource);
        trace!(%key, "Applying");
        self.insert(key.clone(), resource);
        self.notify(CacheEvent::Applied(key));
    }

    fn delete_key(&mut self, key: ObjectKey) {
        if self.remove(&key).is_some() {
            trace!(%key, "Deleted");
            self.notify(CacheEvent::Deleted(key));
        }
    }

    /// Replaces the cache's contents with a full listing of the resource.
    fn replace(&mut self, resources: Vec<K>) {
        let mut stale = self.keys().cloned().collect::<HashSet<_>>();
        for resource in resources.into_iter() {
            let key = ObjectKey::of(&resource);
            stale.remove(&key);
            self.insert(key, resource);
        }

        for key in stale.into_iter() {
            debug!(%key, "Removing defunct object");
            self.remove(&key);
        }

        self.mark_synced();
        self.notify(CacheEvent::Reset);
    }
}

impl<K> SizedIndex for Cache<K> {
    fn size(&self) -> usize {
        self.len()
    }
}

impl<K> kubert::index::IndexNamespacedResource<K> for Cache<K>
where
    K: k8s::Resource<DynamicType = (), Scope = k8s::NamespaceResourceScope> + ResourceExt,
{
    fn apply(&mut self, resource: K) {
        self.apply_resource(resource)
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.delete_key(ObjectKey::new(namespace, name))
    }

    // The listing is authoritative, so objects missing from it are dropped whether or not the
    // caller noticed their removal.
    fn reset(&mut self, resources: Vec<K>, _removed: NamespacedRemoved) {
        self.replace(resources)
    }
}

impl<K> kubert::index::IndexClusterResource<K> for Cache<K>
where
    K: k8s::Resource<DynamicType = (), Scope = k8s::ClusterResourceScope> + ResourceExt,
{
    fn apply(&mut self, resource: K) {
        self.apply_resource(resource)
    }

    fn delete(&mut self, name: String) {
        self.delete_key(ObjectKey::cluster(name))
    }

    fn reset(&mut self, resources: Vec<K>, _removed: ClusterRemoved) {
        self.replace(resources)
    }
}
