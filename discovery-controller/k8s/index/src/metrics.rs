use discovery_controller_k8s_api::Resource;
use kubert::index::{
    ClusterRemoved, IndexClusterResource, IndexNamespacedResource, NamespacedRemoved,
};
use parking_lot::RwLock;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};
use std::sync::Arc;

/// Tracks updates to each resource kind's index.
///
/// The default value is not registered with any registry, so it records updates that are never
/// exported.
#[derive(Clone, Default)]
pub struct IndexMetrics {
    index_size: Family<IndexLabels, Gauge>,
    index_applies: Family<IndexLabels, Counter>,
    index_deletes: Family<IndexLabels, Counter>,
    index_resets: Family<IndexLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct IndexLabels {
    kind: String,
}

pub trait SizedIndex {
    fn size(&self) -> usize;
}

/// Wraps a shared index so that each update is recorded before it is applied.
pub(crate) struct Instrumented<T> {
    inner: Arc<RwLock<T>>,
    metrics: IndexMetrics,
}

// === impl IndexMetrics ===

impl IndexMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let index_size = Family::default();
        prom.register(
            "index_size",
            "Gauge of the number of resources in the index",
            index_size.clone(),
        );

        let index_applies = Family::default();
        prom.register(
            "index_applies",
            "Count of applies to the index",
            index_applies.clone(),
        );

        let index_deletes = Family::default();
        prom.register(
            "index_deletes",
            "Count of deletes to the index",
            index_deletes.clone(),
        );

        let index_resets = Family::default();
        prom.register(
            "index_resets",
            "Count of resets to the index",
            index_resets.clone(),
        );

        Self {
            index_size,
            index_applies,
            index_deletes,
            index_resets,
        }
    }

    pub(crate) fn instrument<T>(&self, inner: Arc<RwLock<T>>) -> Arc<RwLock<Instrumented<T>>> {
        Arc::new(RwLock::new(Instrumented {
            inner,
            metrics: self.clone(),
        }))
    }

    fn record_size<T: SizedIndex>(&self, labels: &IndexLabels, index: &T) {
        self.index_size
            .get_or_create(labels)
            .set(index.size() as i64);
    }
}

fn labels<R: Resource<DynamicType = ()>>() -> IndexLabels {
    IndexLabels {
        kind: R::kind(&()).to_string(),
    }
}

// === impl Instrumented ===

impl<R, T> IndexNamespacedResource<R> for Instrumented<T>
where
    T: SizedIndex + IndexNamespacedResource<R>,
    R: Resource<DynamicType = ()>,
{
    fn apply(&mut self, resource: R) {
        let labels = labels::<R>();
        self.metrics.index_applies.get_or_create(&labels).inc();
        let mut inner = self.inner.write();
        IndexNamespacedResource::apply(&mut *inner, resource);
        self.metrics.record_size(&labels, &*inner);
    }

    fn delete(&mut self, namespace: String, name: String) {
        let labels = labels::<R>();
        self.metrics.index_deletes.get_or_create(&labels).inc();
        let mut inner = self.inner.write();
        IndexNamespacedResource::delete(&mut *inner, namespace, name);
        self.metrics.record_size(&labels, &*inner);
    }

    fn reset(&mut self, resources: Vec<R>, removed: NamespacedRemoved) {
        let labels = labels::<R>();
        self.metrics.index_resets.get_or_create(&labels).inc();
        let mut inner = self.inner.write();
        IndexNamespacedResource::reset(&mut *inner, resources, removed);
        self.metrics.record_size(&labels, &*inner);
    }
}

impl<R, T> IndexClusterResource<R> for Instrumented<T>
where
    T: SizedIndex + IndexClusterResource<R>,
    R: Resource<DynamicType = ()>,
{
    fn apply(&mut self, resource: R) {
        let labels = labels::<R>();
        self.metrics.index_applies.get_or_create(&labels).inc();
        let mut inner = self.inner.write();
        IndexClusterResource::apply(&mut *inner, resource);
        self.metrics.record_size(&labels, &*inner);
    }

    fn delete(&mut self, name: String) {
        let labels = labels::<R>();
        self.metrics.index_deletes.get_or_create(&labels).inc();
        let mut inner = self.inner.write();
        IndexClusterResource::delete(&mut *inner, name);
        self.metrics.record_size(&labels, &*inner);
    }

    fn reset(&mut self, resources: Vec<R>, removed: ClusterRemoved) {
        let labels = labels::<R>();
        self.metrics.index_resets.get_or_create(&labels).inc();
        let mut inner = self.inner.write();
        IndexClusterResource::reset(&mut *inner, resources, removed);
        self.metrics.record_size(&labels, &*inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cache;
    use discovery_controller_k8s_api as k8s;
    use prometheus_client::encoding::text::encode;

    #[test]
    fn records_updates() {
        let mut prom = Registry::default();
        let metrics = IndexMetrics::register(&mut prom);
        let cache = Cache::<k8s::Node>::shared();
        let instrumented = metrics.instrument(cache.clone());

        let node = k8s::Node {
            metadata: k8s::ObjectMeta {
                name: Some("node-0".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        IndexClusterResource::apply(&mut *instrumented.write(), node);
        assert_eq!(cache.read().len(), 1);

        let mut text = String::new();
        encode(&mut text, &prom).unwrap();
        assert!(text.contains("index_applies_total{kind=\"Node\"} 1"), "{text}");
        assert!(text.contains("index_size{kind=\"Node\"} 1"), "{text}");

        IndexClusterResource::delete(&mut *instrumented.write(), "node-0".to_string());
        assert!(cache.read().is_empty());

        let mut text = String::new();
        encode(&mut text, &prom).unwrap();
        assert!(text.contains("index_deletes_total{kind=\"Node\"} 1"), "{text}");
        assert!(text.contains("index_size{kind=\"Node\"} 0"), "{text}");
    }
}
