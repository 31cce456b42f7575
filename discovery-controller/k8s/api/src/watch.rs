use futures::{prelude::*, stream::BoxStream};
use k8s_openapi::NamespaceResourceScope;
pub use kube::runtime::watcher::{Event, Result};
use kube::{
    api::Api,
    runtime::{watcher, WatchStreamExt},
    Client, Resource,
};
use serde::de::DeserializeOwned;
use std::{fmt::Debug, pin::Pin, sync::Arc};
use tokio::time;
use tracing::{debug, info, warn};

pub type EventStream<K> = BoxStream<'static, Result<Event<K>>>;

/// Produces list-then-watch event streams for a single resource kind.
///
/// Each call to `watch` begins a new stream that starts with a full listing of the resource
/// (`Event::Init`, an `Event::InitApply` per object, then `Event::InitDone`) followed by
/// incremental updates.
pub trait Source<K>: Send + Sync + 'static {
    fn watch(&self) -> EventStream<K>;
}

/// Watches a resource through the Kubernetes API.
#[derive(Clone)]
pub struct ApiSource<K> {
    api: Api<K>,
    config: watcher::Config,
}

/// Wraps a source's event streams so that they never terminate, restarting the underlying watch
/// whenever the resync interval elapses.
///
/// The resync interval is measured from the end of the latest listing. A listing is never
/// interrupted by a resync.
pub struct Watch<K> {
    source: Arc<dyn Source<K>>,
    rx: EventStream<K>,
    resync: time::Duration,
    resync_at: Pin<Box<time::Sleep>>,
    listing: bool,
    span: tracing::Span,
}

// === impl ApiSource ===

impl<K> ApiSource<K> {
    /// Limits the amount of time a watch can be idle before being reset.
    ///
    /// Must be less than 295 or Kubernetes throws an error.
    const DEFAULT_TIMEOUT_SECS: u32 = 290;

    pub fn new(api: Api<K>, config: watcher::Config) -> Self {
        Self { api, config }
    }

    fn default_config() -> watcher::Config {
        watcher::Config::default().timeout(Self::DEFAULT_TIMEOUT_SECS)
    }
}

impl<K> ApiSource<K>
where
    K: Resource<DynamicType = ()>,
{
    /// Watches a resource across the whole cluster.
    pub fn all(client: Client) -> Self {
        Self::new(Api::all(client), Self::default_config())
    }
}

impl<K> ApiSource<K>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
{
    /// Watches a namespaced resource in a single namespace, or in all namespaces when `namespace`
    /// is unset.
    pub fn scoped(client: Client, namespace: Option<&str>) -> Self {
        match namespace {
            Some(ns) => Self::new(Api::namespaced(client, ns), Self::default_config()),
            None => Self::all(client),
        }
    }
}

impl<K> Source<K> for ApiSource<K>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    fn watch(&self) -> EventStream<K> {
        watcher(self.api.clone(), self.config.clone())
            .default_backoff()
            .boxed()
    }
}

// === impl Watch ===

impl<K: 'static> Watch<K> {
    pub fn new(source: Arc<dyn Source<K>>, resync: time::Duration) -> Self {
        let rx = source.watch();
        Self {
            source,
            rx,
            resync,
            resync_at: Box::pin(time::sleep(resync)),
            listing: true,
            span: tracing::Span::current(),
        }
    }

    pub fn instrument(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Receive the next event in the stream.
    ///
    /// Watch failures are logged and skipped; the source is responsible for backing off before it
    /// reconnects. Once the resync interval elapses, the watch is restarted so that the following
    /// events relist every object.
    pub async fn recv(&mut self) -> Event<K> {
        loop {
            tokio::select! {
                biased;

                () = &mut self.resync_at, if !self.listing => {
                    debug!(parent: &self.span, "Resyncing");
                    self.restart();
                }

                ev = self.rx.next() => match ev {
                    Some(Ok(ev)) => {
                        match ev {
                            Event::Init => self.listing = true,
                            Event::InitDone => {
                                self.listing = false;
                                self.reset_resync();
                            }
                            Event::InitApply(_) | Event::Apply(_) | Event::Delete(_) => {}
                        }
                        return ev;
                    }
                    Some(Err(error)) => info!(parent: &self.span, %error, "Failed"),
                    None => {
                        warn!(parent: &self.span, "Watch terminated");
                        time::sleep(time::Duration::from_secs(1)).await;
                        info!(parent: &self.span, "Restarting");
                        self.restart();
                    }
                },
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Event<K>> + Send + 'static
    where
        K: Send + 'static,
    {
        stream::unfold(self, |mut watch| async move {
            let ev = watch.recv().await;
            Some((ev, watch))
        })
    }

    fn restart(&mut self) {
        self.rx = self.source.watch();
        self.listing = true;
        self.reset_resync();
    }

    fn reset_resync(&mut self) {
        self.resync_at
            .as_mut()
            .reset(time::Instant::now() + self.resync);
    }
}
