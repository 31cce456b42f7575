use crate::index::{Config, Controller, IndexMetrics, Sources};
use anyhow::{bail, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use tokio::time::{self, Duration};
use tracing::{info, info_span, Instrument};

const SYNC_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Parser)]
#[clap(name = "discovery", about = "A service discovery controller")]
pub struct Args {
    #[clap(
        long,
        default_value = "discovery=info,warn",
        env = "DISCOVERY_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Limits discovery to a single namespace. All namespaces are watched by default.
    #[clap(long)]
    namespace: Option<String>,

    /// How often every watched resource is fully relisted.
    #[clap(long, default_value = "60")]
    resync_interval_secs: u64,

    #[clap(long, default_value = "cluster.local")]
    cluster_domain: String,

    #[clap(long, default_value = "cluster.local")]
    identity_domain: String,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            namespace,
            resync_interval_secs,
            cluster_domain,
            identity_domain,
        } = self;

        let config = Config {
            namespace,
            resync: Duration::from_secs(resync_interval_secs),
            domain_suffix: cluster_domain,
            trust_domain: identity_domain,
        };
        config.validate()?;

        let mut prom = <Registry>::default();
        let index_metrics = IndexMetrics::register(prom.sub_registry_with_prefix("discovery_index"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let sources = Sources::from_client(runtime.client(), config.namespace.as_deref());
        let controller = Controller::new(config, sources)?.with_metrics(index_metrics);

        tokio::spawn({
            let controller = controller.clone();
            let shutdown = runtime.shutdown_handle();
            async move { controller.run(shutdown).await }.instrument(info_span!("controller"))
        });
        tokio::spawn(wait_for_sync(controller));

        // Block until the shutdown signal fires and the controller has released it.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

/// Logs once every watched resource has been listed.
async fn wait_for_sync(controller: Controller) {
    while !controller.has_synced() {
        time::sleep(SYNC_POLL_INTERVAL).await;
    }
    info!(
        services = controller.services().len(),
        "Discovery index synced"
    );
}
