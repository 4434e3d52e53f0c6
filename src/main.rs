use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use netflow_collector::config::CollectorConfig;
use netflow_collector::context::CoreContext;
use netflow_collector::dns::{HickoryReverseResolver, HostnameResolver};
use netflow_collector::pubsub::Publisher;
use netflow_collector::rate;
use netflow_collector::receiver;
use netflow_collector::store::influx::InfluxTimeSeriesStore;
use netflow_collector::store::redis_store::RedisKeyedStore;

/// NetFlow v5/v9 collector — decodes UDP flow exports, classifies
/// direction, resolves hostnames, and writes counters + time-series
/// points for the out-of-scope HTTP API to serve.
#[derive(Parser, Debug)]
#[command(name = "netflow-collector", version, about)]
struct Cli {
    /// Override NETFLOW_PORT for this run.
    #[arg(long)]
    netflow_port: Option<u16>,

    /// Override SFLOW_PORT for this run.
    #[arg(long)]
    sflow_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "netflow_collector=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = CollectorConfig::from_env()?;
    if let Some(port) = cli.netflow_port {
        config.netflow_port = port;
    }
    if let Some(port) = cli.sflow_port {
        config.sflow_port = port;
    }
    info!(
        netflow_port = config.netflow_port,
        sflow_port = config.sflow_port,
        "starting netflow collector"
    );

    let keyed_store: Arc<dyn netflow_collector::store::KeyedStore> =
        Arc::new(RedisKeyedStore::connect(&config.redis_url).await?);
    info!(url = %config.redis_url, "connected to redis");

    let ts_store: Arc<dyn netflow_collector::store::TimeSeriesStore> = Arc::new(
        InfluxTimeSeriesStore::new(
            &config.influxdb_url,
            &config.influxdb_org,
            &config.influxdb_bucket,
            &config.influxdb_token,
        )?,
    );

    let resolver = Arc::new(HickoryReverseResolver::from_system_conf(Duration::from_secs(
        config.dns_timeout_secs,
    ))?);
    let dns = Arc::new(HostnameResolver::new(keyed_store.clone(), resolver));

    let publisher = Arc::new(Publisher::new(keyed_store.clone()));

    let ctx = CoreContext::new(keyed_store.clone(), ts_store, dns, publisher.clone());

    // NetFlow v5/v9 both arrive on the same UDP port and are dispatched
    // by the version field in the datagram header; sFlow arrives on its
    // own port but decoding it is out of scope — the receiver still
    // binds the port so operators can point an exporter at either
    // without a config error.
    let netflow_ctx = ctx.clone();
    let netflow_port = config.netflow_port;
    let netflow_task = tokio::spawn(async move {
        if let Err(e) = receiver::run(netflow_port, netflow_ctx).await {
            error!(error = %e, "netflow receiver exited");
        }
    });

    let sflow_ctx = ctx.clone();
    let sflow_port = config.sflow_port;
    let sflow_task = tokio::spawn(async move {
        if let Err(e) = receiver::run(sflow_port, sflow_ctx).await {
            error!(error = %e, "sflow receiver exited");
        }
    });

    let rate_task = tokio::spawn(rate::run(ctx.keyed_store.clone(), publisher));

    tokio::select! {
        _ = netflow_task => error!("netflow receiver task ended unexpectedly"),
        _ = sflow_task => error!("sflow receiver task ended unexpectedly"),
        _ = rate_task => error!("rate pusher task ended unexpectedly"),
    }

    Ok(())
}
