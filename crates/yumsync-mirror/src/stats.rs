//! Statsd metric emission.
//!
//! Emission is fire and forget over UDP. A mirror without a statsd
//! endpoint configured gets a client that drops every metric, so call
//! sites never branch on whether metrics are enabled.

use std::net::UdpSocket;

use cadence::{Counted, Gauged, MetricResult, NopMetricSink, StatsdClient, UdpMetricSink};
use tracing::warn;
use yumsync_config::StatsdConfig;

const PREFIX: &str = "yumsync";

/// Counters and gauges for sync cycles, tagged per repository.
pub struct MirrorStats {
    client: StatsdClient,
}

impl MirrorStats {
    /// Builds a client for the configured endpoint. Socket setup
    /// failures disable metrics instead of failing the run.
    pub fn new(config: Option<&StatsdConfig>) -> Self {
        let client = match config {
            Some(config) => match udp_client(config) {
                Ok(client) => client,
                Err(err) => {
                    warn!("Failed to set up statsd client: {err}, metrics disabled");
                    nop_client()
                }
            },
            None => nop_client(),
        };
        Self { client }
    }

    /// A client that drops every metric.
    pub fn disabled() -> Self {
        Self {
            client: nop_client(),
        }
    }

    pub fn count(&self, metric: &str, value: u64, repo: &str) {
        self.client
            .count_with_tags(metric, value as i64)
            .with_tag("repo", repo)
            .send();
    }

    pub fn gauge(&self, metric: &str, value: f64, repo: &str) {
        self.client
            .gauge_with_tags(metric, value)
            .with_tag("repo", repo)
            .send();
    }
}

fn nop_client() -> StatsdClient {
    StatsdClient::builder(PREFIX, NopMetricSink).build()
}

fn udp_client(config: &StatsdConfig) -> MetricResult<StatsdClient> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    let sink = UdpMetricSink::from((config.host.as_str(), config.port), socket)?;
    let mut builder = StatsdClient::builder(PREFIX, sink);
    for (key, value) in &config.tags {
        builder = builder.with_tag(key.as_str(), value.as_str());
    }
    Ok(builder.build())
}
