//! Metrics recorder initialization.

use {std::net::SocketAddr, tracing::info};

use crate::Result;

/// Handle to the installed recorder.
#[derive(Clone)]
pub struct MetricsHandle {
    #[cfg(feature = "prometheus")]
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl MetricsHandle {
    /// Render metrics in Prometheus text format.
    ///
    /// Empty when no recorder is installed in-process (disabled, or exporting
    /// through the HTTP listener).
    #[must_use]
    pub fn render(&self) -> String {
        #[cfg(feature = "prometheus")]
        {
            self.prometheus_handle
                .as_ref()
                .map(|handle| handle.render())
                .unwrap_or_default()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            String::new()
        }
    }
}

/// Configuration for the metrics system.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorderConfig {
    /// Whether metrics collection is enabled
    pub enabled: bool,
    /// Address for the Prometheus scrape endpoint. Without one the recorder is
    /// installed in-process and read through [`MetricsHandle::render`].
    pub listen: Option<SocketAddr>,
    /// Global labels to add to all metrics
    pub global_labels: Vec<(String, String)>,
}

/// Initialize the metrics system.
///
/// Call once at startup, inside the tokio runtime when `listen` is set.
/// While disabled the `metrics` facade stays on its no-op recorder.
///
/// # Errors
///
/// Fails if the exporter cannot be built or bound, or when a listener is
/// requested from a build without the `prometheus` feature.
pub fn init_metrics(config: MetricsRecorderConfig) -> Result<MetricsHandle> {
    if !config.enabled {
        info!("metrics collection is disabled");
        return Ok(MetricsHandle {
            #[cfg(feature = "prometheus")]
            prometheus_handle: None,
        });
    }

    #[cfg(feature = "prometheus")]
    {
        let handle = init_prometheus(config)?;
        Ok(MetricsHandle {
            prometheus_handle: handle,
        })
    }

    #[cfg(not(feature = "prometheus"))]
    {
        match config.listen {
            Some(addr) => Err(crate::Error::ExporterUnavailable(addr)),
            None => {
                info!("metrics feature not enabled at compile time");
                Ok(MetricsHandle {})
            },
        }
    }
}

#[cfg(feature = "prometheus")]
fn init_prometheus(
    config: MetricsRecorderConfig,
) -> Result<Option<metrics_exporter_prometheus::PrometheusHandle>> {
    use {
        crate::{buckets, telegram},
        metrics_exporter_prometheus::{Matcher, PrometheusBuilder},
    };

    let mut builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("_duration_seconds".to_string()),
            &buckets::REQUEST_DURATION,
        )?
        .set_buckets_for_metric(
            Matcher::Full(telegram::POLLING_DURATION_SECONDS.to_string()),
            &buckets::POLLING_DURATION,
        )?;

    for (key, value) in config.global_labels {
        builder = builder.add_global_label(key, value);
    }

    match config.listen {
        Some(addr) => {
            builder.with_http_listener(addr).install()?;
            info!(%addr, "prometheus exporter listening");
            Ok(None)
        },
        None => {
            let handle = builder.install_recorder()?;
            info!("prometheus recorder installed");
            Ok(Some(handle))
        },
    }
}
