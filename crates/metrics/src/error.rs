use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[cfg(feature = "prometheus")]
    #[error(transparent)]
    Prometheus(#[from] metrics_exporter_prometheus::BuildError),

    #[error("metrics listener requested on {0} but the prometheus feature is not compiled in")]
    ExporterUnavailable(SocketAddr),
}

pub type Result<T> = std::result::Result<T, Error>;
