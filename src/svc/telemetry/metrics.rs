//! # Metrics module
//!
//! This module expose helpers to export the gathered metrics

use std::path::Path;

use prometheus::{gather, Encoder, TextEncoder};

// -----------------------------------------------------------------------------
// Error enum

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to serialize metrics, {0}")]
    PrometheusSerialize(prometheus::Error),
    #[error("failed to write metrics to '{0}', {1}")]
    Write(String, std::io::Error),
}

// -----------------------------------------------------------------------------
// Helper methods

/// returns the metrics gathered from the application encoded using the
/// prometheus text format
pub fn encode() -> Result<Vec<u8>, Error> {
    let families = gather();
    let mut buf = vec![];

    TextEncoder
        .encode(&families, &mut buf)
        .map_err(Error::PrometheusSerialize)?;

    Ok(buf)
}

#[cfg_attr(feature = "trace", tracing::instrument)]
/// writes the encoded metrics into the given file, in a way that suits the
/// textfile collector of the node exporter
pub async fn dump(path: &Path) -> Result<(), Error> {
    let buf = encode()?;

    tokio::fs::write(path, buf)
        .await
        .map_err(|err| Error::Write(path.display().to_string(), err))
}
