//! # Zero-ETL provisioner
//!
//! A command line tool that provisions an aurora mysql source cluster, a
//! redshift target cluster and the zero-etl integration between them

use std::{convert::TryFrom, path::Path, sync::Arc};

use clap::Parser;
use tracing::{error, info};

use crate::{
    cmd::{provision::Provision, Args, Command, Executor},
    svc::cfg::Configuration,
};

pub mod cmd;
pub mod logging;
pub mod svc;

// -----------------------------------------------------------------------------
// Error enumeration

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to interact with command line interface, {0}")]
    Command(cmd::CommandError),
    #[error("failed to initialize logging system, {0}")]
    Logging(logging::Error),
    #[error("failed to load configuration, {0}")]
    Configuration(svc::cfg::ConfigurationError),
    #[cfg(feature = "metrics")]
    #[error("failed to export metrics, {0}")]
    Metrics(svc::telemetry::metrics::Error),
}

impl From<cmd::CommandError> for Error {
    fn from(err: cmd::CommandError) -> Self {
        Self::Command(err)
    }
}

impl From<logging::Error> for Error {
    fn from(err: logging::Error) -> Self {
        Self::Logging(err)
    }
}

impl From<svc::cfg::ConfigurationError> for Error {
    fn from(err: svc::cfg::ConfigurationError) -> Self {
        Self::Configuration(err)
    }
}

// -----------------------------------------------------------------------------
// main entrypoint

#[tokio::main]
pub(crate) async fn main() -> Result<(), Error> {
    let args = Args::parse();

    logging::initialize(args.verbosity as usize)?;

    let config = Arc::new(match &args.config {
        Some(path) => Configuration::try_from(path.to_owned())?,
        None => Configuration::try_default()?,
    });

    config.help();
    if args.check {
        println!("{} configuration is healthy!", env!("CARGO_PKG_NAME"));
        return Ok(());
    }

    let command = args
        .command
        .to_owned()
        .unwrap_or(Command::Provision(Provision { rollback: false }));

    let result = command.execute(config).await.map_err(Error::Command);

    conclude(result, args.metrics.as_deref()).await?;

    info!("{} halted!", env!("CARGO_PKG_NAME"));
    Ok(())
}

/// logs the error of the command, then exports the metrics. A failed export
/// is logged and only returned if the command succeeded.
#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
async fn conclude(result: Result<(), Error>, metrics: Option<&Path>) -> Result<(), Error> {
    if let Err(err) = &result {
        error!(
            error = err.to_string(),
            "could not execute {} properly",
            env!("CARGO_PKG_NAME"),
        );
    }

    #[cfg(feature = "metrics")]
    if let Some(path) = metrics {
        if let Err(err) = svc::telemetry::metrics::dump(path).await {
            error!(
                error = err.to_string(),
                path = path.display().to_string(),
                "could not export metrics"
            );

            return result.and(Err(Error::Metrics(err)));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure() -> Result<(), Error> {
        Err(Error::Configuration(svc::cfg::ConfigurationError::Validate(
            "target.nodes",
            "expected at least one node, got 0".into(),
        )))
    }

    #[tokio::test]
    async fn command_error_is_returned_without_metrics() {
        let result = conclude(failure(), None).await;

        assert!(matches!(result, Err(Error::Configuration(_))));
        assert!(conclude(Ok(()), None).await.is_ok());
    }

    #[cfg(feature = "metrics")]
    #[tokio::test]
    async fn command_error_prevails_over_metrics_export() {
        let path = Path::new("/nonexistent/directory/metrics.prom");

        let result = conclude(failure(), Some(path)).await;
        assert!(matches!(result, Err(Error::Configuration(_))));

        let result = conclude(Ok(()), Some(path)).await;
        assert!(matches!(result, Err(Error::Metrics(_))));
    }

    #[cfg(feature = "metrics")]
    #[tokio::test]
    async fn metrics_are_exported_after_a_failed_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.prom");

        let result = conclude(failure(), Some(&path)).await;

        assert!(matches!(result, Err(Error::Configuration(_))));
        assert!(path.exists());
    }
}
