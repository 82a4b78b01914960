//! # Provision module
//!
//! This module provides the provision and resume command line interface
//! function implementations

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{
    cmd::Executor,
    svc::{
        aws::client::Client,
        cfg::Configuration,
        provision::{self, waiter::TokioTimer, Provisioner, Report},
    },
};

// -----------------------------------------------------------------------------
// ProvisionError enum

#[derive(thiserror::Error, Debug)]
pub enum ProvisionError {
    #[error("failed to provision zero-etl integration, {0}")]
    Provision(provision::Error),
}

// -----------------------------------------------------------------------------
// Provision structure

#[derive(clap::Args, Clone, Debug)]
pub struct Provision {
    /// Delete the created resources if the provisioning fails
    #[clap(long = "rollback")]
    pub rollback: bool,
}

#[async_trait]
impl Executor for Provision {
    type Error = ProvisionError;

    #[cfg_attr(feature = "trace", tracing::instrument(skip(config)))]
    async fn execute(&self, config: Arc<Configuration>) -> Result<(), Self::Error> {
        let client = Client::new(&config.aws).await;
        let rollback = self.rollback || config.rollback;
        let mut provisioner = Provisioner::new(&client, &TokioTimer, config);

        let result = provisioner.provision(rollback).await;
        if result.is_err() {
            for resource in provisioner.ledger().resources() {
                warn!(
                    resource = resource.to_string(),
                    "Resource is left in place, remove it or run the resume command"
                );
            }
        }

        summarize(&result.map_err(ProvisionError::Provision)?);
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// resume function

#[cfg_attr(feature = "trace", tracing::instrument(skip(config)))]
pub async fn resume(config: Arc<Configuration>) -> Result<(), ProvisionError> {
    let client = Client::new(&config.aws).await;
    let provisioner = Provisioner::new(&client, &TokioTimer, config);

    let report = provisioner
        .resume()
        .await
        .map_err(ProvisionError::Provision)?;

    summarize(&report);
    Ok(())
}

fn summarize(report: &Report) {
    info!(
        source = report.source_arn,
        target = report.target_arn,
        integration = report.integration,
        arn = report.integration_arn,
        attempts = report.attempts,
        "Zero-ETL integration requested"
    );
}
