//! # Provision module
//!
//! This module provide the provisioning chain of a zero-etl integration: the
//! source cluster (which delegates to the target cluster), the availability
//! poll and the creation of the integration.

use std::{sync::Arc, time::Duration};

use tracing::{debug, error, info, warn};

use crate::svc::{
    aws::{self, ControlPlane},
    cfg::Configuration,
};

pub mod integration;
pub mod plan;
pub mod policy;
pub mod rollback;
pub mod source;
pub mod target;
pub mod waiter;

// -----------------------------------------------------------------------------
// Error enumeration

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to provision source cluster '{0}', {1}")]
    Source(String, aws::Error),
    #[error("failed to provision target cluster '{0}', {1}")]
    Target(String, aws::Error),
    #[error("failed to create writer instance '{0}', {1}")]
    Instance(String, aws::Error),
    #[error("failed to attach resource policy on '{0}', {1}")]
    Policy(String, aws::Error),
    #[error("failed to serialize resource policy, {0}")]
    Serialize(serde_json::Error),
    #[error("failed to poll availability of clusters, {0}")]
    Wait(aws::Error),
    #[error("failed to wait for clusters, not available after {attempts} attempts and {}s", .elapsed.as_secs())]
    TimedOut { attempts: u32, elapsed: Duration },
    #[error("failed to wait for clusters, {resource} reached status '{status}'")]
    Failed { resource: String, status: String },
    #[error("failed to create integration '{0}', {1}")]
    Integration(String, aws::Error),
}

// -----------------------------------------------------------------------------
// Report structure

/// summary of a provisioning run
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Report {
    pub source_arn: String,
    pub target_arn: String,
    pub integration: String,
    pub integration_arn: Option<String>,
    pub attempts: u32,
}

// -----------------------------------------------------------------------------
// Provisioner structure

/// runs the provisioning steps, in order, against a control plane
pub struct Provisioner<'a, C: ?Sized, T: ?Sized> {
    client: &'a C,
    timer: &'a T,
    config: Arc<Configuration>,
    ledger: rollback::Ledger,
}

impl<'a, C, T> Provisioner<'a, C, T>
where
    C: ControlPlane + ?Sized,
    T: waiter::Timer + ?Sized,
{
    pub fn new(client: &'a C, timer: &'a T, config: Arc<Configuration>) -> Self {
        Self {
            client,
            timer,
            config,
            ledger: rollback::Ledger::default(),
        }
    }

    /// resources created by this provisioner that still exist, as far as it
    /// knows: a rollback removes the resources it managed to delete
    pub fn ledger(&self) -> &rollback::Ledger {
        &self.ledger
    }

    /// provisions both clusters, waits for them and creates the integration.
    /// If `rollback` is set, resources created before a failure are deleted.
    #[cfg_attr(feature = "trace", tracing::instrument(skip(self)))]
    pub async fn provision(&mut self, rollback: bool) -> Result<Report, Error> {
        let result = match self.source().await {
            Ok(provisioned) => {
                debug!(
                    source = provisioned.source_arn,
                    target = provisioned.target_arn,
                    instance = provisioned.instance.identifier,
                    "Provisioned clusters, waiting for their availability"
                );

                self.resume().await
            }
            Err(err) => Err(err),
        };

        if let Err(err) = &result {
            error!(error = err.to_string(), "Could not provision zero-ETL integration");

            if rollback && !self.ledger.is_empty() {
                warn!(
                    resources = self.ledger.resources().len(),
                    "Roll back resources created by the provisioning"
                );

                let failures = rollback::compensate(
                    self.client,
                    self.timer,
                    &self.config.waiter,
                    &mut self.ledger,
                )
                .await;

                if !failures.is_empty() {
                    let leftovers = failures
                        .iter()
                        .map(|failure| failure.resource().to_string())
                        .collect::<Vec<_>>();

                    warn!(
                        leftovers = leftovers.join(", "),
                        "Some resources could not be rolled back, they are left in place"
                    );
                }
            } else if !self.ledger.is_empty() {
                warn!(
                    resources = self.ledger.resources().len(),
                    "Resources created by the provisioning are left in place"
                );
            }
        }

        result
    }

    /// waits for already provisioned clusters and creates the integration
    #[cfg_attr(feature = "trace", tracing::instrument(skip(self)))]
    pub async fn resume(&self) -> Result<Report, Error> {
        let outcome = waiter::wait(self.client, self.timer, &self.config)
            .await
            .map_err(Error::Wait)?;

        let (snapshot, attempts) = match outcome {
            waiter::Outcome::Ready { snapshot, attempts } => (snapshot, attempts),
            waiter::Outcome::TimedOut { attempts, elapsed } => {
                return Err(Error::TimedOut { attempts, elapsed });
            }
            waiter::Outcome::Failed {
                resource, status, ..
            } => {
                return Err(Error::Failed { resource, status });
            }
        };

        let target_arn = snapshot.target.namespace_arn.ok_or_else(|| {
            Error::Wait(aws::Error::MissingField(
                "DescribeClusters",
                "ClusterNamespaceArn",
            ))
        })?;

        let integration = self.integration(&snapshot.source.arn, &target_arn).await?;

        info!(
            integration = integration.name,
            attempts = attempts,
            "Provisioned zero-ETL integration"
        );

        Ok(Report {
            source_arn: snapshot.source.arn,
            target_arn,
            integration: integration.name,
            integration_arn: integration.arn,
            attempts,
        })
    }
}
