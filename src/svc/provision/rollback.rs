//! # Rollback module
//!
//! This module keeps track of the resources created by the provisioning chain
//! and deletes them when the chain is aborted

use rand::Rng;
use tracing::{debug, error, info};

use crate::svc::{
    aws::{self, ControlPlane, Resource},
    cfg,
    provision::waiter::{Backoff, Timer},
};

// -----------------------------------------------------------------------------
// Error enumeration

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to delete {0}, {1}")]
    Delete(Resource, aws::Error),
    #[error("failed to wait for the deletion of {0}, {1}")]
    Describe(Resource, aws::Error),
    #[error("failed to wait for the deletion of {resource}, still '{status}' after {attempts} attempts")]
    Lingering {
        resource: Resource,
        status: String,
        attempts: u32,
    },
}

impl Error {
    pub fn resource(&self) -> &Resource {
        match self {
            Self::Delete(resource, _) | Self::Describe(resource, _) => resource,
            Self::Lingering { resource, .. } => resource,
        }
    }
}

// -----------------------------------------------------------------------------
// Ledger structure

/// resources in creation order
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct Ledger {
    resources: Vec<Resource>,
}

impl Ledger {
    pub fn record(&mut self, resource: Resource) {
        self.resources.push(resource);
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    fn forget(&mut self, resource: &Resource) {
        self.resources.retain(|recorded| recorded != resource);
    }
}

// -----------------------------------------------------------------------------
// helpers

/// returns the status of the resource, or `None` once the control plane does
/// not know it anymore. Parameter groups are deleted synchronously.
async fn describe<C>(client: &C, resource: &Resource) -> Result<Option<String>, aws::Error>
where
    C: ControlPlane + ?Sized,
{
    let status = match resource {
        Resource::DbClusterParameterGroup(_) | Resource::ClusterParameterGroup(_) => {
            return Ok(None);
        }
        Resource::DbCluster(identifier) => client
            .describe_db_cluster(identifier)
            .await
            .map(|cluster| cluster.status),
        Resource::DbInstance(identifier) => client
            .describe_db_instance(identifier)
            .await
            .map(|instance| instance.status),
        Resource::Cluster(identifier) => client
            .describe_cluster(identifier)
            .await
            .map(|cluster| cluster.status),
    };

    match status {
        Ok(status) => Ok(Some(status)),
        Err(aws::Error::NotFound(_, _)) => Ok(None),
        Err(err) => Err(err),
    }
}

/// polls the resource until it is gone. A cluster keeps its parameter group
/// and an instance keeps its cluster until then.
#[cfg_attr(feature = "trace", tracing::instrument(skip(client, timer, waiter)))]
async fn vanish<C, T>(
    client: &C,
    timer: &T,
    waiter: &cfg::Waiter,
    resource: &Resource,
) -> Result<(), Error>
where
    C: ControlPlane + ?Sized,
    T: Timer + ?Sized,
{
    let backoff = Backoff::from(waiter);
    let timeout = waiter.timeout();
    let begin = timer.now();
    let mut attempts = 0;

    loop {
        attempts += 1;

        let status = match describe(client, resource)
            .await
            .map_err(|err| Error::Describe(resource.to_owned(), err))?
        {
            Some(status) => status,
            None => return Ok(()),
        };

        let remaining = timeout.saturating_sub(timer.now().duration_since(begin));
        if attempts >= waiter.max_attempts || remaining.is_zero() {
            return Err(Error::Lingering {
                resource: resource.to_owned(),
                status,
                attempts,
            });
        }

        let sample = rand::thread_rng().gen::<f64>();
        let delay = backoff.delay(attempts - 1, sample).min(remaining);

        debug!(
            resource = resource.to_string(),
            status = status,
            delay = delay.as_secs(),
            "Resource is not deleted yet, sleeping"
        );

        timer.sleep(delay).await;
    }
}

/// deletes the recorded resources, the most recent first, and waits for each
/// cluster and instance to be gone before deleting what it depends on. A
/// failed deletion does not stop the others. Deleted resources are removed
/// from the ledger, so it only holds the leftovers afterwards.
#[cfg_attr(feature = "trace", tracing::instrument(skip(client, timer, waiter)))]
pub async fn compensate<C, T>(
    client: &C,
    timer: &T,
    waiter: &cfg::Waiter,
    ledger: &mut Ledger,
) -> Vec<Error>
where
    C: ControlPlane + ?Sized,
    T: Timer + ?Sized,
{
    let mut failures = vec![];

    for resource in ledger.resources().to_owned().iter().rev() {
        info!(resource = resource.to_string(), "Delete resource created by the aborted provisioning");

        let result = match client.delete(resource).await {
            Ok(()) => vanish(client, timer, waiter, resource).await,
            Err(err) => Err(Error::Delete(resource.to_owned(), err)),
        };

        match result {
            Ok(()) => ledger.forget(resource),
            Err(err) => {
                error!(
                    resource = resource.to_string(),
                    error = err.to_string(),
                    "Could not delete resource, it has to be removed manually"
                );

                failures.push(err);
            }
        }
    }

    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svc::{
        aws::testing::{Call, Recorder},
        provision::waiter::tests::ManualTimer,
    };

    fn ledger() -> Ledger {
        let mut ledger = Ledger::default();

        ledger.record(Resource::DbClusterParameterGroup("pg".into()));
        ledger.record(Resource::DbCluster("source".into()));
        ledger.record(Resource::ClusterParameterGroup("target-pg".into()));
        ledger
    }

    #[tokio::test]
    async fn deletes_in_reverse_creation_order() {
        let client = Recorder::available();
        let timer = ManualTimer::default();
        let mut ledger = ledger();

        let failures = compensate(&client, &timer, &cfg::Waiter::default(), &mut ledger).await;

        assert!(failures.is_empty());
        assert!(ledger.is_empty());
        assert_eq!(
            client.calls(),
            vec![
                Call::Delete(Resource::ClusterParameterGroup("target-pg".into())),
                Call::Delete(Resource::DbCluster("source".into())),
                Call::DescribeDbCluster("source".into()),
                Call::Delete(Resource::DbClusterParameterGroup("pg".into())),
            ]
        );
    }

    #[tokio::test]
    async fn waits_for_cluster_before_deleting_its_parameter_group() {
        let client = Recorder::available().deleting_for(2);
        let timer = ManualTimer::default();
        let mut ledger = ledger();

        let failures = compensate(&client, &timer, &cfg::Waiter::default(), &mut ledger).await;

        assert!(failures.is_empty(), "{:?}", failures);
        assert!(ledger.is_empty());
        assert_eq!(timer.sleeps().len(), 2);
        assert_eq!(
            client.operations(),
            vec![
                "Delete",
                "Delete",
                "DescribeDBClusters",
                "DescribeDBClusters",
                "DescribeDBClusters",
                "Delete",
            ]
        );
    }

    #[tokio::test]
    async fn parameter_group_in_use_is_refused() {
        let client = Recorder::available().deleting_for(1);
        let cluster = Resource::DbCluster("source".into());
        let group = Resource::DbClusterParameterGroup("pg".into());

        client.delete(&cluster).await.unwrap();
        assert!(client.delete(&group).await.is_err());

        assert_eq!(describe(&client, &cluster).await.unwrap(), Some("deleting".into()));
        assert_eq!(describe(&client, &cluster).await.unwrap(), None);
        assert!(client.delete(&group).await.is_ok());
    }

    #[tokio::test]
    async fn lingering_cluster_is_reported() {
        let client = Recorder::available().deleting_for(10);
        let timer = ManualTimer::default();
        let waiter = cfg::Waiter {
            max_attempts: 3,
            ..Default::default()
        };
        let mut ledger = ledger();

        let failures = compensate(&client, &timer, &waiter, &mut ledger).await;

        assert_eq!(failures.len(), 2);
        assert!(matches!(
            &failures[0],
            Error::Lingering { attempts: 3, status, .. } if status == "deleting"
        ));
        assert!(matches!(&failures[1], Error::Delete(_, _)));
        assert_eq!(
            ledger.resources(),
            &[
                Resource::DbClusterParameterGroup("pg".into()),
                Resource::DbCluster("source".into()),
            ]
        );
    }

    #[tokio::test]
    async fn keeps_deleting_after_a_failure() {
        let client = Recorder::available().failing("Delete");
        let timer = ManualTimer::default();
        let mut ledger = ledger();

        let failures = compensate(&client, &timer, &cfg::Waiter::default(), &mut ledger).await;

        assert_eq!(failures.len(), 3);
        assert_eq!(client.calls().len(), 3);
        assert_eq!(ledger, self::ledger());
        assert_eq!(
            failures.iter().map(Error::resource).collect::<Vec<_>>(),
            vec![
                &Resource::ClusterParameterGroup("target-pg".into()),
                &Resource::DbCluster("source".into()),
                &Resource::DbClusterParameterGroup("pg".into()),
            ]
        );
    }
}
