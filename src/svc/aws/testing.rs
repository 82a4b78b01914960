//! # Testing module
//!
//! This module provides an in-memory control plane that records every call it
//! receives, with scripted statuses and failure injection.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::svc::{
    aws::{
        Cluster, ControlPlane, DbCluster, DbInstance, Error, Integration, Parameter,
        ParameterGroup, Resource,
    },
    cfg,
};

// -----------------------------------------------------------------------------
// Constants

pub const ACCOUNT: &str = "123456789012";
pub const SOURCE_ARN: &str = "arn:aws:rds:us-east-1:123456789012:cluster:my-source-cluster";
pub const TARGET_ARN: &str =
    "arn:aws:redshift:us-east-1:123456789012:namespace:my-target-cluster";

// -----------------------------------------------------------------------------
// Call enum

#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Call {
    CreateDbClusterParameterGroup(String),
    ModifyDbClusterParameterGroup(String, Vec<Parameter>),
    CreateDbCluster(String),
    CreateDbInstance(String),
    DescribeDbCluster(String),
    DescribeDbInstance(String),
    CreateClusterParameterGroup(String),
    ModifyClusterParameterGroup(String, Vec<Parameter>),
    CreateCluster(String),
    DescribeCluster(String),
    CallerAccount,
    PutResourcePolicy(String, String),
    CreateIntegration(String, String, String),
    Delete(Resource),
}

impl Call {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::CreateDbClusterParameterGroup(_) => "CreateDBClusterParameterGroup",
            Self::ModifyDbClusterParameterGroup(_, _) => "ModifyDBClusterParameterGroup",
            Self::CreateDbCluster(_) => "CreateDBCluster",
            Self::CreateDbInstance(_) => "CreateDBInstance",
            Self::DescribeDbCluster(_) => "DescribeDBClusters",
            Self::DescribeDbInstance(_) => "DescribeDBInstances",
            Self::CreateClusterParameterGroup(_) => "CreateClusterParameterGroup",
            Self::ModifyClusterParameterGroup(_, _) => "ModifyClusterParameterGroup",
            Self::CreateCluster(_) => "CreateCluster",
            Self::DescribeCluster(_) => "DescribeClusters",
            Self::CallerAccount => "GetCallerIdentity",
            Self::PutResourcePolicy(_, _) => "PutResourcePolicy",
            Self::CreateIntegration(_, _, _) => "CreateIntegration",
            Self::Delete(_) => "Delete",
        }
    }
}

// -----------------------------------------------------------------------------
// Statuses structure

/// statuses reported by one poll for the source cluster, the source instance
/// and the target cluster
#[derive(Clone, Debug)]
pub struct Statuses {
    pub source: &'static str,
    pub instance: &'static str,
    pub target: &'static str,
}

impl Statuses {
    pub const fn new(source: &'static str, instance: &'static str, target: &'static str) -> Self {
        Self {
            source,
            instance,
            target,
        }
    }
}

// -----------------------------------------------------------------------------
// Recorder structure

#[derive(Default, Debug)]
pub struct Recorder {
    calls: Mutex<Vec<Call>>,
    statuses: Vec<Statuses>,
    polls: Mutex<usize>,
    failures: Mutex<Vec<&'static str>>,
    deleting: usize,
    deleted: Mutex<Vec<(Resource, usize)>>,
}

impl Recorder {
    /// returns a recorder for which every resource is immediately available
    pub fn available() -> Self {
        Self::with_statuses(vec![Statuses::new("available", "available", "available")])
    }

    /// returns a recorder that replays the given statuses, one entry per
    /// poll, the last one is repeated once the others have been consumed
    pub fn with_statuses(statuses: Vec<Statuses>) -> Self {
        Self {
            statuses,
            ..Default::default()
        }
    }

    /// makes the given operation fail
    pub fn failing(self, operation: &'static str) -> Self {
        self.failures.lock().unwrap().push(operation);
        self
    }

    /// keeps deleted clusters and instances in the 'deleting' status for the
    /// given number of descriptions, their parameter groups are in use until
    /// then
    pub fn deleting_for(mut self, describes: usize) -> Self {
        self.deleting = describes;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().to_owned()
    }

    pub fn operations(&self) -> Vec<&'static str> {
        self.calls().iter().map(Call::operation).collect()
    }

    pub fn position(&self, operation: &str) -> Option<usize> {
        self.operations().iter().position(|op| *op == operation)
    }

    fn record(&self, call: Call) -> Result<(), Error> {
        let operation = call.operation();

        self.calls.lock().unwrap().push(call);
        if self.failures.lock().unwrap().contains(&operation) {
            return Err(Error::Request(operation, "mock", "injected failure".into()));
        }

        Ok(())
    }

    /// a poll cycle starts with the description of the source cluster
    fn poll(&self) {
        *self.polls.lock().unwrap() += 1;
    }

    /// returns the status of a deleted resource, `None` if it was not deleted
    fn deletion(&self, resource: &Resource) -> Option<Result<String, Error>> {
        let mut deleted = self.deleted.lock().unwrap();
        let (_, remaining) = deleted.iter_mut().find(|(deleted, _)| deleted == resource)?;

        if *remaining == 0 {
            return Some(Err(Error::NotFound("resource", resource.to_string())));
        }

        *remaining -= 1;
        Some(Ok("deleting".to_string()))
    }

    fn current(&self) -> Statuses {
        let polls = *self.polls.lock().unwrap();

        self.statuses
            .get(polls.saturating_sub(1).min(self.statuses.len().saturating_sub(1)))
            .cloned()
            .unwrap_or_else(|| Statuses::new("available", "available", "available"))
    }
}

#[async_trait]
impl ControlPlane for Recorder {
    async fn create_db_cluster_parameter_group(
        &self,
        group: &ParameterGroup,
    ) -> Result<String, Error> {
        self.record(Call::CreateDbClusterParameterGroup(group.name.to_owned()))?;
        Ok(group.name.to_owned())
    }

    async fn modify_db_cluster_parameter_group(
        &self,
        name: &str,
        parameters: &[Parameter],
    ) -> Result<String, Error> {
        self.record(Call::ModifyDbClusterParameterGroup(
            name.to_string(),
            parameters.to_vec(),
        ))?;
        Ok(name.to_string())
    }

    async fn create_db_cluster(&self, source: &cfg::Source) -> Result<DbCluster, Error> {
        self.record(Call::CreateDbCluster(source.cluster.to_owned()))?;
        Ok(DbCluster {
            identifier: source.cluster.to_owned(),
            arn: SOURCE_ARN.to_string(),
            status: "creating".to_string(),
        })
    }

    async fn create_db_instance(&self, source: &cfg::Source) -> Result<DbInstance, Error> {
        self.record(Call::CreateDbInstance(source.instance_identifier()))?;
        Ok(DbInstance {
            identifier: source.instance_identifier(),
            status: "creating".to_string(),
        })
    }

    async fn describe_db_cluster(&self, identifier: &str) -> Result<DbCluster, Error> {
        self.record(Call::DescribeDbCluster(identifier.to_string()))?;
        if let Some(status) = self.deletion(&Resource::DbCluster(identifier.to_string())) {
            return status.map(|status| DbCluster {
                identifier: identifier.to_string(),
                arn: SOURCE_ARN.to_string(),
                status,
            });
        }

        self.poll();
        Ok(DbCluster {
            identifier: identifier.to_string(),
            arn: SOURCE_ARN.to_string(),
            status: self.current().source.to_string(),
        })
    }

    async fn describe_db_instance(&self, identifier: &str) -> Result<DbInstance, Error> {
        self.record(Call::DescribeDbInstance(identifier.to_string()))?;
        if let Some(status) = self.deletion(&Resource::DbInstance(identifier.to_string())) {
            return status.map(|status| DbInstance {
                identifier: identifier.to_string(),
                status,
            });
        }

        Ok(DbInstance {
            identifier: identifier.to_string(),
            status: self.current().instance.to_string(),
        })
    }

    async fn create_cluster_parameter_group(
        &self,
        group: &ParameterGroup,
    ) -> Result<String, Error> {
        self.record(Call::CreateClusterParameterGroup(group.name.to_owned()))?;
        Ok(group.name.to_owned())
    }

    async fn modify_cluster_parameter_group(
        &self,
        name: &str,
        parameters: &[Parameter],
    ) -> Result<String, Error> {
        self.record(Call::ModifyClusterParameterGroup(
            name.to_string(),
            parameters.to_vec(),
        ))?;
        Ok(name.to_string())
    }

    async fn create_cluster(&self, target: &cfg::Target) -> Result<Cluster, Error> {
        self.record(Call::CreateCluster(target.cluster.to_owned()))?;
        Ok(Cluster {
            identifier: target.cluster.to_owned(),
            status: "creating".to_string(),
            namespace_arn: None,
        })
    }

    async fn describe_cluster(&self, identifier: &str) -> Result<Cluster, Error> {
        self.record(Call::DescribeCluster(identifier.to_string()))?;
        if let Some(status) = self.deletion(&Resource::Cluster(identifier.to_string())) {
            return status.map(|status| Cluster {
                identifier: identifier.to_string(),
                status,
                namespace_arn: Some(TARGET_ARN.to_string()),
            });
        }

        Ok(Cluster {
            identifier: identifier.to_string(),
            status: self.current().target.to_string(),
            namespace_arn: Some(TARGET_ARN.to_string()),
        })
    }

    async fn caller_account(&self) -> Result<String, Error> {
        self.record(Call::CallerAccount)?;
        Ok(ACCOUNT.to_string())
    }

    async fn put_resource_policy(&self, resource_arn: &str, policy: &str) -> Result<(), Error> {
        self.record(Call::PutResourcePolicy(
            resource_arn.to_string(),
            policy.to_string(),
        ))
    }

    async fn create_integration(
        &self,
        source_arn: &str,
        target_arn: &str,
        name: &str,
    ) -> Result<Integration, Error> {
        self.record(Call::CreateIntegration(
            source_arn.to_string(),
            target_arn.to_string(),
            name.to_string(),
        ))?;

        Ok(Integration {
            name: name.to_string(),
            arn: Some(format!(
                "arn:aws:rds:us-east-1:{}:integration:{}",
                ACCOUNT, name
            )),
            status: Some("creating".to_string()),
        })
    }

    async fn delete(&self, resource: &Resource) -> Result<(), Error> {
        self.record(Call::Delete(resource.to_owned()))?;

        let mut deleted = self.deleted.lock().unwrap();
        match resource {
            Resource::DbClusterParameterGroup(_) | Resource::ClusterParameterGroup(_) => {
                if deleted.iter().any(|(_, remaining)| *remaining > 0) {
                    return Err(Error::Request(
                        "Delete",
                        "mock",
                        format!("{} is in use by a cluster being deleted", resource),
                    ));
                }
            }
            _ => deleted.push((resource.to_owned(), self.deleting)),
        }

        Ok(())
    }
}
