//! # Aws module
//!
//! This module provide the control plane abstraction used to provision the
//! source cluster, the target cluster and the integration between them, and
//! its implementation on top of the aws sdk.

use std::fmt::{self, Display, Formatter};

use async_trait::async_trait;
use serde::Serialize;

use crate::svc::cfg;

pub mod client;
#[cfg(test)]
pub mod testing;

// -----------------------------------------------------------------------------
// Constants

pub const RDS: &str = "rds";
pub const REDSHIFT: &str = "redshift";
pub const STS: &str = "sts";

// -----------------------------------------------------------------------------
// Error enumeration

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to execute '{0}' on {1} api, {2}")]
    Request(&'static str, &'static str, String),
    #[error("failed to read field '{1}' from '{0}' response")]
    MissingField(&'static str, &'static str),
    #[error("failed to find {0} '{1}'")]
    NotFound(&'static str, String),
}

// -----------------------------------------------------------------------------
// ApplyMethod enum

#[derive(Serialize, PartialEq, Eq, Clone, Copy, Debug)]
pub enum ApplyMethod {
    #[serde(rename = "immediate")]
    Immediate,
    #[serde(rename = "pending-reboot")]
    PendingReboot,
}

// -----------------------------------------------------------------------------
// Parameter structure

/// a single engine setting of a parameter group
#[derive(Serialize, PartialEq, Eq, Clone, Debug)]
pub struct Parameter {
    #[serde(rename = "name")]
    pub name: String,
    #[serde(rename = "value")]
    pub value: String,
    #[serde(rename = "applyMethod", skip_serializing_if = "Option::is_none")]
    pub apply_method: Option<ApplyMethod>,
}

impl Parameter {
    pub fn new(name: &str, value: &str, apply_method: Option<ApplyMethod>) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            apply_method,
        }
    }
}

// -----------------------------------------------------------------------------
// ParameterGroup structure

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct ParameterGroup {
    pub name: String,
    pub family: String,
    pub description: String,
}

impl From<&cfg::Source> for ParameterGroup {
    fn from(source: &cfg::Source) -> Self {
        Self {
            name: source.parameter_group.to_owned(),
            family: source.parameter_group_family.to_owned(),
            description: source.description.to_owned(),
        }
    }
}

impl From<&cfg::Target> for ParameterGroup {
    fn from(target: &cfg::Target) -> Self {
        Self {
            name: target.parameter_group.to_owned(),
            family: target.parameter_group_family.to_owned(),
            description: target.description.to_owned(),
        }
    }
}

// -----------------------------------------------------------------------------
// Resources returned by the control plane

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct DbCluster {
    pub identifier: String,
    pub arn: String,
    pub status: String,
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct DbInstance {
    pub identifier: String,
    pub status: String,
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Cluster {
    pub identifier: String,
    pub status: String,
    /// only known once the control plane has registered the namespace
    pub namespace_arn: Option<String>,
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Integration {
    pub name: String,
    pub arn: Option<String>,
    pub status: Option<String>,
}

// -----------------------------------------------------------------------------
// Resource enum

/// a resource created by the provisioning chain, which could be deleted when
/// compensating a failure
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Resource {
    DbClusterParameterGroup(String),
    DbCluster(String),
    DbInstance(String),
    ClusterParameterGroup(String),
    Cluster(String),
}

impl Display for Resource {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::DbClusterParameterGroup(name) => write!(f, "db cluster parameter group '{}'", name),
            Self::DbCluster(name) => write!(f, "db cluster '{}'", name),
            Self::DbInstance(name) => write!(f, "db instance '{}'", name),
            Self::ClusterParameterGroup(name) => write!(f, "cluster parameter group '{}'", name),
            Self::Cluster(name) => write!(f, "cluster '{}'", name),
        }
    }
}

// -----------------------------------------------------------------------------
// ControlPlane trait

/// operations of the managed services used to provision a zero-etl
/// integration, the source side lives on rds and the target side on redshift
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn create_db_cluster_parameter_group(
        &self,
        group: &ParameterGroup,
    ) -> Result<String, Error>;

    async fn modify_db_cluster_parameter_group(
        &self,
        name: &str,
        parameters: &[Parameter],
    ) -> Result<String, Error>;

    async fn create_db_cluster(&self, source: &cfg::Source) -> Result<DbCluster, Error>;

    async fn create_db_instance(&self, source: &cfg::Source) -> Result<DbInstance, Error>;

    async fn describe_db_cluster(&self, identifier: &str) -> Result<DbCluster, Error>;

    async fn describe_db_instance(&self, identifier: &str) -> Result<DbInstance, Error>;

    async fn create_cluster_parameter_group(&self, group: &ParameterGroup)
        -> Result<String, Error>;

    async fn modify_cluster_parameter_group(
        &self,
        name: &str,
        parameters: &[Parameter],
    ) -> Result<String, Error>;

    async fn create_cluster(&self, target: &cfg::Target) -> Result<Cluster, Error>;

    async fn describe_cluster(&self, identifier: &str) -> Result<Cluster, Error>;

    /// returns the account identifier of the caller's credentials
    async fn caller_account(&self) -> Result<String, Error>;

    async fn put_resource_policy(&self, resource_arn: &str, policy: &str) -> Result<(), Error>;

    async fn create_integration(
        &self,
        source_arn: &str,
        target_arn: &str,
        name: &str,
    ) -> Result<Integration, Error>;

    async fn delete(&self, resource: &Resource) -> Result<(), Error>;
}
