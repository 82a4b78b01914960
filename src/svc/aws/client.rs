//! # Client module
//!
//! This module provides the aws sdk backed implementation of the control plane

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_rds::error::DisplayErrorContext;
use tracing::debug;

use crate::svc::{
    aws::{
        self, Cluster, ControlPlane, DbCluster, DbInstance, Error, Integration, Parameter,
        ParameterGroup, Resource, RDS, REDSHIFT, STS,
    },
    cfg,
    telemetry::measure,
};

// -----------------------------------------------------------------------------
// helpers

fn request<E>(operation: &'static str, service: &'static str) -> impl FnOnce(E) -> Error
where
    E: std::error::Error,
{
    move |err| Error::Request(operation, service, DisplayErrorContext(&err).to_string())
}

fn field<T>(operation: &'static str, name: &'static str, value: Option<T>) -> Result<T, Error> {
    value.ok_or(Error::MissingField(operation, name))
}

impl From<aws::ApplyMethod> for aws_sdk_rds::types::ApplyMethod {
    fn from(method: aws::ApplyMethod) -> Self {
        match method {
            aws::ApplyMethod::Immediate => Self::Immediate,
            aws::ApplyMethod::PendingReboot => Self::PendingReboot,
        }
    }
}

fn db_cluster(
    operation: &'static str,
    cluster: &aws_sdk_rds::types::DbCluster,
) -> Result<DbCluster, Error> {
    Ok(DbCluster {
        identifier: field(operation, "DBClusterIdentifier", cluster.db_cluster_identifier())?
            .to_string(),
        arn: field(operation, "DBClusterArn", cluster.db_cluster_arn())?.to_string(),
        status: field(operation, "Status", cluster.status())?.to_string(),
    })
}

fn db_instance(
    operation: &'static str,
    instance: &aws_sdk_rds::types::DbInstance,
) -> Result<DbInstance, Error> {
    Ok(DbInstance {
        identifier: field(
            operation,
            "DBInstanceIdentifier",
            instance.db_instance_identifier(),
        )?
        .to_string(),
        status: field(operation, "DBInstanceStatus", instance.db_instance_status())?.to_string(),
    })
}

fn cluster(
    operation: &'static str,
    cluster: &aws_sdk_redshift::types::Cluster,
) -> Result<Cluster, Error> {
    Ok(Cluster {
        identifier: field(operation, "ClusterIdentifier", cluster.cluster_identifier())?
            .to_string(),
        status: field(operation, "ClusterStatus", cluster.cluster_status())?.to_string(),
        namespace_arn: cluster.cluster_namespace_arn().map(ToString::to_string),
    })
}

// -----------------------------------------------------------------------------
// Client structure

/// groups the sdk clients of the services involved in a zero-etl integration
#[derive(Clone, Debug)]
pub struct Client {
    rds: aws_sdk_rds::Client,
    redshift: aws_sdk_redshift::Client,
    sts: aws_sdk_sts::Client,
}

impl From<&SdkConfig> for Client {
    fn from(config: &SdkConfig) -> Self {
        Self {
            rds: aws_sdk_rds::Client::new(config),
            redshift: aws_sdk_redshift::Client::new(config),
            sts: aws_sdk_sts::Client::new(config),
        }
    }
}

impl Client {
    /// returns a new client using the default credential chain, region and
    /// profile could be overridden by the configuration
    #[cfg_attr(feature = "trace", tracing::instrument)]
    pub async fn new(config: &cfg::Aws) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.to_owned()));
        }

        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }

        let sdk = loader.load().await;

        debug!(
            region = sdk.region().map(ToString::to_string),
            "Loaded aws sdk configuration"
        );

        Self::from(&sdk)
    }
}

#[async_trait]
impl ControlPlane for Client {
    #[cfg_attr(feature = "trace", tracing::instrument(skip(self)))]
    async fn create_db_cluster_parameter_group(
        &self,
        group: &ParameterGroup,
    ) -> Result<String, Error> {
        const OPERATION: &str = "CreateDBClusterParameterGroup";

        let output = measure(
            RDS,
            OPERATION,
            self.rds
                .create_db_cluster_parameter_group()
                .db_cluster_parameter_group_name(&group.name)
                .db_parameter_group_family(&group.family)
                .description(&group.description)
                .send(),
        )
        .await
        .map_err(request(OPERATION, RDS))?;

        let group = field(
            OPERATION,
            "DBClusterParameterGroup",
            output.db_cluster_parameter_group(),
        )?;

        Ok(field(
            OPERATION,
            "DBClusterParameterGroupName",
            group.db_cluster_parameter_group_name(),
        )?
        .to_string())
    }

    #[cfg_attr(feature = "trace", tracing::instrument(skip(self)))]
    async fn modify_db_cluster_parameter_group(
        &self,
        name: &str,
        parameters: &[Parameter],
    ) -> Result<String, Error> {
        const OPERATION: &str = "ModifyDBClusterParameterGroup";

        let parameters = parameters
            .iter()
            .map(|parameter| {
                aws_sdk_rds::types::Parameter::builder()
                    .parameter_name(&parameter.name)
                    .parameter_value(&parameter.value)
                    .set_apply_method(parameter.apply_method.map(Into::into))
                    .build()
            })
            .collect::<Vec<_>>();

        let output = measure(
            RDS,
            OPERATION,
            self.rds
                .modify_db_cluster_parameter_group()
                .db_cluster_parameter_group_name(name)
                .set_parameters(Some(parameters))
                .send(),
        )
        .await
        .map_err(request(OPERATION, RDS))?;

        Ok(field(
            OPERATION,
            "DBClusterParameterGroupName",
            output.db_cluster_parameter_group_name(),
        )?
        .to_string())
    }

    #[cfg_attr(feature = "trace", tracing::instrument(skip(self, source)))]
    async fn create_db_cluster(&self, source: &cfg::Source) -> Result<DbCluster, Error> {
        const OPERATION: &str = "CreateDBCluster";

        let output = measure(
            RDS,
            OPERATION,
            self.rds
                .create_db_cluster()
                .db_cluster_identifier(&source.cluster)
                .db_cluster_parameter_group_name(&source.parameter_group)
                .engine(&source.engine)
                .engine_version(&source.engine_version)
                .database_name(&source.database)
                .master_username(&source.username)
                .master_user_password(&source.password)
                .send(),
        )
        .await
        .map_err(request(OPERATION, RDS))?;

        db_cluster(
            OPERATION,
            field(OPERATION, "DBCluster", output.db_cluster())?,
        )
    }

    #[cfg_attr(feature = "trace", tracing::instrument(skip(self, source)))]
    async fn create_db_instance(&self, source: &cfg::Source) -> Result<DbInstance, Error> {
        const OPERATION: &str = "CreateDBInstance";

        let output = measure(
            RDS,
            OPERATION,
            self.rds
                .create_db_instance()
                .db_instance_class(&source.instance_class)
                .db_cluster_identifier(&source.cluster)
                .db_instance_identifier(source.instance_identifier())
                .engine(&source.engine)
                .send(),
        )
        .await
        .map_err(request(OPERATION, RDS))?;

        db_instance(
            OPERATION,
            field(OPERATION, "DBInstance", output.db_instance())?,
        )
    }

    #[cfg_attr(feature = "trace", tracing::instrument(skip(self)))]
    async fn describe_db_cluster(&self, identifier: &str) -> Result<DbCluster, Error> {
        const OPERATION: &str = "DescribeDBClusters";

        let output = measure(
            RDS,
            OPERATION,
            self.rds
                .describe_db_clusters()
                .db_cluster_identifier(identifier)
                .send(),
        )
        .await
        .map_err(|err| {
            if err.as_service_error().map_or(false, |fault| fault.is_db_cluster_not_found_fault()) {
                Error::NotFound("db cluster", identifier.to_string())
            } else {
                request(OPERATION, RDS)(err)
            }
        })?;

        match output.db_clusters().first() {
            Some(cluster) => db_cluster(OPERATION, cluster),
            None => Err(Error::NotFound("db cluster", identifier.to_string())),
        }
    }

    #[cfg_attr(feature = "trace", tracing::instrument(skip(self)))]
    async fn describe_db_instance(&self, identifier: &str) -> Result<DbInstance, Error> {
        const OPERATION: &str = "DescribeDBInstances";

        let output = measure(
            RDS,
            OPERATION,
            self.rds
                .describe_db_instances()
                .db_instance_identifier(identifier)
                .send(),
        )
        .await
        .map_err(|err| {
            if err.as_service_error().map_or(false, |fault| fault.is_db_instance_not_found_fault()) {
                Error::NotFound("db instance", identifier.to_string())
            } else {
                request(OPERATION, RDS)(err)
            }
        })?;

        match output.db_instances().first() {
            Some(instance) => db_instance(OPERATION, instance),
            None => Err(Error::NotFound("db instance", identifier.to_string())),
        }
    }

    #[cfg_attr(feature = "trace", tracing::instrument(skip(self)))]
    async fn create_cluster_parameter_group(
        &self,
        group: &ParameterGroup,
    ) -> Result<String, Error> {
        const OPERATION: &str = "CreateClusterParameterGroup";

        let output = measure(
            REDSHIFT,
            OPERATION,
            self.redshift
                .create_cluster_parameter_group()
                .parameter_group_name(&group.name)
                .parameter_group_family(&group.family)
                .description(&group.description)
                .send(),
        )
        .await
        .map_err(request(OPERATION, REDSHIFT))?;

        let group = field(
            OPERATION,
            "ClusterParameterGroup",
            output.cluster_parameter_group(),
        )?;

        Ok(field(OPERATION, "ParameterGroupName", group.parameter_group_name())?.to_string())
    }

    #[cfg_attr(feature = "trace", tracing::instrument(skip(self)))]
    async fn modify_cluster_parameter_group(
        &self,
        name: &str,
        parameters: &[Parameter],
    ) -> Result<String, Error> {
        const OPERATION: &str = "ModifyClusterParameterGroup";

        // redshift parameters have no apply method, they are applied on the
        // next reboot of the cluster
        let parameters = parameters
            .iter()
            .map(|parameter| {
                aws_sdk_redshift::types::Parameter::builder()
                    .parameter_name(&parameter.name)
                    .parameter_value(&parameter.value)
                    .build()
            })
            .collect::<Vec<_>>();

        let output = measure(
            REDSHIFT,
            OPERATION,
            self.redshift
                .modify_cluster_parameter_group()
                .parameter_group_name(name)
                .set_parameters(Some(parameters))
                .send(),
        )
        .await
        .map_err(request(OPERATION, REDSHIFT))?;

        Ok(field(OPERATION, "ParameterGroupName", output.parameter_group_name())?.to_string())
    }

    #[cfg_attr(feature = "trace", tracing::instrument(skip(self, target)))]
    async fn create_cluster(&self, target: &cfg::Target) -> Result<Cluster, Error> {
        const OPERATION: &str = "CreateCluster";

        let output = measure(
            REDSHIFT,
            OPERATION,
            self.redshift
                .create_cluster()
                .cluster_identifier(&target.cluster)
                .node_type(&target.node_type)
                .number_of_nodes(target.nodes)
                .encrypted(target.encrypted)
                .master_username(&target.username)
                .master_user_password(&target.password)
                .cluster_parameter_group_name(&target.parameter_group)
                .send(),
        )
        .await
        .map_err(request(OPERATION, REDSHIFT))?;

        cluster(OPERATION, field(OPERATION, "Cluster", output.cluster())?)
    }

    #[cfg_attr(feature = "trace", tracing::instrument(skip(self)))]
    async fn describe_cluster(&self, identifier: &str) -> Result<Cluster, Error> {
        const OPERATION: &str = "DescribeClusters";

        let output = measure(
            REDSHIFT,
            OPERATION,
            self.redshift
                .describe_clusters()
                .cluster_identifier(identifier)
                .send(),
        )
        .await
        .map_err(|err| {
            if err.as_service_error().map_or(false, |fault| fault.is_cluster_not_found_fault()) {
                Error::NotFound("cluster", identifier.to_string())
            } else {
                request(OPERATION, REDSHIFT)(err)
            }
        })?;

        match output.clusters().first() {
            Some(c) => cluster(OPERATION, c),
            None => Err(Error::NotFound("cluster", identifier.to_string())),
        }
    }

    #[cfg_attr(feature = "trace", tracing::instrument(skip(self)))]
    async fn caller_account(&self) -> Result<String, Error> {
        const OPERATION: &str = "GetCallerIdentity";

        let output = measure(STS, OPERATION, self.sts.get_caller_identity().send())
            .await
            .map_err(request(OPERATION, STS))?;

        Ok(field(OPERATION, "Account", output.account())?.to_string())
    }

    #[cfg_attr(feature = "trace", tracing::instrument(skip(self, policy)))]
    async fn put_resource_policy(&self, resource_arn: &str, policy: &str) -> Result<(), Error> {
        const OPERATION: &str = "PutResourcePolicy";

        measure(
            REDSHIFT,
            OPERATION,
            self.redshift
                .put_resource_policy()
                .resource_arn(resource_arn)
                .policy(policy)
                .send(),
        )
        .await
        .map_err(request(OPERATION, REDSHIFT))?;

        Ok(())
    }

    #[cfg_attr(feature = "trace", tracing::instrument(skip(self)))]
    async fn create_integration(
        &self,
        source_arn: &str,
        target_arn: &str,
        name: &str,
    ) -> Result<Integration, Error> {
        const OPERATION: &str = "CreateIntegration";

        let output = measure(
            RDS,
            OPERATION,
            self.rds
                .create_integration()
                .source_arn(source_arn)
                .target_arn(target_arn)
                .integration_name(name)
                .send(),
        )
        .await
        .map_err(request(OPERATION, RDS))?;

        Ok(Integration {
            name: field(OPERATION, "IntegrationName", output.integration_name())?.to_string(),
            arn: output.integration_arn().map(ToString::to_string),
            status: output.status().map(|status| status.as_str().to_string()),
        })
    }

    #[cfg_attr(feature = "trace", tracing::instrument(skip(self)))]
    async fn delete(&self, resource: &Resource) -> Result<(), Error> {
        match resource {
            Resource::DbClusterParameterGroup(name) => {
                const OPERATION: &str = "DeleteDBClusterParameterGroup";

                measure(
                    RDS,
                    OPERATION,
                    self.rds
                        .delete_db_cluster_parameter_group()
                        .db_cluster_parameter_group_name(name)
                        .send(),
                )
                .await
                .map_err(request(OPERATION, RDS))?;
            }
            Resource::DbCluster(identifier) => {
                const OPERATION: &str = "DeleteDBCluster";

                measure(
                    RDS,
                    OPERATION,
                    self.rds
                        .delete_db_cluster()
                        .db_cluster_identifier(identifier)
                        .skip_final_snapshot(true)
                        .send(),
                )
                .await
                .map_err(request(OPERATION, RDS))?;
            }
            Resource::DbInstance(identifier) => {
                const OPERATION: &str = "DeleteDBInstance";

                measure(
                    RDS,
                    OPERATION,
                    self.rds
                        .delete_db_instance()
                        .db_instance_identifier(identifier)
                        .skip_final_snapshot(true)
                        .send(),
                )
                .await
                .map_err(request(OPERATION, RDS))?;
            }
            Resource::ClusterParameterGroup(name) => {
                const OPERATION: &str = "DeleteClusterParameterGroup";

                measure(
                    REDSHIFT,
                    OPERATION,
                    self.redshift
                        .delete_cluster_parameter_group()
                        .parameter_group_name(name)
                        .send(),
                )
                .await
                .map_err(request(OPERATION, REDSHIFT))?;
            }
            Resource::Cluster(identifier) => {
                const OPERATION: &str = "DeleteCluster";

                measure(
                    REDSHIFT,
                    OPERATION,
                    self.redshift
                        .delete_cluster()
                        .cluster_identifier(identifier)
                        .skip_final_cluster_snapshot(true)
                        .send(),
                )
                .await
                .map_err(request(OPERATION, REDSHIFT))?;
            }
        }

        Ok(())
    }
}
