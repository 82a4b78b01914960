//! # Source module
//!
//! This module provide the provisioning of the aurora mysql source cluster

use tracing::info;

use crate::svc::{
    aws::{ApplyMethod, ControlPlane, DbInstance, Parameter, ParameterGroup, Resource},
    provision::{waiter::Timer, Error, Provisioner},
};

// -----------------------------------------------------------------------------
// Constants

/// binary log settings required by zero-etl on the source cluster
pub const BINLOG_PARAMETERS: &[(&str, &str)] = &[
    ("aurora_enhanced_binlog", "1"),
    ("binlog_backup", "0"),
    ("binlog_format", "ROW"),
    ("binlog_replication_globaldb", "0"),
    ("binlog_row_image", "full"),
    ("binlog_row_metadata", "full"),
];

pub fn parameters() -> Vec<Parameter> {
    BINLOG_PARAMETERS
        .iter()
        .map(|(name, value)| Parameter::new(name, value, Some(ApplyMethod::PendingReboot)))
        .collect()
}

// -----------------------------------------------------------------------------
// Source provisioning

/// result of the source step
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Provisioned {
    pub source_arn: String,
    pub target_arn: String,
    pub instance: DbInstance,
}

impl<'a, C, T> Provisioner<'a, C, T>
where
    C: ControlPlane + ?Sized,
    T: Timer + ?Sized,
{
    /// creates the parameter group and the source cluster, provisions the
    /// target cluster once the source arn is known, then adds the writer
    /// instance to the source cluster
    #[cfg_attr(feature = "trace", tracing::instrument(skip(self)))]
    pub async fn source(&mut self) -> Result<Provisioned, Error> {
        let config = self.config.to_owned();
        let source = &config.source;
        let fail = |err| Error::Source(source.cluster.to_owned(), err);

        // ---------------------------------------------------------------------
        // Step 1: parameter group, before the cluster which references it

        let group = self
            .client
            .create_db_cluster_parameter_group(&ParameterGroup::from(source))
            .await
            .map_err(fail)?;

        self.ledger
            .record(Resource::DbClusterParameterGroup(group.to_owned()));
        info!(parameter_group = group, "Created source parameter group");

        let group = self
            .client
            .modify_db_cluster_parameter_group(&group, &parameters())
            .await
            .map_err(fail)?;

        info!(parameter_group = group, "Modified source parameter group");

        // ---------------------------------------------------------------------
        // Step 2: source cluster

        let cluster = self
            .client
            .create_db_cluster(source)
            .await
            .map_err(fail)?;

        self.ledger
            .record(Resource::DbCluster(cluster.identifier.to_owned()));
        info!(
            cluster = cluster.identifier,
            arn = cluster.arn,
            "Creating source cluster"
        );

        // ---------------------------------------------------------------------
        // Step 3: target cluster, which needs the source arn for its policy

        let target_arn = self.target(&cluster.arn).await?;

        // ---------------------------------------------------------------------
        // Step 4: writer instance

        let instance = self
            .client
            .create_db_instance(source)
            .await
            .map_err(|err| Error::Instance(source.instance_identifier(), err))?;

        self.ledger
            .record(Resource::DbInstance(instance.identifier.to_owned()));
        info!(
            instance = instance.identifier,
            class = source.instance_class,
            "Creating source writer instance"
        );

        Ok(Provisioned {
            source_arn: cluster.arn,
            target_arn,
            instance,
        })
    }
}
