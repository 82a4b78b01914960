//! # Target module
//!
//! This module provide the provisioning of the redshift target cluster and of
//! the resource policy authorizing the integration

use tracing::{debug, info};

use crate::svc::{
    aws::{self, ControlPlane, Parameter, ParameterGroup, Resource},
    provision::{policy::ResourcePolicy, waiter::Timer, Error, Provisioner},
};

// -----------------------------------------------------------------------------
// Constants

pub const CASE_SENSITIVE_IDENTIFIER: &str = "enable_case_sensitive_identifier";

pub fn parameters() -> Vec<Parameter> {
    vec![Parameter::new(CASE_SENSITIVE_IDENTIFIER, "true", None)]
}

// -----------------------------------------------------------------------------
// Target provisioning

impl<'a, C, T> Provisioner<'a, C, T>
where
    C: ControlPlane + ?Sized,
    T: Timer + ?Sized,
{
    /// creates the parameter group and the target cluster, then attaches the
    /// resource policy to the namespace of the cluster. Returns the namespace
    /// arn.
    #[cfg_attr(feature = "trace", tracing::instrument(skip(self)))]
    pub async fn target(&mut self, source_arn: &str) -> Result<String, Error> {
        let config = self.config.to_owned();
        let target = &config.target;
        let fail = |err| Error::Target(target.cluster.to_owned(), err);

        // ---------------------------------------------------------------------
        // Step 1: parameter group

        let group = self
            .client
            .create_cluster_parameter_group(&ParameterGroup::from(target))
            .await
            .map_err(fail)?;

        self.ledger
            .record(Resource::ClusterParameterGroup(group.to_owned()));
        info!(parameter_group = group, "Created target parameter group");

        let group = self
            .client
            .modify_cluster_parameter_group(&group, &parameters())
            .await
            .map_err(fail)?;

        info!(parameter_group = group, "Modified target parameter group");

        // ---------------------------------------------------------------------
        // Step 2: target cluster

        let cluster = self.client.create_cluster(target).await.map_err(fail)?;

        self.ledger
            .record(Resource::Cluster(cluster.identifier.to_owned()));
        info!(
            cluster = cluster.identifier,
            node_type = target.node_type,
            nodes = target.nodes,
            "Creating target cluster"
        );

        let namespace_arn = self
            .client
            .describe_cluster(&cluster.identifier)
            .await
            .and_then(|cluster| {
                cluster
                    .namespace_arn
                    .ok_or(aws::Error::MissingField("DescribeClusters", "ClusterNamespaceArn"))
            })
            .map_err(fail)?;

        debug!(arn = namespace_arn, "Retrieved namespace of target cluster");

        // ---------------------------------------------------------------------
        // Step 3: resource policy

        let account = self
            .client
            .caller_account()
            .await
            .map_err(|err| Error::Policy(namespace_arn.to_owned(), err))?;

        let policy = ResourcePolicy::zero_etl(source_arn, &account)
            .to_json()
            .map_err(Error::Serialize)?;

        self.client
            .put_resource_policy(&namespace_arn, &policy)
            .await
            .map_err(|err| Error::Policy(namespace_arn.to_owned(), err))?;

        info!(
            arn = namespace_arn,
            account = account,
            "Attached resource policy to target namespace"
        );

        Ok(namespace_arn)
    }
}
