//! # Plan module
//!
//! This module describes the control plane operations issued by a
//! provisioning run without executing them

use serde::Serialize;

use crate::svc::{
    aws::{Parameter, RDS, REDSHIFT, STS},
    cfg::Configuration,
    provision::{source, target},
};

// -----------------------------------------------------------------------------
// Step structure

#[derive(Serialize, PartialEq, Eq, Clone, Debug)]
pub struct Step {
    #[serde(rename = "service")]
    pub service: &'static str,
    #[serde(rename = "operation")]
    pub operation: &'static str,
    #[serde(rename = "resource")]
    pub resource: String,
    #[serde(rename = "parameters", skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(rename = "repeat", skip_serializing_if = "std::ops::Not::not")]
    pub repeat: bool,
}

impl Step {
    fn new(service: &'static str, operation: &'static str, resource: &str) -> Self {
        Self {
            service,
            operation,
            resource: resource.to_string(),
            parameters: vec![],
            repeat: false,
        }
    }

    fn with_parameters(mut self, parameters: Vec<Parameter>) -> Self {
        self.parameters = parameters;
        self
    }

    fn repeated(mut self) -> Self {
        self.repeat = true;
        self
    }
}

// -----------------------------------------------------------------------------
// helpers

/// returns the operations of a provisioning run in the order they are sent,
/// steps marked as repeated belong to the availability poll
pub fn plan(config: &Configuration) -> Vec<Step> {
    let source = &config.source;
    let target = &config.target;

    vec![
        Step::new(RDS, "CreateDBClusterParameterGroup", &source.parameter_group),
        Step::new(RDS, "ModifyDBClusterParameterGroup", &source.parameter_group)
            .with_parameters(source::parameters()),
        Step::new(RDS, "CreateDBCluster", &source.cluster),
        Step::new(REDSHIFT, "CreateClusterParameterGroup", &target.parameter_group),
        Step::new(REDSHIFT, "ModifyClusterParameterGroup", &target.parameter_group)
            .with_parameters(target::parameters()),
        Step::new(REDSHIFT, "CreateCluster", &target.cluster),
        Step::new(REDSHIFT, "DescribeClusters", &target.cluster),
        Step::new(STS, "GetCallerIdentity", "caller"),
        Step::new(REDSHIFT, "PutResourcePolicy", &target.cluster),
        Step::new(RDS, "CreateDBInstance", &source.instance_identifier()),
        Step::new(RDS, "DescribeDBClusters", &source.cluster).repeated(),
        Step::new(RDS, "DescribeDBInstances", &source.instance_identifier()).repeated(),
        Step::new(REDSHIFT, "DescribeClusters", &target.cluster).repeated(),
        Step::new(RDS, "CreateIntegration", &config.integration.name),
    ]
}
