//! # Policy module
//!
//! This module provide the resource policy attached to the namespace of the
//! target cluster, which authorizes the integration from the source cluster

use std::collections::BTreeMap;

use serde::Serialize;

// -----------------------------------------------------------------------------
// Constants

pub const VERSION: &str = "2012-10-17";
pub const REDSHIFT_SERVICE: &str = "redshift.amazonaws.com";
pub const AUTHORIZE_INBOUND_INTEGRATION: &str = "redshift:AuthorizeInboundIntegration";
pub const CREATE_INBOUND_INTEGRATION: &str = "redshift:CreateInboundIntegration";

// -----------------------------------------------------------------------------
// Effect enum

#[derive(Serialize, PartialEq, Eq, Clone, Copy, Debug)]
pub enum Effect {
    Allow,
}

// -----------------------------------------------------------------------------
// Principal enum

#[derive(Serialize, PartialEq, Eq, Clone, Debug)]
pub enum Principal {
    #[serde(rename = "Service")]
    Service(String),
    #[serde(rename = "AWS")]
    Aws(String),
}

// -----------------------------------------------------------------------------
// Action enum

#[derive(Serialize, PartialEq, Eq, Clone, Debug)]
#[serde(untagged)]
pub enum Action {
    One(String),
    Many(Vec<String>),
}

// -----------------------------------------------------------------------------
// Statement structure

#[derive(Serialize, PartialEq, Eq, Clone, Debug)]
pub struct Statement {
    #[serde(rename = "Effect")]
    pub effect: Effect,
    #[serde(rename = "Principal")]
    pub principal: Principal,
    #[serde(rename = "Action")]
    pub action: Action,
    #[serde(rename = "Condition", skip_serializing_if = "Option::is_none")]
    pub condition: Option<BTreeMap<String, BTreeMap<String, String>>>,
}

// -----------------------------------------------------------------------------
// ResourcePolicy structure

#[derive(Serialize, PartialEq, Eq, Clone, Debug)]
pub struct ResourcePolicy {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Statement")]
    pub statements: Vec<Statement>,
}

impl ResourcePolicy {
    /// returns the policy that lets redshift authorize an inbound integration
    /// coming from the given source cluster and lets the account create it
    pub fn zero_etl(source_arn: &str, account: &str) -> Self {
        let condition = BTreeMap::from([(
            "StringEquals".to_string(),
            BTreeMap::from([("aws:SourceArn".to_string(), source_arn.to_string())]),
        )]);

        Self {
            version: VERSION.to_string(),
            statements: vec![
                Statement {
                    effect: Effect::Allow,
                    principal: Principal::Service(REDSHIFT_SERVICE.to_string()),
                    action: Action::Many(vec![AUTHORIZE_INBOUND_INTEGRATION.to_string()]),
                    condition: Some(condition),
                },
                Statement {
                    effect: Effect::Allow,
                    principal: Principal::Aws(format!("arn:aws:iam::{}:root", account)),
                    action: Action::One(CREATE_INBOUND_INTEGRATION.to_string()),
                    condition: None,
                },
            ],
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
