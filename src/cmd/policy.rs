//! # Policy module
//!
//! This module provides the resource policy command line interface function
//! implementation

use std::sync::Arc;

use async_trait::async_trait;
use clap::Subcommand;

use crate::{
    cmd::Executor,
    svc::{
        aws::{self, client::Client, ControlPlane},
        cfg::Configuration,
        provision::policy::ResourcePolicy,
    },
};

// -----------------------------------------------------------------------------
// PolicyError enum

#[derive(thiserror::Error, Debug)]
pub enum PolicyError {
    #[error("failed to serialize resource policy, {0}")]
    Serialize(serde_json::Error),
    #[error("failed to retrieve account of the caller, {0}")]
    Identity(aws::Error),
}

// -----------------------------------------------------------------------------
// Policy enum

#[derive(Subcommand, Clone, Debug)]
pub enum Policy {
    /// View the resource policy attached to the target namespace
    #[clap(name = "view", aliases = &["v"])]
    View {
        /// Arn of the source cluster
        #[clap(long = "source-arn")]
        source_arn: String,
        /// Account allowed to create the integration, defaults to the caller's
        #[clap(long = "account")]
        account: Option<String>,
    },
}

#[async_trait]
impl Executor for Policy {
    type Error = PolicyError;

    #[cfg_attr(feature = "trace", tracing::instrument(skip(config)))]
    async fn execute(&self, config: Arc<Configuration>) -> Result<(), Self::Error> {
        match self {
            Self::View {
                source_arn,
                account,
            } => view(config, source_arn, account.to_owned()).await,
        }
    }
}

// -----------------------------------------------------------------------------
// view function

#[cfg_attr(feature = "trace", tracing::instrument(skip(config)))]
pub async fn view(
    config: Arc<Configuration>,
    source_arn: &str,
    account: Option<String>,
) -> Result<(), PolicyError> {
    let account = match account {
        Some(account) => account,
        None => Client::new(&config.aws)
            .await
            .caller_account()
            .await
            .map_err(PolicyError::Identity)?,
    };

    println!("{}", render(source_arn, &account)?);
    Ok(())
}

pub fn render(source_arn: &str, account: &str) -> Result<String, PolicyError> {
    ResourcePolicy::zero_etl(source_arn, account)
        .to_json()
        .map_err(PolicyError::Serialize)
}
