//! # Command module
//!
//! This module provide command line interface structures and helpers
use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use clap::{ArgAction, Parser, Subcommand};

use crate::svc::cfg::Configuration;

pub mod configuration;
pub mod plan;
pub mod policy;
pub mod provision;

// -----------------------------------------------------------------------------
// Executor trait

#[async_trait]
pub trait Executor {
    type Error;

    async fn execute(&self, config: Arc<Configuration>) -> Result<(), Self::Error>;
}

// -----------------------------------------------------------------------------
// CommandError enum

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("failed to execute command '{0}', {1}")]
    Execution(String, Arc<CommandError>),
    #[error("failed to execute command, {0}")]
    Provision(provision::ProvisionError),
    #[error("failed to execute command, {0}")]
    Policy(policy::PolicyError),
    #[error("failed to execute command, {0}")]
    Plan(plan::PlanError),
    #[error("failed to execute command, {0}")]
    Configuration(configuration::ConfigurationError),
}

// -----------------------------------------------------------------------------
// Command enum

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Provision the source and target clusters, then create the integration
    #[clap(name = "provision", aliases = &["p"])]
    Provision(provision::Provision),
    /// Wait for already provisioned clusters, then create the integration
    #[clap(name = "resume", aliases = &["r"])]
    Resume,
    /// Interact with the resource policy of the target namespace
    #[clap(name = "policy", subcommand)]
    Policy(policy::Policy),
    /// Print the control plane operations issued by a provisioning
    #[clap(name = "plan")]
    Plan,
    /// Interact with the configuration
    #[clap(name = "configuration", aliases = &["config", "cfg"], subcommand)]
    Configuration(configuration::Config),
}

#[async_trait]
impl Executor for Command {
    type Error = CommandError;

    #[cfg_attr(feature = "trace", tracing::instrument(skip(config)))]
    async fn execute(&self, config: Arc<Configuration>) -> Result<(), Self::Error> {
        match self {
            Self::Provision(cmd) => cmd
                .execute(config)
                .await
                .map_err(CommandError::Provision)
                .map_err(|err| CommandError::Execution("provision".into(), Arc::new(err))),
            Self::Resume => provision::resume(config)
                .await
                .map_err(CommandError::Provision)
                .map_err(|err| CommandError::Execution("resume".into(), Arc::new(err))),
            Self::Policy(cmd) => cmd
                .execute(config)
                .await
                .map_err(CommandError::Policy)
                .map_err(|err| CommandError::Execution("policy".into(), Arc::new(err))),
            Self::Plan => plan::view(config)
                .await
                .map_err(CommandError::Plan)
                .map_err(|err| CommandError::Execution("plan".into(), Arc::new(err))),
            Self::Configuration(cmd) => cmd
                .execute(config)
                .await
                .map_err(CommandError::Configuration)
                .map_err(|err| CommandError::Execution("configuration".into(), Arc::new(err))),
        }
    }
}

// -----------------------------------------------------------------------------
// Args struct

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Args {
    /// Increase log verbosity
    #[clap(short = 'v', global = true, action = ArgAction::Count)]
    pub verbosity: u8,
    /// Specify location of configuration
    #[clap(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,
    /// Check if configuration is healthy
    #[clap(short = 't', long = "check", global = true)]
    pub check: bool,
    /// Write metrics in prometheus text format to the given file on exit
    #[clap(long = "metrics-output", global = true)]
    pub metrics: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Option<Command>,
}
