//! # Configuration module
//!
//! This module provides the configuration command line interface function
//! implementation

use std::sync::Arc;

use async_trait::async_trait;
use clap::Subcommand;

use crate::{cmd::Executor, svc::cfg::Configuration};

// -----------------------------------------------------------------------------
// ConfigurationError enum

#[derive(thiserror::Error, Debug)]
pub enum ConfigurationError {
    #[error("failed to encode configuration, {0}")]
    Encode(toml::ser::Error),
}

// -----------------------------------------------------------------------------
// Config enum

#[derive(Subcommand, Clone, Debug)]
pub enum Config {
    /// View the effective configuration, credentials are redacted
    #[clap(name = "view", aliases = &["v"])]
    View,
}

#[async_trait]
impl Executor for Config {
    type Error = ConfigurationError;

    #[cfg_attr(feature = "trace", tracing::instrument(skip(config)))]
    async fn execute(&self, config: Arc<Configuration>) -> Result<(), Self::Error> {
        match self {
            Self::View => view(config).await,
        }
    }
}

// -----------------------------------------------------------------------------
// view function

#[cfg_attr(feature = "trace", tracing::instrument(skip(config)))]
pub async fn view(config: Arc<Configuration>) -> Result<(), ConfigurationError> {
    print!("{}", render(&config)?);
    Ok(())
}

pub fn render(config: &Configuration) -> Result<String, ConfigurationError> {
    toml::to_string(&config.redacted()).map_err(ConfigurationError::Encode)
}
