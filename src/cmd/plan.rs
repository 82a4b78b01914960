//! # Plan module
//!
//! This module provides the plan command line interface function
//! implementation

use std::sync::Arc;

use crate::svc::{cfg::Configuration, provision::plan};

// -----------------------------------------------------------------------------
// PlanError enum

#[derive(thiserror::Error, Debug)]
pub enum PlanError {
    #[error("failed to serialize plan, {0}")]
    Serialize(serde_yaml::Error),
}

// -----------------------------------------------------------------------------
// view function

#[cfg_attr(feature = "trace", tracing::instrument(skip(config)))]
pub async fn view(config: Arc<Configuration>) -> Result<(), PlanError> {
    let steps = plan::plan(&config);

    print!(
        "{}",
        serde_yaml::to_string(&steps).map_err(PlanError::Serialize)?
    );
    Ok(())
}
