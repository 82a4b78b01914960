//! # Integration module
//!
//! This module provide the creation of the zero-etl integration between the
//! source and the target clusters

use tracing::info;

use crate::svc::{
    aws::{ControlPlane, Integration},
    provision::{waiter::Timer, Error, Provisioner},
};

impl<'a, C, T> Provisioner<'a, C, T>
where
    C: ControlPlane + ?Sized,
    T: Timer + ?Sized,
{
    /// binds the source cluster to the target namespace. The integration is
    /// not awaited, the control plane reports it as creating.
    #[cfg_attr(feature = "trace", tracing::instrument(skip(self)))]
    pub async fn integration(
        &self,
        source_arn: &str,
        target_arn: &str,
    ) -> Result<Integration, Error> {
        let name = &self.config.integration.name;
        let integration = self
            .client
            .create_integration(source_arn, target_arn, name)
            .await
            .map_err(|err| Error::Integration(name.to_owned(), err))?;

        info!(
            integration = integration.name,
            arn = integration.arn,
            status = integration.status,
            "Creating integration"
        );

        println!("Creating integration: {}", integration.name);
        Ok(integration)
    }
}
