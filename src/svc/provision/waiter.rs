//! # Waiter module
//!
//! This module provide the availability poll of the source cluster, its writer
//! instance and the target cluster. The poll is bounded by a maximum number of
//! attempts and a deadline, and backs off exponentially between attempts.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::svc::{
    aws::{self, ControlPlane},
    cfg::{self, Configuration},
    telemetry,
};

// -----------------------------------------------------------------------------
// Constants

pub const AVAILABLE: &str = "available";

/// statuses from which a resource never reaches the available state on its own
pub const TERMINAL_STATUSES: &[&str] = &[
    "failed",
    "deleting",
    "final-snapshot",
    "hardware-failure",
    "inaccessible-encryption-credentials",
    "inaccessible-encryption-credentials-recoverable",
    "incompatible-hsm",
    "incompatible-network",
    "incompatible-option-group",
    "incompatible-parameters",
    "incompatible-restore",
    "insufficient-capacity",
    "paused",
    "stopped",
    "stopping",
    "storage-full",
];

// -----------------------------------------------------------------------------
// Timer trait

/// source of time of the waiter
#[async_trait]
pub trait Timer: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

#[derive(Clone, Copy, Default, Debug)]
pub struct TokioTimer;

#[async_trait]
impl Timer for TokioTimer {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

// -----------------------------------------------------------------------------
// Backoff structure

#[derive(PartialEq, Clone, Debug)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
    pub jitter: f64,
}

impl From<&cfg::Waiter> for Backoff {
    fn from(waiter: &cfg::Waiter) -> Self {
        Self {
            initial: Duration::from_secs(waiter.initial_delay),
            max: Duration::from_secs(waiter.max_delay),
            multiplier: waiter.multiplier,
            jitter: waiter.jitter,
        }
    }
}

impl Backoff {
    /// returns the delay to wait after the given attempt (starting at zero),
    /// `sample` is a number in `[0, 1)` used to spread the delay down by at
    /// most `jitter` of its value
    pub fn delay(&self, attempt: u32, sample: f64) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let factor = self.multiplier.powi(exponent);
        let base = if factor.is_finite() {
            self.initial.as_secs_f64() * factor
        } else {
            f64::MAX
        };

        let capped = base.min(self.max.as_secs_f64());
        let spread = 1.0 - self.jitter * sample.clamp(0.0, 1.0);

        Duration::from_secs_f64(capped * spread)
    }
}

// -----------------------------------------------------------------------------
// Readiness enum

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Readiness {
    Available,
    Pending,
    Failed,
}

impl From<&str> for Readiness {
    fn from(status: &str) -> Self {
        let status = status.to_lowercase();

        if status == AVAILABLE {
            Self::Available
        } else if TERMINAL_STATUSES.contains(&status.as_str()) {
            Self::Failed
        } else {
            Self::Pending
        }
    }
}

// -----------------------------------------------------------------------------
// Snapshot structure

/// statuses observed during a single poll cycle
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Snapshot {
    pub source: aws::DbCluster,
    pub instance: aws::DbInstance,
    pub target: aws::Cluster,
}

impl Snapshot {
    fn resources(&self) -> [(String, &str); 3] {
        [
            (
                format!("db cluster '{}'", self.source.identifier),
                self.source.status.as_str(),
            ),
            (
                format!("db instance '{}'", self.instance.identifier),
                self.instance.status.as_str(),
            ),
            (
                format!("cluster '{}'", self.target.identifier),
                self.target.status.as_str(),
            ),
        ]
    }

    /// returns the first resource that could not converge anymore, if any
    pub fn failure(&self) -> Option<(String, String)> {
        self.resources()
            .into_iter()
            .find(|(_, status)| Readiness::from(*status) == Readiness::Failed)
            .map(|(resource, status)| (resource, status.to_string()))
    }

    pub fn is_available(&self) -> bool {
        self.resources()
            .iter()
            .all(|(_, status)| Readiness::from(*status) == Readiness::Available)
    }
}

// -----------------------------------------------------------------------------
// Outcome enum

#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Outcome {
    /// every resource is available, the snapshot holds the discovered arns
    Ready {
        snapshot: Snapshot,
        attempts: u32,
    },
    TimedOut {
        attempts: u32,
        elapsed: Duration,
    },
    Failed {
        resource: String,
        status: String,
        attempts: u32,
    },
}

// -----------------------------------------------------------------------------
// helpers

#[cfg_attr(feature = "trace", tracing::instrument(skip(client, config)))]
pub async fn poll<C>(client: &C, config: &Configuration) -> Result<Snapshot, aws::Error>
where
    C: ControlPlane + ?Sized,
{
    let source = client.describe_db_cluster(&config.source.cluster).await?;
    let instance = client
        .describe_db_instance(&config.source.instance_identifier())
        .await?;
    let target = client.describe_cluster(&config.target.cluster).await?;

    Ok(Snapshot {
        source,
        instance,
        target,
    })
}

/// polls the resources until they are all available in the same cycle, one
/// of them fails, or the attempts or the deadline are exhausted
#[cfg_attr(feature = "trace", tracing::instrument(skip(client, timer, config)))]
pub async fn wait<C, T>(client: &C, timer: &T, config: &Configuration) -> Result<Outcome, aws::Error>
where
    C: ControlPlane + ?Sized,
    T: Timer + ?Sized,
{
    let backoff = Backoff::from(&config.waiter);
    let timeout = config.waiter.timeout();
    let begin = timer.now();
    let mut attempts = 0;

    info!("Waiting for clusters to be available...");
    loop {
        attempts += 1;

        let snapshot = poll(client, config).await?;

        debug!(
            attempt = attempts,
            source = snapshot.source.status,
            instance = snapshot.instance.status,
            target = snapshot.target.status,
            "Poll status of clusters"
        );

        if let Some((resource, status)) = snapshot.failure() {
            warn!(
                resource = resource,
                status = status,
                "Resource will not become available"
            );

            telemetry::poll("failed");
            return Ok(Outcome::Failed {
                resource,
                status,
                attempts,
            });
        }

        if snapshot.is_available() {
            info!("Clusters available. Ready to create zero-ETL integration.");

            telemetry::poll("ready");
            return Ok(Outcome::Ready { snapshot, attempts });
        }

        telemetry::poll("pending");

        let elapsed = timer.now().duration_since(begin);
        let remaining = timeout.saturating_sub(elapsed);
        if attempts >= config.waiter.max_attempts || remaining.is_zero() {
            warn!(
                attempts = attempts,
                elapsed = elapsed.as_secs(),
                "Clusters did not become available in time"
            );

            return Ok(Outcome::TimedOut { attempts, elapsed });
        }

        let sample = rand::thread_rng().gen::<f64>();
        let delay = backoff.delay(attempts - 1, sample).min(remaining);

        debug!(
            attempt = attempts,
            delay = delay.as_secs(),
            "Clusters are not available yet, sleeping"
        );

        timer.sleep(delay).await;
    }
}
