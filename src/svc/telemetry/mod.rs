//! # Telemetry module
//!
//! This module expose telemetry measurements of the requests sent to the
//! control plane and of the availability poll

use std::{fmt::Display, future::Future, time::Instant};

#[cfg(feature = "metrics")]
use once_cell::sync::Lazy;
#[cfg(feature = "metrics")]
use prometheus::{opts, register_counter_vec, CounterVec};
use tracing::{debug, trace};

#[cfg(feature = "metrics")]
pub mod metrics;

// -----------------------------------------------------------------------------
// Telemetry

#[cfg(feature = "metrics")]
static CONTROL_PLANE_REQUEST_SUCCESS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        opts!(
            "zero_etl_control_plane_request_success",
            "number of successful request sent to the control plane",
        ),
        &["service", "operation"]
    )
    .expect("metrics 'zero_etl_control_plane_request_success' to not be already registered")
});

#[cfg(feature = "metrics")]
static CONTROL_PLANE_REQUEST_FAILURE: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        opts!(
            "zero_etl_control_plane_request_failure",
            "number of failed request sent to the control plane",
        ),
        &["service", "operation"]
    )
    .expect("metrics 'zero_etl_control_plane_request_failure' to not be already registered")
});

#[cfg(feature = "metrics")]
static CONTROL_PLANE_REQUEST_DURATION: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        opts!(
            "zero_etl_control_plane_request_duration",
            "duration of request sent to the control plane",
        ),
        &["service", "operation", "unit"]
    )
    .expect("metrics 'zero_etl_control_plane_request_duration' to not be already registered")
});

#[cfg(feature = "metrics")]
static WAITER_POLL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        opts!(
            "zero_etl_waiter_poll",
            "number of availability poll grouped by outcome",
        ),
        &["outcome"]
    )
    .expect("metrics 'zero_etl_waiter_poll' to not be already registered")
});

// -----------------------------------------------------------------------------
// Helper methods

/// awaits the given request and records its duration and outcome
pub async fn measure<F, T, E>(service: &'static str, operation: &'static str, future: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    let begin = Instant::now();
    let result = future.await;
    let duration = Instant::now().duration_since(begin).as_micros() as u64;

    match &result {
        Ok(_) => {
            trace!(
                service = service,
                operation = operation,
                duration = duration,
                "Send request to control plane"
            );

            #[cfg(feature = "metrics")]
            CONTROL_PLANE_REQUEST_SUCCESS
                .with_label_values(&[service, operation])
                .inc();
        }
        Err(err) => {
            debug!(
                service = service,
                operation = operation,
                duration = duration,
                error = err.to_string(),
                "Failed to send request to control plane"
            );

            #[cfg(feature = "metrics")]
            CONTROL_PLANE_REQUEST_FAILURE
                .with_label_values(&[service, operation])
                .inc();
        }
    }

    #[cfg(feature = "metrics")]
    CONTROL_PLANE_REQUEST_DURATION
        .with_label_values(&[service, operation, "us"])
        .inc_by(duration as f64);

    result
}

/// records the outcome of a single availability poll
#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
pub fn poll(outcome: &str) {
    #[cfg(feature = "metrics")]
    WAITER_POLL.with_label_values(&[outcome]).inc();
}
