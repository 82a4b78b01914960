//! # Services module
//!
//! This module provide services to interact with the aws control plane, the
//! provisioning chain and helpers to do so.
pub mod aws;
pub mod cfg;
pub mod provision;
pub mod telemetry;
