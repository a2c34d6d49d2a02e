//! # Observability
//!
//! Prometheus metrics for the controller and its Aqua client.

pub mod metrics;
