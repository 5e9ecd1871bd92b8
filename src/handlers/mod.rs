//! HTTP handlers

pub mod metrics_handler;
pub mod observability_api;
