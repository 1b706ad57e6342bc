//! Deploy console backend.
//!
//! Fronts Jenkins with a REST/WebSocket API for the dashboard: generates
//! and creates deploy and scan jobs, relays build logs, reports
//! deployment status and tears deployments down again.

pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod services;

#[cfg(test)]
mod testing;
