//! Integrations and the operations composed from them.

pub mod cluster;
pub mod deployment_service;
pub mod jenkins;
pub mod job_service;
pub mod log_relay;
pub mod webhook_signature;
