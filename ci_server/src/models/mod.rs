//! Data exchanged with Jenkins, SonarQube and API clients.

pub mod build;
pub mod job;
pub mod scan;
