//! Pipeline-script and job-definition generation for the deploy console.
//!
//! [`generate_pipeline`] renders the deploy pipeline for an existing image,
//! [`generate_scan_pipeline`] the checkout/build/scan pipeline, and
//! [`job_definition_xml`] wraps either one for Jenkins' `createItem`.

pub mod error;
pub mod escape;
pub mod job_xml;
pub mod manifests;
pub mod naming;
pub mod pipeline;
pub mod project;
pub mod script;
pub mod stages;

pub use error::{PipelineError, Result};
pub use job_xml::job_definition_xml;
pub use naming::{checked_namespace, namespace_for, sanitize_name};
pub use pipeline::{generate_pipeline, generate_scan_pipeline, DeployJob, PipelineSettings, ScanJob};
pub use project::ProjectType;
