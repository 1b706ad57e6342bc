//! Composite job operations built on [`JobServer`] and [`Cluster`].

use deploy_pipeline::{
    generate_pipeline, generate_scan_pipeline, job_definition_xml, namespace_for, DeployJob,
    PipelineSettings, ScanJob,
};
use futures_util::future::try_join_all;

use crate::error::{ApiError, StepReport};
use crate::models::job::JobWithBuilds;
use crate::services::cluster::Cluster;
use crate::services::jenkins::JobServer;

/// Create a deploy job and queue its first build.
///
/// Input is validated before Jenkins is contacted. Fails with `Conflict`
/// before anything is created when the job exists.
pub async fn create_and_trigger(
    jobs: &dyn JobServer,
    job: &DeployJob,
    settings: &PipelineSettings,
) -> Result<Option<u64>, ApiError> {
    let script = generate_pipeline(job, settings)?;
    ensure_absent(jobs, &job.job_name).await?;
    create_then_trigger(jobs, &job.job_name, &script, "deploy").await
}

/// Create a checkout/build/scan job and queue its first build.
pub async fn create_scan_and_trigger(
    jobs: &dyn JobServer,
    job: &ScanJob,
    settings: &PipelineSettings,
) -> Result<Option<u64>, ApiError> {
    let script = generate_scan_pipeline(job, settings)?;
    ensure_absent(jobs, &job.job_name).await?;
    create_then_trigger(jobs, &job.job_name, &script, "scan").await
}

/// Queue a build of an existing job.
pub async fn trigger_existing(jobs: &dyn JobServer, job_name: &str) -> Result<Option<u64>, ApiError> {
    if !jobs.job_exists(job_name).await? {
        return Err(ApiError::NotFound(format!("Job {job_name} does not exist")));
    }
    let queued = jobs.trigger_build(job_name).await?;
    crate::metrics::build_triggered();
    Ok(queued)
}

/// Delete the Jenkins job and the namespace its deployments live in.
///
/// Both steps always run; if either fails the error reports each outcome.
pub async fn delete_job_and_namespace(
    jobs: &dyn JobServer,
    cluster: &dyn Cluster,
    job_name: &str,
) -> Result<(), ApiError> {
    let delete_namespace = async {
        let namespace = deploy_pipeline::checked_namespace(job_name)
            .map_err(|e| ApiError::Validation(e.to_string()))?;
        cluster
            .delete_namespace(&namespace)
            .await
            .map_err(ApiError::from)
    };
    let delete_job = async { jobs.delete_job(job_name).await.map_err(ApiError::from) };

    let (job_result, namespace_result) = tokio::join!(delete_job, delete_namespace);

    if job_result.is_ok() && namespace_result.is_ok() {
        tracing::info!(
            job = job_name,
            namespace = %namespace_for(job_name),
            "Deleted job and namespace"
        );
        return Ok(());
    }

    Err(ApiError::PartialFailure {
        message: format!("Deleting {job_name} did not complete"),
        details: vec![
            StepReport::from_result("deleteJob", &job_result),
            StepReport::from_result("deleteNamespace", &namespace_result),
        ],
    })
}

/// Every job with its build history; per-job lookups run concurrently.
pub async fn jobs_with_builds(jobs: &dyn JobServer) -> Result<Vec<JobWithBuilds>, ApiError> {
    let summaries = jobs.list_jobs().await?;
    let rows = try_join_all(summaries.into_iter().map(|job| async move {
        let builds = jobs.job_builds(&job.name).await?;
        Ok::<_, ApiError>(JobWithBuilds { job, builds })
    }))
    .await?;
    Ok(rows)
}

async fn ensure_absent(jobs: &dyn JobServer, job_name: &str) -> Result<(), ApiError> {
    if jobs.job_exists(job_name).await? {
        return Err(ApiError::Conflict(format!("Job {job_name} already exists")));
    }
    Ok(())
}

async fn create_then_trigger(
    jobs: &dyn JobServer,
    job_name: &str,
    script: &str,
    kind: &'static str,
) -> Result<Option<u64>, ApiError> {
    let definition = job_definition_xml(script);
    jobs.create_job(job_name, &definition).await?;
    crate::metrics::job_created(kind);
    tracing::info!(job = job_name, kind, "Created job");

    let queued = jobs.trigger_build(job_name).await?;
    crate::metrics::build_triggered();
    tracing::info!(job = job_name, queue_item = ?queued, "Triggered build");
    Ok(queued)
}
