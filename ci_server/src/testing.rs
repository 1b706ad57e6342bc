//! In-memory stand-ins for Jenkins and the cluster, for route tests.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::ServerConfig;
use crate::models::build::{BuildInfo, BuildSummary, LogFormat, LogPage};
use crate::models::job::{JobSummary, ServerInfo};
use crate::routes::AppState;
use crate::services::cluster::{Cluster, ClusterError};
use crate::services::jenkins::{JenkinsError, JobServer, Result};

#[derive(Default)]
pub struct FakeJobsState {
    pub existing: BTreeSet<String>,
    /// `(operation, job)` in call order.
    pub calls: Vec<(&'static str, String)>,
    /// Job name to the definition it was created with.
    pub created: HashMap<String, String>,
    pub builds: HashMap<String, Vec<BuildSummary>>,
    pub log_pages: VecDeque<Result<LogPage>>,
    pub fail_delete: bool,
}

type LogFeed = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<LogPage>>>;

#[derive(Default)]
pub struct FakeJobs {
    pub state: Mutex<FakeJobsState>,
    /// Builds whose log pages arrive only when a test sends them.
    log_feeds: Mutex<HashMap<u64, LogFeed>>,
}

impl FakeJobs {
    pub fn with_jobs(names: &[&str]) -> Arc<Self> {
        let fake = Self::default();
        fake.state
            .lock()
            .unwrap()
            .existing
            .extend(names.iter().map(|n| n.to_string()));
        Arc::new(fake)
    }

    /// Hold `build_log` for build `number` until a page is sent. Dropping
    /// the sender ends the log.
    pub fn feed_log(&self, number: u64) -> mpsc::UnboundedSender<LogPage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.log_feeds
            .lock()
            .unwrap()
            .insert(number, Arc::new(tokio::sync::Mutex::new(rx)));
        tx
    }

    pub fn calls(&self) -> Vec<(&'static str, String)> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record(&self, op: &'static str, job: &str) {
        self.state.lock().unwrap().calls.push((op, job.to_string()));
    }

    fn require(&self, job: &str) -> Result<()> {
        if self.state.lock().unwrap().existing.contains(job) {
            Ok(())
        } else {
            Err(JenkinsError::NotFound(format!("job {job}")))
        }
    }
}

#[async_trait]
impl JobServer for FakeJobs {
    async fn server_info(&self) -> Result<ServerInfo> {
        let jobs = self.list_jobs().await?;
        Ok(ServerInfo {
            num_executors: 2,
            jobs,
            url: Some("http://jenkins.test/".into()),
        })
    }

    async fn job_exists(&self, job: &str) -> Result<bool> {
        self.record("exists", job);
        Ok(self.state.lock().unwrap().existing.contains(job))
    }

    async fn create_job(&self, job: &str, definition_xml: &str) -> Result<()> {
        self.record("create", job);
        let mut state = self.state.lock().unwrap();
        if !state.existing.insert(job.to_string()) {
            return Err(JenkinsError::AlreadyExists(job.to_string()));
        }
        state
            .created
            .insert(job.to_string(), definition_xml.to_string());
        Ok(())
    }

    async fn trigger_build(&self, job: &str) -> Result<Option<u64>> {
        self.record("trigger", job);
        self.require(job)?;
        Ok(Some(17))
    }

    async fn build_info(&self, job: &str, number: u64) -> Result<BuildInfo> {
        self.require(job)?;
        let state = self.state.lock().unwrap();
        let summary = state
            .builds
            .get(job)
            .and_then(|builds| builds.iter().find(|b| b.number == number))
            .ok_or_else(|| JenkinsError::NotFound(format!("build {job} #{number}")))?;
        Ok(BuildInfo {
            full_display_name: format!("{job} #{number}"),
            number,
            result: summary.result,
            building: summary.result.is_none(),
            url: summary.url.clone(),
            duration: summary.duration,
            parameters: Vec::new(),
        })
    }

    async fn stop_build(&self, job: &str, _number: u64) -> Result<()> {
        self.record("stop", job);
        self.require(job)
    }

    async fn list_jobs(&self) -> Result<Vec<JobSummary>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .existing
            .iter()
            .map(|name| JobSummary {
                name: name.clone(),
                url: format!("http://jenkins.test/job/{name}/"),
                color: Some("blue".into()),
            })
            .collect())
    }

    async fn job_builds(&self, job: &str) -> Result<Vec<BuildSummary>> {
        self.require(job)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .builds
            .get(job)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_job(&self, job: &str) -> Result<()> {
        self.record("delete", job);
        let mut state = self.state.lock().unwrap();
        if state.fail_delete {
            return Err(JenkinsError::Status {
                operation: "delete job",
                status: 500,
            });
        }
        if !state.existing.remove(job) {
            return Err(JenkinsError::NotFound(format!("job {job}")));
        }
        Ok(())
    }

    async fn build_log(
        &self,
        job: &str,
        number: u64,
        start: u64,
        _format: LogFormat,
    ) -> Result<LogPage> {
        self.require(job)?;
        let feed = self.log_feeds.lock().unwrap().get(&number).cloned();
        if let Some(feed) = feed {
            let page = feed.lock().await.recv().await;
            return Ok(page.unwrap_or(LogPage {
                text: String::new(),
                more: false,
                size: start,
            }));
        }
        let mut state = self.state.lock().unwrap();
        state.log_pages.pop_front().unwrap_or(Ok(LogPage {
            text: String::new(),
            more: false,
            size: start,
        }))
    }

    async fn build_stages(&self, job: &str, number: u64) -> Result<serde_json::Value> {
        self.require(job)?;
        Ok(serde_json::json!({ "id": number.to_string(), "stages": [] }))
    }
}

#[derive(Default)]
pub struct FakeCluster {
    pub fail: bool,
    pub deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl Cluster for FakeCluster {
    async fn delete_namespace(&self, namespace: &str) -> std::result::Result<(), ClusterError> {
        self.deleted.lock().unwrap().push(namespace.to_string());
        if self.fail {
            return Err(ClusterError::Failed {
                namespace: namespace.to_string(),
                status: "exit status: 1".into(),
                stderr: "namespaces \"x\" not found".into(),
            });
        }
        Ok(())
    }
}

pub fn test_config() -> ServerConfig {
    ServerConfig::from_lookup(|key| match key {
        "MINIKUBE_URL" => Some("https://cluster.test:8443".into()),
        "SONARQUBE_WEBHOOK_SECRET" => Some("s3cret".into()),
        _ => None,
    })
}

pub fn app_state(jobs: Arc<FakeJobs>, cluster: Arc<FakeCluster>, config: ServerConfig) -> AppState {
    AppState {
        jobs,
        cluster,
        config: Arc::new(config),
    }
}
