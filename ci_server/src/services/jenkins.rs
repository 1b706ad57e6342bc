//! Jenkins façade: the [`JobServer`] seam and its `reqwest` implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{redirect, Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::config::ServerConfig;
use crate::models::build::{BuildInfo, BuildSummary, LogFormat, LogPage};
use crate::models::job::{JobSummary, ServerInfo};

#[derive(Debug, Error)]
pub enum JenkinsError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("job {0} already exists")]
    AlreadyExists(String),

    #[error("{operation} failed with status {status}")]
    Status { operation: &'static str, status: u16 },

    #[error("{operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid Jenkins URL '{0}'")]
    InvalidUrl(String),
}

pub type Result<T> = std::result::Result<T, JenkinsError>;

/// Lazy, finite stream of console output chunks.
pub type LogChunks = BoxStream<'static, Result<String>>;

/// Poll delay applied between progressive-log requests by default.
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    pub format: LogFormat,
    pub delay: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            delay: DEFAULT_POLL_DELAY,
        }
    }
}

/// Operations the console needs from the job server.
#[async_trait]
pub trait JobServer: Send + Sync {
    async fn server_info(&self) -> Result<ServerInfo>;

    async fn job_exists(&self, job: &str) -> Result<bool>;

    /// Create a job from a job-definition document.
    async fn create_job(&self, job: &str, definition_xml: &str) -> Result<()>;

    /// Queue a build; returns the queue item id when Jenkins reports one.
    async fn trigger_build(&self, job: &str) -> Result<Option<u64>>;

    async fn build_info(&self, job: &str, number: u64) -> Result<BuildInfo>;

    async fn stop_build(&self, job: &str, number: u64) -> Result<()>;

    async fn list_jobs(&self) -> Result<Vec<JobSummary>>;

    async fn job_builds(&self, job: &str) -> Result<Vec<BuildSummary>>;

    async fn delete_job(&self, job: &str) -> Result<()>;

    /// One page of console output starting at byte offset `start`.
    async fn build_log(
        &self,
        job: &str,
        number: u64,
        start: u64,
        format: LogFormat,
    ) -> Result<LogPage>;

    /// Pipeline stage breakdown as reported by the workflow API.
    async fn build_stages(&self, job: &str, number: u64) -> Result<serde_json::Value>;
}

/// Follow a build's console by polling [`JobServer::build_log`].
///
/// Empty pages are skipped; the stream ends once Jenkins stops reporting
/// more data, and after the first error.
pub fn log_stream(
    server: Arc<dyn JobServer>,
    job: String,
    number: u64,
    options: StreamOptions,
) -> LogChunks {
    follow(LogCursor {
        server,
        job,
        number,
        options,
        offset: 0,
        polled: false,
        finished: false,
    })
}

/// Like [`log_stream`], for a caller that already fetched the page at
/// offset zero. That page's text comes first; polling resumes after it.
pub fn log_stream_after(
    server: Arc<dyn JobServer>,
    job: String,
    number: u64,
    first: LogPage,
    options: StreamOptions,
) -> LogChunks {
    let rest = follow(LogCursor {
        server,
        job,
        number,
        options,
        offset: first.size,
        polled: true,
        finished: !first.more,
    });
    let head = (!first.text.is_empty()).then_some(Ok(first.text));
    stream::iter(head).chain(rest).boxed()
}

struct LogCursor {
    server: Arc<dyn JobServer>,
    job: String,
    number: u64,
    options: StreamOptions,
    offset: u64,
    polled: bool,
    finished: bool,
}

fn follow(cursor: LogCursor) -> LogChunks {
    stream::unfold(cursor, |mut cursor| async move {
        loop {
            if cursor.finished {
                return None;
            }
            if cursor.polled {
                tokio::time::sleep(cursor.options.delay).await;
            }
            cursor.polled = true;

            let page = cursor
                .server
                .build_log(
                    &cursor.job,
                    cursor.number,
                    cursor.offset,
                    cursor.options.format,
                )
                .await;
            match page {
                Ok(page) => {
                    cursor.offset = page.size;
                    cursor.finished = !page.more;
                    if !page.text.is_empty() {
                        return Some((Ok(page.text), cursor));
                    }
                }
                Err(e) => {
                    cursor.finished = true;
                    return Some((Err(e), cursor));
                }
            }
        }
    })
    .boxed()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Crumb {
    crumb: String,
    crumb_request_field: String,
}

#[derive(Deserialize)]
struct JobList {
    #[serde(default)]
    jobs: Vec<JobSummary>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildHistory {
    #[serde(default)]
    all_builds: Vec<BuildSummary>,
}

/// Jenkins REST client. Cheap to clone; built once at startup.
#[derive(Clone, Debug)]
pub struct JenkinsClient {
    http: Client,
    base: Url,
    username: Option<String>,
    secret: Option<String>,
}

impl JenkinsClient {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let base = parse_base_url(&config.jenkins_url)?;

        // Redirects are answers here (stop and delete reply 302), and the
        // cookie store keeps the session a crumb is bound to.
        let mut builder = Client::builder()
            .redirect(redirect::Policy::none())
            .cookie_store(true)
            .user_agent(concat!("deploy-console/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = config.jenkins_connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        let http = builder.build().map_err(|source| JenkinsError::Transport {
            operation: "build http client",
            source,
        })?;

        let username = Some(config.jenkins_username.clone()).filter(|u| !u.is_empty());
        Ok(Self {
            http,
            base,
            username,
            secret: config.jenkins_secret().map(str::to_string),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| JenkinsError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn job_url(&self, job: &str, rest: &[&str]) -> Result<Url> {
        let mut segments = vec!["job", job];
        segments.extend_from_slice(rest);
        self.url(&segments)
    }

    fn build_url(&self, job: &str, number: u64, rest: &[&str]) -> Result<Url> {
        let number = number.to_string();
        let mut segments = vec!["job", job, number.as_str()];
        segments.extend_from_slice(rest);
        self.url(&segments)
    }

    async fn send(&self, operation: &'static str, request: RequestBuilder) -> Result<Response> {
        let request = match &self.username {
            Some(user) => request.basic_auth(user, self.secret.as_deref()),
            None => request,
        };
        request.send().await.map_err(|source| {
            crate::metrics::upstream_failure(operation);
            JenkinsError::Transport { operation, source }
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: Url,
        missing: impl FnOnce() -> String,
    ) -> Result<T> {
        let response = self.send(operation, self.http.get(url)).await?;
        let response = expect_success(operation, response, missing)?;
        response
            .json()
            .await
            .map_err(|source| JenkinsError::Transport { operation, source })
    }

    /// Fetch a CSRF crumb. Servers with the crumb issuer disabled answer 404.
    async fn crumb(&self) -> Result<Option<Crumb>> {
        let url = self.url(&["crumbIssuer", "api", "json"])?;
        let response = self.send("fetch crumb", self.http.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = expect_success("fetch crumb", response, String::new)?;
        response
            .json()
            .await
            .map(Some)
            .map_err(|source| JenkinsError::Transport {
                operation: "fetch crumb",
                source,
            })
    }

    async fn post(&self, url: Url) -> Result<RequestBuilder> {
        let request = self.http.post(url);
        Ok(match self.crumb().await? {
            Some(crumb) => request.header(crumb.crumb_request_field, crumb.crumb),
            None => request,
        })
    }
}

#[async_trait]
impl JobServer for JenkinsClient {
    async fn server_info(&self) -> Result<ServerInfo> {
        let mut url = self.url(&["api", "json"])?;
        url.query_pairs_mut()
            .append_pair("tree", "numExecutors,url,jobs[name,url,color]");
        self.get_json("server info", url, || "Jenkins root".to_string())
            .await
    }

    async fn job_exists(&self, job: &str) -> Result<bool> {
        let mut url = self.job_url(job, &["api", "json"])?;
        url.query_pairs_mut().append_pair("tree", "name");
        let response = self.send("check job", self.http.get(url)).await?;
        match expect_success("check job", response, String::new) {
            Ok(_) => Ok(true),
            Err(JenkinsError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_job(&self, job: &str, definition_xml: &str) -> Result<()> {
        let mut url = self.url(&["createItem"])?;
        url.query_pairs_mut().append_pair("name", job);
        let request = self
            .post(url)
            .await?
            .header(CONTENT_TYPE, "application/xml")
            .body(definition_xml.to_string());
        let response = self.send("create job", request).await?;

        if response.status() == StatusCode::BAD_REQUEST {
            let reported = response
                .headers()
                .get("x-error")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let reported = match reported {
                Some(text) => text,
                None => response.text().await.unwrap_or_default(),
            };
            if reported.contains("already exists") {
                return Err(JenkinsError::AlreadyExists(job.to_string()));
            }
            crate::metrics::upstream_failure("create job");
            return Err(JenkinsError::Status {
                operation: "create job",
                status: StatusCode::BAD_REQUEST.as_u16(),
            });
        }
        expect_accepted("create job", response, || format!("job {job}"))?;
        Ok(())
    }

    async fn trigger_build(&self, job: &str) -> Result<Option<u64>> {
        let url = self.job_url(job, &["build"])?;
        let request = self.post(url).await?;
        let response = self.send("trigger build", request).await?;
        let response = expect_accepted("trigger build", response, || format!("job {job}"))?;
        Ok(response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(queue_item_id))
    }

    async fn build_info(&self, job: &str, number: u64) -> Result<BuildInfo> {
        let mut url = self.build_url(job, number, &["api", "json"])?;
        url.query_pairs_mut().append_pair(
            "tree",
            "fullDisplayName,number,result,building,url,duration,actions[parameters[name,value]]",
        );
        self.get_json("build status", url, || format!("build {job} #{number}"))
            .await
    }

    async fn stop_build(&self, job: &str, number: u64) -> Result<()> {
        let url = self.build_url(job, number, &["stop"])?;
        let request = self.post(url).await?;
        let response = self.send("stop build", request).await?;
        expect_accepted("stop build", response, || format!("build {job} #{number}"))?;
        Ok(())
    }

    async fn list_jobs(&self) -> Result<Vec<JobSummary>> {
        let mut url = self.url(&["api", "json"])?;
        url.query_pairs_mut()
            .append_pair("tree", "jobs[name,url,color]");
        let list: JobList = self
            .get_json("list jobs", url, || "Jenkins root".to_string())
            .await?;
        Ok(list.jobs)
    }

    async fn job_builds(&self, job: &str) -> Result<Vec<BuildSummary>> {
        let mut url = self.job_url(job, &["api", "json"])?;
        url.query_pairs_mut()
            .append_pair("tree", "allBuilds[number,result,duration,url]");
        let history: BuildHistory = self
            .get_json("list builds", url, || format!("job {job}"))
            .await?;
        Ok(history.all_builds)
    }

    async fn delete_job(&self, job: &str) -> Result<()> {
        let url = self.job_url(job, &["doDelete"])?;
        let request = self.post(url).await?;
        let response = self.send("delete job", request).await?;
        expect_accepted("delete job", response, || format!("job {job}"))?;
        Ok(())
    }

    async fn build_log(
        &self,
        job: &str,
        number: u64,
        start: u64,
        format: LogFormat,
    ) -> Result<LogPage> {
        let mut url = self.build_url(job, number, &["logText", format.endpoint()])?;
        url.query_pairs_mut()
            .append_pair("start", &start.to_string());
        let response = self.send("fetch log", self.http.get(url)).await?;
        let response = expect_success("fetch log", response, || format!("build {job} #{number}"))?;

        let headers = response.headers();
        let size = headers
            .get("x-text-size")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(start);
        let more = headers
            .get("x-more-data")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        let text = response
            .text()
            .await
            .map_err(|source| JenkinsError::Transport {
                operation: "fetch log",
                source,
            })?;
        Ok(LogPage { text, more, size })
    }

    async fn build_stages(&self, job: &str, number: u64) -> Result<serde_json::Value> {
        let url = self.build_url(job, number, &["wfapi", "describe"])?;
        self.get_json("build stages", url, || format!("build {job} #{number}"))
            .await
    }
}

/// Accept `host:port` as shorthand for `http://host:port`.
fn parse_base_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    let mut url =
        Url::parse(&with_scheme).map_err(|_| JenkinsError::InvalidUrl(raw.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(JenkinsError::InvalidUrl(raw.to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// `…/queue/item/42/` → `42`
fn queue_item_id(location: &str) -> Option<u64> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|id| id.parse().ok())
}

fn expect_success(
    operation: &'static str,
    response: Response,
    missing: impl FnOnce() -> String,
) -> Result<Response> {
    check_status(operation, response, missing, StatusCode::is_success)
}

/// Like [`expect_success`], but redirects count as success.
fn expect_accepted(
    operation: &'static str,
    response: Response,
    missing: impl FnOnce() -> String,
) -> Result<Response> {
    check_status(operation, response, missing, |status| {
        status.is_success() || status.is_redirection()
    })
}

fn check_status(
    operation: &'static str,
    response: Response,
    missing: impl FnOnce() -> String,
    ok: impl Fn(&StatusCode) -> bool,
) -> Result<Response> {
    let status = response.status();
    if ok(&status) {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(JenkinsError::NotFound(missing()));
    }
    crate::metrics::upstream_failure(operation);
    tracing::warn!(operation, status = status.as_u16(), "Jenkins call failed");
    Err(JenkinsError::Status {
        operation,
        status: status.as_u16(),
    })
}
