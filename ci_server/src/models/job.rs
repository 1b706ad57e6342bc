//! Job-level views of the Jenkins API.

use serde::{Deserialize, Serialize};

use super::build::BuildSummary;

/// One row of the Jenkins job listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub name: String,
    pub url: String,
    /// Ball colour, e.g. `blue`, `red_anime`; folders have none.
    #[serde(default)]
    pub color: Option<String>,
}

/// Top-level overview returned by `GET /api/json` on the Jenkins root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub num_executors: u32,
    #[serde(default)]
    pub jobs: Vec<JobSummary>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A job together with its full build history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobWithBuilds {
    #[serde(flatten)]
    pub job: JobSummary,
    pub builds: Vec<BuildSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_info_reads_jenkins_shape() {
        let raw = r#"{
            "_class": "hudson.model.Hudson",
            "numExecutors": 2,
            "jobs": [
                {"_class": "org.jenkinsci.plugins.workflow.job.WorkflowJob", "name": "deploy-shop", "url": "http://jenkins/job/deploy-shop/", "color": "blue"},
                {"_class": "com.cloudbees.hudson.plugins.folder.Folder", "name": "team", "url": "http://jenkins/job/team/"}
            ],
            "url": null
        }"#;
        let info: ServerInfo = serde_json::from_str(raw).unwrap();
        assert_eq!(info.num_executors, 2);
        assert_eq!(info.jobs.len(), 2);
        assert_eq!(info.jobs[0].color.as_deref(), Some("blue"));
        assert_eq!(info.jobs[1].color, None);
        assert_eq!(info.url, None);
    }

    #[test]
    fn job_with_builds_flattens_summary() {
        let row = JobWithBuilds {
            job: JobSummary {
                name: "deploy-shop".into(),
                url: "http://jenkins/job/deploy-shop/".into(),
                color: Some("red".into()),
            },
            builds: vec![],
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["name"], "deploy-shop");
        assert_eq!(json["color"], "red");
        assert!(json["builds"].as_array().unwrap().is_empty());
    }
}
