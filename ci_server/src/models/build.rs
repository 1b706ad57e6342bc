//! Build records, log pages and the query parameters that select them.

use serde::{Deserialize, Serialize};

/// Final result Jenkins reports for a finished build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildResult {
    Success,
    Failure,
    Aborted,
    Unstable,
    NotBuilt,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildParameter {
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// One execution of a job. `result` is `None` while the build runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawBuildInfo")]
pub struct BuildInfo {
    pub full_display_name: String,
    pub number: u64,
    pub result: Option<BuildResult>,
    pub building: bool,
    pub url: String,
    /// Milliseconds; zero until the build finishes.
    pub duration: u64,
    pub parameters: Vec<BuildParameter>,
}

impl BuildInfo {
    pub fn in_progress(&self) -> bool {
        self.building || self.result.is_none()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBuildInfo {
    #[serde(default)]
    full_display_name: String,
    number: u64,
    #[serde(default)]
    result: Option<BuildResult>,
    #[serde(default)]
    building: bool,
    #[serde(default)]
    url: String,
    #[serde(default)]
    duration: u64,
    #[serde(default)]
    parameters: Option<Vec<BuildParameter>>,
    #[serde(default)]
    actions: Vec<Option<RawAction>>,
}

#[derive(Deserialize)]
struct RawAction {
    #[serde(default)]
    parameters: Vec<BuildParameter>,
}

impl From<RawBuildInfo> for BuildInfo {
    fn from(raw: RawBuildInfo) -> Self {
        // Jenkins nests parameters under a ParametersAction; our own
        // serialized form carries them at the top level.
        let parameters = raw.parameters.unwrap_or_else(|| {
            raw.actions
                .into_iter()
                .flatten()
                .flat_map(|action| action.parameters)
                .collect()
        });
        Self {
            full_display_name: raw.full_display_name,
            number: raw.number,
            result: raw.result,
            building: raw.building,
            url: raw.url,
            duration: raw.duration,
            parameters,
        }
    }
}

/// Entry of a job's build history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSummary {
    pub number: u64,
    #[serde(default)]
    pub result: Option<BuildResult>,
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub url: String,
}

/// Rendering of the console log requested from Jenkins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Html,
}

impl LogFormat {
    /// Path segment of the progressive log endpoint.
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Text => "progressiveText",
            Self::Html => "progressiveHtml",
        }
    }
}

/// One page of console output starting at a byte offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPage {
    pub text: String,
    /// Whether the build is still producing output.
    pub more: bool,
    /// Offset to resume from.
    pub size: u64,
}

/// `?start=&type=&meta=` on the log page route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogQuery {
    #[serde(default)]
    pub start: Option<u64>,
    #[serde(default, rename = "type")]
    pub format: Option<LogFormat>,
    #[serde(default)]
    pub meta: Option<bool>,
}

/// `?type=&delay=` on the streaming log route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamQuery {
    #[serde(default, rename = "type")]
    pub format: Option<LogFormat>,
    /// Poll delay in milliseconds.
    #[serde(default)]
    pub delay: Option<u64>,
}
