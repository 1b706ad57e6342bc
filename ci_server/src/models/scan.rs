//! SonarQube analysis webhook payload.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub task_id: String,
    pub status: String,
    pub project: AnalysedProject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<AnalysedBranch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_gate: Option<QualityGate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysedProject {
    pub key: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysedBranch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub is_main: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityGate {
    pub status: String,
    #[serde(default)]
    pub conditions: Vec<GateCondition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateCondition {
    pub metric: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_threshold: Option<String>,
}

impl AnalysisReport {
    pub fn gate_status(&self) -> &str {
        self.quality_gate
            .as_ref()
            .map(|gate| gate.status.as_str())
            .unwrap_or("NONE")
    }

    pub fn failed_conditions(&self) -> impl Iterator<Item = &GateCondition> {
        self.quality_gate
            .iter()
            .flat_map(|gate| gate.conditions.iter())
            .filter(|condition| condition.status == "ERROR")
    }
}
