//! Supported project types and the deploy profile each one implies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectType {
    DotNetCore,
    NodeJs,
}

impl ProjectType {
    /// Lower-case slug used for workload and service names.
    pub fn slug(self) -> &'static str {
        match self {
            Self::DotNetCore => "dotnetcore",
            Self::NodeJs => "nodejs",
        }
    }

    /// Port the application listens on inside its container.
    pub fn container_port(self) -> u16 {
        match self {
            Self::DotNetCore => 8080,
            Self::NodeJs => 3000,
        }
    }

    /// Title of the deploy stage in the generated pipeline.
    pub fn deploy_stage_title(self) -> &'static str {
        match self {
            Self::DotNetCore => "Deploy .NET Core Web App To Kubernetes",
            Self::NodeJs => "Deploy Node.js Web App To Kubernetes",
        }
    }

    /// Shell command that builds the project from its source tree.
    pub fn build_command(self) -> &'static str {
        match self {
            Self::DotNetCore => "dotnet build --configuration Release",
            Self::NodeJs => "npm ci && npm run build --if-present",
        }
    }

    pub fn app_name(self) -> String {
        format!("{}-app", self.slug())
    }

    pub fn container_name(self) -> String {
        format!("{}-container", self.slug())
    }

    pub fn service_name(self) -> String {
        format!("{}-service", self.slug())
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DotNetCore => "DotNetCore",
            Self::NodeJs => "NodeJs",
        })
    }
}

impl FromStr for ProjectType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DotNetCore" => Ok(Self::DotNetCore),
            "NodeJs" => Ok(Self::NodeJs),
            other => Err(PipelineError::invalid(
                "projectType",
                format!("unsupported project type '{other}' (expected DotNetCore or NodeJs)"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_types() {
        assert_eq!("DotNetCore".parse::<ProjectType>().unwrap(), ProjectType::DotNetCore);
        assert_eq!("NodeJs".parse::<ProjectType>().unwrap(), ProjectType::NodeJs);
    }

    #[test]
    fn rejects_unknown_type() {
        let err = "Python".parse::<ProjectType>().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidArgument { field: "projectType", .. }
        ));
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for t in [ProjectType::DotNetCore, ProjectType::NodeJs] {
            assert_eq!(t.to_string().parse::<ProjectType>().unwrap(), t);
        }
    }
}
