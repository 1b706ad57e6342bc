use std::collections::BTreeMap;

use clap::{Parser, Subcommand};
use deploy_pipeline::{
    generate_pipeline, generate_scan_pipeline, job_definition_xml, DeployJob, PipelineSettings,
    ProjectType, ScanJob,
};
use eyre::WrapErr;

#[derive(Parser)]
#[command(name = "deploy-pipeline", about = "Render deploy-console Jenkins pipelines")]
struct Cli {
    /// Wrap the script in a Jenkins job-definition document
    #[arg(long, global = true)]
    xml: bool,

    /// Cluster API endpoint used by kubectl inside the pipeline
    #[arg(long, global = true, env = "MINIKUBE_URL")]
    cluster_url: Option<String>,

    /// SonarQube server passed to the scanner
    #[arg(long, global = true, env = "SONARQUBE_URL")]
    sonar_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Deploy an existing image to the cluster
    Deploy {
        #[arg(long)]
        job: String,
        #[arg(long)]
        image: String,
        #[arg(long = "project-type")]
        project_type: ProjectType,
        /// Container environment as KEY=VALUE, repeatable
        #[arg(long = "env", value_parser = parse_env_pair)]
        env: Vec<(String, String)>,
    },
    /// Check out, build and analyse a repository
    Scan {
        #[arg(long)]
        job: String,
        #[arg(long = "git-url")]
        git_url: String,
        #[arg(long = "build-path", default_value = ".")]
        build_path: String,
        #[arg(long = "project-type")]
        project_type: ProjectType,
    },
}

fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let Cli {
        xml,
        cluster_url,
        sonar_url,
        command,
    } = Cli::parse();

    let mut settings = PipelineSettings::default();
    if let Some(url) = cluster_url {
        settings.cluster_url = url;
    }
    settings.sonar_host_url = sonar_url;

    let script = match command {
        Command::Deploy {
            job,
            image,
            project_type,
            env,
        } => {
            let env: BTreeMap<String, String> = env.into_iter().collect();
            let job = DeployJob {
                job_name: job,
                image,
                project_type,
                env,
            };
            generate_pipeline(&job, &settings).wrap_err("rendering deploy pipeline")?
        }
        Command::Scan {
            job,
            git_url,
            build_path,
            project_type,
        } => {
            let job = ScanJob {
                job_name: job,
                git_url,
                build_path,
                project_type,
            };
            generate_scan_pipeline(&job, &settings).wrap_err("rendering scan pipeline")?
        }
    };

    if xml {
        println!("{}", job_definition_xml(&script));
    } else {
        print!("{script}");
    }
    Ok(())
}
