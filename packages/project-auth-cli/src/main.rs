// Operator CLI for ad-hoc project membership queries

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use project_auth::{
    AuthConfig, HttpCredentialSource, ProjectDirectoryClient, ProjectGroup, RemoteCallExecutor,
    ReqwestTransport, ServiceIdentity, TokenStore,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "project-auth", about = "Query project membership from the authorization API")]
struct Cli {
    /// Service code whose credential is used for the calls
    #[arg(long, global = true, default_value = "pipeline")]
    service: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the users of a project
    Users {
        project: String,
        #[arg(long)]
        group: Option<String>,
    },
    /// List a project's role groups with their members
    Groups { project: String },
    /// List the project codes a user belongs to
    Projects { user: String },
    /// Check whether a user belongs to a project
    IsMember {
        user: String,
        project: String,
        #[arg(long)]
        group: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,project_auth=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = AuthConfig::from_env().context("Failed to load configuration")?;
    tracing::info!(base_url = %config.base_url, "Configuration loaded");

    let directory = build_directory(config)?;
    let identity = ServiceIdentity::new(cli.service);

    let output = match cli.command {
        Command::Users { project, group } => {
            let group = group.as_deref().map(ProjectGroup::parse);
            let users = directory
                .list_project_users(&identity, &project, group.as_ref())
                .await
                .with_context(|| format!("Failed to list users of project {}", project))?;
            serde_json::to_string_pretty(&users)?
        }
        Command::Groups { project } => {
            let groups = directory
                .list_project_groups_with_users(&identity, &project)
                .await
                .with_context(|| format!("Failed to list groups of project {}", project))?;
            serde_json::to_string_pretty(&groups)?
        }
        Command::Projects { user } => {
            let codes = directory
                .list_user_project_codes(&identity, &user)
                .await
                .with_context(|| format!("Failed to list projects of user {}", user))?;
            serde_json::to_string_pretty(&codes)?
        }
        Command::IsMember {
            user,
            project,
            group,
        } => {
            let group = group.as_deref().map(ProjectGroup::parse);
            let member = directory
                .is_project_user(&identity, &user, &project, group.as_ref())
                .await
                .with_context(|| format!("Failed to check membership of {} in {}", user, project))?;
            serde_json::to_string_pretty(&member)?
        }
    };

    println!("{}", output);
    Ok(())
}

fn build_directory(config: AuthConfig) -> Result<ProjectDirectoryClient> {
    let transport =
        Arc::new(ReqwestTransport::from_config(&config).context("Failed to create HTTP client")?);
    let source = HttpCredentialSource::new(config.clone(), transport.clone());
    let tokens = TokenStore::new(Arc::new(source));

    Ok(ProjectDirectoryClient::new(RemoteCallExecutor::new(
        config, transport, tokens,
    )))
}
