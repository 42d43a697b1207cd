mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use forgeissues::config::ProjectConfig;
use forgeissues::types::CommentFilter;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("forgeissues=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    let config = ProjectConfig::load(&cli.config)?;
    let (owner, repo) = config.owner_and_repo()?;
    let token = config.resolve_token(cli.token.clone());
    let service = config
        .service(token.as_deref())
        .context("Failed to connect to the backend")?;
    debug!(backend = %config.backend, instance = service.instance_url(), owner, repo, "using project");

    let project = service.project(owner, repo);

    match cli.command {
        Commands::List {
            state,
            author,
            assignee,
            labels,
        } => {
            commands::list(&project, state, author, assignee, labels).await?;
        }

        Commands::Show { index } => {
            commands::show(&project, index).await?;
        }

        Commands::Create {
            title,
            body,
            labels,
            assignees,
            private,
        } => {
            commands::create(&project, title, body, labels, assignees, private).await?;
        }

        Commands::Close { index } => {
            commands::close(&project, index).await?;
        }

        Commands::Edit { index, title, body } => {
            commands::edit(&project, index, title, body).await?;
        }

        Commands::Label { index, names } => {
            commands::label(&project, index, names).await?;
        }

        Commands::Assign { index, logins } => {
            commands::assign(&project, index, logins).await?;
        }

        Commands::Comment { index, body } => {
            commands::comment(&project, index, &body).await?;
        }

        Commands::Comments {
            index,
            filter,
            author,
            reverse,
        } => {
            let filter = CommentFilter {
                filter_regex: filter,
                author,
                reverse,
            };
            commands::comments(&project, index, filter).await?;
        }
    }

    Ok(())
}
