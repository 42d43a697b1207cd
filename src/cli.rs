use clap::{Parser, Subcommand};
use std::path::PathBuf;

use forgeissues::config::DEFAULT_CONFIG_FILE;
use forgeissues::types::IssueStatus;

#[derive(Parser, Debug)]
#[command(name = "forgeissues")]
#[command(about = "Work with issues on Forgejo and GitHub from one command line", long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Access token (defaults to the backend's token environment variable)
    #[arg(long)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List issues
    List {
        /// open, closed or all
        #[arg(long, default_value = "open")]
        state: IssueStatus,

        #[arg(long)]
        author: Option<String>,

        #[arg(long)]
        assignee: Option<String>,

        /// Only issues carrying this label (repeatable)
        #[arg(long = "label")]
        labels: Vec<String>,
    },

    /// Show one issue with its labels and assignees
    Show { index: u64 },

    /// Create a new issue
    Create {
        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        body: String,

        #[arg(long = "label")]
        labels: Vec<String>,

        #[arg(long = "assignee")]
        assignees: Vec<String>,

        /// Request a private issue (not supported by any backend)
        #[arg(long)]
        private: bool,
    },

    /// Close an issue
    Close { index: u64 },

    /// Change the title or description of an issue
    Edit {
        index: u64,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        body: Option<String>,
    },

    /// Add labels to an issue
    Label {
        index: u64,
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Add assignees to an issue
    Assign {
        index: u64,
        #[arg(required = true)]
        logins: Vec<String>,
    },

    /// Comment on an issue
    Comment { index: u64, body: String },

    /// Show the comments of an issue
    Comments {
        index: u64,

        /// Only comments whose body matches this regular expression
        #[arg(long)]
        filter: Option<String>,

        #[arg(long)]
        author: Option<String>,

        /// Newest first
        #[arg(long)]
        reverse: bool,
    },
}
