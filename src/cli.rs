//! Command-line argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Pylon Workbench - inspect, publish and tail Pylon bot deployments.
#[derive(Parser, Debug, Clone)]
#[command(name = "pylon-workbench")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "PYLON_CONFIG")]
    pub config: Option<PathBuf>,

    /// API token. Overrides the configuration file.
    #[arg(short, long, env = "PYLON_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Default deployment ID. Overrides the configuration file.
    #[arg(short, long, env = "PYLON_DEPLOYMENT_ID")]
    pub deployment: Option<String>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Show the account the token belongs to.
    User,

    /// List every guild the account is in.
    Guilds,

    /// List the guilds the account can edit with Pylon.
    EditableGuilds,

    /// Show a guild and its deployments.
    Guild {
        /// Guild ID.
        id: String,
    },

    /// Show computational statistics of a guild.
    Stats {
        /// Guild ID.
        id: String,
    },

    /// Show a deployment.
    Deployment {
        /// Deployment ID. Defaults to the configured deployment.
        id: Option<String>,
    },

    /// Publish a single-file script to a deployment.
    Publish {
        /// Bundled script to publish.
        file: PathBuf,

        /// Deployment ID. Defaults to the configured deployment.
        id: Option<String>,
    },

    /// List the KV namespaces of a deployment.
    Namespaces {
        /// Deployment ID. Defaults to the configured deployment.
        id: Option<String>,
    },

    /// List the items of a KV namespace.
    Items {
        /// Namespace title.
        namespace: String,

        /// Deployment ID. Defaults to the configured deployment.
        id: Option<String>,
    },

    /// Follow a deployment's console output until interrupted.
    Tail {
        /// Deployment ID. Defaults to the configured deployment.
        id: Option<String>,
    },
}
