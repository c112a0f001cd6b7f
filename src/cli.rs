use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// httpcall: declarative HTTP calls with secret placeholders
#[derive(Parser)]
#[command(name = "httpcall", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a request file, store extracted secrets and print the outcome
    Run {
        /// YAML request description
        #[arg(short, long)]
        request: PathBuf,

        #[command(flatten)]
        secrets: SecretsArg,

        /// Previous response (JSON) for `{{jq}}` placeholders
        #[arg(long)]
        prior: Option<PathBuf>,

        #[command(flatten)]
        owner: OwnerArgs,
    },

    /// Substitute secret placeholders in a file and print the result
    Render {
        /// File to render
        input: PathBuf,

        #[command(flatten)]
        secrets: SecretsArg,
    },

    /// Evaluate an expected-response query against a response file
    Check {
        /// Boolean query, e.g. '.statusCode == 200'
        #[arg(short, long)]
        query: String,

        /// Response as JSON: {"statusCode": .., "body": "..", "headers": {..}}
        #[arg(long)]
        response: PathBuf,
    },
}

#[derive(Args)]
pub struct SecretsArg {
    /// Secret snapshot file (YAML); created on first write
    #[arg(short, long, env = "HTTPCALL_SECRETS", default_value = "secrets.yaml")]
    pub secrets: PathBuf,
}

#[derive(Args)]
pub struct OwnerArgs {
    /// Kind of the resource owning created secrets
    #[arg(long, requires_all = ["owner_name", "owner_uid"])]
    pub owner_kind: Option<String>,
    #[arg(long, requires = "owner_kind")]
    pub owner_name: Option<String>,
    #[arg(long, requires = "owner_kind")]
    pub owner_uid: Option<String>,
}
