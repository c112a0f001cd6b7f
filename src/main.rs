use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use httpcall::diagnostics::TracingSink;
use httpcall::engine::{is_expected, patch_secrets_into_string};
use httpcall::executor::RequestExecutor;
use httpcall::models::{DesiredRequest, HttpResponse};
use httpcall::query::QueryEngine;
use httpcall::transport::UpstreamClient;
use httpcall::vault::{snapshot, OwnerRef};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = httpcall::config::load()?;

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "httpcall=info".into()),
    );
    let (fmt_layer, json_layer) = if cfg.log_json {
        (None, Some(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)), None)
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(json_layer)
        .init();

    let args = cli::Cli::parse();

    match args.command {
        cli::Commands::Run {
            request,
            secrets,
            prior,
            owner,
        } => {
            let owner = match (owner.owner_kind, owner.owner_name, owner.owner_uid) {
                (Some(kind), Some(name), Some(uid)) => Some(OwnerRef { kind, name, uid }),
                _ => None,
            };
            handle_run(&cfg, &request, &secrets.secrets, prior.as_deref(), owner).await
        }
        cli::Commands::Render { input, secrets } => handle_render(&input, &secrets.secrets).await,
        cli::Commands::Check { query, response } => handle_check(&query, &response),
    }
}

async fn handle_run(
    cfg: &httpcall::config::Config,
    request_path: &Path,
    secrets_path: &Path,
    prior_path: Option<&Path>,
    owner: Option<OwnerRef>,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(request_path)
        .with_context(|| format!("failed to read {}", request_path.display()))?;
    let request: DesiredRequest = serde_yaml::from_str(&raw)
        .with_context(|| format!("invalid request file {}", request_path.display()))?;
    let prior = prior_path.map(read_response).transpose()?;

    let store = Arc::new(snapshot::load(secrets_path)?);
    let client = Arc::new(UpstreamClient::new(cfg)?);
    let executor = RequestExecutor::new(
        store.clone(),
        client,
        QueryEngine::default(),
        Arc::new(TracingSink),
    );

    let outcome = executor
        .execute(&request, prior.as_ref(), owner.as_ref())
        .await?;

    snapshot::save(secrets_path, &store)?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn handle_render(input: &Path, secrets_path: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let store = snapshot::load(secrets_path)?;
    let rendered = patch_secrets_into_string(&store, &text).await?;
    print!("{}", rendered);
    Ok(())
}

fn handle_check(query: &str, response_path: &Path) -> anyhow::Result<()> {
    let response = read_response(response_path)?;
    let expected = is_expected(&QueryEngine::default(), query, Some(&response))?;
    println!("{}", if expected { "expected" } else { "not expected" });
    if !expected {
        std::process::exit(1);
    }
    Ok(())
}

fn read_response(path: &Path) -> anyhow::Result<HttpResponse> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid response file {}", path.display()))
}
