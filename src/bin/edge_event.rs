use std::{io::{self, stdout, Write}, path::PathBuf};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use edge_oidc_gateway::{handle_event, ClientConfig, CloudFrontEvent, ConfigSource, Gateway, ProcessEnv};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
struct Args {
  /// Where the client registration comes from
  #[arg(long, value_enum, default_value_t = Config::Env)]
  config: Config,
  /// Read the event from this file instead of stdin
  #[arg(long)]
  event: Option<PathBuf>
}

#[derive(ValueEnum, Clone, Copy)]
enum Config {
  /// CLIENT_ID, CLIENT_SECRET, DOMAIN and IDP_METADATA_URL from the environment
  Env,
  /// The origin custom headers of the event
  Origin,
}

/// Runs a Lambda@Edge viewer request event from stdin through the gateway
/// and prints the request or response CloudFront should continue with
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
  // logs go to stderr so stdout stays valid json
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
    )
    .with_writer(io::stderr)
    .init();

  let Args { config, event } = Args::parse();

  let config = match config {
    Config::Env => ConfigSource::Fixed(ClientConfig::from_source(&ProcessEnv)?),
    Config::Origin => ConfigSource::OriginHeaders
  };
  let gateway = Gateway::from_source(&ProcessEnv, config)?;

  let event: CloudFrontEvent = match event {
    Some(path) => serde_json::from_slice(
      &std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?
    )?,
    None => serde_json::from_reader(io::stdin().lock())?
  };

  let result = handle_event(&gateway, event).await?;

  let mut out = stdout().lock();
  serde_json::to_writer(&mut out, &result)?;
  writeln!(out)?;

  Ok(())
}
