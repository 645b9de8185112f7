//! objstore - command-line client for S3-compatible object stores.
//!
//! # Usage
//!
//! ```text
//! objstore ls s3://
//! objstore put ./report.pdf s3://docs/2024/report.pdf
//! objstore sync-up ./site s3://www --force
//! OBJSTORE_ENDPOINT=localhost:9000 objstore --path-style --insecure ls s3://bucket/dir
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OBJSTORE_ENDPOINT` | `s3.amazonaws.com` | Service host |
//! | `OBJSTORE_REGION` | `us-east-1` | Signing region |
//! | `OBJSTORE_PATH_STYLE` | `false` | Force path-style addressing |
//! | `OBJSTORE_USE_HTTPS` | `true` | Use HTTPS |
//! | `OBJSTORE_SIGNATURE_VERSION` | `v4` | `v2` or `v4` |
//! | `OBJSTORE_MAX_RETRIES` | `3` | Retries per request |
//! | `OBJSTORE_CONCURRENCY` | `3` | Parts in flight |
//! | `OBJSTORE_MIN_PART_SIZE` | `5242880` | Multipart threshold |
//! | `OBJSTORE_DEBUG` | `false` | Trace every request |
//! | `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` | *(required)* | Credentials |
//! | `AWS_SESSION_TOKEN` | *(unset)* | Session token |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

mod cli;
mod commands;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use objstore_auth::EnvCredentialProvider;
use objstore_client::{ClientConfig, ObjectStoreClient};
use objstore_fs::StreamWrapper;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to `log_level`.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    let config = cli.connection.apply(ClientConfig::from_env());
    debug!(
        endpoint = %config.endpoint,
        region = %config.region,
        addressing = ?config.addressing_style,
        signature = ?config.signature_version,
        "client configuration"
    );

    let client = ObjectStoreClient::connect(config, Arc::new(EnvCredentialProvider))
        .await
        .context("failed to create object-store client")?;
    let fs = StreamWrapper::new(client);

    commands::run(&fs, cli.command).await
}
