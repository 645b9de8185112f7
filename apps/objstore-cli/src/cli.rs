//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use objstore_client::config::{AddressingStyle, ClientConfig, SignatureVersion};

/// Command-line client for S3-compatible object stores.
///
/// Objects are addressed as `s3://bucket/key`. Connection settings default to the
/// `OBJSTORE_*` environment variables; credentials are read from
/// `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and `AWS_SESSION_TOKEN`.
#[derive(Debug, Parser)]
#[command(name = "objstore", version)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Log level filter, overridden by `RUST_LOG`.
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Overrides of the environment configuration.
#[derive(Debug, Args)]
pub struct ConnectionArgs {
    /// Service host, optionally with a port.
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Signing region.
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Always use path-style addressing.
    #[arg(long, global = true)]
    pub path_style: bool,

    /// Use plain HTTP.
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Signature version.
    #[arg(long, value_enum, global = true)]
    pub signature: Option<Signature>,
}

/// Signature version flag values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Signature {
    V2,
    V4,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List buckets, or the entries below a path.
    Ls {
        /// `s3://` for buckets, `s3://bucket[/prefix]` for keys.
        url: String,
    },
    /// Show size and type of a path.
    Stat { url: String },
    /// Download an object, resuming a partial local file.
    Get { url: String, path: PathBuf },
    /// Upload a file, in parts when it is large.
    Put { path: PathBuf, url: String },
    /// Delete an object.
    Rm { url: String },
    /// Rename an object or directory.
    Mv { from: String, to: String },
    /// Create a bucket or a directory marker.
    Mb { url: String },
    /// Remove an empty bucket or directory.
    Rb { url: String },
    /// Upload a local directory tree.
    SyncUp {
        dir: PathBuf,
        /// `s3://bucket[/prefix]`.
        url: String,
        /// Upload unchanged files too.
        #[arg(long)]
        force: bool,
    },
    /// Download a key prefix into a local directory.
    SyncDown {
        /// `s3://bucket[/prefix]`.
        url: String,
        dir: PathBuf,
        /// Download unchanged files too.
        #[arg(long)]
        force: bool,
    },
    /// Print a presigned GET URL.
    Presign {
        url: String,
        /// Validity in seconds.
        #[arg(long, default_value_t = 3600)]
        expires: u64,
    },
}

impl ConnectionArgs {
    /// Apply the flags on top of `config`.
    pub fn apply(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint.clone_from(endpoint);
        }
        if let Some(region) = &self.region {
            config.region.clone_from(region);
        }
        if self.path_style {
            config.addressing_style = AddressingStyle::Path;
        }
        if self.insecure {
            config.use_https = false;
        }
        if let Some(signature) = self.signature {
            config.signature_version = match signature {
                Signature::V2 => SignatureVersion::V2,
                Signature::V4 => SignatureVersion::V4,
            };
        }
        config
    }
}
