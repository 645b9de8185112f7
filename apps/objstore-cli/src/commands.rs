//! Subcommand implementations.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use http::Method;
use objstore_client::transfer::{SyncOptions, TransferOptions};
use objstore_fs::{ObjectUrl, StreamWrapper};
use tracing::info;

use crate::cli::Command;

/// Run one subcommand against `fs`.
pub async fn run(fs: &StreamWrapper, command: Command) -> Result<()> {
    match command {
        Command::Ls { url } => list(fs, &url).await,
        Command::Stat { url } => {
            let stat = fs.stat(&url).await.with_context(|| format!("stat {url}"))?;
            println!("{url}: mode {:o}, {} bytes", stat.mode, stat.size);
            if let Some(modified) = stat.modified {
                println!("modified {}", modified.to_rfc3339());
            }
            Ok(())
        }
        Command::Get { url, path } => get(fs, &url, &path).await,
        Command::Put { path, url } => put(fs, &path, &url).await,
        Command::Rm { url } => fs.unlink(&url).await.with_context(|| format!("rm {url}")),
        Command::Mv { from, to } => fs
            .rename(&from, &to)
            .await
            .with_context(|| format!("mv {from} {to}")),
        Command::Mb { url } => fs.mkdir(&url).await.with_context(|| format!("mb {url}")),
        Command::Rb { url } => fs.rmdir(&url).await.with_context(|| format!("rb {url}")),
        Command::SyncUp { dir, url, force } => {
            let (bucket, options) = sync_target(fs, &url, force)?;
            let report = fs
                .client()
                .upload_directory(&dir, &bucket, &options)
                .await
                .with_context(|| format!("sync {} to {url}", dir.display()))?;
            info!(
                uploaded = report.transferred.len(),
                skipped = report.skipped.len(),
                "sync finished"
            );
            Ok(())
        }
        Command::SyncDown { url, dir, force } => {
            let (bucket, options) = sync_target(fs, &url, force)?;
            let report = fs
                .client()
                .download_directory(&bucket, &dir, &options)
                .await
                .with_context(|| format!("sync {url} to {}", dir.display()))?;
            info!(
                downloaded = report.transferred.len(),
                skipped = report.skipped.len(),
                "sync finished"
            );
            Ok(())
        }
        Command::Presign { url, expires } => {
            let (bucket, key) = object_url(&url)?;
            let presigned = fs
                .client()
                .presigned_url(&Method::GET, &bucket, &key, Duration::from_secs(expires))
                .await
                .with_context(|| format!("presign {url}"))?;
            println!("{presigned}");
            Ok(())
        }
    }
}

async fn list(fs: &StreamWrapper, url: &str) -> Result<()> {
    let base: ObjectUrl = url.parse().with_context(|| format!("invalid URL {url}"))?;
    let mut dir = fs.opendir(url).await.with_context(|| format!("ls {url}"))?;
    while let Some(name) = dir.read().await? {
        let child = match base.bucket() {
            None => base.with_bucket(&name),
            Some(_) => base.with_key(&match base.key() {
                Some(key) => format!("{key}{}{name}", fs.options().delimiter),
                None => name.clone(),
            }),
        };
        // Served from the entry cached by `read`.
        let stat = fs.stat(&child.to_string()).await?;
        if stat.is_dir() {
            println!("{:>12}  {name}/", "DIR");
        } else {
            println!("{:>12}  {name}", stat.size);
        }
    }
    Ok(())
}

async fn get(fs: &StreamWrapper, url: &str, path: &Path) -> Result<()> {
    let (bucket, key) = object_url(url)?;
    let outcome = fs
        .client()
        .download_file(&bucket, &key, path, TransferOptions::from_config(fs.client().config()))
        .await
        .with_context(|| format!("get {url}"))?;
    info!(
        size = outcome.size,
        fetched = outcome.fetched,
        verified = outcome.verified,
        "downloaded"
    );
    Ok(())
}

async fn put(fs: &StreamWrapper, path: &Path, url: &str) -> Result<()> {
    let (bucket, key) = object_url(url)?;
    let options = TransferOptions {
        content_type: objstore_fs::file::guess_content_type(&key),
        ..TransferOptions::from_config(fs.client().config())
    };
    let outcome = fs
        .client()
        .upload_file(&bucket, &key, path, options)
        .await
        .with_context(|| format!("put {} {url}", path.display()))?;
    info!(size = outcome.size, parts = outcome.parts, e_tag = ?outcome.e_tag, "uploaded");
    Ok(())
}

fn object_url(url: &str) -> Result<(String, String)> {
    let parsed: ObjectUrl = url.parse().with_context(|| format!("invalid URL {url}"))?;
    match (parsed.bucket(), parsed.key()) {
        (Some(bucket), Some(key)) => Ok((bucket.to_owned(), key.to_owned())),
        _ => bail!("{url} does not name an object"),
    }
}

fn sync_target(fs: &StreamWrapper, url: &str, force: bool) -> Result<(String, SyncOptions)> {
    let parsed: ObjectUrl = url.parse().with_context(|| format!("invalid URL {url}"))?;
    let Some(bucket) = parsed.bucket() else {
        bail!("{url} does not name a bucket");
    };
    let options = SyncOptions {
        force,
        key_prefix: parsed.dir_prefix(&fs.options().delimiter),
        transfer: TransferOptions::from_config(fs.client().config()),
        ..SyncOptions::default()
    };
    Ok((bucket.to_owned(), options))
}
