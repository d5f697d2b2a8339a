//! chunkstream: chunked streaming upload server and client.

mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chunkstream_object_store::{BucketAdmin, FsObjectStore};
use chunkstream_protocol::{ChunkSize, Destination};
use chunkstream_transfer::{ServerConfig, UploadClient, UploadConfig, UploadServer};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

fn print_usage() {
    eprintln!("Usage: chunkstream [--config <path>] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  serve [--listen <addr>] [--root <dir>]     Run the upload server");
    eprintln!("  upload <file> [--bucket <b>] [--object <o>] [--address <addr>]");
    eprintln!("         [--chunk-size <n>] [--timeout <secs>]");
    eprintln!("                                             Upload a file");
    eprintln!("  buckets list                               List buckets");
    eprintln!("  buckets create <name>                      Create a bucket");
    eprintln!("  buckets delete <name>                      Delete an empty bucket");
    eprintln!("  rm <bucket> <object>                       Delete an object");
    eprintln!("  help                                       Show this help");
}

/// Removes `--name <value>` from `args` and returns the value.
fn take_option(args: &mut Vec<String>, name: &str) -> Result<Option<String>> {
    let Some(i) = args.iter().position(|a| a == name) else {
        return Ok(None);
    };
    if i + 1 >= args.len() {
        bail!("{name} requires a value");
    }
    let value = args.remove(i + 1);
    args.remove(i);
    Ok(Some(value))
}

// ── Subcommand handlers ───────────────────────────────────────────────────────

async fn cmd_serve(config: &AppConfig, mut args: Vec<String>) -> Result<ExitCode> {
    let listen = match take_option(&mut args, "--listen")? {
        Some(addr) => addr.parse().with_context(|| format!("invalid --listen: {addr}"))?,
        None => config.listen,
    };
    let root = take_option(&mut args, "--root")?
        .map(PathBuf::from)
        .unwrap_or_else(|| config.store_root.clone());
    reject_extra(&args)?;

    let store = FsObjectStore::open(&root)
        .await
        .with_context(|| format!("failed to open store at {}", root.display()))?;
    store
        .ensure_bucket(&config.bucket)
        .await
        .with_context(|| format!("failed to create bucket {}", config.bucket))?;

    let server = UploadServer::new(Arc::new(store), ServerConfig::default());
    let listener = server
        .bind(listen)
        .await
        .with_context(|| format!("failed to listen on {listen}"))?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
        }
        shutdown.cancel();
    });

    tracing::info!(root = %root.display(), "serving uploads");
    server.serve(listener, cancel).await?;
    Ok(ExitCode::SUCCESS)
}

async fn cmd_upload(config: &AppConfig, file: &str, mut args: Vec<String>) -> Result<ExitCode> {
    let path = Path::new(file);
    let bucket = take_option(&mut args, "--bucket")?.unwrap_or_else(|| config.bucket.clone());
    let object = match take_option(&mut args, "--object")? {
        Some(object) => object,
        None => path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .with_context(|| format!("cannot derive object name from {file}"))?,
    };
    let address = match take_option(&mut args, "--address")? {
        Some(addr) => addr.parse().with_context(|| format!("invalid --address: {addr}"))?,
        None => config.address,
    };
    let chunk_size = match take_option(&mut args, "--chunk-size")? {
        Some(n) => {
            let n: usize = n.parse().with_context(|| format!("invalid --chunk-size: {n}"))?;
            ChunkSize::new(n)?
        }
        None => config.chunk_size,
    };
    let timeout = match take_option(&mut args, "--timeout")? {
        Some(secs) => Some(Duration::from_secs(
            secs.parse().with_context(|| format!("invalid --timeout: {secs}"))?,
        )),
        None => config.timeout,
    };
    reject_extra(&args)?;

    let upload_config = UploadConfig {
        chunk_size,
        timeout,
    };
    let destination = Destination::new(bucket, object);
    let report = UploadClient::new(address, upload_config)
        .upload(path, &destination, CancellationToken::new())
        .await
        .with_context(|| format!("upload of {file} to {destination} failed"))?;

    eprintln!("{}", report.status);
    eprintln!(
        "{destination}: {} bytes in {} chunks, sha256 {}",
        report.bytes, report.chunks, report.sha256
    );
    Ok(if report.status.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn cmd_buckets(config: &AppConfig, args: &[&str]) -> Result<ExitCode> {
    let store = FsObjectStore::new(&config.store_root);
    match args {
        ["list"] => {
            for bucket in store.list_buckets().await? {
                println!("{bucket}");
            }
        }
        ["create", name] => {
            store.ensure_bucket(name).await?;
            eprintln!("bucket {name} ready");
        }
        ["delete", name] => {
            store.delete_bucket(name).await?;
            eprintln!("bucket {name} deleted");
        }
        _ => {
            print_usage();
            return Ok(ExitCode::FAILURE);
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_rm(config: &AppConfig, bucket: &str, object: &str) -> Result<ExitCode> {
    let store = FsObjectStore::new(&config.store_root);
    store.delete_object(bucket, object).await?;
    eprintln!("{bucket}/{object} deleted");
    Ok(ExitCode::SUCCESS)
}

fn reject_extra(args: &[String]) -> Result<()> {
    match args.first() {
        Some(arg) => bail!("unexpected argument: {arg}"),
        None => Ok(()),
    }
}

async fn run(mut args: Vec<String>) -> Result<ExitCode> {
    let config_path = take_option(&mut args, "--config")?.map(PathBuf::from);
    let Some(command) = (!args.is_empty()).then(|| args.remove(0)) else {
        print_usage();
        return Ok(ExitCode::FAILURE);
    };
    if matches!(command.as_str(), "help" | "--help" | "-h") {
        print_usage();
        return Ok(ExitCode::SUCCESS);
    }

    let config = AppConfig::load(config_path.as_deref())?;
    tracing::debug!(?config, "configuration loaded");

    match command.as_str() {
        "serve" => cmd_serve(&config, args).await,
        "upload" if !args.is_empty() => {
            let file = args.remove(0);
            cmd_upload(&config, &file, args).await
        }
        "buckets" => {
            let rest: Vec<&str> = args.iter().map(String::as_str).collect();
            cmd_buckets(&config, &rest).await
        }
        "rm" => match args.as_slice() {
            [bucket, object] => cmd_rm(&config, bucket, object).await,
            _ => {
                print_usage();
                Ok(ExitCode::FAILURE)
            }
        },
        other => {
            eprintln!("Unknown command: {other}\n");
            print_usage();
            Ok(ExitCode::FAILURE)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so stdout stays clean for listings.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
