//! UFile Uploadr - command-line uploader for UFile object storage
//!
//! Uploads files with signed, streamed requests and optional dedup lookup.

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use ufile_uploadr::config::Config;
use ufile_uploadr::fingerprint::{ContentFingerprint, DEFAULT_BLOCK_SIZE};
use ufile_uploadr::metrics;
use ufile_uploadr::store::UfileClient;
use ufile_uploadr::upload::{
    ProgressObserver, PutPolicy, UploadHitRequest, UploadOutcome, UploadRequestBuilder,
};

/// UFile Uploadr - signed streaming uploads with dedup
#[derive(Parser, Debug)]
#[command(name = "ufile-uploadr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Log format (json, pretty); overrides the config file
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// Write Prometheus metrics to this file when the command finishes
    #[arg(long, global = true)]
    metrics_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a file
    Put(PutArgs),
    /// Ask the store whether it already holds a file's content
    Hit(HitArgs),
    /// Print a file's content fingerprint
    Fingerprint(FingerprintArgs),
}

#[derive(ClapArgs, Debug)]
struct PutArgs {
    /// File to upload
    file: PathBuf,

    #[arg(short, long)]
    bucket: String,

    /// Object key (defaults to the file name)
    #[arg(short, long)]
    key: Option<String>,

    /// Media type (guessed from the file extension when omitted)
    #[arg(long)]
    content_type: Option<String>,

    /// Skip the whole-file Content-MD5
    #[arg(long)]
    no_verify_md5: bool,

    /// Transfer buffer size in bytes
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Callback URL for a put policy
    #[arg(long, requires = "callback_body")]
    callback_url: Option<String>,

    /// Callback body template for a put policy
    #[arg(long, requires = "callback_url")]
    callback_body: Option<String>,

    /// Run an upload-hit lookup first and skip the transfer on a hit
    #[arg(long)]
    dedup: bool,

    /// Log transfer progress
    #[arg(long)]
    progress: bool,
}

#[derive(ClapArgs, Debug)]
struct HitArgs {
    file: PathBuf,

    #[arg(short, long)]
    bucket: String,

    /// Object key (defaults to the file name)
    #[arg(short, long)]
    key: Option<String>,

    /// Fingerprint block size in bytes
    #[arg(long)]
    block_size: Option<usize>,
}

#[derive(ClapArgs, Debug)]
struct FingerprintArgs {
    file: PathBuf,

    /// Fingerprint block size in bytes
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = args.log_level.as_deref();
    let format = args.log_format.as_deref();

    let result = match &args.command {
        // Fingerprinting is local and needs no configuration
        Command::Fingerprint(fp_args) => {
            init_logging(level.unwrap_or("warn"), format.unwrap_or("pretty"))?;
            fingerprint(fp_args).await
        }
        Command::Put(put_args) => {
            let (config, client) = connect(&args.config, level, format)?;
            put(&client, &config, put_args).await
        }
        Command::Hit(hit_args) => {
            let (config, client) = connect(&args.config, level, format)?;
            hit(&client, &config, hit_args).await
        }
    };

    // Failed runs are recorded too
    if let Some(path) = &args.metrics_file {
        write_metrics(path)?;
    }
    result
}

/// Dump the Prometheus text exposition, e.g. for a node_exporter textfile collector
fn write_metrics(path: &Path) -> anyhow::Result<()> {
    let text = metrics::render().context("failed to encode metrics")?;
    std::fs::write(path, text).with_context(|| format!("failed to write metrics to {:?}", path))
}

/// Load configuration, install logging and build the store client
fn connect(
    path: &Path,
    level: Option<&str>,
    format: Option<&str>,
) -> anyhow::Result<(Config, UfileClient)> {
    let config = Config::load(path)
        .with_context(|| format!("failed to load configuration from {:?}", path))?;
    init_logging(
        level.unwrap_or(&config.logging.level),
        format.unwrap_or(&config.logging.format),
    )?;
    info!("Starting UFile Uploadr v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded configuration from {:?}", path);

    let client = UfileClient::from_config(&config)?;
    Ok((config, client))
}

fn init_logging(level: &str, format: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(level).with_context(|| format!("invalid log level '{}'", level))?;
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match format {
        "pretty" => tracing::subscriber::set_global_default(builder.pretty().finish())?,
        _ => tracing::subscriber::set_global_default(
            builder.json().with_thread_ids(true).finish(),
        )?,
    }
    Ok(())
}

async fn put(client: &UfileClient, config: &Config, args: &PutArgs) -> anyhow::Result<()> {
    let key = object_key(args.key.as_deref(), &args.file)?;
    let content_type = args.content_type.clone().unwrap_or_else(|| {
        mime_guess::from_path(&args.file)
            .first_or_octet_stream()
            .to_string()
    });

    let mut builder = UploadRequestBuilder::new()
        .from_file(&args.file, content_type)
        .name_as(key)
        .to_bucket(args.bucket.as_str())
        .verify_md5(config.upload.verify_md5 && !args.no_verify_md5)
        .buffer_size(args.buffer_size.unwrap_or(config.upload.buffer_size))
        .on_digest_failure(config.upload.on_digest_failure);
    if let (Some(url), Some(body)) = (&args.callback_url, &args.callback_body) {
        builder = builder.put_policy(PutPolicy::new(url.as_str(), body.as_str()));
    }
    let request = builder.build()?;

    let progress: Option<Arc<dyn ProgressObserver>> = if args.progress {
        Some(Arc::new(|sent: u64, total: u64| {
            info!(bytes_sent = sent, total_bytes = total, "Upload progress");
        }))
    } else {
        None
    };

    let outcome = if args.dedup {
        client
            .put_file_with_hit(request, config.upload.fingerprint_block_size, progress)
            .await?
    } else {
        UploadOutcome::Uploaded(client.put_file(request, progress).await?)
    };

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn hit(client: &UfileClient, config: &Config, args: &HitArgs) -> anyhow::Result<()> {
    let key = object_key(args.key.as_deref(), &args.file)?;
    let block_size = args
        .block_size
        .unwrap_or(config.upload.fingerprint_block_size);
    let request = UploadHitRequest::new(args.bucket.as_str(), key, &args.file, block_size)?;
    let outcome = client.upload_hit(request).await?;

    println!("{}", serde_json::json!({ "outcome": outcome }));
    Ok(())
}

async fn fingerprint(args: &FingerprintArgs) -> anyhow::Result<()> {
    let fp = ContentFingerprint::compute_async(args.file.clone(), args.block_size)
        .await
        .with_context(|| format!("failed to fingerprint {:?}", args.file))?;

    let output = serde_json::json!({
        "file": args.file,
        "etag": fp.etag(),
        "file_size": fp.file_size(),
        "block_size": fp.block_size(),
        "block_count": fp.block_count(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn object_key(key: Option<&str>, file: &Path) -> anyhow::Result<String> {
    match key {
        Some(key) => Ok(key.to_string()),
        None => file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .context("cannot derive an object key from the file path; pass --key"),
    }
}
