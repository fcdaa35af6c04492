//! objhash - Digest of a large object in range-addressable storage.
//!
//! The object is never written to disk. It is fetched as concurrent range
//! requests, reassembled in order in memory and fed straight into the digest.
//!
//! # Architecture
//!
//! 1. **Admission thread**: releases ranges for fetching while the lookahead
//!    window has room
//! 2. **Fetch workers**: download ranges in parallel, retrying with backoff
//! 3. **Main thread**: reads the reassembled stream and updates the digest
//!
//! # Usage
//!
//! ```bash
//! # SHA-1 of a public S3 object
//! objhash s3://bucket/path/to/object
//!
//! # SHA-256 with 16 MiB parts and 8 parallel requests
//! objhash -p s3://bucket/key --type sha256 --part 16 --parallel 8
//!
//! # MD5 of a file under a local directory laid out as <root>/<container>/<key>
//! objhash --store local --root /data -p bucket/key --type md5
//! ```

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, ValueEnum};
use parallel_range::{HttpStore, LocalStore, ObjectStore, ParallelRangeReader, ReaderConfig};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use objhash::digest::{self, HashKind};
use objhash::progress::ProgressReader;

const MIB: u64 = 1024 * 1024;

/// Where objects are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    /// HTTP(S) endpoint with path-style object URLs
    Http,
    /// Local directory, one subdirectory per container
    Local,
}

/// Command-line arguments for objhash.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("object").required(true).args(["object_path", "path"])))]
struct Args {
    /// Object path, e.g. s3://bucket/key
    #[arg(value_name = "PATH")]
    object_path: Option<String>,

    /// Object path, as an option
    #[arg(short, long)]
    path: Option<String>,

    /// Digest algorithm
    #[arg(long = "type", value_enum, default_value_t = HashKind::Sha1)]
    hash_type: HashKind,

    /// Part size in MiB (5 to 100)
    #[arg(long, default_value_t = 5)]
    part: u64,

    /// Number of parallel range requests (1 to 64)
    #[arg(long, default_value_t = 5)]
    parallel: usize,

    /// Retries per part after its first failed request
    #[arg(long, default_value_t = 5)]
    retries: u32,

    /// Request timeout in seconds
    #[arg(short, long, default_value_t = 300)]
    timeout: u64,

    /// Object store backend
    #[arg(long, value_enum, default_value_t = StoreKind::Http)]
    store: StoreKind,

    /// HTTP endpoint; overrides --region
    #[arg(long)]
    endpoint: Option<String>,

    /// Region used to build the default S3 endpoint
    #[arg(short, long, default_value = "ap-northeast-1")]
    region: String,

    /// Root directory for --store local
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Also append log output to this file
    #[arg(short, long)]
    log: Option<PathBuf>,

    /// Do not draw a progress bar
    #[arg(long)]
    no_progress: bool,
}

impl Args {
    fn object(&self) -> &str {
        self.path
            .as_deref()
            .or(self.object_path.as_deref())
            .unwrap_or_default()
    }
}

fn init_logging(log_path: Option<&PathBuf>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("objhash=info,parallel_range=info"));

    let file_layer = match log_path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("Failed to initialise logging")?;
    Ok(())
}

fn build_store(args: &Args) -> Result<Arc<dyn ObjectStore>> {
    let timeout = Duration::from_secs(args.timeout);
    let store: Arc<dyn ObjectStore> = match args.store {
        StoreKind::Local => Arc::new(LocalStore::new(&args.root)),
        StoreKind::Http => {
            let store = match &args.endpoint {
                Some(endpoint) => HttpStore::new(endpoint.clone(), timeout),
                None => HttpStore::for_region(&args.region, timeout),
            }
            .context("Failed to create HTTP client")?;
            info!(endpoint = store.endpoint(), "using HTTP object store");
            Arc::new(store)
        }
    };
    Ok(store)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log.as_ref())?;

    // Zero stays zero through clamping and is rejected when the reader opens.
    let config = ReaderConfig::new(args.part.saturating_mul(MIB), args.parallel)
        .with_retry_budget(args.retries)
        .clamped();

    let path = args.object().to_string();
    info!(
        part_size = config.part_size,
        part_size_mib = config.part_size / MIB,
        parallelism = config.parallelism,
        retries = config.retry_budget,
        timeout_secs = args.timeout,
        path = %path,
        "starting"
    );

    let started = Instant::now();
    let store = build_store(&args)?;
    let mut reader = ParallelRangeReader::open(store, &path, config)
        .with_context(|| format!("Failed to open {path}"))?;
    info!(path = %path, length = reader.len(), hash = %args.hash_type, "object opened");

    let length = reader.len();
    let mut progress = ProgressReader::new(&mut reader, length, !args.no_progress);
    let result = digest::compute(&mut progress, args.hash_type);
    progress.finish();

    // Closing reports a failed fetch even if the digest loop missed it.
    let closed = reader.close();
    let digest = result.with_context(|| format!("Failed to read {path}"))?;
    closed.with_context(|| format!("Failed to read {path}"))?;
    anyhow::ensure!(
        digest.length == length,
        "read {} of {} bytes from {}",
        digest.length,
        length,
        path
    );

    let elapsed = started.elapsed();
    let throughput = length as f64 / MIB as f64 / elapsed.as_secs_f64().max(1e-9);
    info!(
        elapsed_ms = elapsed.as_millis() as u64,
        mib_per_sec = %format!("{throughput:.2}"),
        "done"
    );
    info!(hex = %digest.to_hex(), base64 = %digest.to_base64(), "digest");
    println!("{}  {}", digest.to_hex(), path);
    println!("{}  {}", digest.to_base64(), path);

    Ok(())
}
