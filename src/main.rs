use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use site_publisher::{
    FsStorage, Mode, ObjectStore, PublishRequest, Publisher, PublisherBuilder, ServerConfig,
    SiteServer,
};

#[derive(Parser)]
#[command(
    name = "site-publisher",
    about = "Publish versioned HTML sites to an object store and serve them by subdomain",
    version
)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(flatten)]
    site: SiteArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve {
        #[arg(long, env = "SITE_BIND", default_value = "127.0.0.1:8080")]
        bind: SocketAddr,
    },
    /// Publish a local HTML file
    Publish {
        site: String,
        file: PathBuf,
        #[arg(long, default_value = "publish")]
        mode: ModeArg,
    },
    /// Print the current pointer of a site
    Resolve {
        site: String,
        #[arg(long, default_value = "publish")]
        mode: ModeArg,
    },
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum ModeArg {
    Draft,
    Publish,
}

impl From<ModeArg> for Mode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Draft => Mode::Draft,
            ModeArg::Publish => Mode::Publish,
        }
    }
}

#[derive(Args)]
struct StoreArgs {
    /// Directory for the filesystem store
    #[arg(long, env = "SITE_STORE_DIR", default_value = "./data")]
    store_dir: PathBuf,

    /// Public URL under which stored objects are reachable
    #[arg(long, env = "SITE_STORE_PUBLIC_BASE")]
    store_public_base: Option<String>,

    /// Use this S3 bucket instead of the filesystem store
    #[cfg(feature = "s3")]
    #[arg(long, env = "SITE_S3_BUCKET")]
    s3_bucket: Option<String>,
}

#[derive(Args)]
struct SiteArgs {
    /// Domains whose subdomains are routed to sites (comma separated)
    #[arg(long, env = "SITE_BASE_DOMAINS", value_delimiter = ',')]
    base_domain: Vec<String>,

    #[arg(long, env = "SITE_PUBLIC_BASE_URL", default_value = "http://127.0.0.1:8080")]
    public_base_url: String,

    /// Extra subdomains that never map to a site (comma separated)
    #[arg(long, env = "SITE_RESERVED_SUBDOMAINS", value_delimiter = ',')]
    reserved: Vec<String>,

    /// Host suffixes of preview deployments (comma separated)
    #[arg(long, env = "SITE_PREVIEW_HOST_SUFFIXES", value_delimiter = ',')]
    preview_host_suffix: Vec<String>,

    /// Cache max-age for published pages, in seconds
    #[arg(long, env = "SITE_PUBLISHED_MAX_AGE", default_value_t = 60)]
    published_max_age: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    #[cfg(feature = "s3")]
    if let Some(bucket) = cli.store.s3_bucket.clone() {
        let mut store = site_publisher::S3Storage::from_env(bucket).await;
        if let Some(base) = &cli.store.store_public_base {
            store = store.with_public_base(base);
        }
        return run(store, &cli.site, cli.command).await;
    }

    let mut store = FsStorage::new(&cli.store.store_dir);
    if let Some(base) = &cli.store.store_public_base {
        store = store.with_public_base(base);
    }
    run(store, &cli.site, cli.command).await
}

fn build<S: ObjectStore>(store: S, args: &SiteArgs) -> anyhow::Result<Publisher<S>> {
    let mut builder = PublisherBuilder::new(store)
        .public_base_url(&args.public_base_url)
        .published_max_age(Duration::from_secs(args.published_max_age));
    for domain in &args.base_domain {
        builder = builder.base_domain(domain);
    }
    for label in &args.reserved {
        builder = builder.reserve_subdomain(label);
    }
    for suffix in &args.preview_host_suffix {
        builder = builder.preview_host_suffix(suffix);
    }
    builder.build().context("invalid site configuration")
}

async fn run<S: ObjectStore>(store: S, args: &SiteArgs, command: Command) -> anyhow::Result<()> {
    let publisher = build(store, args)?;
    match command {
        Command::Serve { bind } => {
            let config = ServerConfig { bind_addr: bind };
            SiteServer::new(config, publisher)
                .serve()
                .await
                .context("server failed")?;
        }
        Command::Publish { site, file, mode } => {
            let html = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let receipt = publisher
                .publish(&PublishRequest::new(site, mode.into(), html))
                .await?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }
        Command::Resolve { site, mode } => {
            let resolution = publisher.resolve(&site, mode.into()).await?;
            println!("{}", serde_json::to_string_pretty(&resolution.pointer)?);
        }
    }
    Ok(())
}
