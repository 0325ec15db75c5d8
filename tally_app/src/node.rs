use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tally::node::{self, Endpoints, NodeConfig, DEFAULT_PORT, DEFAULT_TOP};
use tally::report::{self, ReportOptions};
use tally::{Extraction, Topology};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

/// One process of a hashtag / language tally run.
#[derive(Parser, Debug)]
#[command(name = "tally-node")]
struct Cli {
    /// Line-delimited JSON corpus
    #[arg(short, long)]
    input: PathBuf,

    /// Ordinal of this process
    #[arg(long, env = "TALLY_RANK", default_value_t = 0)]
    rank: usize,

    /// Number of cooperating processes
    #[arg(long, env = "TALLY_SIZE", default_value_t = 1)]
    size: usize,

    /// Host participants listen on
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    host: IpAddr,

    /// Participant r listens on base-port + r
    #[arg(long, default_value_t = DEFAULT_PORT)]
    base_port: u16,

    /// Listen address of every rank, in rank order (overrides host/base-port)
    #[arg(long = "peer", value_name = "ADDR")]
    peers: Vec<SocketAddr>,

    /// Where hashtags are read from
    #[arg(long, value_enum, default_value_t = Extraction::Entities)]
    extraction: Extraction,

    /// Length of the ranked lists
    #[arg(long, default_value_t = DEFAULT_TOP)]
    top: usize,

    /// Print language codes without display names
    #[arg(long)]
    raw_languages: bool,

    /// Enable verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn node_config(&self) -> anyhow::Result<NodeConfig> {
        let topology = Topology::new(self.rank, self.size)?;
        let endpoints = if self.peers.is_empty() {
            Endpoints::sequential(self.host, self.base_port, self.size)?
        } else {
            Endpoints::explicit(self.peers.clone(), self.size)?
        };
        Ok(NodeConfig {
            input: self.input.clone(),
            topology,
            endpoints,
            extraction: self.extraction,
            top: self.top,
        })
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .init();
}

#[tokio::main]
async fn main() {
    let start = Instant::now();
    let cli = Cli::parse();
    init_logging(cli.verbose);
    debug!("{:?}", cli);

    if let Err(e) = run(&cli, start).await {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: &Cli, start: Instant) -> anyhow::Result<()> {
    let config = cli.node_config().context("invalid topology")?;
    if let Some(result) = node::run(config).await? {
        let options = ReportOptions {
            language_names: !cli.raw_languages,
        };
        print!("{}", report::render(&result, options));
        println!("\n\n");
        println!("{}", report::format_elapsed(start.elapsed()));
    }
    Ok(())
}
