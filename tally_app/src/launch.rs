use std::path::PathBuf;
use std::process::{Child, Command, ExitCode};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Starts a fixed number of tally-node processes and waits for all of them.
#[derive(Parser, Debug)]
#[command(name = "tally-launch")]
struct Cli {
    /// Number of cooperating processes
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..))]
    processes: u32,

    /// tally-node binary (defaults to the one next to this launcher)
    #[arg(long)]
    node: Option<PathBuf>,

    /// Arguments passed to every node
    #[arg(last = true)]
    node_args: Vec<String>,
}

fn default_node() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe().context("cannot locate launcher")?;
    Ok(exe.with_file_name(format!("tally-node{}", std::env::consts::EXE_SUFFIX)))
}

fn launch(cli: &Cli) -> anyhow::Result<bool> {
    let node = match &cli.node {
        Some(node) => node.clone(),
        None => default_node()?,
    };

    let mut children: Vec<(u32, Child)> = Vec::new();
    for rank in 0..cli.processes {
        let spawned = Command::new(&node)
            .args(&cli.node_args)
            .env("TALLY_RANK", rank.to_string())
            .env("TALLY_SIZE", cli.processes.to_string())
            .spawn();
        let child = match spawned {
            Ok(child) => child,
            Err(e) => {
                // The coordinator would wait forever on the missing rank.
                for (_, mut started) in children {
                    let _ = started.kill();
                }
                return Err(e)
                    .with_context(|| format!("failed to start {} as rank {}", node.display(), rank));
            }
        };
        info!(rank, pid = child.id(), "started");
        children.push((rank, child));
    }

    let mut all_ok = true;
    for (rank, mut child) in children {
        let status = child.wait()?;
        if status.success() {
            info!(rank, "exited");
        } else {
            error!(rank, %status, "node failed");
            all_ok = false;
        }
    }
    Ok(all_ok)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match launch(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
