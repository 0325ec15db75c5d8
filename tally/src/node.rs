use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context;
use futures::future;
use thiserror::Error;
use tracing::{error, info};

use crate::coordinator::{self, AggregationResult, Coordinator};
use crate::participant::{self, Participant, ParticipantServer};
use crate::partition::{Role, Topology};
use crate::record::Extraction;
use crate::scanner::{ScanOutcome, Scanner};

pub const DEFAULT_PORT: u16 = 50051;
pub const DEFAULT_TOP: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{given} peer addresses given for {size} participants")]
    PeerCount { given: usize, size: usize },
    #[error("port {base} + {rank} does not fit in a u16")]
    PortOverflow { base: u16, rank: usize },
}

/// Listen address of every rank, indexed by rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints(Vec<SocketAddr>);

impl Endpoints {
    /// Rank `r` listens on `host:base_port + r`.
    pub fn sequential(host: IpAddr, base_port: u16, size: usize) -> Result<Self, ConfigError> {
        (0..size)
            .map(|rank| {
                u16::try_from(rank)
                    .ok()
                    .and_then(|r| base_port.checked_add(r))
                    .map(|port| SocketAddr::new(host, port))
                    .ok_or(ConfigError::PortOverflow {
                        base: base_port,
                        rank,
                    })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Endpoints)
    }

    pub fn explicit(addrs: Vec<SocketAddr>, size: usize) -> Result<Self, ConfigError> {
        if addrs.len() != size {
            return Err(ConfigError::PeerCount {
                given: addrs.len(),
                size,
            });
        }
        Ok(Endpoints(addrs))
    }

    pub fn of(&self, rank: usize) -> SocketAddr {
        self.0[rank]
    }
}

/// Everything one process needs for a run.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub input: PathBuf,
    pub topology: Topology,
    pub endpoints: Endpoints,
    pub extraction: Extraction,
    pub top: usize,
}

/// Scans this process's partition and plays its role in the protocol.
/// Returns the aggregated result on the coordinator, `None` elsewhere.
pub async fn run(config: NodeConfig) -> anyhow::Result<Option<AggregationResult>> {
    let topology = config.topology;
    let role = topology.role();
    info!(rank = topology.rank(), size = topology.size(), %role, "starting");

    let outcome = scan(&config).await?;
    if let Some(e) = &outcome.error {
        error!(rank = topology.rank(), "input unreadable, contributing partial counts: {}", e);
    }

    match role {
        Role::Coordinator => {
            let mut coordinator = Coordinator::new(topology, outcome.tallies);
            if topology.size() > 1 {
                let peers = future::join_all(
                    topology
                        .participant_ranks()
                        .map(|rank| coordinator::connect(rank, config.endpoints.of(rank))),
                )
                .await;
                coordinator.gather(&peers).await?;
            } else {
                info!("processing alone");
            }
            Ok(Some(coordinator.into_result(config.top)))
        }
        Role::Participant => {
            let mut participant = Participant::new(topology.rank());
            participant.finish_scan(outcome.tallies);
            participant::serve(
                ParticipantServer::new(participant),
                config.endpoints.of(topology.rank()),
            )
            .await
            .with_context(|| format!("participant {} failed to serve", topology.rank()))?;
            Ok(None)
        }
    }
}

async fn scan(config: &NodeConfig) -> anyhow::Result<ScanOutcome> {
    let scanner = Scanner::new(config.topology, config.extraction);
    let input = config.input.clone();
    tokio::task::spawn_blocking(move || scanner.scan_path(&input))
        .await
        .context("scan task panicked")
}
