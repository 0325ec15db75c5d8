use futures::future;
use std::net::SocketAddr;
use tarpc::{client, context, tokio_serde::formats::Json};
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::frequency::{FrequencyTable, Tallies};
use crate::partition::Topology;
use crate::rpc::{ControlMessage, Rejection, RpcClient, TableKind, TablePayload};

const CONNECT_RETRY: Duration = Duration::from_millis(500);
// Replies are only bounded by how long a participant needs to serialize its
// tables.
const REPLY_DEADLINE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("expected {expected} participants, got {actual}")]
    PeerCount { expected: usize, actual: usize },
    #[error("participant {rank} did not send its {kind} table")]
    MissingPayload { rank: usize, kind: TableKind },
    #[error("participant {rank} sent its {kind} table twice")]
    DuplicatePayload { rank: usize, kind: TableKind },
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error("request to participant {rank} failed: {source}")]
    Transport {
        rank: usize,
        #[source]
        source: tarpc::client::RpcError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Scanning,
    Collecting,
    Merging,
    Shutdown,
}

/// A connected participant.
#[derive(Clone)]
pub struct Peer {
    pub rank: usize,
    pub client: RpcClient,
}

/// Global tables plus their top-N orderings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationResult {
    pub hashtags: FrequencyTable,
    pub languages: FrequencyTable,
    pub top_hashtags: Vec<(String, u64)>,
    pub top_languages: Vec<(String, u64)>,
    /// Requested length of the top lists.
    pub limit: usize,
}

impl AggregationResult {
    pub fn new(tallies: Tallies, limit: usize) -> Self {
        AggregationResult {
            top_hashtags: tallies.hashtags.top(limit),
            top_languages: tallies.languages.top(limit),
            hashtags: tallies.hashtags,
            languages: tallies.languages,
            limit,
        }
    }
}

#[derive(Debug)]
pub struct Coordinator {
    topology: Topology,
    totals: Tallies,
    state: CoordinatorState,
}

impl Coordinator {
    pub fn new(topology: Topology, scanned: Tallies) -> Self {
        Coordinator {
            topology,
            totals: scanned,
            state: CoordinatorState::Scanning,
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn totals(&self) -> &Tallies {
        &self.totals
    }

    /// Requests every participant's tables and merges them into the totals.
    pub async fn collect(&mut self, peers: &[Peer]) -> Result<(), ProtocolError> {
        let expected = self.topology.size() - 1;
        if peers.len() != expected {
            return Err(ProtocolError::PeerCount {
                expected,
                actual: peers.len(),
            });
        }

        self.transition(CoordinatorState::Collecting);
        info!("gathering tables from {} participants", peers.len());
        let requests = peers.iter().map(|peer| async move {
            let reply = peer
                .client
                .command(deadline_context(), ControlMessage::RequestData)
                .await;
            (peer.rank, reply)
        });
        let mut received = Vec::with_capacity(peers.len());
        for (rank, reply) in future::join_all(requests).await {
            let payloads = reply.map_err(|source| ProtocolError::Transport { rank, source })??;
            received.push(split_reply(rank, payloads)?);
        }

        self.transition(CoordinatorState::Merging);
        for tallies in received {
            self.totals.merge(tallies);
        }
        Ok(())
    }

    /// Tells every participant to exit.
    pub async fn shutdown(&mut self, peers: &[Peer]) {
        self.transition(CoordinatorState::Shutdown);
        info!("shutting down {} participants", peers.len());
        let requests = peers.iter().map(|peer| async move {
            let reply = peer
                .client
                .command(context::current(), ControlMessage::Terminate)
                .await;
            (peer.rank, reply)
        });
        for (rank, reply) in future::join_all(requests).await {
            match reply {
                Ok(Ok(_)) => debug!(rank, "participant terminated"),
                Ok(Err(e)) => warn!(rank, "{}", e),
                // The participant may close the connection before the
                // acknowledgement is read.
                Err(e) => debug!(rank, "terminate not acknowledged: {}", e),
            }
        }
    }

    /// Collects from every participant, then terminates all of them whether
    /// or not collection succeeded.
    pub async fn gather(&mut self, peers: &[Peer]) -> Result<(), ProtocolError> {
        let collected = self.collect(peers).await;
        if let Err(e) = &collected {
            warn!("collection failed, releasing participants: {}", e);
        }
        self.shutdown(peers).await;
        collected
    }

    pub fn into_result(self, limit: usize) -> AggregationResult {
        AggregationResult::new(self.totals, limit)
    }

    fn transition(&mut self, next: CoordinatorState) {
        debug!(from = ?self.state, to = ?next, "coordinator state");
        self.state = next;
    }
}

fn deadline_context() -> context::Context {
    let mut ctx = context::current();
    ctx.deadline += REPLY_DEADLINE;
    ctx
}

/// Sorts a reply into its two tables by payload kind.
pub fn split_reply(rank: usize, payloads: Vec<TablePayload>) -> Result<Tallies, ProtocolError> {
    let mut hashtags = None;
    let mut languages = None;
    for payload in payloads {
        let kind = payload.kind();
        let (slot, table) = match payload {
            TablePayload::Hashtags(table) => (&mut hashtags, table),
            TablePayload::Languages(table) => (&mut languages, table),
        };
        if slot.replace(table).is_some() {
            return Err(ProtocolError::DuplicatePayload { rank, kind });
        }
    }
    Ok(Tallies {
        hashtags: hashtags.ok_or(ProtocolError::MissingPayload {
            rank,
            kind: TableKind::Hashtags,
        })?,
        languages: languages.ok_or(ProtocolError::MissingPayload {
            rank,
            kind: TableKind::Languages,
        })?,
    })
}

/// Connects to a participant, retrying until it is listening.
pub async fn connect(rank: usize, addr: SocketAddr) -> Peer {
    loop {
        let mut transport = tarpc::serde_transport::tcp::connect(addr, Json::default);
        transport.config_mut().max_frame_length(usize::MAX);
        match transport.await {
            Ok(transport) => {
                debug!(rank, %addr, "connected");
                let client = RpcClient::new(client::Config::default(), transport).spawn();
                return Peer { rank, client };
            }
            Err(e) => {
                debug!(rank, %addr, "participant not reachable yet: {}", e);
                sleep(CONNECT_RETRY).await;
            }
        }
    }
}
