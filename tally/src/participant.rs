use futures::{future, lock::Mutex, prelude::*};
use std::{net::SocketAddr, sync::Arc};
use tarpc::{
    context,
    server::{self, Channel},
    tokio_serde::formats::Json,
};
use tokio::sync::Notify;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::frequency::Tallies;
use crate::rpc::{ControlMessage, Rejection, Rpc, TablePayload};

// Lets the Terminate acknowledgement reach the coordinator before the
// process exits.
const TERMINATE_LINGER: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantState {
    Scanning,
    Idle,
    Returning,
    Terminated,
}

#[derive(Debug)]
pub struct Participant {
    rank: usize,
    tallies: Tallies,
    state: ParticipantState,
}

impl Participant {
    pub fn new(rank: usize) -> Self {
        Participant {
            rank,
            tallies: Tallies::new(),
            state: ParticipantState::Scanning,
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn state(&self) -> ParticipantState {
        self.state
    }

    /// Stores the scanned tables and starts accepting commands.
    pub fn finish_scan(&mut self, tallies: Tallies) {
        debug_assert_eq!(self.state, ParticipantState::Scanning);
        self.tallies = tallies;
        self.transition(ParticipantState::Idle);
    }

    pub fn handle(&mut self, message: ControlMessage) -> Result<Vec<TablePayload>, Rejection> {
        match self.state {
            ParticipantState::Scanning => return Err(Rejection::Scanning(self.rank)),
            ParticipantState::Terminated => return Err(Rejection::Terminated(self.rank)),
            ParticipantState::Idle | ParticipantState::Returning => {}
        }
        match message {
            ControlMessage::RequestData => {
                self.transition(ParticipantState::Returning);
                info!(rank = self.rank, "returning tables to coordinator");
                let payloads = vec![
                    TablePayload::Hashtags(self.tallies.hashtags.clone()),
                    TablePayload::Languages(self.tallies.languages.clone()),
                ];
                self.transition(ParticipantState::Idle);
                Ok(payloads)
            }
            ControlMessage::Terminate => {
                info!(rank = self.rank, "shutting down");
                self.transition(ParticipantState::Terminated);
                Ok(vec![])
            }
        }
    }

    fn transition(&mut self, next: ParticipantState) {
        debug!(rank = self.rank, from = ?self.state, to = ?next, "participant state");
        self.state = next;
    }
}

/// tarpc front for a [`Participant`]; clones share the same state.
#[derive(Clone)]
pub struct ParticipantServer {
    participant: Arc<Mutex<Participant>>,
    terminated: Arc<Notify>,
}

impl ParticipantServer {
    pub fn new(participant: Participant) -> Self {
        ParticipantServer {
            participant: Arc::new(Mutex::new(participant)),
            terminated: Arc::new(Notify::new()),
        }
    }

    pub async fn state(&self) -> ParticipantState {
        self.participant.lock().await.state()
    }

    /// Resolves once a Terminate command has been accepted.
    pub async fn terminated(&self) {
        self.terminated.notified().await
    }
}

impl Rpc for ParticipantServer {
    async fn command(
        self,
        _: context::Context,
        message: ControlMessage,
    ) -> Result<Vec<TablePayload>, Rejection> {
        let mut participant = self.participant.lock().await;
        let reply = participant.handle(message);
        match (&reply, message) {
            (Ok(_), ControlMessage::Terminate) => self.terminated.notify_one(),
            (Err(e), _) => warn!("{}", e),
            _ => {}
        }
        reply
    }
}

async fn spawn(fut: impl Future<Output = ()> + Send + 'static) {
    tokio::spawn(fut);
}

/// Listens on `addr` and answers commands until told to terminate.
pub async fn serve(server: ParticipantServer, addr: SocketAddr) -> anyhow::Result<()> {
    let rank = server.participant.lock().await.rank();
    let mut listener = tarpc::serde_transport::tcp::listen(&addr, Json::default).await?;
    listener.config_mut().max_frame_length(usize::MAX);
    info!(rank, port = listener.local_addr().port(), "awaiting commands");

    let serving = server.clone();
    let server_future = listener
        // Ignore accept errors.
        .filter_map(|r| future::ready(r.ok()))
        .map(server::BaseChannel::with_defaults)
        .map(move |channel| channel.execute(serving.clone().serve()).for_each(spawn))
        .buffer_unordered(10)
        .for_each(|_| async {});

    tokio::select! {
        _ = server_future => {},
        _ = server.terminated() => {
            sleep(TERMINATE_LINGER).await;
        },
    }

    Ok(())
}
