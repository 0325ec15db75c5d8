//! Counts hashtags and language codes across a line-delimited JSON corpus,
//! split over a fixed set of cooperating processes. Rank 0 collects every
//! participant's tables over tarpc, merges them and reports the top entries.

pub mod coordinator;
pub mod frequency;
pub mod node;
pub mod participant;
pub mod partition;
pub mod record;
pub mod report;
pub mod rpc;
pub mod scanner;

pub use coordinator::{AggregationResult, Coordinator, CoordinatorState, Peer, ProtocolError};
pub use frequency::{FrequencyTable, Tallies};
pub use node::{Endpoints, NodeConfig};
pub use participant::{Participant, ParticipantServer, ParticipantState};
pub use partition::{Role, Topology};
pub use record::{Extraction, Record};
pub use rpc::{ControlMessage, TablePayload};
