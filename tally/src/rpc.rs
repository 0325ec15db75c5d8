use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frequency::FrequencyTable;

/// Instruction sent by the coordinator to one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMessage {
    RequestData,
    Terminate,
}

/// One of a participant's tables, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TablePayload {
    Hashtags(FrequencyTable),
    Languages(FrequencyTable),
}

impl TablePayload {
    pub fn kind(&self) -> TableKind {
        match self {
            TablePayload::Hashtags(_) => TableKind::Hashtags,
            TablePayload::Languages(_) => TableKind::Languages,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    Hashtags,
    Languages,
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableKind::Hashtags => write!(f, "hashtag"),
            TableKind::Languages => write!(f, "language"),
        }
    }
}

/// Why a participant refused a command.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum Rejection {
    #[error("participant {0} is still scanning")]
    Scanning(usize),
    #[error("participant {0} has already terminated")]
    Terminated(usize),
}

#[tarpc::service]
pub trait Rpc {
    /// `RequestData` is answered with one payload per table kind,
    /// `Terminate` with none.
    async fn command(message: ControlMessage) -> Result<Vec<TablePayload>, Rejection>;
}
