use std::num::NonZeroUsize;

use thiserror::Error;

/// Rank of the process that collects, merges and reports.
pub const COORDINATOR_RANK: usize = 0;

/// Returns the rank owning line `index` in a cluster of `size` processes.
pub fn owner(index: usize, size: NonZeroUsize) -> usize {
    index % size.get()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("participant count must be at least 1")]
    EmptyCluster,
    #[error("rank {rank} is out of range for {size} participants")]
    RankOutOfRange { rank: usize, size: usize },
}

/// This process's position in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topology {
    rank: usize,
    size: NonZeroUsize,
}

impl Topology {
    pub fn new(rank: usize, size: usize) -> Result<Self, TopologyError> {
        let size = NonZeroUsize::new(size).ok_or(TopologyError::EmptyCluster)?;
        if rank >= size.get() {
            return Err(TopologyError::RankOutOfRange {
                rank,
                size: size.get(),
            });
        }
        Ok(Topology { rank, size })
    }

    pub fn single() -> Self {
        Topology {
            rank: COORDINATOR_RANK,
            size: NonZeroUsize::MIN,
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size.get()
    }

    pub fn owns(&self, index: usize) -> bool {
        owner(index, self.size) == self.rank
    }

    pub fn role(&self) -> Role {
        Role::of(self.rank)
    }

    /// Ranks of every process other than the coordinator.
    pub fn participant_ranks(&self) -> impl Iterator<Item = usize> {
        (0..self.size.get()).filter(|r| *r != COORDINATOR_RANK)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Coordinator,
    Participant,
}

impl Role {
    pub fn of(rank: usize) -> Role {
        if rank == COORDINATOR_RANK {
            Role::Coordinator
        } else {
            Role::Participant
        }
    }

    pub fn is_coordinator(&self) -> bool {
        matches!(self, Role::Coordinator)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Coordinator => write!(f, "coordinator"),
            Role::Participant => write!(f, "participant"),
        }
    }
}
