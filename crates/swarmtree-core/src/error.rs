//! Fatal error conditions raised by the engine.

use thiserror::Error;

use crate::LeaderId;

/// Consistency or capacity violation. None of these are recoverable: the run
/// must stop.
#[derive(Debug, Error, PartialEq)]
pub enum SwarmError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("tree full at agent {placed} of {requested} (arity {arity}, depth {max_depth})")]
    TreeFull {
        placed: usize,
        requested: usize,
        arity: usize,
        max_depth: usize,
    },
    #[error("{found} agents qualify as leaders, capacity is {capacity}")]
    LeaderCapacity { found: usize, capacity: usize },
    #[error("leader {} exceeds descendant capacity {capacity}", leader.0)]
    DescendantCapacity { leader: LeaderId, capacity: usize },
    #[error("leader {} exceeds enemy capacity {capacity}", leader.0)]
    EnemyCapacity { leader: LeaderId, capacity: usize },
    #[error("unable to detach agent {agent}: it has no parent")]
    DetachRoot { agent: usize },
    #[error("agent {child} is not a child of {parent}")]
    NotAChild { parent: usize, child: usize },
    #[error("agent {child} is already attached; detach it before attaching it elsewhere")]
    AlreadyAttached { child: usize },
    #[error("cannot attach under agent {parent}: it is not governed by a leader")]
    NotLeaderGoverned { parent: usize },
    #[error("agent index {index} out of range (store holds {len})")]
    AgentOutOfRange { index: usize, len: usize },
    #[error("cycle detected while walking the subtree of agent {agent}")]
    CycleDetected { agent: usize },
}

/// First broken tree invariant reported by [`crate::hierarchy::verify_tree`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeViolation {
    #[error("no root agent")]
    MissingRoot,
    #[error("multiple roots: {first} and {second}")]
    MultipleRoots { first: usize, second: usize },
    #[error("agent {agent} is not attached to the tree")]
    Unattached { agent: usize },
    #[error("agent {agent} points at missing parent {parent}")]
    DanglingParent { agent: usize, parent: usize },
    #[error("agent {agent} points at parent {parent} but is not among its children")]
    Orphaned { agent: usize, parent: usize },
    #[error("agent {agent} is its own ancestor")]
    Cycle { agent: usize },
    #[error("agent {agent} holds {count} children, limit is {limit}")]
    Arity {
        agent: usize,
        count: usize,
        limit: usize,
    },
    #[error("agent {child} listed under {holder} but its parent is {parent:?}")]
    ParentMismatch {
        holder: usize,
        child: usize,
        parent: Option<usize>,
    },
    #[error("agent {child} appears twice under {holder}")]
    DuplicateChild { holder: usize, child: usize },
}
