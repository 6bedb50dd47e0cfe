//! Dense agent storage. Indices are stable for the lifetime of a run: agents
//! are never removed, only re-linked.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{LeaderId, MAX_CHILDREN, SwarmError, Vec3};

/// Ordered child list; order is attachment order.
pub type Children = SmallVec<[usize; MAX_CHILDREN]>;

/// Link from an agent to its parent.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ParentLink {
    /// Not yet placed in the tree, or momentarily detached during a re-parenting.
    #[default]
    Unattached,
    /// The single root of the tree.
    Root,
    Node(usize),
}

impl ParentLink {
    /// Parent index, if the agent hangs below another agent.
    #[must_use]
    pub const fn index(self) -> Option<usize> {
        match self {
            Self::Node(idx) => Some(idx),
            Self::Unattached | Self::Root => None,
        }
    }
}

/// Leader governing an agent: its slot in the leader table and the leader's agent index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct LeaderRef {
    pub id: LeaderId,
    pub agent: usize,
}

/// Fields for a single agent used when inserting or snapshotting from the SoA store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentData {
    pub position: Vec3,
    pub velocity: Vec3,
    pub mass: f32,
    pub parent: ParentLink,
    pub children: Children,
    pub leader: Option<LeaderRef>,
}

impl AgentData {
    /// Unattached agent at rest.
    #[must_use]
    pub fn at(position: Vec3, mass: f32) -> Self {
        Self {
            position,
            mass,
            ..Self::default()
        }
    }
}

impl Default for AgentData {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            mass: 1.0,
            parent: ParentLink::Unattached,
            children: Children::new(),
            leader: None,
        }
    }
}

/// Collection of per-agent columns for hot-path iteration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentColumns {
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    masses: Vec<f32>,
    parents: Vec<ParentLink>,
    children: Vec<Children>,
    leaders: Vec<Option<LeaderRef>>,
}

impl AgentColumns {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collection with reserved capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: Vec::with_capacity(capacity),
            velocities: Vec::with_capacity(capacity),
            masses: Vec::with_capacity(capacity),
            parents: Vec::with_capacity(capacity),
            children: Vec::with_capacity(capacity),
            leaders: Vec::with_capacity(capacity),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push a new row onto each column, returning its index.
    pub fn push(&mut self, agent: AgentData) -> usize {
        let index = self.len();
        self.positions.push(agent.position);
        self.velocities.push(agent.velocity);
        self.masses.push(agent.mass);
        self.parents.push(agent.parent);
        self.children.push(agent.children);
        self.leaders.push(agent.leader);
        self.debug_assert_coherent();
        index
    }

    /// Return a copy of the fields at `index`.
    #[must_use]
    pub fn snapshot(&self, index: usize) -> AgentData {
        AgentData {
            position: self.positions[index],
            velocity: self.velocities[index],
            mass: self.masses[index],
            parent: self.parents[index],
            children: self.children[index].clone(),
            leader: self.leaders[index],
        }
    }

    /// Fails when `index` does not name a stored agent.
    pub fn ensure(&self, index: usize) -> Result<(), SwarmError> {
        if index < self.len() {
            Ok(())
        } else {
            Err(SwarmError::AgentOutOfRange {
                index,
                len: self.len(),
            })
        }
    }

    #[must_use]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    #[must_use]
    pub fn positions_mut(&mut self) -> &mut [Vec3] {
        &mut self.positions
    }

    #[must_use]
    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    #[must_use]
    pub fn velocities_mut(&mut self) -> &mut [Vec3] {
        &mut self.velocities
    }

    #[must_use]
    pub fn masses(&self) -> &[f32] {
        &self.masses
    }

    #[must_use]
    pub fn masses_mut(&mut self) -> &mut [f32] {
        &mut self.masses
    }

    #[must_use]
    pub fn parents(&self) -> &[ParentLink] {
        &self.parents
    }

    #[must_use]
    pub fn leaders(&self) -> &[Option<LeaderRef>] {
        &self.leaders
    }

    #[must_use]
    pub fn parent(&self, index: usize) -> ParentLink {
        self.parents[index]
    }

    #[must_use]
    pub fn children(&self, index: usize) -> &[usize] {
        &self.children[index]
    }

    #[must_use]
    pub fn leader(&self, index: usize) -> Option<LeaderRef> {
        self.leaders[index]
    }

    /// Agent currently marked as the tree root, if any.
    #[must_use]
    pub fn root(&self) -> Option<usize> {
        self.parents
            .iter()
            .position(|parent| *parent == ParentLink::Root)
    }

    pub(crate) fn set_parent(&mut self, index: usize, parent: ParentLink) {
        self.parents[index] = parent;
    }

    pub(crate) fn set_leader(&mut self, index: usize, leader: Option<LeaderRef>) {
        self.leaders[index] = leader;
    }

    pub(crate) fn children_mut(&mut self, index: usize) -> &mut Children {
        &mut self.children[index]
    }

    /// Positions, velocities and masses borrowed together for integration.
    pub(crate) fn kinematics_mut(&mut self) -> (&mut [Vec3], &mut [Vec3], &mut [f32]) {
        (&mut self.positions, &mut self.velocities, &mut self.masses)
    }

    /// Clears leader assignments on every agent.
    pub(crate) fn clear_leaders(&mut self) {
        self.leaders.fill(None);
    }

    #[inline]
    fn debug_assert_coherent(&self) {
        debug_assert_eq!(self.positions.len(), self.velocities.len());
        debug_assert_eq!(self.positions.len(), self.masses.len());
        debug_assert_eq!(self.positions.len(), self.parents.len());
        debug_assert_eq!(self.positions.len(), self.children.len());
        debug_assert_eq!(self.positions.len(), self.leaders.len());
    }
}

impl FromIterator<AgentData> for AgentColumns {
    fn from_iter<I: IntoIterator<Item = AgentData>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut columns = Self::with_capacity(iter.size_hint().0);
        for agent in iter {
            columns.push(agent);
        }
        columns
    }
}
