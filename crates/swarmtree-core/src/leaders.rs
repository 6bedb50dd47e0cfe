//! Leader table: one combat unit per agent on the leader layer.

use serde::{Deserialize, Serialize};

use crate::hierarchy::{self, count_children, layer_of};
use crate::{AgentColumns, LeaderId, LeaderRef, ParentLink, SwarmError};

/// Governing record for one subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leader {
    pub id: LeaderId,
    /// Agent heading the unit; `None` once the unit has been vacated.
    pub agent: Option<usize>,
    /// Display hue in (0, 1).
    pub hue: f32,
    pub(crate) descendants: Vec<usize>,
    pub(crate) enemies: Vec<usize>,
}

impl Leader {
    /// Leader agent and its subtree in traversal order, as of the last enemy pass.
    #[must_use]
    pub fn descendants(&self) -> &[usize] {
        &self.descendants
    }

    /// Enemy agents within reach, as of the last enemy pass.
    #[must_use]
    pub fn enemies(&self) -> &[usize] {
        &self.enemies
    }

    #[must_use]
    pub const fn is_vacant(&self) -> bool {
        self.agent.is_none()
    }

    fn reference(&self) -> Option<LeaderRef> {
        self.agent.map(|agent| LeaderRef { id: self.id, agent })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaderTable {
    leaders: Vec<Leader>,
}

impl LeaderTable {
    /// Designates every agent on `leader_layer` (root = layer 1) as a leader.
    ///
    /// Ids are assigned in agent index order. Agents not connected to the
    /// root are ignored.
    pub fn identify(
        agents: &AgentColumns,
        leader_layer: usize,
        capacity: usize,
    ) -> Result<Self, SwarmError> {
        let mut found = Vec::new();
        for idx in 0..agents.len() {
            if !reaches_root(agents, idx) {
                continue;
            }
            if layer_of(agents, idx)? == leader_layer {
                found.push(idx);
            }
        }
        if found.len() > capacity {
            return Err(SwarmError::LeaderCapacity {
                found: found.len(),
                capacity,
            });
        }

        let count = found.len();
        let leaders = found
            .into_iter()
            .enumerate()
            .map(|(slot, agent)| Leader {
                id: LeaderId(slot as u32),
                agent: Some(agent),
                hue: (1 + slot) as f32 / (count + 1) as f32,
                descendants: Vec::new(),
                enemies: Vec::new(),
            })
            .collect();
        Ok(Self { leaders })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.leaders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaders.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: LeaderId) -> Option<&Leader> {
        self.leaders.get(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Leader> + '_ {
        self.leaders.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Leader] {
        &self.leaders
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Leader] {
        &mut self.leaders
    }

    /// Points leader `id` at a new agent, or vacates it.
    pub(crate) fn reassign(&mut self, id: LeaderId, agent: Option<usize>) {
        if let Some(leader) = self.leaders.get_mut(id.index()) {
            leader.agent = agent;
            if agent.is_none() {
                leader.descendants.clear();
                leader.enemies.clear();
            }
        }
    }

    /// Clears every agent's leader, then stamps each leader onto its subtree.
    ///
    /// Re-running this on an unchanged tree yields the same assignment.
    pub fn propagate(&self, agents: &mut AgentColumns) -> Result<(), SwarmError> {
        agents.clear_leaders();
        for leader in &self.leaders {
            if let Some(reference) = leader.reference() {
                hierarchy::make_leader(agents, reference.agent, Some(reference))?;
            }
        }
        Ok(())
    }

    /// Subtree size per leader (leader included), 0 for vacant slots.
    pub fn agent_counts(&self, agents: &AgentColumns) -> Result<Vec<usize>, SwarmError> {
        self.leaders
            .iter()
            .map(|leader| match leader.agent {
                Some(agent) => count_children(agents, agent).map(|n| n + 1),
                None => Ok(0),
            })
            .collect()
    }
}

fn reaches_root(agents: &AgentColumns, idx: usize) -> bool {
    let mut current = idx;
    for _ in 0..=agents.len() {
        match agents.parent(current) {
            ParentLink::Root => return true,
            ParentLink::Unattached => return false,
            ParentLink::Node(parent) => current = parent,
        }
    }
    false
}
