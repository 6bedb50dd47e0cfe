//! Per-step descendant and enemy sets for every leader.

use std::collections::HashSet;

use rayon::prelude::*;

use crate::hierarchy::subtree;
use crate::{AgentColumns, EnemyPolicy, LeaderTable, SwarmError};

/// Limits applied while rebuilding the sets.
#[derive(Debug, Clone, Copy)]
pub struct EnemyScan {
    pub attack_radius: f32,
    pub policy: EnemyPolicy,
    pub descendant_capacity: usize,
    pub enemy_capacity: usize,
}

/// Recomputes `descendants` and `enemies` of every leader, returning the
/// total number of enemy links.
///
/// Both passes fan out across leaders. Each worker reads shared state and
/// produces only its own leader's set; the sets are written back afterwards.
pub fn identify_enemies(
    agents: &AgentColumns,
    leaders: &mut LeaderTable,
    scan: EnemyScan,
) -> Result<usize, SwarmError> {
    let descendants: Vec<Vec<usize>> = leaders
        .as_slice()
        .par_iter()
        .map(|leader| {
            let Some(agent) = leader.agent else {
                return Ok(Vec::new());
            };
            let members = subtree(agents, agent)?;
            if members.len() > scan.descendant_capacity {
                return Err(SwarmError::DescendantCapacity {
                    leader: leader.id,
                    capacity: scan.descendant_capacity,
                });
            }
            Ok(members)
        })
        .collect::<Result<_, SwarmError>>()?;

    for (leader, members) in leaders.as_mut_slice().iter_mut().zip(descendants) {
        leader.descendants = members;
    }

    let table = leaders.as_slice();
    let positions = agents.positions();
    let enemies: Vec<Vec<usize>> = table
        .par_iter()
        .map(|leader| {
            let Some(agent) = leader.agent else {
                return Ok(Vec::new());
            };
            let origin = positions[agent];
            let mut found = Vec::new();
            let mut seen = HashSet::new();
            for other in table.iter().filter(|other| other.id != leader.id) {
                for &target in &other.descendants {
                    if agents.leader(target).is_none()
                        || origin.distance(positions[target]) > scan.attack_radius
                    {
                        continue;
                    }
                    if scan.policy == EnemyPolicy::Unique && !seen.insert(target) {
                        continue;
                    }
                    if found.len() == scan.enemy_capacity {
                        return Err(SwarmError::EnemyCapacity {
                            leader: leader.id,
                            capacity: scan.enemy_capacity,
                        });
                    }
                    found.push(target);
                }
            }
            Ok(found)
        })
        .collect::<Result<_, SwarmError>>()?;

    let mut links = 0;
    for (leader, found) in leaders.as_mut_slice().iter_mut().zip(enemies) {
        links += found.len();
        leader.enemies = found;
    }
    Ok(links)
}
