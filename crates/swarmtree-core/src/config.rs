//! Static configuration for a swarm run.

use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};

use crate::{MAX_CHILDREN, MAX_NUM_LEADERS, SwarmError};

/// Constants driving the attack/defend/fight kernel.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CombatConstants {
    /// Enemy detection radius around a leader; also the distance floor for combat forces.
    pub attack_radius: f32,
    pub attack_constant: f32,
    pub defend_constant: f32,
    /// Unfloored distance below which a mass contest is resolved.
    pub fight_radius: f32,
    pub fight_mass_rate: f32,
}

impl CombatConstants {
    /// Constants installed when rivalry between leaders begins.
    #[must_use]
    pub const fn rivalry() -> Self {
        Self {
            attack_radius: 40.0,
            attack_constant: 100.0,
            defend_constant: 50.0,
            fight_radius: 5.0,
            fight_mass_rate: 0.01,
        }
    }

    /// True when every combat force and transfer is zero.
    #[must_use]
    pub fn is_inert(&self) -> bool {
        self.attack_constant == 0.0
            && self.defend_constant == 0.0
            && self.fight_radius <= 0.0
            && self.fight_mass_rate == 0.0
    }
}

/// How repeated enemies are treated when building a leader's enemy set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum EnemyPolicy {
    /// Keep every occurrence in iteration order.
    #[default]
    KeepDuplicates,
    /// Keep the first occurrence of each agent only.
    Unique,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Extent of the initial placement box along x (centred on the origin).
    pub lx: f32,
    pub ly: f32,
    pub lz: f32,
    /// Integration time step.
    pub dt: f32,
    /// Rest length of the parent/child spring.
    pub grouping_radius: f32,
    /// Stiffness of the parent/child spring.
    pub grouping_constant: f32,
    pub coulomb_constant: f32,
    /// Distance floor for repulsion.
    pub coulomb_radius: f32,
    pub damping_constant: f32,
    pub center_force_constant: f32,
    /// Lower bound on agent mass after every step.
    pub mass_min: f32,
    pub surrender_mass_ratio: f32,
    /// Active combat constants (zero until the combat phase is enabled).
    pub combat: CombatConstants,
    /// Constants installed by `enable_combat_phase`.
    pub rivalry: CombatConstants,
    pub num_agents: usize,
    /// Children per node used when building the initial tree.
    pub tree_arity: usize,
    /// Hard arity bound enforced by `attach`.
    pub max_children: usize,
    /// Maximum depth of the initial tree (root is depth 0).
    pub max_tree_depth: usize,
    /// Layer whose agents become leaders (root is layer 1).
    pub leader_layer: usize,
    pub leader_capacity: usize,
    pub descendant_capacity: usize,
    pub enemy_capacity: usize,
    pub enemy_policy: EnemyPolicy,
    /// Optional RNG seed for reproducible placement.
    pub rng_seed: Option<u64>,
    /// Maximum number of step summaries retained in memory.
    pub history_capacity: usize,
    /// Directory for images and logs; never touched by the engine itself.
    pub output_dir: String,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        let grouping_constant = 1.0_f32;
        Self {
            lx: 200.0,
            ly: 200.0,
            lz: 200.0,
            dt: 0.05,
            grouping_radius: 1.0,
            grouping_constant,
            coulomb_constant: 10.0,
            coulomb_radius: 2.0,
            // aperiodic limit
            damping_constant: (2.0 * grouping_constant).sqrt(),
            center_force_constant: 0.1,
            mass_min: 0.1,
            surrender_mass_ratio: 3.0,
            combat: CombatConstants::default(),
            rivalry: CombatConstants::rivalry(),
            num_agents: 10_240,
            tree_arity: 4,
            max_children: MAX_CHILDREN,
            max_tree_depth: 7,
            leader_layer: 5,
            leader_capacity: MAX_NUM_LEADERS,
            descendant_capacity: 1 << 16,
            enemy_capacity: 1 << 16,
            enemy_policy: EnemyPolicy::KeepDuplicates,
            rng_seed: None,
            history_capacity: 256,
            output_dir: "out".to_string(),
        }
    }
}

impl SwarmConfig {
    /// Larger population with a deeper tree and a coarser time step.
    #[must_use]
    pub fn large_case() -> Self {
        Self {
            dt: 0.1,
            num_agents: 1 << 14,
            max_tree_depth: 9,
            ..Self::default()
        }
    }

    /// Validates the configuration before any state is built.
    pub fn validate(&self) -> Result<(), SwarmError> {
        if self.lx < 0.0 || self.ly < 0.0 || self.lz < 0.0 {
            return Err(SwarmError::InvalidConfig(
                "placement extents must be non-negative",
            ));
        }
        if self.dt <= 0.0 {
            return Err(SwarmError::InvalidConfig("dt must be positive"));
        }
        if self.mass_min <= 0.0 {
            return Err(SwarmError::InvalidConfig("mass_min must be positive"));
        }
        if self.coulomb_radius <= 0.0 {
            return Err(SwarmError::InvalidConfig("coulomb_radius must be positive"));
        }
        if self.grouping_radius < 0.0
            || self.grouping_constant < 0.0
            || self.damping_constant < 0.0
            || self.surrender_mass_ratio <= 0.0
        {
            return Err(SwarmError::InvalidConfig(
                "spring, damping and surrender parameters must be non-negative, ratio positive",
            ));
        }
        if self.max_children == 0 || self.max_children > MAX_CHILDREN {
            return Err(SwarmError::InvalidConfig(
                "max_children must be in 1..=MAX_CHILDREN",
            ));
        }
        if self.tree_arity == 0 || self.tree_arity > self.max_children {
            return Err(SwarmError::InvalidConfig(
                "tree_arity must be in 1..=max_children",
            ));
        }
        if self.leader_layer == 0 {
            return Err(SwarmError::InvalidConfig(
                "leader_layer counts from 1 (the root)",
            ));
        }
        if self.leader_capacity == 0
            || self.descendant_capacity == 0
            || self.enemy_capacity == 0
            || self.history_capacity == 0
        {
            return Err(SwarmError::InvalidConfig("capacities must be non-zero"));
        }
        for combat in [&self.combat, &self.rivalry] {
            if combat.attack_radius < 0.0 || combat.fight_radius < 0.0 {
                return Err(SwarmError::InvalidConfig(
                    "combat radii must be non-negative",
                ));
            }
        }
        Ok(())
    }

    /// Returns the configured RNG, seeding from entropy if no seed is set.
    pub(crate) fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::seed_from_u64(rand::random()),
        }
    }
}
