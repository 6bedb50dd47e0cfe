//! Simulation context and the per-step integrator.

use std::collections::VecDeque;

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, info};

use crate::enemies::{self, EnemyScan};
use crate::forces::{self, Combat};
use crate::hierarchy::{self, ChainLink};
use crate::{
    ActionBuffer, AgentColumns, AgentData, LeaderTable, ParentLink, SwarmConfig, SwarmError, Tick,
    TreeViolation, Vec3,
};

/// Aggregate state recorded after each step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    pub tick: Tick,
    pub agent_count: usize,
    /// Leaders currently heading a unit (vacant slots excluded).
    pub leader_count: usize,
    pub enemy_links: usize,
    /// Encounters in which the defender dominated and the attacker asked to switch sides.
    pub surrenders: usize,
    /// Re-parentings applied during restructure.
    pub reparented: usize,
    pub total_mass: f64,
    pub center_of_mass: [f64; 3],
    pub center_of_mass_velocity: [f64; 3],
    /// Sum of `m v^2 / 2` over all agents.
    pub kinetic_energy: f64,
}

impl StepSummary {
    fn measure(tick: Tick, agents: &AgentColumns, leaders: &LeaderTable) -> Self {
        let mut total_mass = 0.0_f64;
        let mut weighted_position = [0.0_f64; 3];
        let mut momentum = [0.0_f64; 3];
        let mut kinetic_energy = 0.0_f64;
        for ((position, velocity), &mass) in agents
            .positions()
            .iter()
            .zip(agents.velocities())
            .zip(agents.masses())
        {
            let m = f64::from(mass);
            total_mass += m;
            for (acc, value) in weighted_position
                .iter_mut()
                .zip([position.x, position.y, position.z])
            {
                *acc += m * f64::from(value);
            }
            for (acc, value) in momentum.iter_mut().zip([velocity.x, velocity.y, velocity.z]) {
                *acc += m * f64::from(value);
            }
            kinetic_energy += 0.5 * m * f64::from(velocity.length_squared());
        }
        let scale = if total_mass > 0.0 { 1.0 / total_mass } else { 0.0 };
        Self {
            tick,
            agent_count: agents.len(),
            leader_count: leaders.iter().filter(|leader| !leader.is_vacant()).count(),
            enemy_links: 0,
            surrenders: 0,
            reparented: 0,
            total_mass,
            center_of_mass: weighted_position.map(|v| v * scale),
            center_of_mass_velocity: momentum.map(|v| v * scale),
            kinetic_energy,
        }
    }
}

/// Owns every store of one simulation run.
///
/// The agent store and leader table are read-only while forces accumulate and
/// are mutated only by the sequential integrate and restructure phases.
#[derive(Debug)]
pub struct SwarmWorld {
    config: SwarmConfig,
    tick: Tick,
    agents: AgentColumns,
    leaders: LeaderTable,
    actions: ActionBuffer,
    combat_enabled: bool,
    history: VecDeque<StepSummary>,
}

impl SwarmWorld {
    /// Places `num_agents` agents uniformly in the configured box, builds the
    /// initial tree and designates the leaders.
    pub fn new(config: SwarmConfig) -> Result<Self, SwarmError> {
        config.validate()?;
        let mut rng = config.seeded_rng();
        let extent = Vec3::new(config.lx, config.ly, config.lz);
        let mut agents = AgentColumns::with_capacity(config.num_agents);
        for _ in 0..config.num_agents {
            let position = Vec3::new(
                extent.x * (rng.random::<f32>() - 0.5),
                extent.y * (rng.random::<f32>() - 0.5),
                extent.z * (rng.random::<f32>() - 0.5),
            );
            agents.push(AgentData::at(position, 1.0 + rng.random::<f32>()));
        }
        hierarchy::build_tree(&mut agents, config.tree_arity, config.max_tree_depth)?;
        Self::assemble(config, agents)
    }

    /// Wraps an existing, already linked agent store.
    pub fn from_agents(config: SwarmConfig, agents: AgentColumns) -> Result<Self, SwarmError> {
        config.validate()?;
        Self::assemble(config, agents)
    }

    fn assemble(config: SwarmConfig, mut agents: AgentColumns) -> Result<Self, SwarmError> {
        if agents.masses().iter().any(|&m| m.is_nan() || m <= 0.0) {
            return Err(SwarmError::InvalidConfig("agent masses must be positive"));
        }
        let leaders =
            LeaderTable::identify(&agents, config.leader_layer, config.leader_capacity)?;
        leaders.propagate(&mut agents)?;
        info!(
            agents = agents.len(),
            leaders = leaders.len(),
            layer = config.leader_layer,
            "swarm initialised"
        );
        let actions = ActionBuffer::new(agents.len());
        let history = VecDeque::with_capacity(config.history_capacity);
        Ok(Self {
            config,
            tick: Tick::zero(),
            agents,
            leaders,
            actions,
            combat_enabled: false,
            history,
        })
    }

    /// Switches the combat kernel on. Calling it again has no effect.
    pub fn enable_combat_phase(&mut self) {
        if self.combat_enabled {
            return;
        }
        self.config.combat = self.config.rivalry;
        self.combat_enabled = true;
        info!(
            attack_radius = self.config.combat.attack_radius,
            fight_radius = self.config.combat.fight_radius,
            "rivalry enabled"
        );
    }

    /// Advances the simulation by one tick.
    ///
    /// Any error leaves the world in a partially updated state and must be
    /// treated as fatal by the caller.
    pub fn step(&mut self) -> Result<StepSummary, SwarmError> {
        let next_tick = self.tick.next();
        self.actions.reset(self.agents.len());
        self.leaders.propagate(&mut self.agents)?;

        let enemy_links = {
            let _span = debug_span!("identify_enemies").entered();
            let scan = self.enemy_scan();
            enemies::identify_enemies(&self.agents, &mut self.leaders, scan)?
        };
        {
            let _span = debug_span!("tree_force").entered();
            forces::tree_forces(
                &self.agents,
                &self.actions,
                self.config.grouping_radius,
                self.config.grouping_constant,
            );
        }
        {
            let _span = debug_span!("center+coulomb_force").entered();
            forces::center_forces(&self.agents, &self.actions, self.config.center_force_constant);
            forces::repulsion(
                &self.agents,
                &self.actions,
                self.config.coulomb_constant,
                self.config.coulomb_radius,
            );
        }
        let surrenders = {
            let _span = debug_span!("engage_enemies").entered();
            let combat = Combat {
                constants: self.config.combat,
                surrender_mass_ratio: self.config.surrender_mass_ratio,
                dt: self.config.dt,
            };
            forces::engage(&self.agents, &self.leaders, &self.actions, &combat)
        };
        {
            let _span = debug_span!("integrate").entered();
            self.integrate();
        }
        let reparented = {
            let _span = debug_span!("restructure").entered();
            self.restructure()?
        };

        self.tick = next_tick;
        let summary = StepSummary {
            enemy_links,
            surrenders,
            reparented,
            ..StepSummary::measure(self.tick, &self.agents, &self.leaders)
        };
        debug!(
            tick = self.tick.0,
            enemy_links, surrenders, reparented, "step complete"
        );
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary.clone());
        Ok(summary)
    }

    fn enemy_scan(&self) -> EnemyScan {
        EnemyScan {
            attack_radius: self.config.combat.attack_radius,
            policy: self.config.enemy_policy,
            descendant_capacity: self.config.descendant_capacity,
            enemy_capacity: self.config.enemy_capacity,
        }
    }

    /// Leap-frog update: velocity from force and damping, then mass, then
    /// position from the new velocity.
    fn integrate(&mut self) {
        let dt = self.config.dt;
        let damping = self.config.damping_constant;
        let mass_min = self.config.mass_min;
        let actions = &self.actions;
        let (positions, velocities, masses) = self.agents.kinematics_mut();
        positions
            .par_iter_mut()
            .zip(velocities.par_iter_mut())
            .zip(masses.par_iter_mut())
            .enumerate()
            .for_each(|(idx, ((position, velocity), mass))| {
                let action = actions.get(idx);
                *velocity += (action.force * (1.0 / *mass) - *velocity * damping) * dt;
                *mass = (*mass + dt * action.mass_rate).max(mass_min);
                *position += *velocity * dt;
            });
    }

    /// Applies pending re-parentings one at a time in agent index order.
    fn restructure(&mut self) -> Result<usize, SwarmError> {
        let pending = self.actions.pending_reparents();
        let max_children = self.config.max_children;
        for &(agent, new_parent) in &pending {
            let ParentLink::Node(parent) = self.agents.parent(agent) else {
                return Err(SwarmError::DetachRoot { agent });
            };
            hierarchy::detach(
                &mut self.agents,
                &mut self.leaders,
                parent,
                agent,
                max_children,
            )?;
            hierarchy::attach(&mut self.agents, new_parent, agent, max_children)?;
        }
        Ok(pending.len())
    }

    /// Moves `child` under `parent` (or the first descendant with room).
    pub fn attach(&mut self, parent: usize, child: usize) -> Result<usize, SwarmError> {
        hierarchy::attach(&mut self.agents, parent, child, self.config.max_children)
    }

    /// Removes `child` from `parent`, promoting its first offspring.
    pub fn detach(&mut self, parent: usize, child: usize) -> Result<(), SwarmError> {
        hierarchy::detach(
            &mut self.agents,
            &mut self.leaders,
            parent,
            child,
            self.config.max_children,
        )
    }

    pub fn propagate_leadership(&mut self) -> Result<(), SwarmError> {
        self.leaders.propagate(&mut self.agents)
    }

    /// Rebuilds descendant and enemy sets outside of a step.
    pub fn identify_enemies(&mut self) -> Result<usize, SwarmError> {
        let scan = self.enemy_scan();
        enemies::identify_enemies(&self.agents, &mut self.leaders, scan)
    }

    #[must_use]
    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    #[must_use]
    pub const fn combat_enabled(&self) -> bool {
        self.combat_enabled
    }

    #[must_use]
    pub fn agents(&self) -> &AgentColumns {
        &self.agents
    }

    #[must_use]
    pub fn leaders(&self) -> &LeaderTable {
        &self.leaders
    }

    /// Action records of the most recent step.
    #[must_use]
    pub fn actions(&self) -> &ActionBuffer {
        &self.actions
    }

    #[must_use]
    pub fn positions(&self) -> &[Vec3] {
        self.agents.positions()
    }

    #[must_use]
    pub fn velocities(&self) -> &[Vec3] {
        self.agents.velocities()
    }

    #[must_use]
    pub fn masses(&self) -> &[f32] {
        self.agents.masses()
    }

    /// Subtree size of every leader, in leader id order.
    pub fn leader_agent_counts(&self) -> Result<Vec<usize>, SwarmError> {
        self.leaders.agent_counts(&self.agents)
    }

    pub fn parent_chain(&self, index: usize) -> Result<Vec<ChainLink>, SwarmError> {
        hierarchy::parent_chain(&self.agents, index)
    }

    /// Verifies the single-rooted, bounded-arity tree invariant.
    pub fn check_invariants(&self) -> Result<(), TreeViolation> {
        hierarchy::verify_tree(&self.agents, self.config.max_children)
    }

    /// Iterate over retained step summaries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &StepSummary> {
        self.history.iter()
    }
}
