//! Force kernels.
//!
//! Every kernel reads agent state and accumulates into the shared
//! [`ActionBuffer`]; none of them mutates the agent store.

use rayon::prelude::*;

use crate::{ActionBuffer, AgentColumns, CombatConstants, LeaderTable, ParentLink, Vec3};

/// Mass moved per unit time from defender to attacker when the defender dominates.
pub const SURRENDER_MASS_TRANSFER: f32 = 0.1;

/// Inverse-cube force along `separation` with the distance floored at `floor`.
///
/// Magnitude is `strength / max(|separation|, floor)^3`. Coincident points
/// yield zero since no direction is defined.
#[must_use]
pub fn capped_inverse_cube(separation: Vec3, strength: f32, floor: f32) -> Vec3 {
    let r = separation.length();
    if r <= 0.0 {
        return Vec3::ZERO;
    }
    let rr = r.max(floor);
    separation * (strength / (rr * rr * rr * r))
}

/// Linear spring force on `target` toward rest length `rest` from `peer`.
#[must_use]
pub fn spring_force(target: Vec3, peer: Vec3, rest: f32, stiffness: f32) -> Vec3 {
    let d = target - peer;
    let r = d.length();
    if r <= 0.0 {
        return Vec3::ZERO;
    }
    d * (-stiffness * (r - rest) / r)
}

/// Linear restoring force toward the origin.
#[must_use]
pub fn center_force(position: Vec3, strength: f32) -> Vec3 {
    -position * strength
}

/// Springs along every parent/child edge, equal and opposite on both ends.
pub fn tree_forces(agents: &AgentColumns, actions: &ActionBuffer, rest: f32, stiffness: f32) {
    let positions = agents.positions();
    agents
        .parents()
        .par_iter()
        .enumerate()
        .for_each(|(idx, link)| {
            let ParentLink::Node(parent) = *link else {
                return;
            };
            if parent == idx {
                return;
            }
            let force = spring_force(positions[idx], positions[parent], rest, stiffness);
            actions.add_force(idx, force);
            actions.add_force(parent, -force);
        });
}

/// Centering force on every agent.
pub fn center_forces(agents: &AgentColumns, actions: &ActionBuffer, strength: f32) {
    if strength == 0.0 {
        return;
    }
    agents
        .positions()
        .par_iter()
        .enumerate()
        .for_each(|(idx, &position)| actions.add_force(idx, center_force(position, strength)));
}

/// Repulsion between every pair of led agents.
///
/// Each agent sums its own incoming force and writes once; the partner never
/// receives a reciprocal write.
pub fn repulsion(agents: &AgentColumns, actions: &ActionBuffer, strength: f32, floor: f32) {
    if strength == 0.0 {
        return;
    }
    let positions = agents.positions();
    let led: Vec<usize> = (0..agents.len())
        .filter(|&idx| agents.leader(idx).is_some())
        .collect();
    led.par_iter().for_each(|&target| {
        let origin = positions[target];
        let mut total = Vec3::ZERO;
        for &partner in &led {
            if partner != target {
                total += capped_inverse_cube(origin - positions[partner], strength, floor);
            }
        }
        actions.add_force(target, total);
    });
}

/// Result of one attacker/defender encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engagement {
    /// Attacker and defender are the same agent.
    Ignored,
    /// Forces only; the pair is outside `fight_radius`.
    Ranged,
    /// Attacker outweighs the defender beyond the surrender ratio.
    AttackerDominates,
    /// Defender outweighs the attacker; the attacker asks to join the defender.
    DefenderDominates,
    /// Neither side dominates; mass flows toward the heavier agent.
    Contest,
}

/// Parameters shared by every encounter of one step.
#[derive(Debug, Clone, Copy)]
pub struct Combat {
    pub constants: CombatConstants,
    pub surrender_mass_ratio: f32,
    pub dt: f32,
}

/// Applies attack and defend forces to a pair and resolves a fight in reach.
///
/// The attacker is pulled toward the defender and the defender is pushed
/// away from the attacker, both with the distance floored at `attack_radius`.
pub fn attack_defend_fight(
    agents: &AgentColumns,
    actions: &ActionBuffer,
    combat: &Combat,
    attacker: usize,
    defender: usize,
) -> Engagement {
    if attacker == defender {
        return Engagement::Ignored;
    }
    let constants = &combat.constants;
    let positions = agents.positions();
    let separation = positions[defender] - positions[attacker];
    let floor = constants.attack_radius;
    actions.add_force(
        attacker,
        capped_inverse_cube(separation, constants.attack_constant, floor),
    );
    actions.add_force(
        defender,
        capped_inverse_cube(separation, constants.defend_constant, floor),
    );

    if separation.length() >= constants.fight_radius {
        return Engagement::Ranged;
    }
    let masses = agents.masses();
    let (ma, md) = (masses[attacker], masses[defender]);
    if ma / md > combat.surrender_mass_ratio {
        Engagement::AttackerDominates
    } else if md / ma > combat.surrender_mass_ratio {
        let rate = SURRENDER_MASS_TRANSFER / combat.dt;
        actions.request_parent(attacker, defender);
        actions.add_mass_rate(attacker, rate);
        actions.add_mass_rate(defender, -rate);
        Engagement::DefenderDominates
    } else {
        let dm = constants.fight_mass_rate * (ma - md) / (ma + md);
        actions.add_mass_rate(defender, -dm);
        actions.add_mass_rate(attacker, dm);
        Engagement::Contest
    }
}

/// Every descendant of every leader engages every enemy of that leader.
///
/// Returns the number of encounters the defender dominated.
pub fn engage(
    agents: &AgentColumns,
    leaders: &LeaderTable,
    actions: &ActionBuffer,
    combat: &Combat,
) -> usize {
    if combat.constants.is_inert() {
        return 0;
    }
    leaders
        .as_slice()
        .par_iter()
        .map(|leader| {
            let mut surrendered = 0;
            for &attacker in leader.descendants() {
                for &defender in leader.enemies() {
                    let outcome = attack_defend_fight(agents, actions, combat, attacker, defender);
                    if outcome == Engagement::DefenderDominates {
                        surrendered += 1;
                    }
                }
            }
            surrendered
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AgentData, LeaderId, LeaderRef};

    fn pair(a: Vec3, ma: f32, b: Vec3, mb: f32) -> AgentColumns {
        [AgentData::at(a, ma), AgentData::at(b, mb)]
            .into_iter()
            .collect()
    }

    fn rivalry(dt: f32) -> Combat {
        Combat {
            constants: CombatConstants::rivalry(),
            surrender_mass_ratio: 3.0,
            dt,
        }
    }

    #[test]
    fn repulsion_is_floored_at_coulomb_radius() {
        let force = capped_inverse_cube(Vec3::new(0.5, 0.0, 0.0), 10.0, 2.0);
        assert!((force.length() - 1.25).abs() < 1e-6);
        assert!(force.x > 0.0);

        let at_floor = capped_inverse_cube(Vec3::new(0.0, 2.0, 0.0), 10.0, 2.0);
        assert!((force.length() - at_floor.length()).abs() < 1e-6);

        let beyond = capped_inverse_cube(Vec3::new(0.0, 0.0, 4.0), 10.0, 2.0);
        assert!((beyond.length() - 10.0 / 64.0).abs() < 1e-6);

        assert_eq!(capped_inverse_cube(Vec3::ZERO, 10.0, 2.0), Vec3::ZERO);
    }

    #[test]
    fn spring_at_rest_length_is_silent() {
        let force = spring_force(Vec3::new(1.0, 0.0, 0.0), Vec3::ZERO, 1.0, 1.0);
        assert!(force.length() < 1e-6);
        let stretched = spring_force(Vec3::new(3.0, 0.0, 0.0), Vec3::ZERO, 1.0, 1.0);
        assert_eq!(stretched, Vec3::new(-2.0, 0.0, 0.0));
        assert_eq!(spring_force(Vec3::ZERO, Vec3::ZERO, 1.0, 1.0), Vec3::ZERO);
    }

    #[test]
    fn tree_forces_are_equal_and_opposite() {
        let mut agents = pair(Vec3::ZERO, 1.0, Vec3::new(0.0, 3.0, 0.0), 1.0);
        agents.set_parent(0, ParentLink::Root);
        agents.set_parent(1, ParentLink::Node(0));
        agents.children_mut(0).push(1);
        let actions = ActionBuffer::new(2);
        tree_forces(&agents, &actions, 1.0, 1.0);
        assert_eq!(actions.get(1).force, Vec3::new(0.0, -2.0, 0.0));
        assert_eq!(actions.get(0).force, Vec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn repulsion_skips_unled_agents() {
        let agents = pair(Vec3::ZERO, 1.0, Vec3::new(0.5, 0.0, 0.0), 1.0);
        let actions = ActionBuffer::new(2);
        repulsion(&agents, &actions, 10.0, 2.0);
        assert_eq!(actions.get(0).force, Vec3::ZERO);
        assert_eq!(actions.get(1).force, Vec3::ZERO);
    }

    #[test]
    fn repulsion_between_led_agents_is_clamped_at_floor() {
        let led = Some(LeaderRef {
            id: LeaderId(0),
            agent: 0,
        });
        let mut near = AgentData::at(Vec3::ZERO, 1.0);
        near.leader = led;
        let mut partner = AgentData::at(Vec3::new(0.5, 0.0, 0.0), 1.0);
        partner.leader = led;
        let stray = AgentData::at(Vec3::new(0.0, 0.5, 0.0), 1.0);
        let agents: AgentColumns = [near, partner, stray].into_iter().collect();
        let actions = ActionBuffer::new(3);

        repulsion(&agents, &actions, 10.0, 2.0);
        let pushed = actions.get(0).force;
        assert!((pushed.x + 1.25).abs() < 1e-6, "{pushed:?}");
        assert!(pushed.y.abs() < 1e-6 && pushed.z.abs() < 1e-6);
        let pushed = actions.get(1).force;
        assert!((pushed.x - 1.25).abs() < 1e-6, "{pushed:?}");
        assert!(pushed.y.abs() < 1e-6 && pushed.z.abs() < 1e-6);
        assert_eq!(actions.get(2).force, Vec3::ZERO);
    }

    #[test]
    fn heavy_attacker_does_not_trigger_reparenting() {
        let agents = pair(Vec3::ZERO, 10.0, Vec3::new(1.0, 0.0, 0.0), 1.0);
        let actions = ActionBuffer::new(2);
        let outcome = attack_defend_fight(&agents, &actions, &rivalry(0.1), 0, 1);
        assert_eq!(outcome, Engagement::AttackerDominates);
        assert_eq!(actions.get(0).new_parent, None);
        assert_eq!(actions.get(1).new_parent, None);
        assert_eq!(actions.get(0).mass_rate, 0.0);
        assert_eq!(actions.get(1).mass_rate, 0.0);
        // Forces still apply: attacker toward defender, defender away.
        assert!(actions.get(0).force.x > 0.0);
        assert!(actions.get(1).force.x > 0.0);
    }

    #[test]
    fn heavy_defender_captures_attacker() {
        let agents = pair(Vec3::ZERO, 1.0, Vec3::new(1.0, 0.0, 0.0), 10.0);
        let actions = ActionBuffer::new(2);
        let outcome = attack_defend_fight(&agents, &actions, &rivalry(0.1), 0, 1);
        assert_eq!(outcome, Engagement::DefenderDominates);
        assert_eq!(actions.get(0).new_parent, Some(1));
        assert!((actions.get(0).mass_rate - 1.0).abs() < 1e-6);
        assert!((actions.get(1).mass_rate + 1.0).abs() < 1e-6);
    }

    #[test]
    fn even_fight_moves_mass_to_heavier() {
        let agents = pair(Vec3::ZERO, 2.0, Vec3::new(1.0, 0.0, 0.0), 1.0);
        let actions = ActionBuffer::new(2);
        let outcome = attack_defend_fight(&agents, &actions, &rivalry(0.1), 0, 1);
        assert_eq!(outcome, Engagement::Contest);
        let dm = 0.01 * (2.0 - 1.0) / 3.0;
        assert!((actions.get(0).mass_rate - dm).abs() < 1e-7);
        assert!((actions.get(1).mass_rate + dm).abs() < 1e-7);
        assert_eq!(actions.get(0).new_parent, None);
    }

    #[test]
    fn distant_pair_only_exchanges_forces() {
        let agents = pair(Vec3::ZERO, 1.0, Vec3::new(10.0, 0.0, 0.0), 10.0);
        let actions = ActionBuffer::new(2);
        let outcome = attack_defend_fight(&agents, &actions, &rivalry(0.1), 0, 1);
        assert_eq!(outcome, Engagement::Ranged);
        assert_eq!(actions.get(0).new_parent, None);
        // Floored at attack_radius 40: 100 / 40^3.
        assert!((actions.get(0).force.x - 100.0 / 64_000.0).abs() < 1e-7);
        assert_eq!(
            attack_defend_fight(&agents, &actions, &rivalry(0.1), 1, 1),
            Engagement::Ignored
        );
    }
}
