use std::collections::HashMap;

use rand::{Rng, SeedableRng, rngs::SmallRng};
use swarmtree_core::hierarchy::{build_tree, subtree};
use swarmtree_core::{
    AgentColumns, AgentData, CombatConstants, ParentLink, SwarmConfig, SwarmWorld, Tick, Vec3,
};

fn crowded_config(seed: u64) -> SwarmConfig {
    SwarmConfig {
        num_agents: 400,
        lx: 30.0,
        ly: 30.0,
        lz: 30.0,
        leader_layer: 4,
        rng_seed: Some(seed),
        ..SwarmConfig::default()
    }
}

/// Asserts every led agent sits in exactly one leader's subtree, the one it points at.
fn assert_leadership_partition(world: &SwarmWorld) {
    let agents = world.agents();
    let mut owner = HashMap::new();
    for leader in world.leaders().iter() {
        let Some(head) = leader.agent else {
            continue;
        };
        for member in subtree(agents, head).expect("walk") {
            assert!(
                owner.insert(member, leader.id).is_none(),
                "agent {member} owned twice"
            );
        }
    }
    for idx in 0..agents.len() {
        match agents.leader(idx) {
            Some(reference) => {
                assert_eq!(owner.get(&idx), Some(&reference.id), "agent {idx}");
                let slot = world.leaders().get(reference.id).expect("slot");
                assert_eq!(slot.agent, Some(reference.agent));
            }
            None => assert!(!owner.contains_key(&idx), "agent {idx} owned but unled"),
        }
    }
}

#[test]
fn spring_chain_at_rest_length_feels_no_force() {
    let agents: AgentColumns = (0..5)
        .map(|i| {
            let mut agent = AgentData::at(Vec3::new(i as f32, 0.0, 0.0), 1.0);
            agent.parent = if i == 0 {
                ParentLink::Root
            } else {
                ParentLink::Node(i - 1)
            };
            if i < 4 {
                agent.children.push(i + 1);
            }
            agent
        })
        .collect();
    let config = SwarmConfig {
        dt: 0.1,
        center_force_constant: 0.0,
        grouping_constant: 1.0,
        grouping_radius: 1.0,
        combat: CombatConstants::default(),
        rng_seed: Some(0),
        ..SwarmConfig::default()
    };
    let mut world = SwarmWorld::from_agents(config, agents).expect("world");
    let before = world.positions().to_vec();
    world.step().expect("step");

    for idx in 0..5 {
        let force = world.actions().get(idx).force;
        assert!(force.length() < 1e-5, "agent {idx} feels {force:?}");
        assert!(world.velocities()[idx].length() < 1e-5);
    }
    assert_eq!(world.positions(), before.as_slice());
    assert!(world.check_invariants().is_ok());
}

#[test]
fn even_masses_skirmish_without_changing_sides() {
    let mut world = SwarmWorld::new(crowded_config(0x5EED)).expect("world");
    assert!(world.check_invariants().is_ok());
    assert_leadership_partition(&world);

    world.enable_combat_phase();
    for _ in 0..6 {
        let summary = world.step().expect("step");
        assert!(summary.enemy_links > 0);
        assert_eq!(summary.reparented, 0);
        assert!(world.check_invariants().is_ok());
        let floor = world.config().mass_min;
        assert!(world.masses().iter().all(|&m| m >= floor));

        world.propagate_leadership().expect("propagate");
        assert_leadership_partition(&world);
    }
    assert_eq!(world.tick(), Tick(6));
    let counts = world.leader_agent_counts().expect("counts");
    let led = world
        .agents()
        .leaders()
        .iter()
        .filter(|leader| leader.is_some())
        .count();
    assert_eq!(counts.iter().sum::<usize>(), led);
}

/// Same box as `crowded_config`, with masses spread wide enough for surrenders.
fn uneven_world(seed: u64) -> SwarmWorld {
    let config = crowded_config(seed);
    let mut rng = SmallRng::seed_from_u64(seed);
    let half = config.lx / 2.0;
    let mut agents: AgentColumns = (0..config.num_agents)
        .map(|_| {
            let position = Vec3::new(
                rng.random_range(-half..half),
                rng.random_range(-half..half),
                rng.random_range(-half..half),
            );
            AgentData::at(position, rng.random_range(0.2..10.0))
        })
        .collect();
    build_tree(&mut agents, config.tree_arity, config.max_tree_depth).expect("tree");
    SwarmWorld::from_agents(config, agents).expect("world")
}

#[test]
fn reparenting_keeps_tree_and_partition() {
    let mut world = uneven_world(0xB0A7);
    world.enable_combat_phase();

    let mut total = 0;
    let mut busiest = 0;
    for _ in 0..30 {
        let summary = world.step().expect("step");
        total += summary.reparented;
        busiest = busiest.max(summary.reparented);

        assert!(world.check_invariants().is_ok());
        let floor = world.config().mass_min;
        assert!(world.masses().iter().all(|&m| m >= floor));
        world.propagate_leadership().expect("propagate");
        assert_leadership_partition(&world);
    }
    assert!(total > 0, "no agent changed sides");
    assert!(busiest > 1, "never more than one re-parenting per step");
}

#[test]
fn detach_then_attach_restores_leaf() {
    let mut world = SwarmWorld::new(crowded_config(21)).expect("world");
    let agents = world.agents();
    let (leaf, parent) = (0..agents.len())
        .filter(|&idx| agents.children(idx).is_empty())
        .find_map(|idx| match agents.parent(idx) {
            ParentLink::Node(parent) if agents.leader(parent).is_some() => Some((idx, parent)),
            _ => None,
        })
        .expect("a leaf below a led parent");
    let mut siblings_before = agents.children(parent).to_vec();
    let leader_before = agents.leader(leaf);

    world.detach(parent, leaf).expect("detach");
    assert!(!world.agents().children(parent).contains(&leaf));
    assert_eq!(world.attach(parent, leaf).expect("attach"), parent);

    let mut siblings_after = world.agents().children(parent).to_vec();
    siblings_before.sort_unstable();
    siblings_after.sort_unstable();
    assert_eq!(siblings_before, siblings_after);
    assert_eq!(world.agents().leader(leaf), leader_before);
    assert!(world.check_invariants().is_ok());
}

#[test]
fn detaching_the_root_is_fatal() {
    let mut world = SwarmWorld::new(crowded_config(2)).expect("world");
    let root = world.agents().root().expect("root");
    assert!(world.detach(root, root).is_err());
}

#[test]
fn seeded_worlds_agree_up_to_rounding() {
    let mut a = SwarmWorld::new(crowded_config(77)).expect("world");
    let mut b = SwarmWorld::new(crowded_config(77)).expect("world");
    assert_eq!(a.positions(), b.positions());
    for _ in 0..3 {
        a.step().expect("step");
        b.step().expect("step");
    }
    for (pa, pb) in a.positions().iter().zip(b.positions()) {
        assert!(pa.distance(*pb) < 1e-3);
    }
}

#[test]
fn parent_chain_ends_at_root() {
    let world = SwarmWorld::new(crowded_config(4)).expect("world");
    let deepest = world.agents().len() - 1;
    let chain = world.parent_chain(deepest).expect("chain");
    assert_eq!(chain.first().map(|link| link.index), Some(deepest));
    assert_eq!(chain.last().map(|link| link.index), world.agents().root());
    assert!(world.parent_chain(world.agents().len()).is_err());
}
