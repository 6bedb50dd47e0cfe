//! Bounded-arity tree over the agent store.
//!
//! All traversals use an explicit stack; a walk that visits more nodes than the
//! store holds reports [`SwarmError::CycleDetected`] instead of looping.

use serde::{Deserialize, Serialize};

use crate::agents::Children;
use crate::{AgentColumns, LeaderRef, LeaderTable, ParentLink, SwarmError, TreeViolation};

/// One hop of a parent-chain walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainLink {
    pub index: usize,
    pub leader: Option<LeaderRef>,
    pub children: Children,
}

/// Builds a single rooted tree over every stored agent, depth first.
///
/// Agent 0 becomes the root. Each new agent is hung below the most recently
/// placed agent that still has room (fewer than `arity` children and depth
/// below `max_depth`), backtracking toward the root when a node is full.
pub fn build_tree(
    agents: &mut AgentColumns,
    arity: usize,
    max_depth: usize,
) -> Result<(), SwarmError> {
    let requested = agents.len();
    for idx in 0..requested {
        agents.set_parent(idx, ParentLink::Unattached);
        agents.set_leader(idx, None);
        agents.children_mut(idx).clear();
    }
    if requested == 0 {
        return Ok(());
    }

    agents.set_parent(0, ParentLink::Root);
    let mut current = 0;
    let mut level = 0;
    let mut next = 1;
    while next < requested {
        if agents.children(current).len() < arity && level < max_depth {
            agents.children_mut(current).push(next);
            agents.set_parent(next, ParentLink::Node(current));
            current = next;
            level += 1;
            next += 1;
        } else if let ParentLink::Node(parent) = agents.parent(current) {
            current = parent;
            level -= 1;
        } else {
            return Err(SwarmError::TreeFull {
                placed: next,
                requested,
                arity,
                max_depth,
            });
        }
    }
    Ok(())
}

/// Visits `start` and its subtree in pre-order (children in attachment order).
pub(crate) fn visit_subtree(
    agents: &AgentColumns,
    start: usize,
    mut visit: impl FnMut(usize) -> Result<(), SwarmError>,
) -> Result<(), SwarmError> {
    agents.ensure(start)?;
    let limit = agents.len();
    let mut visited = 0usize;
    let mut stack = vec![start];
    while let Some(idx) = stack.pop() {
        visited += 1;
        if visited > limit {
            return Err(SwarmError::CycleDetected { agent: start });
        }
        visit(idx)?;
        stack.extend(agents.children(idx).iter().rev().copied());
    }
    Ok(())
}

/// Subtree members of `start` in pre-order, `start` first.
pub fn subtree(agents: &AgentColumns, start: usize) -> Result<Vec<usize>, SwarmError> {
    let mut members = Vec::new();
    visit_subtree(agents, start, |idx| {
        members.push(idx);
        Ok(())
    })?;
    Ok(members)
}

/// Number of agents strictly below `idx`.
pub fn count_children(agents: &AgentColumns, idx: usize) -> Result<usize, SwarmError> {
    let mut count = 0usize;
    visit_subtree(agents, idx, |_| {
        count += 1;
        Ok(())
    })?;
    Ok(count - 1)
}

/// Assigns `leader` to `idx` and its whole subtree, returning the number of agents touched.
pub fn make_leader(
    agents: &mut AgentColumns,
    idx: usize,
    leader: Option<LeaderRef>,
) -> Result<usize, SwarmError> {
    let members = subtree(agents, idx)?;
    for &member in &members {
        agents.set_leader(member, leader);
    }
    Ok(members.len())
}

/// Layer of `idx` counted along its parent chain; the root is layer 1.
pub fn layer_of(agents: &AgentColumns, idx: usize) -> Result<usize, SwarmError> {
    agents.ensure(idx)?;
    let mut layer = 1;
    let mut current = idx;
    while let ParentLink::Node(parent) = agents.parent(current) {
        layer += 1;
        if layer > agents.len() {
            return Err(SwarmError::CycleDetected { agent: idx });
        }
        current = parent;
    }
    Ok(layer)
}

/// True when `ancestor` lies on the parent chain of `idx` (or is `idx`).
fn is_ancestor(agents: &AgentColumns, ancestor: usize, idx: usize) -> bool {
    let mut current = Some(idx);
    let mut steps = 0;
    while let Some(node) = current {
        if node == ancestor {
            return true;
        }
        steps += 1;
        if steps > agents.len() {
            return false;
        }
        current = agents.parent(node).index();
    }
    false
}

/// Walks from `idx` up to the root.
pub fn parent_chain(agents: &AgentColumns, idx: usize) -> Result<Vec<ChainLink>, SwarmError> {
    agents.ensure(idx)?;
    let mut chain = Vec::new();
    let mut current = Some(idx);
    while let Some(node) = current {
        if chain.len() >= agents.len() {
            return Err(SwarmError::CycleDetected { agent: idx });
        }
        chain.push(ChainLink {
            index: node,
            leader: agents.leader(node),
            children: agents.children(node).iter().copied().collect(),
        });
        current = agents.parent(node).index();
    }
    Ok(chain)
}

/// Hangs `child` below `parent`, or below the first descendant along the
/// first-child path that still has room. Returns the agent actually used.
///
/// `child` takes over the leader of its new parent, subtree included.
pub fn attach(
    agents: &mut AgentColumns,
    parent: usize,
    child: usize,
    max_children: usize,
) -> Result<usize, SwarmError> {
    agents.ensure(parent)?;
    agents.ensure(child)?;
    if agents.parent(child) != ParentLink::Unattached {
        return Err(SwarmError::AlreadyAttached { child });
    }
    if is_ancestor(agents, child, parent) {
        return Err(SwarmError::CycleDetected { agent: child });
    }

    let mut target = parent;
    let mut hops = 0;
    loop {
        let Some(leader) = agents.leader(target) else {
            return Err(SwarmError::NotLeaderGoverned { parent: target });
        };
        if agents.children(target).len() < max_children {
            agents.children_mut(target).push(child);
            agents.set_parent(child, ParentLink::Node(target));
            make_leader(agents, child, Some(leader))?;
            return Ok(target);
        }
        hops += 1;
        if hops > agents.len() {
            return Err(SwarmError::CycleDetected { agent: parent });
        }
        let Some(&first) = agents.children(target).first() else {
            return Err(SwarmError::InvalidConfig("max_children must be positive"));
        };
        target = first;
    }
}

/// Removes `child` from `parent`, keeping the tree connected.
///
/// A detached agent with offspring is replaced in its parent's slot by its
/// first child; the remaining offspring are re-attached under that promoted
/// agent. If `child` was a leader the promoted agent inherits the leader slot,
/// or the slot becomes vacant when there is nothing to promote. The detached
/// agent ends up unattached, childless and unled.
pub fn detach(
    agents: &mut AgentColumns,
    leaders: &mut LeaderTable,
    parent: usize,
    child: usize,
    max_children: usize,
) -> Result<(), SwarmError> {
    agents.ensure(parent)?;
    agents.ensure(child)?;
    if agents.parent(child) == ParentLink::Root {
        return Err(SwarmError::DetachRoot { agent: child });
    }
    let Some(slot) = agents.children(parent).iter().position(|&c| c == child) else {
        return Err(SwarmError::NotAChild { parent, child });
    };

    let former_leader = agents.leader(child);
    let led_by_self = former_leader.filter(|leader| leader.agent == child);
    if agents.children(child).len() > 1 && former_leader.is_none() {
        return Err(SwarmError::NotLeaderGoverned {
            parent: agents.children(child)[0],
        });
    }

    let offspring = std::mem::take(agents.children_mut(child));
    match offspring.split_first() {
        None => {
            agents.children_mut(parent).remove(slot);
            if let Some(leader) = led_by_self {
                leaders.reassign(leader.id, None);
            }
        }
        Some((&promoted, rest)) => {
            agents.children_mut(parent)[slot] = promoted;
            agents.set_parent(promoted, ParentLink::Node(parent));
            for &orphan in rest {
                agents.set_parent(orphan, ParentLink::Unattached);
                attach(agents, promoted, orphan, max_children)?;
            }
            if let Some(leader) = led_by_self {
                leaders.reassign(leader.id, Some(promoted));
                make_leader(
                    agents,
                    promoted,
                    Some(LeaderRef {
                        id: leader.id,
                        agent: promoted,
                    }),
                )?;
            }
        }
    }

    agents.set_parent(child, ParentLink::Unattached);
    agents.set_leader(child, None);
    Ok(())
}

/// Checks the rooted-tree invariants, reporting the first violation.
pub fn verify_tree(agents: &AgentColumns, max_children: usize) -> Result<(), TreeViolation> {
    let len = agents.len();
    if len == 0 {
        return Ok(());
    }
    let mut root = None;
    for idx in 0..len {
        match agents.parent(idx) {
            ParentLink::Root => {
                if let Some(first) = root {
                    return Err(TreeViolation::MultipleRoots { first, second: idx });
                }
                root = Some(idx);
            }
            ParentLink::Unattached => return Err(TreeViolation::Unattached { agent: idx }),
            ParentLink::Node(parent) => {
                if parent >= len {
                    return Err(TreeViolation::DanglingParent { agent: idx, parent });
                }
                if !agents.children(parent).contains(&idx) {
                    return Err(TreeViolation::Orphaned { agent: idx, parent });
                }
            }
        }
    }
    if root.is_none() {
        return Err(TreeViolation::MissingRoot);
    }

    for holder in 0..len {
        let children = agents.children(holder);
        if children.len() > max_children {
            return Err(TreeViolation::Arity {
                agent: holder,
                count: children.len(),
                limit: max_children,
            });
        }
        for (pos, &child) in children.iter().enumerate() {
            if children[..pos].contains(&child) {
                return Err(TreeViolation::DuplicateChild { holder, child });
            }
            let parent = agents.parents().get(child).copied();
            if parent != Some(ParentLink::Node(holder)) {
                return Err(TreeViolation::ParentMismatch {
                    holder,
                    child,
                    parent: parent.and_then(ParentLink::index),
                });
            }
        }
    }

    // Every chain must reach the root; memoise agents already known to.
    let mut grounded = vec![false; len];
    let mut path = Vec::new();
    for start in 0..len {
        path.clear();
        let mut current = start;
        loop {
            if grounded[current] {
                break;
            }
            path.push(current);
            if path.len() > len {
                return Err(TreeViolation::Cycle { agent: start });
            }
            match agents.parent(current) {
                ParentLink::Node(parent) => current = parent,
                ParentLink::Root | ParentLink::Unattached => break,
            }
        }
        for &node in &path {
            grounded[node] = true;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AgentData, LeaderId, Vec3};

    fn unplaced(n: usize) -> AgentColumns {
        (0..n)
            .map(|i| AgentData::at(Vec3::new(i as f32, 0.0, 0.0), 1.0))
            .collect()
    }

    fn led_tree(n: usize, arity: usize, depth: usize, layer: usize) -> (AgentColumns, LeaderTable) {
        let mut agents = unplaced(n);
        build_tree(&mut agents, arity, depth).expect("tree");
        let leaders = LeaderTable::identify(&agents, layer, 64).expect("leaders");
        leaders.propagate(&mut agents).expect("propagate");
        (agents, leaders)
    }

    #[test]
    fn build_tree_is_depth_first() {
        let mut agents = unplaced(7);
        build_tree(&mut agents, 2, 2).expect("tree");
        assert_eq!(agents.parent(0), ParentLink::Root);
        assert_eq!(agents.children(0), &[1, 4]);
        assert_eq!(agents.children(1), &[2, 3]);
        assert_eq!(agents.children(4), &[5, 6]);
        assert_eq!(layer_of(&agents, 6).expect("layer"), 3);
        assert!(verify_tree(&agents, 2).is_ok());
    }

    #[test]
    fn build_tree_fails_when_full() {
        let mut agents = unplaced(8);
        let err = build_tree(&mut agents, 2, 2).expect_err("capacity is 7");
        assert_eq!(
            err,
            SwarmError::TreeFull {
                placed: 7,
                requested: 8,
                arity: 2,
                max_depth: 2
            }
        );
    }

    #[test]
    fn count_and_subtree_follow_preorder() {
        let mut agents = unplaced(7);
        build_tree(&mut agents, 2, 2).expect("tree");
        assert_eq!(subtree(&agents, 0).expect("walk"), vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(count_children(&agents, 0).expect("count"), 6);
        assert_eq!(count_children(&agents, 4).expect("count"), 2);
        assert_eq!(count_children(&agents, 6).expect("count"), 0);
    }

    #[test]
    fn parent_chain_reaches_root() {
        let (agents, _) = led_tree(7, 2, 2, 2);
        let chain = parent_chain(&agents, 5).expect("chain");
        let indices: Vec<usize> = chain.iter().map(|link| link.index).collect();
        assert_eq!(indices, vec![5, 4, 0]);
        assert_eq!(chain[1].children.as_slice(), &[5, 6]);
        assert_eq!(chain[0].leader.map(|l| l.agent), Some(4));
        assert!(chain[2].leader.is_none());
    }

    #[test]
    fn attach_falls_back_to_first_child() {
        let (mut agents, mut leaders) = led_tree(7, 2, 2, 2);
        detach(&mut agents, &mut leaders, 4, 6, 2).expect("detach leaf");
        // 1 is full (2, 3); the fallback path descends into 2.
        let used = attach(&mut agents, 1, 6, 2).expect("attach");
        assert_eq!(used, 2);
        assert_eq!(agents.children(2), &[6]);
        assert_eq!(agents.parent(6), ParentLink::Node(2));
        assert_eq!(agents.leader(6).map(|l| l.agent), Some(1));
        assert!(verify_tree(&agents, 2).is_ok());
    }

    #[test]
    fn attach_requires_leader_governed_parent() {
        let (mut agents, mut leaders) = led_tree(7, 2, 2, 2);
        detach(&mut agents, &mut leaders, 4, 6, 2).expect("detach");
        let err = attach(&mut agents, 0, 6, 2).expect_err("root is unled");
        assert_eq!(err, SwarmError::NotLeaderGoverned { parent: 0 });
    }

    #[test]
    fn attach_rejects_attached_child() {
        let (mut agents, _) = led_tree(7, 2, 2, 2);
        assert_eq!(
            attach(&mut agents, 1, 5, 8),
            Err(SwarmError::AlreadyAttached { child: 5 })
        );
    }

    #[test]
    fn detach_leaf_then_attach_round_trips() {
        let (mut agents, mut leaders) = led_tree(7, 2, 2, 2);
        let leader_before = agents.leader(3);
        detach(&mut agents, &mut leaders, 1, 3, 2).expect("detach");
        assert_eq!(agents.children(1), &[2]);
        assert_eq!(agents.parent(3), ParentLink::Unattached);
        assert!(agents.leader(3).is_none());

        attach(&mut agents, 1, 3, 2).expect("attach");
        let mut children = agents.children(1).to_vec();
        children.sort_unstable();
        assert_eq!(children, vec![2, 3]);
        assert_eq!(agents.leader(3), leader_before);
        assert!(verify_tree(&agents, 2).is_ok());
    }

    #[test]
    fn detach_promotes_first_child_and_hands_over_leadership() {
        // 0 -> 1 -> {2, 5}; 2 -> {3, 4}; layer 3 holds leaders 2 and 5.
        let mut agents = unplaced(6);
        agents.set_parent(0, ParentLink::Root);
        for (parent, child) in [(0, 1), (1, 2), (2, 3), (2, 4), (1, 5)] {
            agents.children_mut(parent).push(child);
            agents.set_parent(child, ParentLink::Node(parent));
        }
        let mut leaders = LeaderTable::identify(&agents, 3, 8).expect("leaders");
        leaders.propagate(&mut agents).expect("propagate");
        assert_eq!(leaders.len(), 2);
        let id = agents.leader(2).expect("led").id;

        detach(&mut agents, &mut leaders, 1, 2, 8).expect("detach");
        assert_eq!(agents.children(1), &[3, 5]);
        assert_eq!(agents.parent(3), ParentLink::Node(1));
        assert_eq!(agents.children(3), &[4]);
        assert_eq!(leaders.get(id).and_then(|l| l.agent), Some(3));
        assert_eq!(agents.leader(4), Some(LeaderRef { id, agent: 3 }));
        assert!(agents.leader(2).is_none());
        assert_eq!(agents.parent(2), ParentLink::Unattached);
    }

    #[test]
    fn detaching_childless_leader_vacates_slot() {
        let (mut agents, mut leaders) = led_tree(7, 2, 2, 3);
        let id = agents.leader(6).expect("led").id;
        assert_eq!(leaders.get(id).and_then(|l| l.agent), Some(6));
        detach(&mut agents, &mut leaders, 4, 6, 2).expect("detach");
        assert!(leaders.get(id).expect("slot").is_vacant());
    }

    #[test]
    fn detach_rejects_root_and_strangers() {
        let (mut agents, mut leaders) = led_tree(7, 2, 2, 2);
        assert_eq!(
            detach(&mut agents, &mut leaders, 0, 0, 2),
            Err(SwarmError::DetachRoot { agent: 0 })
        );
        assert_eq!(
            detach(&mut agents, &mut leaders, 1, 5, 2),
            Err(SwarmError::NotAChild {
                parent: 1,
                child: 5
            })
        );
    }

    #[test]
    fn verify_tree_reports_violations() {
        let mut agents = unplaced(3);
        build_tree(&mut agents, 2, 2).expect("tree");
        assert!(verify_tree(&agents, 2).is_ok());

        agents.set_parent(2, ParentLink::Root);
        assert_eq!(
            verify_tree(&agents, 2),
            Err(TreeViolation::MultipleRoots {
                first: 0,
                second: 2
            })
        );

        let mut agents = unplaced(3);
        build_tree(&mut agents, 2, 1).expect("star");
        assert_eq!(
            verify_tree(&agents, 1),
            Err(TreeViolation::Arity {
                agent: 0,
                count: 2,
                limit: 1
            })
        );

        let mut agents = unplaced(3);
        build_tree(&mut agents, 1, 2).expect("chain");
        agents.set_parent(0, ParentLink::Node(2));
        agents.children_mut(2).push(0);
        assert!(matches!(
            verify_tree(&agents, 2),
            Err(TreeViolation::MissingRoot)
        ));
    }

    #[test]
    fn leader_id_index_matches_table_slot() {
        let (agents, leaders) = led_tree(7, 2, 2, 2);
        for leader in leaders.iter() {
            assert_eq!(leaders.get(leader.id).map(|l| l.id), Some(leader.id));
        }
        assert_eq!(agents.leader(2).map(|l| l.id), Some(LeaderId(0)));
    }
}
