//! Core simulation engine for swarmtree.
//!
//! A population of point-mass agents is arranged in a single rooted tree of
//! bounded arity. Every agent at a fixed depth (the leader layer) governs its
//! subtree as a combat unit. Each step accumulates spring, centering, repulsion
//! and combat forces, integrates with a leap-frog scheme and finally re-parents
//! agents that lost a fight.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

pub mod actions;
pub mod agents;
pub mod config;
pub mod enemies;
pub mod error;
pub mod forces;
pub mod hierarchy;
pub mod leaders;
pub mod world;

pub use actions::{Action, ActionBuffer};
pub use agents::{AgentColumns, AgentData, LeaderRef, ParentLink};
pub use config::{CombatConstants, EnemyPolicy, SwarmConfig};
pub use enemies::EnemyScan;
pub use error::{SwarmError, TreeViolation};
pub use forces::{Combat, Engagement};
pub use hierarchy::ChainLink;
pub use leaders::{Leader, LeaderTable};
pub use world::{StepSummary, SwarmWorld};

/// Compile-time upper bound on children per agent.
pub const MAX_CHILDREN: usize = 8;

/// Default number of leader slots.
pub const MAX_NUM_LEADERS: usize = 1024;

/// Simulation clock (steps completed since setup).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Position of a leader in the leader table.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct LeaderId(pub u32);

impl LeaderId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Plain 3D vector used for positions, velocities and forces.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    #[must_use]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Euclidean distance between two points.
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}
