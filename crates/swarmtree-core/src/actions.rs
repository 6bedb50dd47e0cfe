//! Per-step action records.
//!
//! Force kernels run in parallel and several of them may hit the same agent in
//! one phase, so every field is an atomic accumulator. The buffer is zeroed at
//! the start of a step and consumed once by the integrator.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::Vec3;

const NO_PARENT: usize = usize::MAX;

/// `f32` cell supporting lock-free addition.
#[derive(Debug, Default)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    #[must_use]
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[must_use]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Adds `delta`, retrying until no other writer interleaved.
    pub fn fetch_add(&self, delta: f32) -> f32 {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let next = (f32::from_bits(current) + delta).to_bits();
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(previous) => return f32::from_bits(previous),
                Err(actual) => current = actual,
            }
        }
    }
}

/// Plain copy of one agent's accumulated action.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Action {
    pub force: Vec3,
    pub mass_rate: f32,
    /// Parent requested by the combat kernel this step.
    pub new_parent: Option<usize>,
}

#[derive(Debug, Default)]
struct ActionSlot {
    fx: AtomicF32,
    fy: AtomicF32,
    fz: AtomicF32,
    rm: AtomicF32,
    new_parent: AtomicUsize,
}

impl ActionSlot {
    fn empty() -> Self {
        Self {
            new_parent: AtomicUsize::new(NO_PARENT),
            ..Self::default()
        }
    }

    fn reset(&mut self) {
        *self.fx.0.get_mut() = 0;
        *self.fy.0.get_mut() = 0;
        *self.fz.0.get_mut() = 0;
        *self.rm.0.get_mut() = 0;
        *self.new_parent.get_mut() = NO_PARENT;
    }
}

/// Action records for every agent, shared by reference across rayon workers.
#[derive(Debug, Default)]
pub struct ActionBuffer {
    slots: Vec<ActionSlot>,
}

impl ActionBuffer {
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| ActionSlot::empty()).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Zeroes every record; resizes when the population changed.
    pub fn reset(&mut self, len: usize) {
        if self.slots.len() != len {
            self.slots.resize_with(len, ActionSlot::empty);
        }
        for slot in &mut self.slots {
            slot.reset();
        }
    }

    pub fn add_force(&self, index: usize, force: Vec3) {
        let slot = &self.slots[index];
        slot.fx.fetch_add(force.x);
        slot.fy.fetch_add(force.y);
        slot.fz.fetch_add(force.z);
    }

    pub fn add_mass_rate(&self, index: usize, rate: f32) {
        self.slots[index].rm.fetch_add(rate);
    }

    /// Records a re-parenting request. Later requests overwrite earlier ones.
    pub fn request_parent(&self, index: usize, parent: usize) {
        self.slots[index]
            .new_parent
            .store(parent, Ordering::Relaxed);
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Action {
        let slot = &self.slots[index];
        let new_parent = slot.new_parent.load(Ordering::Relaxed);
        Action {
            force: Vec3::new(slot.fx.load(), slot.fy.load(), slot.fz.load()),
            mass_rate: slot.rm.load(),
            new_parent: (new_parent != NO_PARENT).then_some(new_parent),
        }
    }

    /// Agents with a pending re-parenting, in index order.
    #[must_use]
    pub fn pending_reparents(&self) -> Vec<(usize, usize)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| {
                let parent = slot.new_parent.load(Ordering::Relaxed);
                (parent != NO_PARENT).then_some((idx, parent))
            })
            .collect()
    }
}
