use crate::physics::ids::ObjectId;
use crate::physics::obstacle::{Obstacle, Vec2};
use std::collections::BTreeMap;

/// Storage for the bodies the reconciliation engine manages.
///
/// Implemented by the game's physics world; the engine only needs keyed
/// access to obstacles.
pub trait ObstacleWorld {
    /// Adds an obstacle; returns `false` if the id is already taken
    fn insert(&mut self, id: ObjectId, obstacle: Obstacle) -> bool;

    fn remove(&mut self, id: ObjectId) -> Option<Obstacle>;

    fn get(&self, id: ObjectId) -> Option<&Obstacle>;

    fn get_mut(&mut self, id: ObjectId) -> Option<&mut Obstacle>;

    /// Every id currently in the world, in ascending order
    fn ids(&self) -> Vec<ObjectId>;

    fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }
}

/// Minimal in-memory world with an explicit Euler step
#[derive(Debug, Clone, Default)]
pub struct BasicWorld {
    bodies: BTreeMap<ObjectId, Obstacle>,
    gravity: Vec2,
}

impl BasicWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gravity(gravity: Vec2) -> Self {
        Self {
            bodies: BTreeMap::new(),
            gravity,
        }
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    pub fn step(&mut self, dt: f32) {
        for body in self.bodies.values_mut() {
            body.integrate(dt, self.gravity);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &Obstacle)> {
        self.bodies.iter().map(|(id, body)| (*id, body))
    }
}

impl ObstacleWorld for BasicWorld {
    fn insert(&mut self, id: ObjectId, obstacle: Obstacle) -> bool {
        if self.bodies.contains_key(&id) {
            return false;
        }
        self.bodies.insert(id, obstacle);
        true
    }

    fn remove(&mut self, id: ObjectId) -> Option<Obstacle> {
        self.bodies.remove(&id)
    }

    fn get(&self, id: ObjectId) -> Option<&Obstacle> {
        self.bodies.get(&id)
    }

    fn get_mut(&mut self, id: ObjectId) -> Option<&mut Obstacle> {
        self.bodies.get_mut(&id)
    }

    fn ids(&self) -> Vec<ObjectId> {
        self.bodies.keys().copied().collect()
    }

    fn contains(&self, id: ObjectId) -> bool {
        self.bodies.contains_key(&id)
    }
}
