use crate::physics::obstacle::Obstacle;
use std::ops::{Deref, DerefMut};

/// Drops an obstacle's `shared` flag for the lifetime of the guard.
///
/// Writes made through the guard are network-driven corrections, so they must
/// not be recorded as local changes and echoed back out. The previous flag is
/// restored on drop, on every exit path.
pub struct SharedGuard<'a> {
    obstacle: &'a mut Obstacle,
    was_shared: bool,
}

impl<'a> SharedGuard<'a> {
    pub fn new(obstacle: &'a mut Obstacle) -> Self {
        let was_shared = obstacle.is_shared();
        obstacle.set_shared(false);
        Self {
            obstacle,
            was_shared,
        }
    }
}

impl Deref for SharedGuard<'_> {
    type Target = Obstacle;

    fn deref(&self) -> &Obstacle {
        self.obstacle
    }
}

impl DerefMut for SharedGuard<'_> {
    fn deref_mut(&mut self) -> &mut Obstacle {
        self.obstacle
    }
}

impl Drop for SharedGuard<'_> {
    fn drop(&mut self) {
        self.obstacle.set_shared(self.was_shared);
    }
}
