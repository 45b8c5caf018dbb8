//! Cross-peer object identity.
//!
//! An [`ObjectId`] packs the creating peer's short id into the high 32 bits and
//! that peer's creation counter into the low 32 bits, so peers that create
//! objects independently never collide. Owner `0` is reserved for init objects
//! that every peer builds in the same order during scene setup.

use std::fmt;

/// Owner half used by init objects
pub const INIT_OWNER: u32 = 0;

/// 64-bit identifier shared by every peer for one synchronized body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl ObjectId {
    pub fn new(owner: u32, seq: u32) -> Self {
        Self((u64::from(owner) << 32) | u64::from(seq))
    }

    /// Short id of the peer that created the object
    pub fn owner(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn seq(self) -> u32 {
        self.0 as u32
    }

    pub fn is_init(self) -> bool {
        self.owner() == INIT_OWNER
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner(), self.seq())
    }
}

impl From<u64> for ObjectId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Hands out ids for one owner
#[derive(Debug, Clone)]
pub struct IdAllocator {
    owner: u32,
    next_seq: u32,
}

impl IdAllocator {
    pub fn new(owner: u32) -> Self {
        Self { owner, next_seq: 0 }
    }

    pub fn owner(&self) -> u32 {
        self.owner
    }

    /// Rebinds the allocator to a new owner and restarts its counter
    pub fn set_owner(&mut self, owner: u32) {
        self.owner = owner;
        self.next_seq = 0;
    }

    pub fn next_id(&mut self) -> ObjectId {
        let id = ObjectId::new(self.owner, self.next_seq);
        self.next_seq = self.next_seq.wrapping_add(1);
        id
    }

    pub fn reset(&mut self) {
        self.next_seq = 0;
    }
}
