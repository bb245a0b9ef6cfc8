//! Parser identities and generation stamps

use std::sync::atomic::{AtomicU32, Ordering};

/// Identity of one coordinator instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParserId(pub u32);

impl std::fmt::Display for ParserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generation stamp of a coordinator's cache
///
/// A new stamp is taken every time a parse cycle starts and every time the
/// coordinator is reset. Comparing two stamps only means something when they
/// share a parser id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SerialId {
    parser: ParserId,
    generation: u64,
}

impl SerialId {
    /// First stamp of a parser
    pub fn initial(parser: ParserId) -> Self {
        Self {
            parser,
            generation: 0,
        }
    }

    /// The stamp following this one
    pub fn next(self) -> Self {
        Self {
            parser: self.parser,
            generation: self.generation + 1,
        }
    }

    /// Parser that issued the stamp
    pub fn parser(&self) -> ParserId {
        self.parser
    }

    /// Generation counter
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Check if `other` is a later stamp of the same parser
    pub fn is_older_than(&self, other: &SerialId) -> bool {
        self.parser == other.parser && self.generation < other.generation
    }
}

impl std::fmt::Display for SerialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.parser, self.generation)
    }
}

/// Hands out parser ids in sequence
///
/// Owned by whoever builds coordinators, so ids are deterministic per
/// allocator rather than per process.
#[derive(Debug, Default)]
pub struct ParserIdAllocator {
    next: AtomicU32,
}

impl ParserIdAllocator {
    /// Start allocating at zero
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Start allocating at `first`
    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }

    /// Take the next id
    pub fn allocate(&self) -> ParserId {
        ParserId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}
