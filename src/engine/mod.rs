//! Parsing engine capability
//!
//! The coordinator does not parse anything itself. It drives a
//! [`ParseEngine`], which turns a file into an opaque unit and re-parses an
//! existing unit against new contents. The engine owns no coordinator state.
//!
//! # Ownership
//!
//! Units and the engine context are plain owned values. The coordinator keeps
//! exactly one owner per cache entry and one context; replacing an entry, a
//! reset, or dropping the coordinator releases them through `Drop`, once.
//!
//! # Thread Safety
//!
//! The context is only ever touched by the thread that owns the current
//! parse cycle (or a reset), so it needs to be `Send` but not `Sync`. Units
//! are shared with readers through `Arc` and must be `Send + Sync`.

pub mod treesitter;

use std::path::Path;

use crate::error::EngineError;
use crate::paths::IncludeContext;
use crate::statement::StatementKind;

pub use self::treesitter::{TranslationUnit, TreeSitterContext, TreeSitterEngine};

/// Everything an engine gets for a single parse or reparse
#[derive(Debug, Clone, Copy)]
pub struct ParseInput<'a> {
    /// File identity
    pub path: &'a Path,
    /// Current contents, or `None` for "read the file yourself"
    pub source: Option<&'a [u8]>,
    /// Include path snapshot taken when the parse cycle started
    pub includes: &'a IncludeContext,
}

impl<'a> ParseInput<'a> {
    /// Build an input for `path` with optional in-memory contents
    pub fn new(path: &'a Path, source: Option<&'a [u8]>, includes: &'a IncludeContext) -> Self {
        Self {
            path,
            source,
            includes,
        }
    }
}

/// A parsing engine driven by the coordinator
pub trait ParseEngine: Send + Sync {
    /// Opaque parse result for one file
    type Unit: Send + Sync;

    /// Reusable engine state (symbol and include caches internal to the engine)
    type Context: Send;

    /// Create a fresh context
    fn create_context(&self) -> Result<Self::Context, EngineError>;

    /// Parse a file that has no unit yet
    fn parse(
        &self,
        ctx: &mut Self::Context,
        input: ParseInput<'_>,
    ) -> Result<Self::Unit, EngineError>;

    /// Produce a replacement for `unit` from the file's current contents
    ///
    /// The old unit is left untouched; on failure the caller keeps it.
    fn reparse(
        &self,
        ctx: &mut Self::Context,
        unit: &Self::Unit,
        input: ParseInput<'_>,
    ) -> Result<Self::Unit, EngineError>;

    /// Resolve what is at a 1-based line / column of a unit
    fn resolve_location(&self, unit: &Self::Unit, line: u32, column: u32)
        -> Option<StatementKind>;
}
