//! tucache: incremental translation-unit cache for code editors
//!
//! A [`ParserCoordinator`] keeps one parsed unit per source file and decides
//! when the parsing engine runs. Editor features read the cache while
//! background tasks refresh it; the coordinator makes sure at most one parse
//! cycle runs at a time and that readers holding a [`FreezeGuard`] see a
//! stable cache.
//!
//! # Supported Languages
//!
//! The bundled [`TreeSitterEngine`] parses C and C++ (`.h` headers are
//! treated as C++). Any other engine can be plugged in through
//! [`ParseEngine`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tucache::{CoordinatorFactory, FileSystemSource, ParseMode, TracingSink, TreeSitterEngine};
//!
//! let coordinator = CoordinatorFactory::new().create(
//!     TreeSitterEngine::new(),
//!     Arc::new(FileSystemSource),
//!     Arc::new(TracingSink),
//! )?;
//!
//! coordinator.add_include_paths(["/usr/include"]);
//! coordinator.parse_file("src/main.c", ParseMode::Always, true)?;
//!
//! if let Some(guard) = coordinator.freeze() {
//!     let kind = coordinator.statement_kind_at("src/main.c", 3, 5);
//!     println!("{} at {}", kind, guard.serial_id());
//! }
//! ```

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod events;
pub mod keywords;
pub mod lang;
pub mod paths;
pub mod source;
pub mod statement;
pub mod task;

// Re-export commonly used types
pub use config::CoordinatorConfig;
pub use coordinator::{
    CacheStats, CoordinatorFactory, FileListSummary, FreezeGuard, ParseMode, ParseOutcome,
    ParserCoordinator, ParserId, SerialId, SkipReason,
};
pub use engine::{ParseEngine, ParseInput, TranslationUnit, TreeSitterEngine};
pub use error::{CoordinatorError, EngineError, Result};
pub use events::{
    ChannelSink, JsonLinesSink, NoopSink, ParseEvent, ParseEventSink, SinkSet, TracingSink,
};
pub use lang::{FileKind, Lang};
pub use paths::{IncludeContext, IncludeDirective};
pub use source::{BufferOverlay, EngineReadsSource, FileSystemSource, SourceProvider};
pub use statement::StatementKind;
pub use task::{spawn_parse_file, spawn_parse_file_list, ParseTask};
