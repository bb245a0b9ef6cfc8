//! Parser coordinator
//!
//! Owns the translation-unit cache, the include path sets and the project
//! file set, and decides when the [`ParseEngine`] runs.
//!
//! # Protocol
//!
//! - At most one parse cycle runs at a time. A request arriving while a cycle
//!   runs, while the coordinator is frozen, or while it is disabled is
//!   rejected with [`ParseOutcome::Skipped`]; nothing is queued.
//! - [`ParserCoordinator::freeze`] hands out a [`FreezeGuard`]. While any
//!   guard is alive no new cycle starts. Dropping the guard is the only way to
//!   release it, so an unmatched unfreeze cannot be written.
//! - Every cycle start and every reset takes a new [`SerialId`]. A caller that
//!   remembered a stamp can use [`ParserCoordinator::freeze_checked`] to make
//!   sure nothing changed in between.
//! - [`ParserCoordinator::reset`] waits on a condition variable until no
//!   cycle runs and no guard is held, then clears everything.
//!
//! # Thread Safety
//!
//! One `Mutex` protects all metadata and the cache map. It is held only for
//! short check/update sections. Engine calls run outside it, under the
//! separate context lock that only the cycle owner touches. Readers that ask
//! for a unit while a reparse of the same file is in flight get the previous
//! unit; the replacement is installed in one step when the engine returns.
//!
//! LOCKING ORDER: `context` before `state`. Notifications are always sent with
//! no lock held.

pub mod cache;
pub mod serial;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::engine::{ParseEngine, ParseInput};
use crate::error::{EngineError, Result};
use crate::events::ParseEventSink;
use crate::lang::FileKind;
use crate::paths::{self, IncludeContext};
use crate::source::SourceProvider;
use crate::statement::StatementKind;

pub use self::cache::{CacheEntry, CacheStats, UnitCache};
pub use self::serial::{ParserId, ParserIdAllocator, SerialId};

/// What a parse request should do with respect to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Reparse if cached, parse otherwise
    #[default]
    Always,
    /// Only refresh a file that already has a unit
    OnlyIfCached,
    /// Only parse a file that has no unit yet
    OnlyIfNotCached,
}

/// Why a request did not reach the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The coordinator is disabled
    Disabled,
    /// Another parse cycle (or a reset) is running
    Busy,
    /// At least one freeze guard is held
    Frozen,
    /// `OnlyIfCached` and the file has no unit
    NotCached,
    /// `OnlyIfNotCached` and the file already has a unit
    AlreadyCached,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Disabled => "disabled",
            Self::Busy => "busy",
            Self::Frozen => "frozen",
            Self::NotCached => "not cached",
            Self::AlreadyCached => "already cached",
        };
        f.write_str(text)
    }
}

/// Result of a single-file parse request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// A new unit was created
    Parsed,
    /// An existing unit was replaced
    Reparsed,
    /// The engine was not called
    Skipped(SkipReason),
}

impl ParseOutcome {
    /// Check if the request was rejected or aborted before the engine ran
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    /// Check if the engine produced a unit
    pub fn ran_engine(&self) -> bool {
        matches!(self, Self::Parsed | Self::Reparsed)
    }
}

/// Result of a project-wide parse
#[derive(Debug, Default)]
pub struct FileListSummary {
    /// Number of project files at cycle start
    pub total: usize,
    /// Files handed to the engine
    pub scanned: usize,
    /// Files that got their first unit
    pub parsed: usize,
    /// Files whose unit was replaced
    pub reparsed: usize,
    /// Per-file engine failures; the previous unit (if any) is kept
    pub failures: Vec<EngineError>,
    /// Set when the whole request was rejected
    pub skipped: Option<SkipReason>,
}

impl FileListSummary {
    fn rejected(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }
}

/// Metadata and cache, guarded by the coordinator's state lock
struct CoordinatorState<U> {
    enabled: bool,
    parsing: bool,
    lock_count: usize,
    serial_id: SerialId,
    cache: UnitCache<U>,
    /// Search order matters for resolution, so these keep insertion order
    include_paths: Vec<PathBuf>,
    project_include_paths: Vec<PathBuf>,
    project_files: BTreeSet<PathBuf>,
}

impl<U> CoordinatorState<U> {
    fn new(parser_id: ParserId) -> Self {
        Self {
            enabled: true,
            parsing: false,
            lock_count: 0,
            serial_id: SerialId::initial(parser_id),
            cache: UnitCache::new(),
            include_paths: Vec::new(),
            project_include_paths: Vec::new(),
            project_files: BTreeSet::new(),
        }
    }

    /// Guard checked before a parse cycle may start
    fn rejection(&self) -> Option<SkipReason> {
        if !self.enabled {
            Some(SkipReason::Disabled)
        } else if self.parsing {
            Some(SkipReason::Busy)
        } else if self.lock_count > 0 {
            Some(SkipReason::Frozen)
        } else {
            None
        }
    }

    fn is_idle(&self) -> bool {
        !self.parsing && self.lock_count == 0
    }

    /// Claim the cache for a new cycle and take a fresh stamp
    fn begin_cycle(&mut self) -> SerialId {
        self.serial_id = self.serial_id.next();
        self.parsing = true;
        self.serial_id
    }

    fn include_context(&self) -> IncludeContext {
        IncludeContext::new(self.include_paths.clone(), self.project_include_paths.clone())
    }
}

fn push_unique(set: &mut Vec<PathBuf>, path: PathBuf) -> bool {
    if set.contains(&path) {
        false
    } else {
        set.push(path);
        true
    }
}

/// Incremental parse coordinator
///
/// Generic over the engine so tests can drive it with scripted engines; the
/// binary uses [`crate::engine::TreeSitterEngine`].
pub struct ParserCoordinator<E: ParseEngine> {
    engine: E,

    /// Engine context, touched only by the owner of `parsing`
    ///
    /// LOCKING ORDER: acquire before `state`.
    context: Mutex<Option<E::Context>>,

    /// All coordinator metadata and the cache map
    state: Mutex<CoordinatorState<E::Unit>>,

    /// Signalled whenever `parsing` clears or `lock_count` drops to zero
    idle: Condvar,

    source: Arc<dyn SourceProvider>,
    events: Arc<dyn ParseEventSink>,
    parser_id: ParserId,
}

impl<E: ParseEngine> ParserCoordinator<E> {
    /// Create a coordinator and its engine context
    ///
    /// Prefer [`CoordinatorFactory::create`], which assigns the id.
    pub fn new(
        parser_id: ParserId,
        engine: E,
        source: Arc<dyn SourceProvider>,
        events: Arc<dyn ParseEventSink>,
    ) -> Result<Self> {
        let context = engine.create_context()?;
        tracing::debug!("[COORDINATOR {}] Created", parser_id);
        Ok(Self {
            engine,
            context: Mutex::new(Some(context)),
            state: Mutex::new(CoordinatorState::new(parser_id)),
            idle: Condvar::new(),
            source,
            events,
            parser_id,
        })
    }

    /// The engine driven by this coordinator
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Identity assigned at construction
    pub fn parser_id(&self) -> ParserId {
        self.parser_id
    }

    // ========================================================================
    // Parsing
    // ========================================================================

    /// Parse or reparse one file
    ///
    /// Returns `Skipped` when the coordinator is disabled, busy or frozen, or
    /// when `mode` rules the file out. An engine failure is returned as an
    /// error and leaves any previous unit for the file in place.
    pub fn parse_file(
        &self,
        path: impl AsRef<Path>,
        mode: ParseMode,
        update_view: bool,
    ) -> Result<ParseOutcome> {
        let path = paths::normalize(path.as_ref());

        let (serial, existing, includes) = {
            let mut state = self.state.lock();
            if let Some(reason) = state.rejection() {
                tracing::debug!(
                    "[COORDINATOR {}] Skipping {}: {}",
                    self.parser_id,
                    path.display(),
                    reason
                );
                return Ok(ParseOutcome::Skipped(reason));
            }
            let serial = state.begin_cycle();
            (serial, state.cache.unit(&path), state.include_context())
        };
        let mut cycle = ExclusiveSection::cycle(self, update_view);

        match (mode, &existing) {
            (ParseMode::OnlyIfCached, None) => {
                return Ok(ParseOutcome::Skipped(SkipReason::NotCached));
            }
            (ParseMode::OnlyIfNotCached, Some(_)) => {
                return Ok(ParseOutcome::Skipped(SkipReason::AlreadyCached));
            }
            _ => {}
        }

        let mut slot = self.context.lock();
        let ctx = self.ensure_context(&mut slot)?;
        let outcome = self
            .run_engine(ctx, &path, existing.as_deref(), &includes, serial)
            .map_err(|e| {
                tracing::warn!("[COORDINATOR {}] {}", self.parser_id, e);
                e
            })?;
        drop(slot);

        cycle.files = 1;
        tracing::debug!(
            "[COORDINATOR {}] {:?} {} at {}",
            self.parser_id,
            outcome,
            path.display(),
            serial
        );
        Ok(outcome)
    }

    /// Parse every project file in one cycle
    ///
    /// Headers go first, then sources, then anything else. Each file is
    /// reparsed when cached and parsed otherwise. Engine failures are
    /// collected per file; only a missing engine context fails the call.
    pub fn parse_file_list(&self, update_view: bool) -> Result<FileListSummary> {
        let (serial, files, includes) = {
            let mut state = self.state.lock();
            if let Some(reason) = state.rejection() {
                tracing::debug!(
                    "[COORDINATOR {}] Skipping file list: {}",
                    self.parser_id,
                    reason
                );
                return Ok(FileListSummary::rejected(reason));
            }
            let serial = state.begin_cycle();
            let files: Vec<PathBuf> = state.project_files.iter().cloned().collect();
            (serial, files, state.include_context())
        };
        let mut cycle = ExclusiveSection::cycle(self, update_view);

        let mut ordered = files;
        ordered.sort_by_key(|file| match FileKind::of(file) {
            FileKind::Header => 0,
            FileKind::Source => 1,
            FileKind::Other => 2,
        });

        let mut summary = FileListSummary {
            total: ordered.len(),
            ..FileListSummary::default()
        };
        tracing::info!(
            "[COORDINATOR {}] Parsing {} project files",
            self.parser_id,
            summary.total
        );

        let mut slot = self.context.lock();
        let ctx = self.ensure_context(&mut slot)?;
        for file in &ordered {
            summary.scanned += 1;
            cycle.files = summary.scanned;
            self.events.on_progress(file, summary.total, summary.scanned);

            let existing = self.state.lock().cache.unit(file);
            match self.run_engine(ctx, file, existing.as_deref(), &includes, serial) {
                Ok(ParseOutcome::Reparsed) => summary.reparsed += 1,
                Ok(_) => summary.parsed += 1,
                Err(e) => {
                    tracing::warn!("[COORDINATOR {}] {}", self.parser_id, e);
                    summary.failures.push(e);
                }
            }
        }
        drop(slot);

        tracing::info!(
            "[COORDINATOR {}] File list done: {} parsed, {} reparsed, {} failed",
            self.parser_id,
            summary.parsed,
            summary.reparsed,
            summary.failures.len()
        );
        Ok(summary)
    }

    /// Take the context out of its slot, creating one if a reset left none
    fn ensure_context<'s>(
        &self,
        slot: &'s mut Option<E::Context>,
    ) -> std::result::Result<&'s mut E::Context, EngineError> {
        let ctx = match slot.take() {
            Some(ctx) => ctx,
            None => self.engine.create_context()?,
        };
        Ok(slot.insert(ctx))
    }

    /// Call the engine for one file and install the result
    fn run_engine(
        &self,
        ctx: &mut E::Context,
        path: &Path,
        existing: Option<&E::Unit>,
        includes: &IncludeContext,
        serial: SerialId,
    ) -> std::result::Result<ParseOutcome, EngineError> {
        let source = self.source.read_source(path);
        let input = ParseInput::new(path, source.as_deref(), includes);

        let (unit, outcome) = match existing {
            Some(old) => (self.engine.reparse(ctx, old, input)?, ParseOutcome::Reparsed),
            None => (self.engine.parse(ctx, input)?, ParseOutcome::Parsed),
        };

        let replaced = self
            .state
            .lock()
            .cache
            .install(path.to_path_buf(), unit, serial);
        drop(replaced);
        Ok(outcome)
    }

    /// Check if a parse cycle (or a reset) currently owns the cache
    pub fn parsing(&self) -> bool {
        self.state.lock().parsing
    }

    // ========================================================================
    // Freeze
    // ========================================================================

    /// Block new parse cycles while the returned guard lives
    ///
    /// Denied while a cycle is running. Any number of guards may be held at
    /// once.
    pub fn freeze(&self) -> Option<FreezeGuard<'_, E>> {
        let mut state = self.state.lock();
        if state.parsing {
            return None;
        }
        state.lock_count += 1;
        Some(FreezeGuard {
            coordinator: self,
            serial_id: state.serial_id,
        })
    }

    /// Like [`freeze`](Self::freeze), but also denied unless the current stamp
    /// equals `expected`
    pub fn freeze_checked(&self, expected: &SerialId) -> Option<FreezeGuard<'_, E>> {
        let mut state = self.state.lock();
        if state.parsing || state.serial_id != *expected {
            return None;
        }
        state.lock_count += 1;
        Some(FreezeGuard {
            coordinator: self,
            serial_id: state.serial_id,
        })
    }

    fn release_freeze(&self) {
        let mut state = self.state.lock();
        state.lock_count = state.lock_count.saturating_sub(1);
        if state.lock_count == 0 {
            self.idle.notify_all();
        }
    }

    /// Number of freeze guards currently held
    pub fn lock_count(&self) -> usize {
        self.state.lock().lock_count
    }

    /// Current stamp
    pub fn serial_id(&self) -> SerialId {
        self.state.lock().serial_id
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Block until no cycle runs and no freeze guard is held
    ///
    /// Calling this while holding a guard from the same coordinator never
    /// returns.
    pub fn wait_idle(&self) {
        let mut state = self.state.lock();
        while !state.is_idle() {
            self.idle.wait(&mut state);
        }
    }

    /// Drop every unit, clear all path sets and recreate the engine context
    ///
    /// Waits for the running cycle and all freeze guards first. Every stamp
    /// taken before the reset fails a later `freeze_checked`.
    pub fn reset(&self) {
        {
            let mut state = self.state.lock();
            while !state.is_idle() {
                self.idle.wait(&mut state);
            }
            state.parsing = true;
        }
        let _section = ExclusiveSection::plain(self);
        self.events.on_busy();

        // Units go before the context they were parsed with.
        let mut slot = self.context.lock();
        let (dropped, serial) = {
            let mut state = self.state.lock();
            state.include_paths.clear();
            state.project_include_paths.clear();
            state.project_files.clear();
            state.serial_id = state.serial_id.next();
            (std::mem::take(&mut state.cache), state.serial_id)
        };
        let count = dropped.len();
        drop(dropped);

        *slot = None;
        match self.engine.create_context() {
            Ok(ctx) => *slot = Some(ctx),
            Err(e) => {
                tracing::warn!(
                    "[COORDINATOR {}] Context recreation failed, retrying on next parse: {}",
                    self.parser_id,
                    e
                );
            }
        }
        drop(slot);

        tracing::info!(
            "[COORDINATOR {}] Reset: dropped {} units, now at {}",
            self.parser_id,
            count,
            serial
        );
    }

    /// Enable or disable parsing
    ///
    /// Disabling an enabled coordinator resets it. Enabling does not parse
    /// anything by itself.
    pub fn set_enabled(&self, enabled: bool) {
        let was_enabled = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.enabled, enabled)
        };
        if was_enabled && !enabled {
            tracing::info!("[COORDINATOR {}] Disabled", self.parser_id);
            self.reset();
        }
    }

    /// Check if parsing is enabled
    pub fn enabled(&self) -> bool {
        self.state.lock().enabled
    }

    // ========================================================================
    // Path sets
    // ========================================================================

    /// Add system include directories
    pub fn add_include_paths<I, P>(&self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut state = self.state.lock();
        for path in paths {
            push_unique(&mut state.include_paths, paths::normalize(path.as_ref()));
        }
    }

    /// Add project include directories
    pub fn add_project_include_paths<I, P>(&self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut state = self.state.lock();
        for path in paths {
            push_unique(
                &mut state.project_include_paths,
                paths::normalize(path.as_ref()),
            );
        }
    }

    /// Add files belonging to the project
    pub fn add_project_files<I, P>(&self, files: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut state = self.state.lock();
        for file in files {
            state.project_files.insert(paths::normalize(file.as_ref()));
        }
    }

    /// System include directories
    pub fn include_paths(&self) -> Vec<PathBuf> {
        self.state.lock().include_paths.clone()
    }

    /// Project include directories
    pub fn project_include_paths(&self) -> Vec<PathBuf> {
        self.state.lock().project_include_paths.clone()
    }

    /// Project files, sorted
    pub fn project_files(&self) -> Vec<PathBuf> {
        self.state.lock().project_files.iter().cloned().collect()
    }

    /// Check if `path` was registered as a project file
    pub fn is_project_file(&self, path: impl AsRef<Path>) -> bool {
        self.state
            .lock()
            .project_files
            .contains(&paths::normalize(path.as_ref()))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Kind of the statement at a 1-based line and column
    ///
    /// `Unknown` when the file has no unit or the engine cannot resolve the
    /// location.
    pub fn statement_kind_at(&self, path: impl AsRef<Path>, line: u32, column: u32) -> StatementKind {
        let Some(unit) = self.unit(path) else {
            return StatementKind::Unknown;
        };
        self.engine
            .resolve_location(&unit, line, column)
            .unwrap_or(StatementKind::Unknown)
    }

    /// Snapshot of both include path sets
    ///
    /// Header lookups resolve against the snapshot, so the filesystem is
    /// never touched while the state lock is held.
    pub fn include_context(&self) -> IncludeContext {
        self.state.lock().include_context()
    }

    /// Resolve the header named by an include `line` written in `relative_to`
    pub fn header_file_name(&self, relative_to: impl AsRef<Path>, line: &str) -> Option<PathBuf> {
        self.include_context().header_file_name(relative_to.as_ref(), line)
    }

    /// Check if a header belongs to the system include directories
    pub fn is_system_header_file(&self, file: impl AsRef<Path>) -> bool {
        self.include_context().is_system_header(file.as_ref())
    }

    /// Check if a header belongs to the project include directories
    pub fn is_project_header_file(&self, file: impl AsRef<Path>) -> bool {
        self.include_context().is_project_header(file.as_ref())
    }

    /// Shared handle to the cached unit of a file
    pub fn unit(&self, path: impl AsRef<Path>) -> Option<Arc<E::Unit>> {
        self.state.lock().cache.unit(&paths::normalize(path.as_ref()))
    }

    /// Stamp of the cycle that produced a file's unit
    pub fn parsed_at(&self, path: impl AsRef<Path>) -> Option<SerialId> {
        self.state
            .lock()
            .cache
            .get(&paths::normalize(path.as_ref()))
            .map(|entry| entry.parsed_at)
    }

    /// Check if a file has a unit
    pub fn contains_unit(&self, path: impl AsRef<Path>) -> bool {
        self.state
            .lock()
            .cache
            .contains(&paths::normalize(path.as_ref()))
    }

    /// Files that have a unit, sorted
    pub fn cached_files(&self) -> Vec<PathBuf> {
        self.state.lock().cache.files()
    }

    /// Cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        self.state.lock().cache.stats()
    }
}

impl<E: ParseEngine> Drop for ParserCoordinator<E> {
    fn drop(&mut self) {
        // Guards borrow the coordinator, so only a leaked guard or an
        // unwinding cycle can leave the state busy here.
        let state = self.state.get_mut();
        if !state.is_idle() {
            tracing::warn!(
                "[COORDINATOR {}] Dropped while busy (parsing: {}, locks: {})",
                self.parser_id,
                state.parsing,
                state.lock_count
            );
        }
        let units = std::mem::take(&mut state.cache);
        drop(units);
        drop(self.context.get_mut().take());
        tracing::debug!("[COORDINATOR {}] Released", self.parser_id);
    }
}

/// Releases `parsing` when a cycle or reset ends, on every exit path
///
/// For parse cycles it also sends the started/ended notifications, so
/// `parsing ended` goes out exactly once per cycle.
struct ExclusiveSection<'a, E: ParseEngine> {
    coordinator: &'a ParserCoordinator<E>,
    /// `Some(update_view)` for parse cycles
    report: Option<bool>,
    /// Files handed to the engine so far
    files: usize,
}

impl<'a, E: ParseEngine> ExclusiveSection<'a, E> {
    fn cycle(coordinator: &'a ParserCoordinator<E>, update_view: bool) -> Self {
        if update_view {
            coordinator.events.on_busy();
        }
        coordinator.events.on_parsing_started();
        Self {
            coordinator,
            report: Some(update_view),
            files: 0,
        }
    }

    fn plain(coordinator: &'a ParserCoordinator<E>) -> Self {
        Self {
            coordinator,
            report: None,
            files: 0,
        }
    }
}

impl<E: ParseEngine> Drop for ExclusiveSection<'_, E> {
    fn drop(&mut self) {
        // Ended goes out while still exclusive, so the next cycle's started
        // can never overtake it.
        if let Some(update_view) = self.report {
            self.coordinator
                .events
                .on_parsing_ended(self.files, update_view && self.files > 0);
        }

        {
            let mut state = self.coordinator.state.lock();
            state.parsing = false;
        }
        self.coordinator.idle.notify_all();
    }
}

/// Proof that a freeze is held
///
/// Dropping the guard (or calling [`unfreeze`](Self::unfreeze)) releases it.
#[must_use = "the freeze is released as soon as the guard is dropped"]
pub struct FreezeGuard<'a, E: ParseEngine> {
    coordinator: &'a ParserCoordinator<E>,
    serial_id: SerialId,
}

impl<E: ParseEngine> FreezeGuard<'_, E> {
    /// Stamp that was current when the freeze was granted
    ///
    /// Stays current for the lifetime of the guard, since no cycle can start
    /// and a reset waits for the guard.
    pub fn serial_id(&self) -> SerialId {
        self.serial_id
    }

    /// Release the freeze
    pub fn unfreeze(self) {}
}

impl<E: ParseEngine> Drop for FreezeGuard<'_, E> {
    fn drop(&mut self) {
        self.coordinator.release_freeze();
    }
}

impl<E: ParseEngine> std::fmt::Debug for FreezeGuard<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreezeGuard")
            .field("serial_id", &self.serial_id)
            .finish()
    }
}

/// Builds coordinators with sequential parser ids
#[derive(Debug, Default)]
pub struct CoordinatorFactory {
    ids: ParserIdAllocator,
}

impl CoordinatorFactory {
    /// Factory handing out ids from zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory handing out ids from `first`
    pub fn starting_at(first: u32) -> Self {
        Self {
            ids: ParserIdAllocator::starting_at(first),
        }
    }

    /// Build a coordinator with the next id
    pub fn create<E: ParseEngine>(
        &self,
        engine: E,
        source: Arc<dyn SourceProvider>,
        events: Arc<dyn ParseEventSink>,
    ) -> Result<ParserCoordinator<E>> {
        ParserCoordinator::new(self.ids.allocate(), engine, source, events)
    }
}
