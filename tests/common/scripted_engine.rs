//! A parsing engine driven by the test
//!
//! Units carry a version that grows with every reparse. A test can make the
//! next engine call block until it says so, make calls for chosen files fail,
//! and count how many units and contexts were released.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use parking_lot::Mutex;
use tucache::{EngineError, ParseEngine, ParseInput, StatementKind};

/// How long a test waits for a blocked engine call before giving up
pub const GATE_TIMEOUT: Duration = Duration::from_secs(10);

/// An engine call as seen by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Parse(PathBuf),
    Reparse(PathBuf),
}

/// Parse result
#[derive(Debug)]
pub struct ScriptedUnit {
    pub path: PathBuf,
    pub version: u32,
    /// Bytes handed in by the source provider, if any
    pub source: Option<Vec<u8>>,
    drops: Arc<AtomicUsize>,
}

impl Drop for ScriptedUnit {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Engine context
#[derive(Debug)]
pub struct ScriptedContext {
    drops: Arc<AtomicUsize>,
}

impl Drop for ScriptedContext {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Test side of a blocked engine call
pub struct Gate {
    entered: mpsc::Receiver<PathBuf>,
    release: mpsc::Sender<()>,
}

impl Gate {
    /// Wait until the engine call is in progress
    pub fn wait_entered(&self) -> PathBuf {
        self.entered
            .recv_timeout(GATE_TIMEOUT)
            .expect("engine call never started")
    }

    /// Let the engine call finish
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

struct EngineGate {
    entered: mpsc::Sender<PathBuf>,
    release: mpsc::Receiver<()>,
}

#[derive(Default)]
pub struct ScriptedEngine {
    gate: Mutex<Option<EngineGate>>,
    failing: Mutex<HashSet<PathBuf>>,
    calls: Mutex<Vec<EngineCall>>,
    contexts_created: AtomicUsize,
    contexts_dropped: Arc<AtomicUsize>,
    units_dropped: Arc<AtomicUsize>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next engine call block until the returned gate is released
    pub fn block_next(&self) -> Gate {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.gate.lock() = Some(EngineGate {
            entered: entered_tx,
            release: release_rx,
        });
        Gate {
            entered: entered_rx,
            release: release_tx,
        }
    }

    /// Make every call for `path` fail
    pub fn fail_on(&self, path: impl Into<PathBuf>) {
        self.failing.lock().insert(path.into());
    }

    /// Stop failing calls for `path`
    pub fn recover(&self, path: &Path) {
        self.failing.lock().remove(path);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    pub fn contexts_created(&self) -> usize {
        self.contexts_created.load(Ordering::SeqCst)
    }

    pub fn contexts_dropped(&self) -> usize {
        self.contexts_dropped.load(Ordering::SeqCst)
    }

    pub fn units_dropped(&self) -> usize {
        self.units_dropped.load(Ordering::SeqCst)
    }

    /// Shared counter so a test can read it after the engine is gone
    pub fn units_dropped_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.units_dropped)
    }

    /// Shared counter so a test can read it after the engine is gone
    pub fn contexts_dropped_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.contexts_dropped)
    }

    fn enter(&self, call: EngineCall, path: &Path) -> Result<(), EngineError> {
        self.calls.lock().push(call);

        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.entered.send(path.to_path_buf());
            let _ = gate.release.recv_timeout(GATE_TIMEOUT);
        }

        if self.failing.lock().contains(path) {
            return Err(EngineError::Parse {
                path: path.to_path_buf(),
                message: "scripted failure".to_string(),
            });
        }
        Ok(())
    }

    fn unit(&self, input: &ParseInput<'_>, version: u32) -> ScriptedUnit {
        ScriptedUnit {
            path: input.path.to_path_buf(),
            version,
            source: input.source.map(|bytes| bytes.to_vec()),
            drops: Arc::clone(&self.units_dropped),
        }
    }
}

impl ParseEngine for ScriptedEngine {
    type Unit = ScriptedUnit;
    type Context = ScriptedContext;

    fn create_context(&self) -> Result<ScriptedContext, EngineError> {
        self.contexts_created.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedContext {
            drops: Arc::clone(&self.contexts_dropped),
        })
    }

    fn parse(
        &self,
        _ctx: &mut ScriptedContext,
        input: ParseInput<'_>,
    ) -> Result<ScriptedUnit, EngineError> {
        self.enter(EngineCall::Parse(input.path.to_path_buf()), input.path)?;
        Ok(self.unit(&input, 1))
    }

    fn reparse(
        &self,
        _ctx: &mut ScriptedContext,
        unit: &ScriptedUnit,
        input: ParseInput<'_>,
    ) -> Result<ScriptedUnit, EngineError> {
        self.enter(EngineCall::Reparse(input.path.to_path_buf()), input.path)?;
        Ok(self.unit(&input, unit.version + 1))
    }

    fn resolve_location(&self, unit: &ScriptedUnit, line: u32, _column: u32) -> Option<StatementKind> {
        (line <= unit.version).then_some(StatementKind::Variable)
    }
}
