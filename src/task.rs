//! Background parse tasks
//!
//! Runs a coordinator parse on its own named thread so editor-facing callers
//! never wait for the engine. Nothing is returned to the dispatcher: the
//! outcome shows up in the coordinator's notifications and cache. Dropping a
//! [`ParseTask`] detaches the thread, which ends on its own once the parse is
//! done.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::coordinator::{ParseMode, ParserCoordinator};
use crate::engine::ParseEngine;

/// Handle to a dispatched parse
#[derive(Debug)]
pub struct ParseTask {
    handle: JoinHandle<()>,
}

impl ParseTask {
    /// Check if the parse has finished
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the parse to finish
    ///
    /// Returns `false` if the task panicked.
    pub fn join(self) -> bool {
        self.handle.join().is_ok()
    }
}

/// Parse one file in the background
///
/// Returns `None` without spawning when the coordinator is already parsing.
/// The check is advisory; the coordinator's own guard decides.
pub fn spawn_parse_file<E>(
    coordinator: &Arc<ParserCoordinator<E>>,
    path: impl Into<PathBuf>,
    mode: ParseMode,
    update_view: bool,
) -> Option<ParseTask>
where
    E: ParseEngine + 'static,
{
    if coordinator.parsing() {
        tracing::debug!("[TASK] Coordinator busy, not dispatching");
        return None;
    }

    let coordinator = Arc::clone(coordinator);
    let path = path.into();
    spawn("tucache-parse", move || {
        match coordinator.parse_file(&path, mode, update_view) {
            Ok(outcome) => {
                tracing::debug!("[TASK] {}: {:?}", path.display(), outcome);
            }
            Err(e) => {
                tracing::warn!("[TASK] {}", e);
            }
        }
    })
}

/// Parse every project file in the background
pub fn spawn_parse_file_list<E>(
    coordinator: &Arc<ParserCoordinator<E>>,
    update_view: bool,
) -> Option<ParseTask>
where
    E: ParseEngine + 'static,
{
    if coordinator.parsing() {
        tracing::debug!("[TASK] Coordinator busy, not dispatching");
        return None;
    }

    let coordinator = Arc::clone(coordinator);
    spawn("tucache-parse-list", move || {
        match coordinator.parse_file_list(update_view) {
            Ok(summary) => {
                tracing::debug!(
                    "[TASK] File list: {}/{} scanned, {} failed",
                    summary.scanned,
                    summary.total,
                    summary.failures.len()
                );
            }
            Err(e) => {
                tracing::warn!("[TASK] {}", e);
            }
        }
    })
}

fn spawn<F>(name: &str, body: F) -> Option<ParseTask>
where
    F: FnOnce() + Send + 'static,
{
    match thread::Builder::new().name(name.to_string()).spawn(body) {
        Ok(handle) => Some(ParseTask { handle }),
        Err(e) => {
            tracing::warn!("[TASK] Failed to spawn parse thread: {}", e);
            None
        }
    }
}
