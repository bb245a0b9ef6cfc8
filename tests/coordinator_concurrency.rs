//! Coordinator protocol tests with a scripted engine
//!
//! The engine blocks inside a parse on request, which lets these tests
//! observe the coordinator while a cycle is in flight.
//!
//! ## Running These Tests
//!
//! ```bash
//! cargo test --test coordinator_concurrency
//! ```

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tucache::{
    BufferOverlay, ChannelSink, CoordinatorError, CoordinatorFactory, EngineReadsSource, NoopSink,
    ParseEvent, ParseEventSink, ParseMode, ParseOutcome, ParserCoordinator, SkipReason,
    StatementKind,
};

mod common;
use common::{EngineCall, ScriptedEngine};

fn coordinator() -> ParserCoordinator<ScriptedEngine> {
    CoordinatorFactory::new()
        .create(
            ScriptedEngine::new(),
            Arc::new(EngineReadsSource),
            Arc::new(NoopSink),
        )
        .unwrap()
}

// ============================================================================
// SINGLE CYCLE
// ============================================================================

mod single_cycle {
    use super::*;

    #[test]
    fn concurrent_parse_is_skipped() {
        let c = coordinator();
        let gate = c.engine().block_next();

        thread::scope(|s| {
            let first = s.spawn(|| c.parse_file("a.c", ParseMode::Always, true));
            gate.wait_entered();

            assert!(c.parsing());
            assert_eq!(
                c.parse_file("a.c", ParseMode::Always, true).unwrap(),
                ParseOutcome::Skipped(SkipReason::Busy)
            );
            assert_eq!(
                c.parse_file_list(true).unwrap().skipped,
                Some(SkipReason::Busy)
            );

            gate.release();
            assert_eq!(first.join().unwrap().unwrap(), ParseOutcome::Parsed);
        });

        assert_eq!(c.engine().calls(), vec![EngineCall::Parse(PathBuf::from("a.c"))]);
        assert!(!c.parsing());
    }

    #[test]
    fn freeze_denied_while_parsing() {
        let c = coordinator();
        let gate = c.engine().block_next();

        thread::scope(|s| {
            let worker = s.spawn(|| c.parse_file("a.c", ParseMode::Always, false));
            gate.wait_entered();

            assert!(c.freeze().is_none());
            assert!(c.freeze_checked(&c.serial_id()).is_none());
            assert_eq!(c.lock_count(), 0);

            gate.release();
            worker.join().unwrap().unwrap();
        });

        assert!(c.freeze().is_some());
    }

    #[test]
    fn reader_sees_previous_unit_during_reparse() {
        let c = coordinator();
        c.parse_file("a.c", ParseMode::Always, false).unwrap();
        let gate = c.engine().block_next();

        thread::scope(|s| {
            let worker = s.spawn(|| c.parse_file("a.c", ParseMode::OnlyIfCached, false));
            gate.wait_entered();

            let during = c.unit("a.c").unwrap();
            assert_eq!(during.version, 1);
            assert_eq!(c.statement_kind_at("a.c", 2, 1), StatementKind::Unknown);

            gate.release();
            assert_eq!(worker.join().unwrap().unwrap(), ParseOutcome::Reparsed);
            // A handle taken before the swap stays valid.
            assert_eq!(during.version, 1);
        });

        assert_eq!(c.unit("a.c").unwrap().version, 2);
        assert_eq!(c.statement_kind_at("a.c", 2, 1), StatementKind::Variable);
    }

    #[test]
    fn failed_reparse_keeps_unit_and_recovers() {
        let c = coordinator();
        c.parse_file("a.c", ParseMode::Always, false).unwrap();

        c.engine().fail_on("a.c");
        let err = c.parse_file("a.c", ParseMode::Always, false).unwrap_err();
        assert!(matches!(err, CoordinatorError::Engine(_)));
        assert_eq!(c.unit("a.c").unwrap().version, 1);

        c.engine().recover(&PathBuf::from("a.c"));
        assert_eq!(
            c.parse_file("a.c", ParseMode::Always, false).unwrap(),
            ParseOutcome::Reparsed
        );
        assert_eq!(c.unit("a.c").unwrap().version, 2);
    }

    #[test]
    fn only_if_cached_reparses_existing_entry() {
        let c = coordinator();
        assert_eq!(
            c.parse_file("a.c", ParseMode::Always, false).unwrap(),
            ParseOutcome::Parsed
        );
        assert_eq!(c.cached_files().len(), 1);
        assert_eq!(
            c.parse_file("a.c", ParseMode::OnlyIfCached, false).unwrap(),
            ParseOutcome::Reparsed
        );
        assert_eq!(
            c.engine().calls(),
            vec![
                EngineCall::Parse(PathBuf::from("a.c")),
                EngineCall::Reparse(PathBuf::from("a.c")),
            ]
        );
    }
}

// ============================================================================
// FREEZE
// ============================================================================

mod freeze {
    use super::*;

    #[test]
    fn freeze_blocks_parse_from_other_thread() {
        let c = coordinator();
        let guard = c.freeze().unwrap();

        thread::scope(|s| {
            let outcome = s
                .spawn(|| c.parse_file("a.c", ParseMode::Always, false))
                .join()
                .unwrap()
                .unwrap();
            assert_eq!(outcome, ParseOutcome::Skipped(SkipReason::Frozen));
        });
        assert!(c.engine().calls().is_empty());

        guard.unfreeze();
        assert_eq!(
            c.parse_file("a.c", ParseMode::Always, false).unwrap(),
            ParseOutcome::Parsed
        );
    }

    #[test]
    fn lock_count_matches_grants_minus_releases() {
        let c = coordinator();
        let mut held = Vec::new();
        let mut expected = 0usize;

        // freeze, freeze, release, freeze, release, release, freeze
        for step in [true, true, false, true, false, false, true] {
            if step {
                held.push(c.freeze().unwrap());
                expected += 1;
            } else {
                drop(held.pop());
                expected -= 1;
            }
            assert_eq!(c.lock_count(), expected);
        }

        held.clear();
        assert_eq!(c.lock_count(), 0);
    }

    #[test]
    fn serial_checked_freeze_detects_new_cycle() {
        let c = coordinator();
        let remembered = c.serial_id();

        c.parse_file("a.c", ParseMode::Always, false).unwrap();
        assert!(c.freeze_checked(&remembered).is_none());

        let current = c.parsed_at("a.c").unwrap();
        assert_eq!(current, c.serial_id());
        let guard = c.freeze_checked(&current).unwrap();
        assert_eq!(guard.serial_id(), current);
    }
}

// ============================================================================
// RESET AND TEARDOWN
// ============================================================================

mod lifecycle {
    use super::*;

    #[test]
    fn reset_waits_for_running_parse() {
        let c = coordinator();
        c.add_include_paths(["/usr/include"]);
        let gate = c.engine().block_next();

        thread::scope(|s| {
            let parser = s.spawn(|| c.parse_file("a.c", ParseMode::Always, false));
            gate.wait_entered();

            let (done_tx, done_rx) = mpsc::channel();
            let c = &c;
            let resetter = s.spawn(move || {
                c.reset();
                done_tx.send(()).unwrap();
            });

            assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());
            gate.release();

            parser.join().unwrap().unwrap();
            resetter.join().unwrap();
            done_rx.recv().unwrap();
        });

        assert!(c.cached_files().is_empty());
        assert!(c.include_paths().is_empty());
        assert_eq!(c.engine().contexts_created(), 2);
        assert_eq!(c.engine().contexts_dropped(), 1);
        assert_eq!(c.engine().units_dropped(), 1);
    }

    #[test]
    fn reset_waits_for_freeze_guard() {
        let c = coordinator();
        c.parse_file("a.c", ParseMode::Always, false).unwrap();
        let guard = c.freeze().unwrap();
        let stamp = guard.serial_id();

        thread::scope(|s| {
            let (done_tx, done_rx) = mpsc::channel();
            let c = &c;
            let resetter = s.spawn(move || {
                c.reset();
                done_tx.send(()).unwrap();
            });

            assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());
            assert!(c.contains_unit("a.c"));

            drop(guard);
            resetter.join().unwrap();
            done_rx.recv().unwrap();
        });

        assert!(!c.contains_unit("a.c"));
        assert!(c.freeze_checked(&stamp).is_none());
    }

    #[test]
    fn reset_clears_all_sets() {
        let c = coordinator();
        c.add_include_paths(["/usr/include"]);
        c.add_project_include_paths(["/work/include"]);
        c.add_project_files(["/work/a.c", "/work/b.h"]);
        c.parse_file_list(false).unwrap();
        assert_eq!(c.cached_files().len(), 2);

        c.reset();

        assert!(c.cached_files().is_empty());
        assert!(c.include_paths().is_empty());
        assert!(c.project_include_paths().is_empty());
        assert!(c.project_files().is_empty());
        assert!(!c.is_system_header_file("/usr/include/stdio.h"));
    }

    #[test]
    fn disable_with_three_files_then_enable() {
        let c = coordinator();
        for file in ["a.c", "b.c", "c.c"] {
            c.parse_file(file, ParseMode::Always, false).unwrap();
        }
        assert_eq!(c.cached_files().len(), 3);

        c.set_enabled(false);
        assert!(c.cached_files().is_empty());
        assert_eq!(
            c.parse_file("a.c", ParseMode::Always, false).unwrap(),
            ParseOutcome::Skipped(SkipReason::Disabled)
        );

        c.set_enabled(true);
        assert!(c.cached_files().is_empty());
        assert_eq!(
            c.parse_file("a.c", ParseMode::Always, false).unwrap(),
            ParseOutcome::Parsed
        );
    }

    #[test]
    fn disable_waits_for_running_parse() {
        let c = coordinator();
        let gate = c.engine().block_next();

        thread::scope(|s| {
            let parser = s.spawn(|| c.parse_file("a.c", ParseMode::Always, false));
            gate.wait_entered();
            let disabler = s.spawn(|| c.set_enabled(false));

            gate.release();
            parser.join().unwrap().unwrap();
            disabler.join().unwrap();
        });

        assert!(!c.enabled());
        assert!(c.cached_files().is_empty());
    }

    #[test]
    fn drop_releases_units_and_context_once() {
        let c = coordinator();
        let units = c.engine().units_dropped_counter();
        let contexts = c.engine().contexts_dropped_counter();

        for file in ["a.c", "b.c", "c.c"] {
            c.parse_file(file, ParseMode::Always, false).unwrap();
        }
        c.parse_file("a.c", ParseMode::Always, false).unwrap();
        assert_eq!(units.load(Ordering::SeqCst), 1);

        drop(c);
        assert_eq!(units.load(Ordering::SeqCst), 4);
        assert_eq!(contexts.load(Ordering::SeqCst), 1);
    }
}

// ============================================================================
// NOTIFICATIONS AND SOURCES
// ============================================================================

mod notifications {
    use super::*;

    #[test]
    fn every_cycle_ends_exactly_once() {
        let (sink, rx) = ChannelSink::new();
        let c = CoordinatorFactory::new()
            .create(ScriptedEngine::new(), Arc::new(EngineReadsSource), Arc::new(sink))
            .unwrap();
        c.engine().fail_on("bad.c");

        c.parse_file("a.c", ParseMode::Always, false).unwrap();
        let _ = c.parse_file("bad.c", ParseMode::Always, false);
        c.parse_file("x.c", ParseMode::OnlyIfCached, false).unwrap();
        let _guard = c.freeze().unwrap();
        c.parse_file("a.c", ParseMode::Always, false).unwrap();

        let events: Vec<ParseEvent> = rx.try_iter().collect();
        let started = events
            .iter()
            .filter(|e| **e == ParseEvent::ParsingStarted)
            .count();
        let ended = events
            .iter()
            .filter(|e| matches!(e, ParseEvent::ParsingEnded { .. }))
            .count();
        assert_eq!(started, 3);
        assert_eq!(ended, 3);
    }

    /// Records started/ended and stalls inside the first ended notification
    struct StallingSink {
        log: Mutex<Vec<&'static str>>,
        stall: Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
    }

    impl ParseEventSink for StallingSink {
        fn on_parsing_started(&self) {
            self.log.lock().push("started");
        }

        fn on_parsing_ended(&self, _total_files: usize, _did_update_view: bool) {
            let stall = self.stall.lock().take();
            if let Some((entered, release)) = stall {
                entered.send(()).unwrap();
                release.recv().unwrap();
            }
            self.log.lock().push("ended");
        }
    }

    #[test]
    fn ended_arrives_before_next_cycle_starts() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let sink = Arc::new(StallingSink {
            log: Mutex::new(Vec::new()),
            stall: Mutex::new(Some((entered_tx, release_rx))),
        });
        let c = CoordinatorFactory::new()
            .create(ScriptedEngine::new(), Arc::new(EngineReadsSource), sink.clone())
            .unwrap();

        thread::scope(|s| {
            let first = s.spawn(|| c.parse_file("a.c", ParseMode::Always, false));
            entered_rx.recv().unwrap();

            // Still exclusive while the ended notification is in flight.
            assert!(c.parsing());
            assert_eq!(
                c.parse_file("b.c", ParseMode::Always, false).unwrap(),
                ParseOutcome::Skipped(SkipReason::Busy)
            );

            release_tx.send(()).unwrap();
            assert_eq!(first.join().unwrap().unwrap(), ParseOutcome::Parsed);
        });

        c.parse_file("b.c", ParseMode::Always, false).unwrap();
        assert_eq!(*sink.log.lock(), vec!["started", "ended", "started", "ended"]);
    }

    #[test]
    fn reset_reports_busy() {
        let (sink, rx) = ChannelSink::new();
        let c = CoordinatorFactory::new()
            .create(ScriptedEngine::new(), Arc::new(EngineReadsSource), Arc::new(sink))
            .unwrap();

        c.reset();
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![ParseEvent::Busy]);
    }

    #[test]
    fn file_list_progress_counts_up() {
        let (sink, rx) = ChannelSink::new();
        let c = CoordinatorFactory::new()
            .create(ScriptedEngine::new(), Arc::new(EngineReadsSource), Arc::new(sink))
            .unwrap();
        c.add_project_files(["b.c", "a.h", "c.cpp"]);

        let summary = c.parse_file_list(true).unwrap();
        assert_eq!(summary.parsed, 3);

        let progress: Vec<(PathBuf, usize, usize)> = rx
            .try_iter()
            .filter_map(|event| match event {
                ParseEvent::Progress {
                    file,
                    total,
                    scanned,
                } => Some((file, total, scanned)),
                _ => None,
            })
            .collect();
        assert_eq!(
            progress,
            vec![
                (PathBuf::from("a.h"), 3, 1),
                (PathBuf::from("b.c"), 3, 2),
                (PathBuf::from("c.cpp"), 3, 3),
            ]
        );
    }

    #[test]
    fn source_provider_bytes_reach_engine() {
        let overlay = BufferOverlay::with_fallback(Arc::new(EngineReadsSource));
        overlay.set_buffer("/edit/a.c", "int unsaved;");
        let c = CoordinatorFactory::new()
            .create(ScriptedEngine::new(), Arc::new(overlay), Arc::new(NoopSink))
            .unwrap();

        c.parse_file("/edit/a.c", ParseMode::Always, false).unwrap();
        c.parse_file("/edit/b.c", ParseMode::Always, false).unwrap();

        assert_eq!(
            c.unit("/edit/a.c").unwrap().source.as_deref(),
            Some(b"int unsaved;".as_slice())
        );
        assert!(c.unit("/edit/b.c").unwrap().source.is_none());
    }
}

// ============================================================================
// BACKGROUND TASKS
// ============================================================================

mod background {
    use super::*;
    use tucache::{spawn_parse_file, spawn_parse_file_list};

    #[test]
    fn task_not_dispatched_while_parsing() {
        let c = Arc::new(coordinator());
        let gate = c.engine().block_next();

        let first = spawn_parse_file(&c, "a.c", ParseMode::Always, true).unwrap();
        gate.wait_entered();

        assert!(spawn_parse_file(&c, "b.c", ParseMode::Always, true).is_none());
        assert!(spawn_parse_file_list(&c, true).is_none());

        gate.release();
        assert!(first.join());
        assert!(c.contains_unit("a.c"));
        assert!(!c.contains_unit("b.c"));
    }

    #[test]
    fn many_tasks_never_interleave() {
        let c = Arc::new(coordinator());
        let tasks: Vec<_> = (0..8)
            .filter_map(|i| {
                spawn_parse_file(&c, format!("f{}.c", i), ParseMode::Always, false)
            })
            .collect();
        for task in tasks {
            assert!(task.join());
        }

        // Every engine call produced exactly one unit; skipped tasks made none.
        let calls = c.engine().calls();
        assert_eq!(calls.len(), c.cached_files().len());
        assert!(!c.parsing());
    }
}
