//! Parse notifications for editor consumers
//!
//! The coordinator reports its lifecycle through a [`ParseEventSink`]. Every
//! notification is fire-and-forget: sinks never block the coordinator and
//! cannot reject an event.
//!
//! # Event Types
//!
//! - `parsing_started` - A parse cycle claimed the cache
//! - `parsing_ended` - The cycle released the cache (emitted exactly once per cycle)
//! - `progress` - A file of a file-list parse is being processed
//! - `busy` - The coordinator entered an exclusive section
//!
//! # JSON Lines Format
//!
//! [`JsonLinesSink`] writes one object per line:
//! ```json
//! {"type":"parsing_ended","total_files":1,"did_update_view":true,"timestamp":"..."}
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use parking_lot::Mutex;
use serde::Serialize;

/// Receiver of coordinator notifications
///
/// All methods default to no-ops so a sink implements only what it needs.
pub trait ParseEventSink: Send + Sync {
    /// A parse cycle started
    fn on_parsing_started(&self) {}

    /// A parse cycle ended; `did_update_view` tells consumers whether derived
    /// views should be refreshed
    fn on_parsing_ended(&self, _total_files: usize, _did_update_view: bool) {}

    /// A file of a multi-file parse is being processed
    fn on_progress(&self, _current_file: &Path, _total: usize, _scanned: usize) {}

    /// The coordinator entered an exclusive section
    fn on_busy(&self) {}
}

/// A notification as a value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParseEvent {
    ParsingStarted,
    ParsingEnded {
        total_files: usize,
        did_update_view: bool,
    },
    Progress {
        file: PathBuf,
        total: usize,
        scanned: usize,
    },
    Busy,
}

impl ParseEvent {
    /// Event type name as used in the JSON stream
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ParsingStarted => "parsing_started",
            Self::ParsingEnded { .. } => "parsing_ended",
            Self::Progress { .. } => "progress",
            Self::Busy => "busy",
        }
    }

    /// Deliver this event to a sink
    pub fn dispatch(&self, sink: &dyn ParseEventSink) {
        match self {
            Self::ParsingStarted => sink.on_parsing_started(),
            Self::ParsingEnded {
                total_files,
                did_update_view,
            } => sink.on_parsing_ended(*total_files, *did_update_view),
            Self::Progress {
                file,
                total,
                scanned,
            } => sink.on_progress(file, *total, *scanned),
            Self::Busy => sink.on_busy(),
        }
    }
}

/// Sink that drops every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ParseEventSink for NoopSink {}

/// Sink that logs notifications through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ParseEventSink for TracingSink {
    fn on_parsing_started(&self) {
        tracing::debug!("[EVENTS] parsing started");
    }

    fn on_parsing_ended(&self, total_files: usize, did_update_view: bool) {
        tracing::debug!(
            "[EVENTS] parsing ended: {} files, update view: {}",
            total_files,
            did_update_view
        );
    }

    fn on_progress(&self, current_file: &Path, total: usize, scanned: usize) {
        tracing::debug!(
            "[EVENTS] {}/{} {}",
            scanned,
            total,
            current_file.display()
        );
    }

    fn on_busy(&self) {
        tracing::debug!("[EVENTS] busy");
    }
}

/// Sink forwarding events into a channel
///
/// Disconnected receivers are ignored.
pub struct ChannelSink {
    sender: Mutex<mpsc::Sender<ParseEvent>>,
}

impl ChannelSink {
    /// Create a sink and the receiver observing it
    pub fn new() -> (Self, mpsc::Receiver<ParseEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self::from_sender(tx), rx)
    }

    /// Wrap an existing sender
    pub fn from_sender(sender: mpsc::Sender<ParseEvent>) -> Self {
        Self {
            sender: Mutex::new(sender),
        }
    }

    fn send(&self, event: ParseEvent) {
        if let Err(e) = self.sender.lock().send(event) {
            tracing::debug!("[EVENTS] Receiver gone, dropping {:?}", e.0.event_type());
        }
    }
}

impl ParseEventSink for ChannelSink {
    fn on_parsing_started(&self) {
        self.send(ParseEvent::ParsingStarted);
    }

    fn on_parsing_ended(&self, total_files: usize, did_update_view: bool) {
        self.send(ParseEvent::ParsingEnded {
            total_files,
            did_update_view,
        });
    }

    fn on_progress(&self, current_file: &Path, total: usize, scanned: usize) {
        self.send(ParseEvent::Progress {
            file: current_file.to_path_buf(),
            total,
            scanned,
        });
    }

    fn on_busy(&self) {
        self.send(ParseEvent::Busy);
    }
}

/// Wrapper adding a timestamp to serialized events
#[derive(Serialize)]
struct TimestampedEvent<'a> {
    #[serde(flatten)]
    event: &'a ParseEvent,
    timestamp: String,
}

/// Sink writing events as JSON lines
pub struct JsonLinesSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesSink {
    /// Write events to stdout
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Write events to any writer
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Serialize an event to a single JSON line (without the newline)
    pub fn encode(event: &ParseEvent) -> Option<String> {
        let wrapper = TimestampedEvent {
            event,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        serde_json::to_string(&wrapper).ok()
    }

    fn emit(&self, event: ParseEvent) {
        if let Some(json) = Self::encode(&event) {
            let mut out = self.out.lock();
            // Ignore write errors (reader may have closed)
            let _ = writeln!(out, "{}", json);
            let _ = out.flush();
        }
    }
}

impl ParseEventSink for JsonLinesSink {
    fn on_parsing_started(&self) {
        self.emit(ParseEvent::ParsingStarted);
    }

    fn on_parsing_ended(&self, total_files: usize, did_update_view: bool) {
        self.emit(ParseEvent::ParsingEnded {
            total_files,
            did_update_view,
        });
    }

    fn on_progress(&self, current_file: &Path, total: usize, scanned: usize) {
        self.emit(ParseEvent::Progress {
            file: current_file.to_path_buf(),
            total,
            scanned,
        });
    }

    fn on_busy(&self) {
        self.emit(ParseEvent::Busy);
    }
}

/// Fan a notification out to several sinks
#[derive(Default)]
pub struct SinkSet {
    sinks: Vec<Box<dyn ParseEventSink>>,
}

impl SinkSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    pub fn with(mut self, sink: impl ParseEventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    fn each(&self, event: ParseEvent) {
        for sink in &self.sinks {
            event.dispatch(sink.as_ref());
        }
    }
}

impl ParseEventSink for SinkSet {
    fn on_parsing_started(&self) {
        self.each(ParseEvent::ParsingStarted);
    }

    fn on_parsing_ended(&self, total_files: usize, did_update_view: bool) {
        self.each(ParseEvent::ParsingEnded {
            total_files,
            did_update_view,
        });
    }

    fn on_progress(&self, current_file: &Path, total: usize, scanned: usize) {
        self.each(ParseEvent::Progress {
            file: current_file.to_path_buf(),
            total,
            scanned,
        });
    }

    fn on_busy(&self) {
        self.each(ParseEvent::Busy);
    }
}
