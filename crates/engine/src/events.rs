//! Loader events
//!
//! The loader reports progress and query results as `LoaderEvent`s over
//! `std::sync::mpsc` channels. Any number of subscribers may listen; a
//! subscriber whose receiver was dropped is forgotten on the next send.

use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use tracedex_core::Api;

use crate::frame::{Frame, FrameContents};
use crate::search::{SearchRequest, SearchResult};
use crate::CallRef;

/// Something the loader did
#[derive(Debug, Clone)]
pub enum LoaderEvent {
    /// A load began
    StartedParsing,
    /// Progress through the stream, 0-100, non-decreasing within a load
    Parsed(u8),
    /// Frames became known, in increasing frame order
    FramesLoaded(Vec<Arc<Frame>>),
    /// A frame was materialized
    FrameContentsLoaded {
        /// Frame number
        frame: usize,
        /// Grouped contents
        contents: Arc<FrameContents>,
    },
    /// A search finished
    SearchResult {
        /// What was searched for
        request: SearchRequest,
        /// Outcome
        result: SearchResult,
    },
    /// First call of a frame
    FoundFrameStart {
        /// Frame number
        frame: usize,
        /// The call, if the frame has any
        call: Option<CallRef>,
    },
    /// Last call of a frame
    FoundFrameEnd {
        /// Frame number
        frame: usize,
        /// The call, if the frame has any
        call: Option<CallRef>,
    },
    /// Lookup by sequence number finished
    FoundCallIndex(Option<CallRef>),
    /// Recorded or inferred API of the trace
    GuessedApi(Api),
    /// A load finished
    FinishedParsing,
    /// A background request failed
    Failed {
        /// Name of the request
        operation: &'static str,
        /// Error message
        message: String,
    },
}

/// Fan-out of loader events to subscribers
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    senders: Arc<Mutex<Vec<Sender<LoaderEvent>>>>,
}

impl EventSink {
    /// Sink with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber
    pub fn subscribe(&self) -> Receiver<LoaderEvent> {
        let (tx, rx) = mpsc::channel();
        self.senders.lock().push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber
    pub fn emit(&self, event: LoaderEvent) {
        let mut senders = self.senders.lock();
        match senders.len() {
            0 => {}
            1 => {
                if senders[0].send(event).is_err() {
                    senders.clear();
                }
            }
            _ => senders.retain(|tx| tx.send(event.clone()).is_ok()),
        }
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.senders.lock().len()
    }
}

/// Emits `Parsed` events at a minimum step
///
/// Reported values never decrease, and `finish` always ends on 100.
#[derive(Debug)]
pub struct ProgressReporter<'a> {
    sink: &'a EventSink,
    step: u8,
    last: u8,
}

impl<'a> ProgressReporter<'a> {
    /// Reporter that emits when progress advanced by at least `step` points
    pub fn new(sink: &'a EventSink, step: u8) -> Self {
        ProgressReporter {
            sink,
            step: step.max(1),
            last: 0,
        }
    }

    /// Observe the current percentage
    pub fn update(&mut self, percent: u8) {
        let percent = percent.min(100);
        if percent >= self.last.saturating_add(self.step) {
            self.last = percent;
            self.sink.emit(LoaderEvent::Parsed(percent));
        }
    }

    /// Report completion
    pub fn finish(&mut self) {
        self.last = 100;
        self.sink.emit(LoaderEvent::Parsed(100));
    }

    /// Last reported percentage
    pub fn last(&self) -> u8 {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(rx: &Receiver<LoaderEvent>) -> Vec<u8> {
        rx.try_iter()
            .filter_map(|e| match e {
                LoaderEvent::Parsed(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_fan_out_and_prune() {
        let sink = EventSink::new();
        let a = sink.subscribe();
        let b = sink.subscribe();
        sink.emit(LoaderEvent::StartedParsing);
        assert!(matches!(a.try_recv(), Ok(LoaderEvent::StartedParsing)));
        assert!(matches!(b.try_recv(), Ok(LoaderEvent::StartedParsing)));

        drop(b);
        sink.emit(LoaderEvent::FinishedParsing);
        assert_eq!(sink.subscriber_count(), 1);
        assert!(matches!(a.try_recv(), Ok(LoaderEvent::FinishedParsing)));
    }

    #[test]
    fn test_emit_without_subscribers() {
        let sink = EventSink::new();
        sink.emit(LoaderEvent::GuessedApi(Api::Gl));
        assert_eq!(sink.subscriber_count(), 0);
    }

    #[test]
    fn test_progress_step() {
        let sink = EventSink::new();
        let rx = sink.subscribe();
        let mut p = ProgressReporter::new(&sink, 5);
        for pct in [0u8, 1, 4, 5, 6, 9, 10, 12, 30, 29, 31, 99] {
            p.update(pct);
        }
        p.finish();
        assert_eq!(parsed(&rx), vec![5, 10, 30, 99, 100]);
    }

    #[test]
    fn test_progress_non_decreasing() {
        let sink = EventSink::new();
        let rx = sink.subscribe();
        let mut p = ProgressReporter::new(&sink, 1);
        for pct in [3u8, 2, 8, 7, 8, 50] {
            p.update(pct);
        }
        p.finish();
        let seen = parsed(&rx);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last(), Some(&100));
    }
}
