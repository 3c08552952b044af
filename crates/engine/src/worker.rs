//! Background loader thread
//!
//! `TraceLoader::spawn` moves the loader onto a dedicated thread that runs
//! requests one at a time, in the order they were sent. Results arrive as
//! `LoaderEvent`s; a request that fails emits `LoaderEvent::Failed`.
//! Read-only queries (`num_frames`, `frame`, ...) can still be made directly
//! on the shared loader.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracedex_core::{CallNo, Result};
use tracing::{debug, warn};

use crate::events::LoaderEvent;
use crate::loader::TraceLoader;
use crate::search::SearchRequest;

/// Request for the loader thread
#[derive(Debug, Clone)]
pub enum Command {
    /// Open and load a trace file
    LoadTrace(PathBuf),
    /// Materialize a frame
    LoadFrame(usize),
    /// Look up the first call of a frame
    FindFrameStart(usize),
    /// Look up the last call of a frame
    FindFrameEnd(usize),
    /// Look up a call by sequence number
    FindCallIndex(CallNo),
    /// Search the stream
    Search(SearchRequest),
    /// Stop the thread
    Shutdown,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::LoadTrace(_) => "load_trace",
            Command::LoadFrame(_) => "load_frame",
            Command::FindFrameStart(_) => "find_frame_start",
            Command::FindFrameEnd(_) => "find_frame_end",
            Command::FindCallIndex(_) => "find_call_index",
            Command::Search(_) => "search",
            Command::Shutdown => "shutdown",
        }
    }
}

/// Handle to a loader running on its own thread
///
/// Dropping the handle stops the thread after the request in progress.
#[derive(Debug)]
pub struct LoaderHandle {
    loader: Arc<TraceLoader>,
    commands: Sender<Command>,
    thread: Option<JoinHandle<()>>,
}

impl TraceLoader {
    /// Run this loader on a dedicated thread
    pub fn spawn(self) -> LoaderHandle {
        let loader = Arc::new(self);
        let (commands, requests) = mpsc::channel();
        let worker = Arc::clone(&loader);
        let thread = std::thread::Builder::new()
            .name("tracedex-loader".to_string())
            .spawn(move || run(worker, requests));
        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "could not start loader thread");
                None
            }
        };
        LoaderHandle {
            loader,
            commands,
            thread,
        }
    }
}

fn run(loader: Arc<TraceLoader>, requests: Receiver<Command>) {
    debug!("loader thread started");
    while let Ok(command) = requests.recv() {
        let operation = command.name();
        let outcome: Result<()> = match command {
            Command::LoadTrace(path) => loader.load_trace(path),
            Command::LoadFrame(frame) => loader.load_frame(frame).map(drop),
            Command::FindFrameStart(frame) => loader.find_frame_start(frame).map(drop),
            Command::FindFrameEnd(frame) => loader.find_frame_end(frame).map(drop),
            Command::FindCallIndex(no) => loader.find_call_index(no).map(drop),
            Command::Search(request) => loader.search(request).map(drop),
            Command::Shutdown => break,
        };
        if let Err(e) = outcome {
            warn!(operation, error = %e, "loader request failed");
            loader.events().emit(LoaderEvent::Failed {
                operation,
                message: e.to_string(),
            });
        }
    }
    debug!("loader thread stopped");
}

impl LoaderHandle {
    /// The shared loader, for direct queries
    pub fn loader(&self) -> &Arc<TraceLoader> {
        &self.loader
    }

    /// Receive loader events
    pub fn subscribe(&self) -> Receiver<LoaderEvent> {
        self.loader.subscribe()
    }

    /// Queue `command`; returns false if the thread is gone
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Queue a trace load
    pub fn load_trace(&self, path: impl Into<PathBuf>) -> bool {
        self.send(Command::LoadTrace(path.into()))
    }

    /// Queue a frame materialization
    pub fn load_frame(&self, frame: usize) -> bool {
        self.send(Command::LoadFrame(frame))
    }

    /// Queue a frame-start lookup
    pub fn find_frame_start(&self, frame: usize) -> bool {
        self.send(Command::FindFrameStart(frame))
    }

    /// Queue a frame-end lookup
    pub fn find_frame_end(&self, frame: usize) -> bool {
        self.send(Command::FindFrameEnd(frame))
    }

    /// Queue a lookup by sequence number
    pub fn find_call_index(&self, no: CallNo) -> bool {
        self.send(Command::FindCallIndex(no))
    }

    /// Queue a search
    pub fn search(&self, request: SearchRequest) -> bool {
        self.send(Command::Search(request))
    }

    /// Cancel the request in progress, or the next one when idle
    pub fn cancel(&self) {
        self.loader.cancel_token().cancel();
    }

    /// Stop the thread and wait for it
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("loader thread panicked");
            }
        }
    }
}

impl Drop for LoaderHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::LoaderOptions;
    use crate::search::SearchStatus;
    use std::time::Duration;
    use tempfile::TempDir;
    use tracedex_core::Api;
    use tracedex_storage::{CallScript, TraceWriter};

    fn wait_for<F: Fn(&LoaderEvent) -> bool>(rx: &Receiver<LoaderEvent>, pred: F) -> LoaderEvent {
        loop {
            let event = rx.recv_timeout(Duration::from_secs(10)).expect("event");
            if pred(&event) {
                return event;
            }
        }
    }

    #[test]
    fn test_requests_run_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("three.tdx");
        let mut s = CallScript::new();
        for _ in 0..3 {
            s.ordinary("glClear");
            s.render("glDrawArrays");
            s.swap();
        }
        let mut writer = TraceWriter::create(&path, Api::Gl).unwrap();
        writer.write_all(s.calls()).unwrap();
        writer.finish().unwrap();

        let handle = TraceLoader::new(LoaderOptions::default()).spawn();
        let rx = handle.subscribe();
        assert!(handle.load_trace(&path));
        assert!(handle.load_frame(1));
        assert!(handle.search(SearchRequest::forward(0, "glDrawArrays")));

        wait_for(&rx, |e| matches!(e, LoaderEvent::FinishedParsing));
        match wait_for(&rx, |e| matches!(e, LoaderEvent::FrameContentsLoaded { .. })) {
            LoaderEvent::FrameContentsLoaded { frame, contents } => {
                assert_eq!(frame, 1);
                assert_eq!(contents.len(), 3);
            }
            _ => unreachable!(),
        }
        match wait_for(&rx, |e| matches!(e, LoaderEvent::SearchResult { .. })) {
            LoaderEvent::SearchResult { result, .. } => {
                assert_eq!(result.status, SearchStatus::Found);
                assert_eq!(result.call.unwrap().no(), 1);
            }
            _ => unreachable!(),
        }
        assert_eq!(handle.loader().num_frames(), 3);
        handle.shutdown();
    }

    #[test]
    fn test_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let handle = TraceLoader::default().spawn();
        let rx = handle.subscribe();
        handle.load_trace(dir.path().join("missing.tdx"));
        match wait_for(&rx, |e| matches!(e, LoaderEvent::Failed { .. })) {
            LoaderEvent::Failed { operation, .. } => assert_eq!(operation, "load_trace"),
            _ => unreachable!(),
        }
    }
}
