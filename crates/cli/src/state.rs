//! Session state for the CLI.
//!
//! Holds the open trace and the loader settings taken from the global flags,
//! and turns an `Action` into an `Output` for formatting.

use serde::Serialize;
use std::path::Path;
use tracedex::engine::{FilterOptions, SearchDirection, SearchStatus};
use tracedex::prelude::{
    Api, Call, CallFlags, CallNo, CallRef, CaseSensitivity, SearchRequest, Trace, TraceSummary, Value,
};
use tracedex::storage::{CallScript, TraceWriter};

use crate::parse::Action;

/// Loader settings shared by every trace opened in the session.
#[derive(Debug, Clone, Default)]
pub struct LoadSettings {
    pub show_all: bool,
    pub hide: Option<String>,
    pub skip_verify: bool,
}

/// One call as printed.
#[derive(Debug, Clone, Serialize)]
pub struct CallRow {
    pub no: CallNo,
    pub depth: usize,
    pub text: String,
    pub children: usize,
}

/// One frame in a frame listing.
#[derive(Debug, Clone, Serialize)]
pub struct FrameRow {
    pub frame: usize,
    pub calls: u64,
    pub loaded: bool,
}

/// Result of executing an action.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Output {
    Summary(TraceSummary),
    Frames { frames: Vec<FrameRow> },
    Calls { frame: usize, calls: Vec<CallRow> },
    Call { frame: usize, call: CallRow },
    Written { path: String, frames: usize, calls: usize },
    Nothing { reason: String },
}

/// Interactive session.
pub struct SessionState {
    settings: LoadSettings,
    trace: Option<Trace>,
}

impl SessionState {
    pub fn new(settings: LoadSettings) -> Self {
        SessionState {
            settings,
            trace: None,
        }
    }

    /// The open trace, if any.
    pub fn trace(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }

    /// Open `path`, replacing the current trace.
    pub fn open(&mut self, path: &str) -> Result<TraceSummary, String> {
        // Drop the old trace first so a failed open leaves nothing loaded.
        self.trace = None;
        let mut builder = Trace::builder().verify_checksums(!self.settings.skip_verify);
        if self.settings.show_all {
            builder = builder.accept_all();
        } else if let Some(hide) = &self.settings.hide {
            builder = builder.hide(FilterOptions::default(), hide);
        }
        let trace = builder
            .open(path)
            .map_err(|e| format!("Failed to open {}: {}", path, e))?;
        let summary = trace.summary();
        self.trace = Some(trace);
        Ok(summary)
    }

    pub fn execute(&mut self, action: Action) -> Result<Output, String> {
        match action {
            Action::Open { path } => self.open(&path).map(Output::Summary),
            Action::Sample {
                path,
                frames,
                offsets,
            } => write_sample(&path, frames, offsets),
            Action::Info => Ok(Output::Summary(self.loaded()?.summary())),
            Action::Frames { limit } => {
                let trace = self.loaded()?;
                let count = limit.map_or(trace.num_frames(), |n| n.min(trace.num_frames()));
                let frames = (0..count)
                    .map(|frame| FrameRow {
                        frame,
                        calls: trace.calls_in_frame(frame),
                        loaded: trace.is_frame_loaded(frame),
                    })
                    .collect();
                Ok(Output::Frames { frames })
            }
            Action::Frame { number, flat } => {
                let trace = self.loaded()?;
                let contents = trace.frame(number).map_err(|e| e.to_string())?;
                let calls = if flat {
                    contents
                        .calls()
                        .iter()
                        .map(|call| CallRow {
                            no: call.no(),
                            depth: 0,
                            text: call.text(),
                            children: 0,
                        })
                        .collect()
                } else {
                    contents
                        .walk()
                        .into_iter()
                        .map(|(id, depth)| row(contents.call(id), depth))
                        .collect()
                };
                Ok(Output::Calls {
                    frame: number,
                    calls,
                })
            }
            Action::Call { no } => {
                let found = self.loaded()?.call(no).map_err(|e| e.to_string())?;
                Ok(call_output(found, format!("no call {}", no)))
            }
            Action::FrameStart { number } => {
                let found = self.loaded()?.frame_start(number).map_err(|e| e.to_string())?;
                Ok(call_output(found, format!("frame {} is empty", number)))
            }
            Action::FrameEnd { number } => {
                let found = self.loaded()?.frame_end(number).map_err(|e| e.to_string())?;
                Ok(call_output(found, format!("frame {} is empty", number)))
            }
            Action::Search {
                text,
                from,
                direction,
                case,
            } => {
                let trace = self.loaded()?;
                let frame = from.unwrap_or(match direction {
                    SearchDirection::Forward => 0,
                    SearchDirection::Backward => trace.num_frames().saturating_sub(1),
                });
                let request = SearchRequest {
                    frame,
                    text: text.clone(),
                    case,
                    direction,
                };
                let result = trace.search(request).map_err(|e| e.to_string())?;
                match result.status {
                    SearchStatus::Unsupported => {
                        Err("Search needs a trace with seekable calls".to_string())
                    }
                    _ => Ok(call_output(result.call, format!("no match for {:?}", text))),
                }
            }
        }
    }

    fn loaded(&self) -> Result<&Trace, String> {
        self.trace
            .as_ref()
            .ok_or_else(|| "No trace loaded (use: open <path>)".to_string())
    }
}

fn row(call: &Call, depth: usize) -> CallRow {
    CallRow {
        no: call.no(),
        depth,
        text: call.display_text(),
        children: call.children().len(),
    }
}

fn call_output(found: Option<CallRef>, reason: String) -> Output {
    match found {
        Some(hit) => Output::Call {
            frame: hit.frame(),
            call: row(hit.call(), 0),
        },
        None => Output::Nothing { reason },
    }
}

/// Write `frames` frames of a small GL render loop to `path`.
fn write_sample(path: &str, frames: usize, offsets: bool) -> Result<Output, String> {
    let mut script = CallScript::new();
    for frame in 0..frames {
        script.push_group(&format!("shadow pass {}", frame));
        script.call(
            "glBindFramebuffer",
            &[("target", Value::UInt(36160)), ("framebuffer", Value::UInt(1))],
            CallFlags::NONE,
        );
        script.ordinary("glClear");
        script.render("glDrawArrays");
        script.pop_group();
        script.push_group(&format!("main pass {}", frame));
        script.call(
            "glBindTexture",
            &[("target", Value::UInt(3553)), ("texture", Value::UInt(frame as u64 + 1))],
            CallFlags::NONE,
        );
        script.upload("glBufferData", 256);
        script.render("glDrawElements");
        script.pop_group();
        script.ordinary("glGetError");
        script.swap();
    }

    let file = std::fs::File::create(Path::new(path))
        .map_err(|e| format!("Failed to create {}: {}", path, e))?;
    let writer = if offsets {
        TraceWriter::new(file, Api::Gl)
    } else {
        TraceWriter::without_offsets(file, Api::Gl)
    };
    let mut writer = writer.map_err(|e| e.to_string())?;
    writer.write_all(script.calls()).map_err(|e| e.to_string())?;
    writer.finish().map_err(|e| e.to_string())?;

    Ok(Output::Written {
        path: path.to_string(),
        frames,
        calls: script.len(),
    })
}
