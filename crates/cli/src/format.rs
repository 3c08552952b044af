//! Output formatting: human, JSON and raw modes.

use crate::state::{CallRow, Output};

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Indented, labelled text
    Human,
    /// One JSON document per result
    Json,
    /// Bare values, one per line
    Raw,
}

pub fn format_output(output: &Output, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => {
            serde_json::to_string(output).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
        }
        OutputMode::Raw => format_raw(output),
        OutputMode::Human => format_human(output),
    }
}

pub fn format_error(message: &str, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => serde_json::json!({ "error": message }).to_string(),
        OutputMode::Raw => message.to_string(),
        OutputMode::Human => format!("(error) {}", message),
    }
}

// =========================================================================
// Human
// =========================================================================

fn format_human(output: &Output) -> String {
    match output {
        Output::Summary(s) => format!(
            "frames:  {}\ncalls:   {}\napi:     {}\nindexed: {}",
            s.frames,
            s.calls,
            s.api,
            if s.indexed { "yes" } else { "no" }
        ),
        Output::Frames { frames } => {
            if frames.is_empty() {
                return "(empty)".to_string();
            }
            frames
                .iter()
                .map(|f| {
                    let loaded = if f.loaded { "  [loaded]" } else { "" };
                    format!("frame {:>5}  {:>7} calls{}", f.frame, f.calls, loaded)
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        Output::Calls { calls, .. } => {
            if calls.is_empty() {
                return "(empty frame)".to_string();
            }
            calls.iter().map(tree_line).collect::<Vec<_>>().join("\n")
        }
        Output::Call { frame, call } => format!("frame {}: {}", frame, tree_line(call)),
        Output::Written { path, frames, calls } => {
            format!("wrote {} ({} frames, {} calls)", path, frames, calls)
        }
        Output::Nothing { reason } => format!("(nil) {}", reason),
    }
}

fn tree_line(row: &CallRow) -> String {
    let marker = if row.children > 0 { "+ " } else { "  " };
    format!("{}{}{:>7}  {}", "  ".repeat(row.depth), marker, row.no, row.text)
}

// =========================================================================
// Raw
// =========================================================================

fn format_raw(output: &Output) -> String {
    match output {
        Output::Summary(s) => format!("{}\n{}\n{}", s.frames, s.calls, s.api),
        Output::Frames { frames } => frames
            .iter()
            .map(|f| f.calls.to_string())
            .collect::<Vec<_>>()
            .join("\n"),
        Output::Calls { calls, .. } => calls
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
        Output::Call { call, .. } => call.text.clone(),
        Output::Written { path, .. } => path.clone(),
        Output::Nothing { .. } => String::new(),
    }
}
