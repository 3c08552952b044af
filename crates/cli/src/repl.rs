//! Interactive REPL and pipe mode.
//!
//! Each line is split with shell quoting rules, checked for meta-commands,
//! then parsed by the same clap tree as shell mode.

use std::io::BufRead;
use std::path::PathBuf;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::commands::build_repl_cli;
use crate::format::{format_error, format_output, OutputMode};
use crate::parse::{check_meta_command, matches_to_action, CliAction, MetaCommand};
use crate::state::SessionState;

/// What the caller should do after a line.
#[derive(Debug, PartialEq, Eq)]
enum LineOutcome {
    Ok,
    Failed,
    Quit,
}

pub fn run_repl(state: &mut SessionState, mode: OutputMode) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("(error) Failed to start line editor: {}", e);
            return;
        }
    };
    let history = history_path();
    if let Some(path) = &history {
        let _ = editor.load_history(path);
    }

    loop {
        match editor.readline(&prompt(state)) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line.as_str());
                if execute_line(state, &line, mode, true) == LineOutcome::Quit {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("(error) {}", e);
                break;
            }
        }
    }

    if let Some(path) = &history {
        let _ = editor.save_history(path);
    }
}

/// Execute stdin line by line. Returns 1 if any line failed.
pub fn run_pipe(state: &mut SessionState, mode: OutputMode) -> i32 {
    let stdin = std::io::stdin();
    let mut exit_code = 0;
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                eprintln!("{}", format_error(&e.to_string(), mode));
                return 1;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match execute_line(state, trimmed, mode, false) {
            LineOutcome::Ok => {}
            LineOutcome::Failed => exit_code = 1,
            LineOutcome::Quit => break,
        }
    }
    exit_code
}

fn execute_line(state: &mut SessionState, line: &str, mode: OutputMode, interactive: bool) -> LineOutcome {
    let action = match check_meta_command(line) {
        Some(meta) => Ok(CliAction::Meta(meta)),
        None => parse_line(line),
    };

    let result = match action {
        Ok(CliAction::Execute(action)) => state.execute(action),
        Ok(CliAction::Meta(meta)) => return run_meta(meta, interactive),
        Err(e) => Err(e),
    };
    match result {
        Ok(output) => {
            let formatted = format_output(&output, mode);
            if !formatted.is_empty() {
                println!("{}", formatted);
            }
            LineOutcome::Ok
        }
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            LineOutcome::Failed
        }
    }
}

fn parse_line(line: &str) -> Result<CliAction, String> {
    let args = shlex::split(line).ok_or_else(|| "Unbalanced quotes".to_string())?;
    let matches = build_repl_cli()
        .try_get_matches_from(args)
        .map_err(|e| e.render().to_string().trim_end().to_string())?;
    matches_to_action(&matches)
}

fn run_meta(meta: MetaCommand, interactive: bool) -> LineOutcome {
    match meta {
        MetaCommand::Quit => LineOutcome::Quit,
        MetaCommand::Clear => {
            if interactive {
                print!("\x1B[2J\x1B[1;1H");
            }
            LineOutcome::Ok
        }
        MetaCommand::Help { command } => {
            let mut cli = build_repl_cli();
            match command {
                Some(name) => match cli.find_subcommand_mut(&name) {
                    Some(sub) => println!("{}", sub.render_help()),
                    None => {
                        eprintln!("(error) Unknown command: {}", name);
                        return LineOutcome::Failed;
                    }
                },
                None => {
                    println!("{}", cli.render_help());
                    println!("Meta-commands: help [command], clear, quit");
                }
            }
            LineOutcome::Ok
        }
    }
}

fn prompt(state: &SessionState) -> String {
    match state.trace() {
        Some(trace) => format!("tdx [{} frames]> ", trace.num_frames()),
        None => "tdx> ".to_string(),
    }
}

fn history_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".tdx_history"))
}
