//! Tracedex CLI: browse graphics API call traces from a terminal.
//!
//! Three modes:
//! - **Shell mode**: `tdx -t trace.tdx frame 3`: single command, exit
//! - **REPL mode**: `tdx -t trace.tdx`: interactive prompt (if stdin is TTY)
//! - **Pipe mode**: `echo "search glDraw" | tdx -t trace.tdx`: line-by-line from stdin

mod commands;
mod format;
mod parse;
mod repl;
mod state;

use std::io::IsTerminal;
use std::process;

use tracing_subscriber::EnvFilter;

use commands::build_cli;
use format::{format_error, format_output, OutputMode};
use parse::{matches_to_action, CliAction};
use state::{LoadSettings, SessionState};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = build_cli();
    let matches = cli.get_matches();

    // Determine output mode
    let output_mode = if matches.get_flag("json") {
        OutputMode::Json
    } else if matches.get_flag("raw") {
        OutputMode::Raw
    } else {
        OutputMode::Human
    };

    let settings = LoadSettings {
        show_all: matches.get_flag("show-all"),
        hide: matches.get_one::<String>("hide").cloned(),
        skip_verify: matches.get_flag("no-verify"),
    };
    let mut state = SessionState::new(settings);

    // Open the initial trace
    if let Some(path) = matches.get_one::<String>("trace") {
        if let Err(e) = state.open(path) {
            eprintln!("{}", format_error(&e, output_mode));
            process::exit(1);
        }
    }

    // Dispatch mode
    if matches.subcommand().is_some() {
        let exit_code = run_shell_mode(&matches, &mut state, output_mode);
        process::exit(exit_code);
    } else if std::io::stdin().is_terminal() {
        repl::run_repl(&mut state, output_mode);
    } else {
        let exit_code = repl::run_pipe(&mut state, output_mode);
        process::exit(exit_code);
    }
}

fn run_shell_mode(matches: &clap::ArgMatches, state: &mut SessionState, mode: OutputMode) -> i32 {
    match matches_to_action(matches) {
        Ok(CliAction::Execute(action)) => match state.execute(action) {
            Ok(output) => {
                let formatted = format_output(&output, mode);
                if !formatted.is_empty() {
                    println!("{}", formatted);
                }
                0
            }
            Err(e) => {
                eprintln!("{}", format_error(&e, mode));
                1
            }
        },
        Ok(CliAction::Meta(_)) => {
            eprintln!("(error) Meta-commands are only available in REPL mode");
            1
        }
        Err(e) => {
            eprintln!("(error) {}", e);
            1
        }
    }
}
