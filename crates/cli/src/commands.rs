//! clap command tree.
//!
//! The same subcommands serve shell mode (`tdx -t trace.tdx frame 3`) and
//! the REPL, where each line is parsed by `build_repl_cli`.

use clap::{Arg, ArgAction, Command};

/// Top-level command with global flags.
pub fn build_cli() -> Command {
    with_subcommands(
        Command::new("tdx")
            .about("Browse recorded graphics API call traces frame by frame")
            .version(env!("CARGO_PKG_VERSION"))
            .arg(
                Arg::new("trace")
                    .short('t')
                    .long("trace")
                    .value_name("PATH")
                    .help("Trace file to open"),
            )
            .arg(
                Arg::new("json")
                    .long("json")
                    .action(ArgAction::SetTrue)
                    .conflicts_with("raw")
                    .help("Print results as JSON"),
            )
            .arg(
                Arg::new("raw")
                    .long("raw")
                    .action(ArgAction::SetTrue)
                    .help("Print bare values, one per line"),
            )
            .arg(
                Arg::new("show-all")
                    .long("show-all")
                    .action(ArgAction::SetTrue)
                    .help("Let every call head a group (no default filter)"),
            )
            .arg(
                Arg::new("hide")
                    .long("hide")
                    .value_name("SUBSTRING")
                    .help("Also keep calls whose name contains SUBSTRING from heading groups"),
            )
            .arg(
                Arg::new("no-verify")
                    .long("no-verify")
                    .action(ArgAction::SetTrue)
                    .help("Skip per-call checksum verification"),
            ),
    )
}

/// Command used to parse one REPL line.
pub fn build_repl_cli() -> Command {
    with_subcommands(
        Command::new("tdx")
            .no_binary_name(true)
            .disable_help_flag(true)
            .disable_version_flag(true),
    )
}

fn with_subcommands(cmd: Command) -> Command {
    cmd.subcommand(Command::new("info").about("Frame and call counts of the loaded trace"))
        .subcommand(
            Command::new("open")
                .about("Load another trace file")
                .arg(Arg::new("path").required(true)),
        )
        .subcommand(
            Command::new("frames")
                .about("List frames with their call counts")
                .arg(
                    Arg::new("limit")
                        .short('n')
                        .long("limit")
                        .value_name("N")
                        .help("Show at most N frames"),
                ),
        )
        .subcommand(
            Command::new("frame")
                .about("Show the grouped calls of a frame")
                .arg(Arg::new("number").required(true))
                .arg(
                    Arg::new("flat")
                        .long("flat")
                        .action(ArgAction::SetTrue)
                        .help("List calls in sequence order without grouping"),
                ),
        )
        .subcommand(
            Command::new("call")
                .about("Show a call by sequence number")
                .arg(Arg::new("no").required(true)),
        )
        .subcommand(
            Command::new("start")
                .about("Show the first call of a frame")
                .arg(Arg::new("number").required(true)),
        )
        .subcommand(
            Command::new("end")
                .about("Show the last call of a frame")
                .arg(Arg::new("number").required(true)),
        )
        .subcommand(
            Command::new("search")
                .about("Find the next call whose name or arguments contain TEXT")
                .arg(Arg::new("text").required(true))
                .arg(
                    Arg::new("from")
                        .short('f')
                        .long("from")
                        .value_name("FRAME")
                        .help("Frame to start from (default: first, or last with --backward)"),
                )
                .arg(
                    Arg::new("backward")
                        .short('b')
                        .long("backward")
                        .action(ArgAction::SetTrue)
                        .help("Search towards the start of the trace"),
                )
                .arg(
                    Arg::new("ignore-case")
                        .short('i')
                        .long("ignore-case")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("sample")
                .about("Write a synthetic trace file")
                .arg(Arg::new("path").required(true))
                .arg(
                    Arg::new("frames")
                        .short('n')
                        .long("frames")
                        .value_name("N")
                        .default_value("10"),
                )
                .arg(
                    Arg::new("no-offsets")
                        .long("no-offsets")
                        .action(ArgAction::SetTrue)
                        .help("Mark the file as not seekable"),
                ),
        )
}
