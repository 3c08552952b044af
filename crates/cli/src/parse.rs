//! ArgMatches → Action/MetaCommand conversion.
//!
//! Translates clap's parsed arguments into the appropriate action:
//! - Trace queries → `CliAction::Execute(Action)`
//! - REPL meta-commands → `CliAction::Meta`

use clap::ArgMatches;
use tracedex::engine::SearchDirection;
use tracedex::prelude::{CallNo, CaseSensitivity};

/// The result of parsing user input.
pub enum CliAction {
    /// A query or file operation.
    Execute(Action),
    /// A REPL-only meta-command.
    Meta(MetaCommand),
}

/// Operations on the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Info,
    Open { path: String },
    Frames { limit: Option<usize> },
    Frame { number: usize, flat: bool },
    Call { no: CallNo },
    FrameStart { number: usize },
    FrameEnd { number: usize },
    Search {
        text: String,
        from: Option<usize>,
        direction: SearchDirection,
        case: CaseSensitivity,
    },
    Sample { path: String, frames: usize, offsets: bool },
}

/// REPL meta-commands.
pub enum MetaCommand {
    Help { command: Option<String> },
    Quit,
    Clear,
}

/// Check for REPL meta-commands before delegating to clap.
///
/// Returns `Some(MetaCommand)` if the line is a meta-command, `None` otherwise.
pub fn check_meta_command(line: &str) -> Option<MetaCommand> {
    let trimmed = line.trim();
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let cmd = parts.next()?;

    match cmd {
        "quit" | "exit" => Some(MetaCommand::Quit),
        "clear" => Some(MetaCommand::Clear),
        "help" => {
            let command = parts.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
            Some(MetaCommand::Help { command })
        }
        _ => None,
    }
}

/// Convert clap ArgMatches into a CliAction.
pub fn matches_to_action(matches: &ArgMatches) -> Result<CliAction, String> {
    let (sub_name, m) = matches
        .subcommand()
        .ok_or_else(|| "No command provided".to_string())?;

    let action = match sub_name {
        "info" => Action::Info,
        "open" => Action::Open {
            path: required(m, "path")?.to_string(),
        },
        "frames" => Action::Frames {
            limit: optional_number(m, "limit")?,
        },
        "frame" => Action::Frame {
            number: number(m, "number")?,
            flat: m.get_flag("flat"),
        },
        "call" => Action::Call { no: number(m, "no")? },
        "start" => Action::FrameStart {
            number: number(m, "number")?,
        },
        "end" => Action::FrameEnd {
            number: number(m, "number")?,
        },
        "search" => Action::Search {
            text: required(m, "text")?.to_string(),
            from: optional_number(m, "from")?,
            direction: if m.get_flag("backward") {
                SearchDirection::Backward
            } else {
                SearchDirection::Forward
            },
            case: if m.get_flag("ignore-case") {
                CaseSensitivity::Insensitive
            } else {
                CaseSensitivity::Sensitive
            },
        },
        "sample" => Action::Sample {
            path: required(m, "path")?.to_string(),
            frames: number(m, "frames")?,
            offsets: !m.get_flag("no-offsets"),
        },
        other => return Err(format!("Unknown command: {}", other)),
    };
    Ok(CliAction::Execute(action))
}

// =========================================================================
// Argument helpers
// =========================================================================

fn required<'a>(m: &'a ArgMatches, name: &str) -> Result<&'a str, String> {
    m.get_one::<String>(name)
        .map(|s| s.as_str())
        .ok_or_else(|| format!("Missing argument: {}", name))
}

fn number<T: std::str::FromStr>(m: &ArgMatches, name: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    let raw = required(m, name)?;
    raw.parse::<T>()
        .map_err(|e| format!("Invalid {}: {} ({})", name, raw, e))
}

fn optional_number<T: std::str::FromStr>(m: &ArgMatches, name: &str) -> Result<Option<T>, String>
where
    T::Err: std::fmt::Display,
{
    match m.get_one::<String>(name) {
        Some(_) => number(m, name).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::build_repl_cli;

    fn parse(line: &str) -> Result<Action, String> {
        let args = shlex::split(line).unwrap();
        let matches = build_repl_cli()
            .try_get_matches_from(args)
            .map_err(|e| e.to_string())?;
        match matches_to_action(&matches)? {
            CliAction::Execute(action) => Ok(action),
            CliAction::Meta(_) => Err("meta".into()),
        }
    }

    #[test]
    fn test_parse_frame() {
        assert_eq!(
            parse("frame 3 --flat").unwrap(),
            Action::Frame { number: 3, flat: true }
        );
        assert!(parse("frame three").unwrap_err().contains("Invalid number"));
    }

    #[test]
    fn test_parse_search() {
        assert_eq!(
            parse("search \"texture=42\" -b -i --from 9").unwrap(),
            Action::Search {
                text: "texture=42".into(),
                from: Some(9),
                direction: SearchDirection::Backward,
                case: CaseSensitivity::Insensitive,
            }
        );
    }

    #[test]
    fn test_parse_sample_default_frames() {
        assert_eq!(
            parse("sample out.tdx").unwrap(),
            Action::Sample {
                path: "out.tdx".into(),
                frames: 10,
                offsets: true,
            }
        );
    }

    #[test]
    fn test_meta_commands() {
        assert!(matches!(check_meta_command("quit"), Some(MetaCommand::Quit)));
        assert!(matches!(check_meta_command("  exit "), Some(MetaCommand::Quit)));
        assert!(matches!(
            check_meta_command("help frame"),
            Some(MetaCommand::Help { command: Some(c) }) if c == "frame"
        ));
        assert!(matches!(check_meta_command("help"), Some(MetaCommand::Help { command: None })));
        assert!(check_meta_command("frame 1").is_none());
    }
}
