use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Analyze { channel: String, fresh: bool },
    Rank { path: PathBuf },
    History,
    Reports { channel_id: String, page: usize },
    Show { channel_id: String, timestamp: i64 },
    Delete { channel_id: String, timestamp: i64 },
    Clear,
    Prune,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: Command,
    /// Keep reports in memory only for this run.
    pub ephemeral: bool,
}

pub const USAGE: &str = "\
Usage: channel-insights [--ephemeral] <command>

Commands:
  analyze <channel> [--fresh]        Rank recent uploads and generate a report
                                     (<channel> is an id, @handle or channel URL)
  rank <videos.json>                 Rank videos from a local JSON file
  history                            List channels with cached reports
  reports <channel_id> [page]        List cached reports for a channel
  show <channel_id> <timestamp>      Print a cached report
  delete <channel_id> <timestamp>    Delete a cached report
  clear                              Delete every cached report
  prune                              Remove expired reports from storage
  help                               Show this message";

pub fn parse_args(args: &[String]) -> Result<Invocation> {
    let ephemeral = args.iter().any(|a| a == "--ephemeral");
    let fresh = args.iter().any(|a| a == "--fresh");

    let positional: Vec<&str> = args
        .iter()
        .map(String::as_str)
        .filter(|a| !matches!(*a, "--ephemeral" | "--fresh"))
        .collect();

    if let Some(flag) = positional.iter().find(|a| a.starts_with("--")) {
        if !matches!(*flag, "--help") {
            return Err(AppError::InvalidInput(format!("unknown flag {flag}")));
        }
    }

    let command = match positional.as_slice() {
        [] | ["help"] | ["--help"] => Command::Help,
        ["analyze", channel] => Command::Analyze {
            channel: channel.to_string(),
            fresh,
        },
        ["rank", path] => Command::Rank {
            path: PathBuf::from(path),
        },
        ["history"] => Command::History,
        ["reports", channel_id] => Command::Reports {
            channel_id: channel_id.to_string(),
            page: 1,
        },
        ["reports", channel_id, page] => Command::Reports {
            channel_id: channel_id.to_string(),
            page: page
                .parse()
                .map_err(|_| AppError::InvalidInput(format!("page must be a number, got {page:?}")))?,
        },
        ["show", channel_id, timestamp] => Command::Show {
            channel_id: channel_id.to_string(),
            timestamp: parse_timestamp(timestamp)?,
        },
        ["delete", channel_id, timestamp] => Command::Delete {
            channel_id: channel_id.to_string(),
            timestamp: parse_timestamp(timestamp)?,
        },
        ["clear"] => Command::Clear,
        ["prune"] => Command::Prune,
        _ => {
            return Err(AppError::InvalidInput(format!(
                "unrecognized arguments: {}",
                positional.join(" ")
            )))
        }
    };

    if fresh && !matches!(command, Command::Analyze { .. }) {
        return Err(AppError::InvalidInput("--fresh only applies to analyze".to_string()));
    }

    Ok(Invocation { command, ephemeral })
}

fn parse_timestamp(raw: &str) -> Result<i64> {
    raw.parse()
        .map_err(|_| AppError::InvalidInput(format!("timestamp must be milliseconds, got {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Invocation> {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        parse_args(&args)
    }

    #[test]
    fn no_args_shows_help() {
        assert_eq!(parse(&[]).unwrap().command, Command::Help);
    }

    #[test]
    fn parses_analyze_with_flags() {
        let inv = parse(&["--ephemeral", "analyze", "@acme", "--fresh"]).unwrap();
        assert!(inv.ephemeral);
        assert_eq!(
            inv.command,
            Command::Analyze {
                channel: "@acme".to_string(),
                fresh: true
            }
        );
    }

    #[test]
    fn parses_history_commands() {
        assert_eq!(
            parse(&["reports", "UC1"]).unwrap().command,
            Command::Reports {
                channel_id: "UC1".to_string(),
                page: 1
            }
        );
        assert_eq!(
            parse(&["reports", "UC1", "3"]).unwrap().command,
            Command::Reports {
                channel_id: "UC1".to_string(),
                page: 3
            }
        );
        assert_eq!(
            parse(&["delete", "UC1", "1700000000000"]).unwrap().command,
            Command::Delete {
                channel_id: "UC1".to_string(),
                timestamp: 1_700_000_000_000
            }
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse(&["show", "UC1", "yesterday"]).is_err());
        assert!(parse(&["history", "--fresh"]).is_err());
        assert!(parse(&["analyze"]).is_err());
        assert!(parse(&["history", "--verbose"]).is_err());
    }
}
