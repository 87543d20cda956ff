// src/cli.rs

use clap::Parser;
use std::path::PathBuf;

/// shellwrap: run commands next to a persistent interpreter, with stdout and stderr
/// streamed back line by line.
///
/// Valid formats:
/// - `shellwrap [OPTIONS] <program> [args...]`
/// - `shellwrap [OPTIONS] --command "<command line>"`
/// - `shellwrap [OPTIONS] --interactive` (one command line per stdin line)
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// A command line, split with shell-word rules. No shell features are interpreted.
    #[arg(long, short, conflicts_with = "tokens")]
    pub command: Option<String>,

    /// Read command lines from stdin and run each one in the same session.
    #[arg(long, short, conflicts_with_all = ["tokens", "command"])]
    pub interactive: bool,

    /// Set an environment variable for the command (e.g., "KEY=VALUE"). Repeatable.
    #[arg(long, short)]
    pub env: Vec<String>,

    /// Kill the command if it runs longer than this many seconds.
    #[arg(long, short)]
    pub timeout: Option<u64>,

    /// Discard a final output line that has no trailing newline.
    #[arg(long)]
    pub drop_partial: bool,

    /// Read the session configuration from this file instead of the default location.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// The program to run, followed by its arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub tokens: Vec<String>,
}

impl Cli {
    /// Parses every `--env` entry into a `(key, value)` pair.
    ///
    /// Returns the offending entry when one is not of the form `KEY=VALUE`.
    pub fn env_pairs(&self) -> Result<Vec<(String, String)>, String> {
        self.env
            .iter()
            .map(|entry| match entry.split_once('=') {
                Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
                _ => Err(entry.clone()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_tokens_keep_hyphens() {
        let cli = Cli::try_parse_from(["shellwrap", "-e", "A=1", "ls", "-la", "/tmp"]).unwrap();
        assert_eq!(cli.tokens, vec!["ls", "-la", "/tmp"]);
        assert_eq!(cli.env, vec!["A=1"]);
    }

    #[test]
    fn test_env_pairs() {
        let cli =
            Cli::try_parse_from(["shellwrap", "--env", "A=1", "-e", "B=x=y", "true"]).unwrap();
        assert_eq!(
            cli.env_pairs().unwrap(),
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "x=y".to_string())
            ]
        );
    }

    #[test]
    fn test_env_value_keeps_commas() {
        let cli = Cli::try_parse_from(["shellwrap", "-e", "PATH=/a,/b", "true"]).unwrap();
        assert_eq!(cli.env, vec!["PATH=/a,/b"]);
        assert_eq!(
            cli.env_pairs().unwrap(),
            vec![("PATH".to_string(), "/a,/b".to_string())]
        );
        assert_eq!(cli.tokens, vec!["true"]);
    }

    #[test]
    fn test_env_pairs_rejects_malformed_entry() {
        let cli = Cli {
            env: vec!["NOEQUALS".to_string()],
            ..Default::default()
        };
        assert_eq!(cli.env_pairs(), Err("NOEQUALS".to_string()));

        let cli = Cli {
            env: vec!["=value".to_string()],
            ..Default::default()
        };
        assert!(cli.env_pairs().is_err());
    }

    #[test]
    fn test_command_and_tokens_conflict() {
        let result = Cli::try_parse_from(["shellwrap", "--command", "echo hi", "echo"]);
        assert!(result.is_err());
    }
}
