use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::commands::{expand_command_abbrev, known_command_names};
use crate::config::Config;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((k, v)) => Ok(Self {
                key: k.trim().to_string(),
                value: v.trim().to_string(),
            }),
            None => Err(anyhow!("expected KEY=VALUE, got: {s}")),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "memo",
    version,
    about = "Memo: a due-date-sorted to-do list",
    disable_help_subcommand = true,
    arg_required_else_help = false
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "memorc")]
    pub memorc: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = match (quiet, verbose) {
        (2.., _) => "error",
        (1, _) => "warn",
        (0, 0) => "warn",
        (0, 1) => "info",
        (0, 2) => "debug",
        (0, 3..) => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init()
        .is_err()
    {
        debug!("tracing subscriber already set, continuing");
    }

    Ok(())
}

/// A parsed invocation: `memo [ids] <command> [args]`.
///
/// Unlike a filter language, selectors here are positional todo ids and
/// nothing else: every token before the command must parse as one.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub ids: Vec<usize>,
    pub command: String,
    pub command_args: Vec<String>,
}

impl Invocation {
    #[tracing::instrument(skip(cfg, rest))]
    pub fn parse(cfg: &Config, rest: Vec<OsString>) -> anyhow::Result<Self> {
        let tokens: Vec<String> = rest
            .into_iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect();

        let known = known_command_names();
        let mut ids = Vec::new();

        for (i, token) in tokens.iter().enumerate() {
            if let Ok(id) = token.parse::<usize>() {
                ids.push(id);
                continue;
            }

            let full = expand_command_abbrev(token, &known)
                .ok_or_else(|| anyhow!("expected a todo id or a command, got: {token}"))?;
            debug!(token = %token, expanded = %full, split_index = i, "resolved command token");
            return Ok(Self {
                ids,
                command: full.to_string(),
                command_args: tokens[i + 1..].to_vec(),
            });
        }

        // ids with no command read naturally as an info query
        if !ids.is_empty() {
            debug!(count = ids.len(), "numeric tokens only; showing info");
            return Ok(Self {
                ids,
                command: "info".to_string(),
                command_args: vec![],
            });
        }

        let command = cfg
            .get("default.command")
            .unwrap_or_else(|| "list".to_string());
        debug!(command = %command, "no arguments; using default command");
        Ok(Self {
            ids: vec![],
            command,
            command_args: vec![],
        })
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use super::Invocation;
    use crate::config::Config;

    fn parse(tokens: &[&str]) -> anyhow::Result<Invocation> {
        let rest: Vec<OsString> = tokens.iter().map(OsString::from).collect();
        Invocation::parse(&Config::defaults(), rest)
    }

    #[test]
    fn leading_ids_then_command() {
        let inv = parse(&["0", "3", "delete"]).expect("parse batch delete");
        assert_eq!(inv.ids, [0, 3]);
        assert_eq!(inv.command, "delete");
        assert!(inv.command_args.is_empty());
    }

    #[test]
    fn command_args_flow_through_untouched() {
        let inv = parse(&["1", "edit", "Buy", "milk", "due:tomorrow"]).expect("parse edit");
        assert_eq!(inv.ids, [1]);
        assert_eq!(inv.command, "edit");
        assert_eq!(inv.command_args, ["Buy", "milk", "due:tomorrow"]);
    }

    #[test]
    fn bare_ids_read_as_info() {
        let inv = parse(&["2"]).expect("parse bare id");
        assert_eq!(inv.command, "info");
        assert_eq!(inv.ids, [2]);
    }

    #[test]
    fn no_arguments_falls_back_to_default_command() {
        let inv = parse(&[]).expect("parse empty");
        assert_eq!(inv.command, "list");
        assert!(inv.ids.is_empty());
    }

    #[test]
    fn unambiguous_prefix_expands() {
        let inv = parse(&["pu"]).expect("parse abbreviated purge");
        assert_eq!(inv.command, "purge");
    }

    #[test]
    fn non_numeric_selector_is_rejected() {
        assert!(parse(&["groceries", "list"]).is_err());
    }
}
