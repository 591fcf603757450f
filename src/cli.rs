// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use dowse_config::AgentStyleKind;

#[derive(Parser, Debug)]
#[command(
    name = "dowse",
    about = "A tool-using language model agent: plan, act, observe, answer",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Question or task for the agent.  Read from stdin when omitted.
    #[arg(value_name = "PROMPT")]
    pub prompt: Option<String>,

    /// Path to config file (overrides auto-discovery)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Prompt convention (overrides `agent.style`)
    #[arg(long, short = 's', value_enum)]
    pub style: Option<AgentStyleKind>,

    /// Model to use, e.g. "gpt-4o-mini" (overrides `model.name`)
    #[arg(long, short = 'M', env = "DOWSE_MODEL")]
    pub model: Option<String>,

    /// Maximum plan/act iterations (overrides `agent.max_iterations`)
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<u32>,

    /// Wall-clock budget for the run in seconds
    #[arg(long, value_name = "SECS")]
    pub max_time: Option<f64>,

    /// Extra prompt variable in KEY=VALUE form.
    /// May be repeated: --var persona=pirate --var lang=en
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// Print the run result as JSON
    #[arg(long)]
    pub json: bool,

    /// Print every intermediate step to stderr as it happens
    #[arg(long)]
    pub show_steps: bool,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Print the effective configuration and exit
    ShowConfig,
    /// List the tools the agent can use
    Tools,
}

impl Cli {
    /// Parse the repeated `--var KEY=VALUE` flags.
    pub fn parsed_vars(&self) -> anyhow::Result<HashMap<String, String>> {
        parse_vars(&self.vars)
    }
}

pub fn parse_vars(raw: &[String]) -> anyhow::Result<HashMap<String, String>> {
    raw.iter()
        .map(|kv| match kv.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
            _ => anyhow::bail!("invalid --var {kv:?}: expected KEY=VALUE"),
        })
        .collect()
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "dowse", &mut std::io::stdout());
}

/// True when stdin is attached to a terminal.
pub fn is_stdin_tty() -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        unsafe { libc::isatty(std::io::stdin().as_raw_fd()) != 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_prompt_and_overrides() {
        let cli = Cli::try_parse_from([
            "dowse", "--style", "conversational", "--max-iterations", "3", "--json", "what time is it?",
        ])
        .unwrap();
        assert_eq!(cli.prompt.as_deref(), Some("what time is it?"));
        assert_eq!(cli.style, Some(AgentStyleKind::Conversational));
        assert_eq!(cli.max_iterations, Some(3));
        assert!(cli.json);
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["dowse", "tools"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Tools)));
        let cli = Cli::try_parse_from(["dowse", "show-config"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::ShowConfig)));
    }

    #[test]
    fn rejects_unknown_style() {
        assert!(Cli::try_parse_from(["dowse", "--style", "socratic", "q"]).is_err());
    }

    #[test]
    fn vars_split_on_first_equals() {
        let vars = parse_vars(&["persona=pirate".into(), "expr=a=b".into()]).unwrap();
        assert_eq!(vars["persona"], "pirate");
        assert_eq!(vars["expr"], "a=b");
    }

    #[test]
    fn vars_without_key_are_rejected() {
        assert!(parse_vars(&["novalue".into()]).is_err());
        assert!(parse_vars(&["=x".into()]).is_err());
    }
}
