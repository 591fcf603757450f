// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::io::{self, Read};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::debug;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use dowse_config::{Config, ToolsConfig};
use dowse_core::{Executor, ExecutorEvent, StepOutcome};
use dowse_model::ModelProvider;
use dowse_tools::{ShellTool, ToolRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    // Handle subcommands first
    if let Some(cmd) = &cli.command {
        match cmd {
            Commands::Completions { shell } => {
                cli::print_completions(*shell);
                return Ok(());
            }
            Commands::ShowConfig => {
                let config = load_config(&cli)?;
                print!("{}", toml::to_string_pretty(&config).context("rendering configuration")?);
                return Ok(());
            }
            Commands::Tools => {
                let config = load_config(&cli)?;
                let registry = build_registry(&config.tools)?;
                if registry.is_empty() {
                    println!("(no tools enabled)");
                }
                for line in registry.describe().lines() {
                    println!("{line}");
                }
                return Ok(());
            }
        }
    }

    let config = load_config(&cli)?;
    let vars = cli.parsed_vars()?;
    let prompt = read_prompt(&cli)?;
    debug!(
        provider = %config.model.provider,
        model = %config.model.name,
        style = %config.agent.style,
        "configuration loaded"
    );

    let model: Arc<dyn ModelProvider> = Arc::from(dowse_model::from_config(&config.model)?);
    let tools = Arc::new(build_registry(&config.tools)?);
    let executor = Executor::from_config(&config.agent, model, tools)?;

    let (tx, mut rx) = mpsc::channel::<ExecutorEvent>(64);
    let show_steps = cli.show_steps;
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if show_steps {
                print_event(&event);
            }
        }
    });

    let result = executor.run_with_events(&prompt, vars, tx).await;
    // The sender was moved into the run, so the printer drains and exits.
    let _ = printer.await;
    let output = result?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", output.output);
    }
    Ok(())
}

/// Load layered configuration and apply command-line overrides.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = dowse_config::load(cli.config.as_deref())?;
    if let Some(style) = cli.style {
        config.agent.style = style;
    }
    if let Some(model) = &cli.model {
        config.model.name = model.clone();
    }
    if let Some(n) = cli.max_iterations {
        config.agent.max_iterations = n;
    }
    if let Some(secs) = cli.max_time {
        config.agent.max_execution_time_secs = Some(secs);
    }
    if cli.json {
        config.agent.return_intermediate_steps = true;
    }
    Ok(config)
}

fn build_registry(cfg: &ToolsConfig) -> anyhow::Result<ToolRegistry> {
    let mut builder = ToolRegistry::builder();
    if cfg.shell_enabled {
        builder = builder.register(ShellTool { timeout_secs: cfg.shell_timeout_secs })?;
    }
    Ok(builder.build())
}

/// The positional prompt, or all of stdin when it is piped in.
fn read_prompt(cli: &Cli) -> anyhow::Result<String> {
    if let Some(p) = &cli.prompt {
        return Ok(p.clone());
    }
    if cli::is_stdin_tty() {
        anyhow::bail!("no prompt given: pass it as an argument or pipe it on stdin");
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf).context("reading prompt from stdin")?;
    let prompt = buf.trim();
    if prompt.is_empty() {
        anyhow::bail!("empty prompt on stdin");
    }
    Ok(prompt.to_string())
}

fn print_event(event: &ExecutorEvent) {
    match event {
        ExecutorEvent::IterationStarted { iteration } => eprintln!("── iteration {iteration} ──"),
        ExecutorEvent::ActionPlanned { action } => {
            eprintln!("→ {} {}", action.tool, action.tool_input);
        }
        ExecutorEvent::ToolFinished { observation, outcome, .. } => {
            let tag = match outcome {
                StepOutcome::Observed => "",
                StepOutcome::ToolFailed => " (tool error)",
                StepOutcome::UnknownTool => " (unknown tool)",
                StepOutcome::InvalidOutput => " (invalid output)",
            };
            eprintln!("← {observation}{tag}");
        }
        ExecutorEvent::DecisionFailed { attempt, error } => {
            eprintln!("! attempt {attempt} failed: {error}");
        }
        ExecutorEvent::Stopped { reason } => eprintln!("■ stopped: {reason:?}"),
        ExecutorEvent::Finished { .. } => {}
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
