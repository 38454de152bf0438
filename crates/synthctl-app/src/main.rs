//! synthctl - slider console for synths on an external engine
//!
//! Main application entry point.

mod commands;
mod play;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use synthctl_core::{ParamValue, RangePolicy};
use synthctl_engine::EngineConfig;
use synthctl_session::SessionConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Control synths on an external synthesis engine
#[derive(Parser, Debug)]
#[command(name = "synthctl", version)]
#[command(about = "Move synth parameters like sliders and see the client call for every step", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// List the synth definitions that can be played
    List {
        /// RON configuration file declaring extra definitions
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Start a session and read commands from stdin or a script
    Play(PlayArgs),
}

#[derive(clap::Args, Debug)]
struct PlayArgs {
    /// Definition to play (default: sine)
    #[arg(short, long)]
    definition: Option<String>,

    /// Engine to drive
    #[arg(short, long, value_enum)]
    engine: Option<EngineKind>,

    /// Engine host program (implies `--engine process`)
    #[arg(long)]
    host_command: Option<PathBuf>,

    /// RON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Preset applied before the session starts
    #[arg(short, long)]
    preset: Option<PathBuf>,

    /// Read commands from this file instead of stdin
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Initial parameter value (repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = commands::parse_assignment)]
    set: Vec<(String, ParamValue)>,

    /// Refuse out-of-range values instead of clamping them
    #[arg(long)]
    reject_out_of_range: bool,

    /// Send every parameter change, even when a newer one is queued
    #[arg(long)]
    no_coalesce: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum EngineKind {
    /// In-process engine that tracks nodes without sound
    Loopback,
    /// Engine host subprocess speaking the line protocol
    Process,
}

impl PlayArgs {
    /// Configuration file values with command-line overrides applied
    fn session_config(&self) -> Result<SessionConfig> {
        let mut config = load_config(self.config.as_deref())?;

        if let Some(definition) = &self.definition {
            config.definition.clone_from(definition);
        }

        match (self.engine, &self.host_command) {
            (Some(EngineKind::Loopback), Some(_)) => {
                anyhow::bail!("--host-command cannot be used with the loopback engine")
            }
            (Some(EngineKind::Loopback), None) => config.engine = EngineConfig::Loopback,
            (_, Some(program)) => config.engine = process_engine(&config.engine, program.clone()),
            (Some(EngineKind::Process), None) => {
                if !matches!(config.engine, EngineConfig::Process { .. }) {
                    config.engine = EngineConfig::process(bundled_host()?);
                }
            }
            (None, None) => {}
        }

        for (name, value) in &self.set {
            config.parameters.set(name.clone(), *value);
        }
        if self.reject_out_of_range {
            config.range_policy = RangePolicy::Reject;
        }
        if self.no_coalesce {
            config.coalesce_updates = false;
        }

        Ok(config)
    }
}

/// Point a process engine at `program`, keeping configured arguments
fn process_engine(current: &EngineConfig, program: PathBuf) -> EngineConfig {
    match current {
        EngineConfig::Process {
            args,
            response_timeout_ms,
            ..
        } => EngineConfig::Process {
            program,
            args: args.clone(),
            response_timeout_ms: *response_timeout_ms,
        },
        EngineConfig::Loopback => EngineConfig::process(program),
    }
}

/// The engine host installed next to this executable
fn bundled_host() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Cannot locate the synthctl executable")?;
    Ok(exe.with_file_name(format!(
        "synthctl-engine-host{}",
        std::env::consts::EXE_SUFFIX
    )))
}

fn load_config(path: Option<&Path>) -> Result<SessionConfig> {
    match path {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(SessionConfig::default()),
    }
}

fn list(config: &SessionConfig) {
    for definition in config.catalog().iter() {
        println!("{}", definition.id);
        if !definition.description.is_empty() {
            println!("    {}", definition.description);
        }
        for spec in &definition.params {
            let step = spec
                .step
                .map(|s| format!(", step {s}"))
                .unwrap_or_default();
            println!(
                "    {:<14} {} .. {} (default {}{step})",
                spec.name,
                spec.display_value(spec.min),
                spec.display_value(spec.max),
                spec.display_value(spec.default),
            );
        }
    }
}

fn main() -> Result<()> {
    // Logs go to stderr so they never mix with console output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "synthctl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        CliCommand::List { config } => {
            list(&load_config(config.as_deref())?);
            Ok(())
        }
        CliCommand::Play(args) => {
            let config = args.session_config()?;
            tracing::info!("Playing '{}' on {:?}", config.definition, config.engine);
            play::run(&config, args.preset.as_deref(), args.script.as_deref())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play_args(args: &[&str]) -> PlayArgs {
        let cli = Cli::try_parse_from(["synthctl", "play"].iter().chain(args)).unwrap();
        match cli.command {
            CliCommand::Play(args) => args,
            CliCommand::List { .. } => panic!("expected play"),
        }
    }

    #[test]
    fn test_cli_overrides() {
        let config = play_args(&[
            "--definition",
            "noise-modulated",
            "--set",
            "noise_hz=3.5",
            "--set",
            "note_offset=60",
            "--reject-out-of-range",
            "--no-coalesce",
        ])
        .session_config()
        .unwrap();

        assert_eq!(config.definition, "noise-modulated");
        assert_eq!(config.parameters.get("noise_hz"), Some(3.5));
        assert_eq!(config.parameters.get("note_offset"), Some(60.0));
        assert_eq!(config.range_policy, RangePolicy::Reject);
        assert!(!config.coalesce_updates);
        assert_eq!(config.engine, EngineConfig::Loopback);
    }

    #[test]
    fn test_host_command_selects_process_engine() {
        let config = play_args(&["--host-command", "/opt/synth/bridge"])
            .session_config()
            .unwrap();
        assert_eq!(config.engine, EngineConfig::process("/opt/synth/bridge"));

        assert!(
            play_args(&["--engine", "loopback", "--host-command", "/opt/synth/bridge"])
                .session_config()
                .is_err()
        );
    }

    #[test]
    fn test_config_file_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synthctl.ron");
        std::fs::write(
            &path,
            r#"(
                engine: Process(program: "/opt/synth/bridge", response_timeout_ms: 250),
                definition: "noise-modulated",
            )"#,
        )
        .unwrap();

        let config = play_args(&[
            "--config",
            path.to_str().unwrap(),
            "--host-command",
            "/usr/bin/other-bridge",
        ])
        .session_config()
        .unwrap();

        assert_eq!(config.definition, "noise-modulated");
        assert_eq!(
            config.engine,
            EngineConfig::Process {
                program: PathBuf::from("/usr/bin/other-bridge"),
                args: Vec::new(),
                response_timeout_ms: 250,
            }
        );
    }

    #[test]
    fn test_bad_set_is_rejected_by_parser() {
        assert!(Cli::try_parse_from(["synthctl", "play", "--set", "frequency"]).is_err());
    }
}
