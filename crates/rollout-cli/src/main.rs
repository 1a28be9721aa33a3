mod cmd;
mod manifest;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

use rollout_core::session::{LifecycleFlags, PrimaryIntent};
use rollout_core::SequenceKind;

#[derive(Parser)]
#[command(
    name = "rollout",
    about = "Anchored action orchestration — plan and run install-style action sequences",
    version,
    propagate_version = true
)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the fixed checkpoint skeleton of a sequence
    Checkpoints {
        /// Sequence to show (install or ui)
        #[arg(long, default_value = "install")]
        sequence: String,
    },

    /// Resolve a manifest into its ordered plan without running it
    Plan {
        /// Path to the YAML run manifest
        manifest: PathBuf,

        /// Sequence to plan (install or ui)
        #[arg(long, default_value = "install")]
        sequence: String,
    },

    /// Execute a manifest as one session
    Run {
        /// Path to the YAML run manifest
        manifest: PathBuf,

        /// What the session is doing
        #[arg(long, value_enum, default_value_t = IntentArg::FirstInstall)]
        intent: IntentArg,

        /// Mark the session as the removal half of an upgrade
        #[arg(long)]
        removing_for_upgrade: bool,

        /// Mark the session as a reinstall over the same version
        #[arg(long)]
        being_reinstalled: bool,

        /// Override a session property (repeatable)
        #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_property)]
        set: Vec<(String, String)>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum IntentArg {
    FirstInstall,
    Upgrading,
    Maintenance,
    Uninstalling,
}

impl From<IntentArg> for PrimaryIntent {
    fn from(arg: IntentArg) -> Self {
        match arg {
            IntentArg::FirstInstall => PrimaryIntent::FirstInstall,
            IntentArg::Upgrading => PrimaryIntent::Upgrading,
            IntentArg::Maintenance => PrimaryIntent::Maintenance,
            IntentArg::Uninstalling => PrimaryIntent::Uninstalling,
        }
    }
}

fn parse_property(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{raw}'")),
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Checkpoints { sequence } => match SequenceKind::from_str(&sequence) {
            Ok(kind) => cmd::checkpoints::run(kind, cli.json),
            Err(e) => Err(e.into()),
        },
        Commands::Plan { manifest, sequence } => match SequenceKind::from_str(&sequence) {
            Ok(kind) => cmd::plan::run(&manifest, kind, cli.json),
            Err(e) => Err(e.into()),
        },
        Commands::Run {
            manifest,
            intent,
            removing_for_upgrade,
            being_reinstalled,
            set,
        } => {
            let mut flags = LifecycleFlags::new(intent.into());
            if removing_for_upgrade {
                flags = flags.with_removing_for_upgrade();
            }
            if being_reinstalled {
                flags = flags.with_being_reinstalled();
            }
            cmd::run::run(&manifest, flags, &set, cli.json)
        }
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
