// src/main.rs

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use status_sync::reconcile::MergeReport;
use status_sync::{Config, SnapshotStatus, SyncOptions, SyncOutcome, Synchronizer};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "status-sync")]
#[command(author, version, about = "Overlay a user-scope dpkg status database onto the system one", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct ConfigArgs {
    /// Native dpkg architecture (e.g., amd64)
    #[arg(long, env = "ARCH", global = true)]
    arch: Option<String>,

    /// Root of the user chroot
    #[arg(long, env = "CHROOT", global = true)]
    chroot: Option<PathBuf>,

    /// Directory holding root-status and user-status
    #[arg(long, env = "TEMPDIR", global = true)]
    scratch_dir: Option<PathBuf>,

    /// Directory holding the root-status.old snapshot
    #[arg(long, env = "APPDATA", global = true)]
    data_dir: Option<PathBuf>,

    /// Snapshot comparison window in bytes
    #[arg(long, global = true, default_value_t = status_sync::snapshot::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Stanzas written per batch
    #[arg(long, global = true, default_value_t = status_sync::control::codec::DEFAULT_BATCH_SIZE)]
    batch_size: usize,
}

impl ConfigArgs {
    fn into_config(self) -> Result<Config> {
        let arch = self.arch.context("architecture not set (use --arch or ARCH)")?;
        let chroot = self.chroot.context("chroot not set (use --chroot or CHROOT)")?;
        let scratch_dir = self
            .scratch_dir
            .context("scratch directory not set (use --scratch-dir or TEMPDIR)")?;
        let data_dir = self
            .data_dir
            .context("data directory not set (use --data-dir or APPDATA)")?;

        Ok(Config::new(arch, chroot, scratch_dir, data_dir)
            .with_chunk_size(self.chunk_size)
            .with_batch_size(self.batch_size))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Merge user-owned entries into the user status file (default)
    Sync {
        /// Merge even if the system status is unchanged
        #[arg(short, long)]
        force: bool,
        /// Compute the merge without writing anything
        #[arg(short = 'n', long)]
        dry_run: bool,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Report whether the system status changed since the last sync
    Check {
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        shell: Shell,
    },
}

fn print_report(report: &MergeReport) {
    println!("  Entries: {}", report.total);
    println!("  Replaced from user database: {}", report.substituted);
    println!("  Owned user entries: {}", report.owned);
    if !report.unmatched.is_empty() {
        println!("  Not in system database ({}):", report.unmatched.len());
        for key in &report.unmatched {
            println!("    - {}", key);
        }
    }
}

fn print_outcome(outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Bootstrapped => {
            println!("No previous snapshot; recorded the current system status as baseline.")
        }
        SyncOutcome::Unchanged => println!("System status unchanged; nothing to do."),
        SyncOutcome::Merged(report) => {
            println!("User status updated.");
            print_report(report);
        }
        SyncOutcome::Planned(report) => {
            println!("Dry run; user status not written.");
            print_report(report);
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber for logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let command = cli.command.unwrap_or(Commands::Sync {
        force: false,
        dry_run: false,
        json: false,
    });

    match command {
        Commands::Sync {
            force,
            dry_run,
            json,
        } => {
            let config = cli.config.into_config()?;
            info!("Synchronizing status for {} in {}", config.arch, config.chroot.display());

            let outcome = Synchronizer::new(&config)
                .run(&SyncOptions { force, dry_run })
                .context("Status synchronization failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
            Ok(())
        }
        Commands::Check { json } => {
            let config = cli.config.into_config()?;
            let status = Synchronizer::new(&config)
                .check()
                .context("Snapshot comparison failed")?;

            if json {
                println!("{}", serde_json::to_string(&status)?);
            } else {
                match status {
                    SnapshotStatus::Missing => println!("No snapshot yet."),
                    SnapshotStatus::Unchanged => println!("System status unchanged."),
                    SnapshotStatus::Changed => println!("System status changed."),
                }
            }
            Ok(())
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "status-sync", &mut std::io::stdout());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATHS: [&str; 8] = [
        "--arch",
        "amd64",
        "--chroot",
        "/c",
        "--scratch-dir",
        "/s",
        "--data-dir",
        "/d",
    ];

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sync_flags_parse() {
        let args = ["status-sync", "sync", "--force", "-n"].into_iter().chain(PATHS);
        let cli = Cli::try_parse_from(args).unwrap();

        match cli.command {
            Some(Commands::Sync {
                force,
                dry_run,
                json,
            }) => {
                assert!(force);
                assert!(dry_run);
                assert!(!json);
            }
            _ => panic!("expected sync command"),
        }

        let config = cli.config.into_config().unwrap();
        assert_eq!(config.arch, "amd64");
        assert_eq!(config.user_status_path(), PathBuf::from("/s/user-status"));
    }

    #[test]
    fn test_tuning_flags_reach_config() {
        let args = ["status-sync", "--chunk-size", "64", "--batch-size", "3"]
            .into_iter()
            .chain(PATHS);
        let config = Cli::try_parse_from(args).unwrap().config.into_config().unwrap();
        assert_eq!(config.chunk_size, 64);
        assert_eq!(config.batch_size, 3);
    }

    #[test]
    fn test_completions_parse_shell() {
        let cli = Cli::try_parse_from(["status-sync", "completions", "bash"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Completions { shell: Shell::Bash })
        ));
    }
}
