//! DN Log CLI: record delta-neutral option positions and their perp hedges.
//!
//! Commands:
//! - `menu` (default): interactive loop over all operations
//! - `new`: show the starting hedge and record a position once it is opened
//! - `list` / `history`: active and closed positions
//! - `check`: observe a delta and, on confirmation, apply the rehedge
//! - `close`: archive a position

mod commands;
mod menu;
mod prompt;
mod render;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dnlog_core::{
    AppConfig, DeltaSource, JsonFileStore, NewPosition, OptionType, PositionId, PositionLifecycle,
    SourceKind,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::Session;
use crate::prompt::Prompt;

#[derive(Parser)]
#[command(
    name = "dnlog",
    version,
    about = "DN Log: delta-neutral option position tracker"
)]
struct Cli {
    /// Path to a TOML config file. Defaults to <config dir>/dnlog/config.toml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding positions.json and history.json. Overrides the config file.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Delta source: mock or binance. Overrides the config file.
    #[arg(long, global = true)]
    source: Option<SourceKind>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive menu (the default).
    Menu,
    /// Open a position: prints the starting hedge, saves after confirmation.
    New {
        /// Expiry label, e.g. 27FEB.
        #[arg(long)]
        expiry: String,

        /// call or put.
        #[arg(long = "type")]
        option_type: OptionType,

        #[arg(long)]
        strike: f64,

        /// Contracts, e.g. 0.1.
        #[arg(long)]
        size: f64,

        /// Entry delta (0.0 to 1.0).
        #[arg(long, allow_negative_numbers = true)]
        delta: f64,

        /// Rehedge threshold, e.g. 0.0038.
        #[arg(long)]
        band: f64,

        /// Skip the "did you open the hedge?" confirmation.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// List active positions.
    List,
    /// List closed positions.
    History,
    /// Check a position against a delta and rehedge if needed.
    Check {
        id: String,

        /// Delta to use. Without it the configured source is asked, then you are.
        #[arg(long, allow_negative_numbers = true)]
        delta: Option<f64>,

        /// Record the rehedge without asking whether it was executed.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// Close a position and move it to history.
    Close {
        id: String,

        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(source) = cli.source {
        config.market.source = source;
    }

    init_tracing(&config.log_filter);
    debug!(
        data_dir = %config.data_dir.display(),
        source = %config.market.source,
        "Configuration loaded"
    );

    let lifecycle = PositionLifecycle::new(
        JsonFileStore::new(config.data_dir.clone()),
        config.underlying.clone(),
    );
    let mut session = Session::new(lifecycle, build_source(&config));

    let stdin = io::stdin();
    let mut prompt = Prompt::new(stdin.lock(), io::stdout().lock());

    match cli.command.unwrap_or(Commands::Menu) {
        Commands::Menu => menu::run(&mut session, &mut prompt),
        Commands::New {
            expiry,
            option_type,
            strike,
            size,
            delta,
            band,
            yes,
        } => {
            let intent = NewPosition {
                expiry,
                option_type,
                strike,
                size,
                entry_delta: delta,
                band,
            };
            commands::open(&mut session, &mut prompt, intent, yes).map(|_| ())
        }
        Commands::List => commands::list(&session, prompt.writer()),
        Commands::History => commands::history(&session, prompt.writer()),
        Commands::Check { id, delta, yes } => {
            commands::check(&mut session, &mut prompt, &PositionId::new(id), delta, yes)
        }
        Commands::Close { id, yes } => {
            commands::close(&mut session, &mut prompt, &PositionId::new(id), yes).map(|_| ())
        }
    }?;

    prompt.writer().flush()?;
    Ok(())
}

/// Logs go to stderr so they never interleave with prompts on stdout.
/// `RUST_LOG` wins over the configured filter.
fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// A source that cannot be built leaves `check` on manual input.
fn build_source(config: &AppConfig) -> Option<Box<dyn DeltaSource>> {
    match config.delta_source() {
        Ok(source) => Some(source),
        Err(e) => {
            warn!(source = %config.market.source, error = %e, "Delta source unavailable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_menu() {
        let cli = Cli::try_parse_from(["dnlog"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn new_accepts_put_with_signed_delta() {
        let cli = Cli::try_parse_from([
            "dnlog", "new", "--expiry", "27FEB", "--type", "put", "--strike", "60000", "--size",
            "0.2", "--delta", "-0.3", "--band", "0.005", "--yes",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::New {
                option_type,
                delta,
                yes,
                ..
            }) => {
                assert_eq!(option_type, OptionType::Put);
                assert_eq!(delta, -0.3);
                assert!(yes);
            }
            _ => panic!("expected new"),
        }
    }

    #[test]
    fn global_overrides_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "dnlog", "check", "20260210-090000", "--delta", "0.55", "--source", "binance",
            "--data-dir", "/tmp/dn",
        ])
        .unwrap();
        assert_eq!(cli.source, Some(SourceKind::Binance));
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/dn")));
        assert!(matches!(
            cli.command,
            Some(Commands::Check { delta: Some(d), yes: false, .. }) if d == 0.55
        ));
    }

    #[test]
    fn unknown_source_is_rejected() {
        assert!(Cli::try_parse_from(["dnlog", "--source", "kraken", "list"]).is_err());
    }
}
