use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chainwatch_store::{
    config::StoreConfig,
    diagnostics,
    migration::{LogEntry, MigrateOptions, Severity},
    stack::StorageStack,
    types::Backend,
};

#[derive(Parser)]
#[command(name = "chainwatch-store")]
#[command(about = "Operator controls for the chainwatch configuration store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy local data to the remote backend
    Migrate {
        /// Also send records whose name already exists remotely
        #[arg(long)]
        no_skip_existing: bool,
    },
    /// Compare local and remote record counts
    Validate,
    /// Delete every row of every remote table
    Wipe {
        /// Confirm the irreversible wipe
        #[arg(long)]
        yes: bool,
    },
    /// Drop one remote table and create it empty
    ResetTable {
        /// Logical collection name, e.g. ApiConfig
        name: String,
        /// Confirm the irreversible reset
        #[arg(long)]
        yes: bool,
    },
    /// Check DNS and reachability of the remote endpoint
    Diagnose,
    /// Show or change the selected storage backend
    Backend {
        #[arg(value_enum, default_value = "show")]
        action: BackendAction,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendAction {
    Show,
    Local,
    Remote,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chainwatch_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = StoreConfig::from_env().context("invalid configuration")?;
    let stack = StorageStack::open(config).context("failed to open local storage")?;

    match cli.command {
        Commands::Migrate { no_skip_existing } => {
            let options = MigrateOptions {
                skip_existing: !no_skip_existing,
            };
            let progress = |pct: u8, message: &str| eprintln!("[{pct:>3}%] {message}");
            let result = stack
                .migration_engine()
                .migrate(options, Some(&progress))
                .await;
            print_log(&result.log);
            println!("{}", result.summary);
            if !result.success {
                bail!("migration did not complete");
            }
        }
        Commands::Validate => {
            let report = stack.migration_engine().validate().await;
            print_log(&report.log);
            println!("{}", report.summary);
            if !report.success {
                bail!("validation failed");
            }
        }
        Commands::Wipe { yes } => {
            if !yes {
                bail!("refusing to wipe remote data without --yes");
            }
            let progress = |pct: u8, message: &str| eprintln!("[{pct:>3}%] {message}");
            let report = stack
                .migration_engine()
                .wipe_remote_data(Some(&progress))
                .await;
            print_log(&report.log);
            println!("{}", report.summary);
            if !report.success {
                bail!("wipe did not complete");
            }
        }
        Commands::ResetTable { name, yes } => {
            if !yes {
                bail!("refusing to drop remote table for {name} without --yes");
            }
            stack
                .migration_engine()
                .drop_and_recreate_table(&name)
                .await
                .with_context(|| format!("failed to reset remote table for {name}"))?;
            println!("Remote table for {name} recreated");
        }
        Commands::Diagnose => {
            let Some(remote) = &stack.config.remote else {
                bail!("CHAINWATCH_REMOTE_URL and CHAINWATCH_REMOTE_KEY are not set");
            };
            let result = diagnostics::diagnose_network(
                &stack.connectivity,
                stack.reachability.as_ref(),
                &remote.rest_url(),
                remote.probe_timeout,
            )
            .await;
            for line in &result.log {
                println!("  {line}");
            }
            println!("{}", result.detail.unwrap_or_default());
            if !result.success {
                bail!("remote endpoint is not usable");
            }
        }
        Commands::Backend { action } => match action {
            BackendAction::Show => {
                println!("{}", stack.selection.get_current(true));
            }
            BackendAction::Local => {
                stack.selection.set_current(Backend::Local)?;
                println!("local");
            }
            BackendAction::Remote => {
                if !stack.selection.try_set_current(Backend::Remote).await {
                    bail!("remote backend is not reachable; selection unchanged");
                }
                println!("remote");
            }
        },
    }

    Ok(())
}

fn print_log(entries: &[LogEntry]) {
    for entry in entries {
        let tag = match entry.severity {
            Severity::Info => "info",
            Severity::Success => " ok ",
            Severity::Warning => "warn",
            Severity::Error => "FAIL",
        };
        println!("{} [{tag}] {}", entry.timestamp.format("%H:%M:%S"), entry.message);
    }
}
