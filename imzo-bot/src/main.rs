//! Imzo Bot CLI.
//!
//! Runs the Telegram bridge to the Imzo AI question backend.

#![allow(clippy::print_stdout)] // CLI program intentionally uses stdout

use clap::{Args, Parser, Subcommand};
use imzo_bot::config::{BotConfig, vars};
use imzo_bot::error::Result;
use imzo_bot::gateway::{Gateway, GatewayConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Imzo Bot - Telegram bridge to the Imzo AI question backend
#[derive(Parser)]
#[command(name = "imzo-bot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Read variables from this file instead of `./.env`
    #[arg(long, env = "IMZO_ENV_FILE", global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run(RunArgs),

    /// Validate the configuration and show which variables are set
    CheckConfig,
}

/// Arguments for the run command
#[derive(Args)]
struct RunArgs {
    /// Also read questions from stdin as one local chat
    #[arg(long)]
    console: bool,

    /// Do not start the Telegram channel
    #[arg(long)]
    no_telegram: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");

    match rt.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging with the given verbosity level.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "imzo_bot={level},{}",
            if verbosity >= 2 { "debug" } else { "warn" }
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let env_file = cli.env_file.as_deref();
    match cli.command {
        Commands::Run(args) => cmd_run(args, env_file).await,
        Commands::CheckConfig => {
            cmd_check_config(env_file);
            Ok(())
        }
    }
}

/// Start the gateway and run until Ctrl+C.
async fn cmd_run(args: RunArgs, env_file: Option<&Path>) -> Result<()> {
    let config = BotConfig::load(env_file)?;
    tracing::info!(?config, "starting imzo-bot");

    let gateway_config = GatewayConfig::new(config)
        .telegram(!args.no_telegram && cfg!(feature = "telegram"))
        .console(args.console);
    let gateway = Gateway::from_config(gateway_config)?;

    let shutdown = gateway.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            shutdown.cancel();
        }
    });

    gateway.run().await
}

/// Print the resolved configuration.
fn cmd_check_config(env_file: Option<&Path>) {
    // Loaded first so the status below includes variables from the env file.
    let config = BotConfig::load(env_file);

    println!("Imzo Bot configuration\n");

    println!("Environment:");
    for name in vars::ALL {
        print_env_status(name);
    }
    println!();

    match config {
        Ok(config) => {
            println!("Backend:");
            println!("  API base:      {}", config.backend.api_base);
            println!("  Chat room:     {}", config.backend.chat_room_id);
            println!("  HTTP timeout:  {:?}", config.backend.http_timeout);
            println!(
                "  Poll auth:     {}",
                if config.backend.poll_auth_override.is_some() {
                    "static bearer"
                } else {
                    "user token"
                }
            );
            println!("Polling:");
            println!("  Interval:      {:?}", config.poll.interval);
            println!("  Timeout:       {:?}", config.poll.timeout);
            println!("Telegram:");
            match config.require_telegram_token() {
                Ok(_) => println!("  Token:         set"),
                Err(e) => println!("  Token:         {e}"),
            }
        }
        Err(e) => println!("error: {e}"),
    }
}

/// Print environment variable status.
fn print_env_status(name: &str) {
    let status = if std::env::var(name).is_ok() {
        "set"
    } else {
        "-"
    };
    println!("  {name}: {status}");
}
