//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use loginflow_core::config;
use loginflow_core::form::Field;
use loginflow_core::logging;

use crate::interrupt;

mod commands;

#[derive(Parser)]
#[command(name = "loginflow")]
#[command(version)]
#[command(about = "Sign in to a token-authenticated HTTP API")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Log in with a username and password (read from stdin)
    Login {
        /// Username to log in as (prompted for when omitted)
        #[arg(short, long, env = "LOGINFLOW_USERNAME")]
        username: Option<String>,
    },

    /// Log out and invalidate the cached token
    Logout,

    /// Show the user the cached token belongs to
    Whoami,

    /// Check a value against a field's validation rule
    Validate {
        /// Field to validate (username or password)
        #[arg(value_name = "FIELD", value_parser = parse_field)]
        field: Field,
        /// Value to check
        #[arg(value_name = "VALUE", allow_hyphen_values = true)]
        value: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Print the default configuration as TOML
    Generate,
}

fn parse_field(value: &str) -> Result<Field, String> {
    value.parse()
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // Config commands must work even when the config file is broken.
    if let Commands::Config { command } = &cli.command {
        return config_command(command);
    }

    let config = config::Config::load().context("load config")?;
    let _log_guard = logging::init(&config).context("init logging")?;

    interrupt::init()?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli, &config).await })
}

async fn dispatch(cli: Cli, config: &config::Config) -> Result<()> {
    match cli.command {
        Commands::Login { username } => commands::auth::login(config, username).await,
        Commands::Logout => commands::auth::logout(config).await,
        Commands::Whoami => commands::auth::whoami(config).await,
        Commands::Validate { field, value } => commands::validate::run(config, field, &value),
        Commands::Config { command } => config_command(&command),
    }
}

fn config_command(command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Path => {
            commands::config::path();
            Ok(())
        }
        ConfigCommands::Init => commands::config::init(),
        ConfigCommands::Generate => commands::config::generate(),
    }
}
