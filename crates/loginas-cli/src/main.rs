mod commands;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use loginas_auth::{Clock, SystemClock, TokenGenerator};
use loginas_connectors::{EnvSecretStore, MemoryUserStore};
use loginas_core::{
    Settings, default_config_path, init_logging, load_settings_from_file, write_default_config,
};

use crate::commands::login_as::build_login_link;
use crate::commands::serve::cmd_serve;

#[derive(Debug, Parser)]
#[command(name = "loginas", about = "Issue and redeem one-time \"login as\" links")]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Print a URL that logs the holder in as USERNAME
    LoginAs {
        username: String,
        /// Seconds the link stays valid (default from config, normally 60)
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Run the HTTP endpoint that redeems login-as links
    Serve,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    match cli.command {
        Commands::Init { force } => {
            let written = write_default_config(&config_path, force)?;
            let text = if written {
                "Init complete"
            } else {
                "Config already exists (use --force to overwrite)"
            };
            pout(
                cli.json,
                serde_json::json!({"written": written, "config": config_path}),
                text,
            )?;
        }
        Commands::LoginAs { username, timeout } => {
            let (settings, tokens, _) = load(&config_path)?;
            let users = MemoryUserStore::with_users(settings.users.clone());
            let link = build_login_link(&users, &tokens, &settings.urls, &username, timeout)?;
            pout(cli.json, serde_json::to_value(&link)?, &link.url)?;
        }
        Commands::Serve => {
            let (settings, tokens, clock) = load(&config_path)?;
            cmd_serve(&settings, tokens, clock)?;
        }
    }

    Ok(())
}

/// Load settings, start logging, and build the token generator.
fn load(config_path: &Path) -> anyhow::Result<(Settings, TokenGenerator, Arc<dyn Clock>)> {
    let settings = load_settings_from_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Err(e) = init_logging(&settings.log.level, settings.log.format) {
        eprintln!("Warning: logging disabled: {e}");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let tokens = settings.token_generator(&EnvSecretStore, clock.clone())?;
    Ok((settings, tokens, clock))
}

pub fn pout(json_mode: bool, value: serde_json::Value, text: &str) -> anyhow::Result<()> {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{text}");
    }
    Ok(())
}
