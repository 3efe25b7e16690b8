pub mod config;
pub mod run;
pub mod token;

use clap::{Parser, Subcommand};

/// Executive Insider: staged coaching conversations over HTTP.
#[derive(Debug, Parser)]
#[command(name = "insider", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server (default when no subcommand is given).
    Serve,
    /// Run a single turn and print the reply.
    Run {
        /// The message to send.
        message: String,
        /// Conversation id (a fresh one is generated when omitted).
        #[arg(long)]
        conversation: Option<String>,
        /// Tool to bind the conversation to (e.g. "grow").
        #[arg(long)]
        tool: Option<String>,
        /// Model provider: deepseek or doubao.
        #[arg(long)]
        provider: Option<String>,
        /// Reply persona: rational or empathetic.
        #[arg(long)]
        persona: Option<String>,
        /// Run as this user instead of anonymously.
        #[arg(long)]
        user: Option<String>,
        /// Print every event as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Mint a signed caller token.
    Token {
        user_id: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `EI_CONFIG` (default
/// `config.toml`). A missing file yields the built-in defaults.
pub fn load_config() -> anyhow::Result<(ei_domain::config::Config, String)> {
    let config_path = std::env::var("EI_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        ei_domain::config::Config::default()
    };

    Ok((config, config_path))
}
