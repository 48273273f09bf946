pub mod blocks;
pub mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// bx: add and fetch content-addressed blocks through a local exchange.
#[derive(Debug, Parser)]
#[command(name = "bx", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store each file as a raw block and print its CID.
    Add {
        /// Files to add.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Fetch one block through a session.
    Get {
        /// CID of the block.
        cid: String,
        /// Write the block here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Stream several blocks through one session, printing `<cid> <size>`.
    GetMany {
        /// CIDs to fetch.
        #[arg(required = true)]
        cids: Vec<String>,
    },
    /// Exit 0 if the block is stored locally, 1 otherwise.
    Has {
        /// CID of the block.
        cid: String,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
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

/// Load the configuration from the path specified by `BX_CONFIG` (or
/// `bx.toml` by default).  Returns the parsed config and the path that was
/// used.  A missing file yields the defaults.
pub fn load_config() -> anyhow::Result<(bx_domain::config::Config, String)> {
    let config_path = std::env::var("BX_CONFIG").unwrap_or_else(|_| "bx.toml".into());
    let config = load_config_from(&config_path)?;
    Ok((config, config_path))
}

pub fn load_config_from(config_path: &str) -> bx_domain::Result<bx_domain::config::Config> {
    if !std::path::Path::new(config_path).exists() {
        return Ok(bx_domain::config::Config::default());
    }
    let raw = std::fs::read_to_string(config_path)
        .map_err(|e| bx_domain::Error::Config(format!("reading {config_path}: {e}")))?;
    toml::from_str(&raw)
        .map_err(|e| bx_domain::Error::Config(format!("parsing {config_path}: {e}")))
}
