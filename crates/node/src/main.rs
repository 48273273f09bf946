use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use bx_domain::config::LoggingConfig;
use bx_node::cli::{blocks, Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Add { files } => {
            let (config, _) = bx_node::cli::load_config()?;
            init_tracing(&config.logging);
            blocks::add(&config, &files).await
        }
        Command::Get { cid, out } => {
            let (config, _) = bx_node::cli::load_config()?;
            init_tracing(&config.logging);
            blocks::get(&config, &cid, out.as_deref()).await
        }
        Command::GetMany { cids } => {
            let (config, _) = bx_node::cli::load_config()?;
            init_tracing(&config.logging);
            if !blocks::get_many(&config, &cids).await? {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Has { cid } => {
            let (config, _) = bx_node::cli::load_config()?;
            init_tracing(&config.logging);
            if !blocks::has(&config, &cid)? {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Validate) => {
            let (config, config_path) = bx_node::cli::load_config()?;
            let valid = bx_node::cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            let (config, _config_path) = bx_node::cli::load_config()?;
            bx_node::cli::config::show(&config)
        }
        Command::Version => {
            println!("bx {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Logs go to stderr so block data written to stdout stays clean.
fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
