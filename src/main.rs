use clap::Parser;

use speakdown::cli::{self, CacheCommand, Cli, Command, ConfigCommand, CredentialCommand};
use speakdown::{config, logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };

    let mut logging_config = config.logging.clone();
    if cli.verbose {
        logging_config.level = "debug".to_string();
    }
    logging::init_logging(&logging_config)?;

    match cli.command {
        Command::Convert(args) => cli::handle_convert(&config, args).await,
        Command::Languages => {
            cli::handle_languages();
            Ok(())
        }
        Command::Symbols => {
            cli::handle_symbols();
            Ok(())
        }
        Command::Cache(CacheCommand::Stats) => cli::handle_cache_stats(&config).await,
        Command::Cache(CacheCommand::Clear) => cli::handle_cache_clear(&config).await,
        Command::Credential(CredentialCommand::Set { key }) => {
            cli::handle_credential_set(&config, key).await
        }
        Command::Credential(CredentialCommand::Status) => {
            cli::handle_credential_status(&config).await
        }
        Command::Credential(CredentialCommand::Delete) => {
            cli::handle_credential_delete(&config).await
        }
        Command::Config(ConfigCommand::Show) => cli::handle_config_show(&config),
        Command::Config(ConfigCommand::Path) => {
            cli::handle_config_path(cli.config.as_ref());
            Ok(())
        }
        Command::Version => {
            cli::handle_version();
            Ok(())
        }
    }
}
