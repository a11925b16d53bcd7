//! CLI subcommand definitions and handlers.
//!
//! Uses clap derive to define the subcommand hierarchy:
//! - `convert` -- turn a Markdown file or pasted text into an MP3
//! - `languages` / `symbols` -- list accepted values
//! - `cache stats|clear` -- inspect or empty the optimization cache
//! - `credential set|status|delete` -- manage the stored API key
//! - `config show|path` -- inspect configuration
//! - `version` -- print build/version info

use std::io::BufRead;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Markdown to speech converter.
#[derive(Parser, Debug)]
#[command(
    name = "speakdown",
    version = env!("CARGO_PKG_VERSION"),
    about = "speakdown: read Markdown documents aloud as MP3"
)]
pub struct Cli {
    /// Config file (default: $SPEAKDOWN_CONFIG_PATH or the user config dir).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert a Markdown document to speech.
    Convert(ConvertArgs),

    /// List supported languages.
    Languages,

    /// List symbols that can be excluded from the spoken text.
    Symbols,

    /// Inspect or clear the optimization cache.
    #[command(subcommand)]
    Cache(CacheCommand),

    /// Manage the stored API key.
    #[command(subcommand)]
    Credential(CredentialCommand),

    /// Inspect configuration.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Print version, build date, and git commit information.
    Version,
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Markdown file to convert.
    #[arg(required_unless_present = "text", conflicts_with = "text")]
    pub file: Option<PathBuf>,

    /// Convert this text instead of a file.
    #[arg(long)]
    pub text: Option<String>,

    /// Language code (e.g. en, de, zh-cn).
    #[arg(short, long)]
    pub lang: Option<String>,

    /// Characters per synthesis request.
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Symbols to strip (names or literals, comma-separated or repeated).
    #[arg(short = 'x', long = "exclude", value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Rewrite the text with a language model before synthesis.
    #[arg(long)]
    pub optimize: bool,

    /// Skip optimization even if enabled in config.
    #[arg(long, conflicts_with = "optimize")]
    pub no_optimize: bool,

    /// Reuse optimized text saved by an earlier run.
    #[arg(long)]
    pub optimized_text: Option<PathBuf>,

    /// Save the optimized text here for later reuse.
    #[arg(long)]
    pub save_optimized: Option<PathBuf>,

    /// Directory for the finished MP3.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Speech provider (google, openai).
    #[arg(long)]
    pub provider: Option<String>,

    /// Suppress progress output.
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Show entry count and size.
    Stats,
    /// Remove every cached optimization.
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum CredentialCommand {
    /// Store an API key (read from stdin when omitted).
    Set {
        key: Option<String>,
    },
    /// Show whether a key is stored.
    Status,
    /// Remove the stored key.
    Delete,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the fully loaded configuration as JSON.
    Show,
    /// Print the resolved configuration file path.
    Path,
}

// ---------------------------------------------------------------------------
// Subcommand handlers
// ---------------------------------------------------------------------------

use crate::audio::AudioAssembler;
use crate::cache::OptimizationCache;
use crate::config::{self, Config};
use crate::credentials::{self, CredentialStore};
use crate::optimize::Optimizer;
use crate::pipeline::{
    NoProgress, OptimizeRequest, Pipeline, PipelineOutcome, PipelineRequest, ProgressReporter,
    StderrProgress, PASTED_SOURCE_NAME,
};
use crate::text::{Symbol, SymbolSet};
use crate::tts::{self, Language};

/// Environment variable consulted when no key is stored.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

type HandlerResult = Result<(), Box<dyn std::error::Error>>;

/// Stored key first, then the environment.
async fn resolve_api_key(store: &CredentialStore) -> Option<String> {
    if let Some(key) = store.load().await {
        return Some(key.to_string());
    }
    std::env::var(API_KEY_ENV)
        .ok()
        .filter(|k| !k.trim().is_empty())
}

/// Run the `convert` subcommand.
pub async fn handle_convert(config: &Config, args: ConvertArgs) -> HandlerResult {
    let (document, source_name) = match (&args.file, args.text) {
        (Some(path), _) => {
            let document = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| PASTED_SOURCE_NAME.to_string());
            (document, name)
        }
        (None, Some(text)) => (text, PASTED_SOURCE_NAME.to_string()),
        (None, None) => return Err("Provide a FILE or --text".into()),
    };

    let mut tts_config = config.tts.clone();
    if let Some(provider) = &args.provider {
        tts_config.provider = provider.parse()?;
    }

    let store = CredentialStore::new(config.credential_path());
    let api_key = resolve_api_key(&store).await;

    let synthesizer = tts::create_provider(&tts_config, api_key.clone())?;
    let output_dir = args.output_dir.clone().unwrap_or_else(|| config.output_dir());

    let mut pipeline = Pipeline::new(
        synthesizer,
        AudioAssembler::from_config(&config.audio),
        output_dir,
    );
    if let Some(work_dir) = &config.audio.work_dir {
        pipeline = pipeline.with_work_dir(work_dir);
    }

    let mut request = PipelineRequest::new(document, source_name);
    request.language = args
        .lang
        .clone()
        .unwrap_or_else(|| tts_config.language.code().to_string());
    request.chunk_size = args.chunk_size.unwrap_or(tts_config.chunk_size);
    request.excluded_symbols = if args.exclude.is_empty() {
        tts_config.excluded_symbols.clone()
    } else {
        SymbolSet::parse(&args.exclude)?
    };

    if let Some(path) = &args.optimized_text {
        request.optimized_text = Some(tokio::fs::read_to_string(path).await?);
    }

    let wants_optimization = !args.no_optimize && (args.optimize || config.optimization.enabled);
    if wants_optimization && request.optimized_text.is_none() {
        match api_key {
            Some(credential) => {
                let cache = OptimizationCache::from_config(&config.cache, &config.cache_dir());
                pipeline = pipeline.with_optimizer(Optimizer::openai(&config.optimization)?.with_cache(cache));
                request.optimize = Some(OptimizeRequest { credential });
            }
            None => {
                eprintln!(
                    "Warning: no API key stored and {} not set; skipping optimization",
                    API_KEY_ENV
                );
            }
        }
    }

    let reporter: Box<dyn ProgressReporter> = if args.quiet {
        Box::new(NoProgress)
    } else {
        Box::new(StderrProgress)
    };

    let outcome = pipeline.run(request, reporter.as_ref()).await;

    for warning in outcome.warnings() {
        eprintln!("Warning: {}", warning);
    }
    if let (Some(path), Some(text)) = (&args.save_optimized, outcome.optimized_text()) {
        tokio::fs::write(path, text).await?;
        eprintln!("Optimized text saved to {}", path.display());
    }

    match outcome {
        PipelineOutcome::Done { output_path, .. } => {
            println!("{}", output_path.display());
            Ok(())
        }
        PipelineOutcome::Failed { stage, error, .. } => {
            Err(format!("Conversion failed while {}: {}", stage, error).into())
        }
    }
}

/// Run the `languages` subcommand.
pub fn handle_languages() {
    for language in Language::ALL {
        println!("{:<6} {}", language.code(), language.display_name());
    }
}

/// Run the `symbols` subcommand.
pub fn handle_symbols() {
    for symbol in Symbol::ALL {
        println!("{:<18} {}", symbol.name(), symbol.label());
    }
}

/// Run the `cache stats` subcommand.
pub async fn handle_cache_stats(config: &Config) -> HandlerResult {
    let cache = OptimizationCache::from_config(&config.cache, &config.cache_dir());
    let stats = cache.stats().await?;
    println!("Directory: {}", cache.dir().display());
    println!("Entries:   {}", stats.entries);
    println!("Size:      {} bytes", stats.total_bytes);
    println!("Expiry:    {} days", config.cache.expiry_days);
    Ok(())
}

/// Run the `cache clear` subcommand.
pub async fn handle_cache_clear(config: &Config) -> HandlerResult {
    let cache = OptimizationCache::from_config(&config.cache, &config.cache_dir());
    let removed = cache.clear().await?;
    println!("Removed {} cached optimization(s)", removed);
    Ok(())
}

/// Run the `credential set` subcommand.
pub async fn handle_credential_set(config: &Config, key: Option<String>) -> HandlerResult {
    let key = match key {
        Some(key) => key,
        None => {
            eprintln!("Enter API key:");
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            line
        }
    };

    let store = CredentialStore::new(config.credential_path());
    store.save(&key).await?;
    println!("API key saved to {}", store.path().display());
    Ok(())
}

/// Run the `credential status` subcommand.
pub async fn handle_credential_status(config: &Config) -> HandlerResult {
    let store = CredentialStore::new(config.credential_path());
    match store.load().await {
        Some(key) => println!("API key stored ({})", credentials::mask(&key)),
        None if std::env::var(API_KEY_ENV).is_ok() => {
            println!("No API key stored; {} is set and will be used", API_KEY_ENV)
        }
        None => println!("No API key stored"),
    }
    Ok(())
}

/// Run the `credential delete` subcommand.
pub async fn handle_credential_delete(config: &Config) -> HandlerResult {
    let store = CredentialStore::new(config.credential_path());
    store.delete().await?;
    println!("API key removed");
    Ok(())
}

/// Run the `config show` subcommand.
pub fn handle_config_show(config: &Config) -> HandlerResult {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

/// Run the `config path` subcommand.
pub fn handle_config_path(explicit: Option<&PathBuf>) {
    match explicit {
        Some(path) => println!("{}", path.display()),
        None => println!("{}", config::get_config_path().display()),
    }
}

/// Run the `version` subcommand.
pub fn handle_version() {
    println!("speakdown {}", env!("CARGO_PKG_VERSION"));
    println!("  Build date: {}", env!("SPEAKDOWN_BUILD_DATE"));
    println!("  Git commit: {}", env!("SPEAKDOWN_GIT_HASH"));
    println!(
        "  Platform:   {} ({})",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_convert_file() {
        let cli = Cli::try_parse_from([
            "speakdown", "convert", "notes.md", "--lang", "de", "-x", "hash,pipe", "--exclude", "-",
        ])
        .unwrap();
        match cli.command {
            Command::Convert(args) => {
                assert_eq!(args.file, Some(PathBuf::from("notes.md")));
                assert_eq!(args.lang.as_deref(), Some("de"));
                assert_eq!(args.exclude, vec!["hash", "pipe", "-"]);
                assert!(!args.optimize);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_convert_text() {
        let cli = Cli::try_parse_from(["speakdown", "convert", "--text", "# Hi", "--optimize"]).unwrap();
        match cli.command {
            Command::Convert(args) => {
                assert!(args.file.is_none());
                assert_eq!(args.text.as_deref(), Some("# Hi"));
                assert!(args.optimize);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_convert_requires_input() {
        assert!(Cli::try_parse_from(["speakdown", "convert"]).is_err());
        assert!(Cli::try_parse_from(["speakdown", "convert", "a.md", "--text", "x"]).is_err());
    }

    #[test]
    fn test_optimize_flags_conflict() {
        assert!(
            Cli::try_parse_from(["speakdown", "convert", "a.md", "--optimize", "--no-optimize"]).is_err()
        );
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["speakdown", "cache", "clear"]).unwrap();
        assert!(matches!(cli.command, Command::Cache(CacheCommand::Clear)));

        let cli = Cli::try_parse_from(["speakdown", "credential", "set", "sk-x"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Credential(CredentialCommand::Set { key: Some(_) })
        ));

        let cli = Cli::try_parse_from(["speakdown", "--config", "/tmp/c.json5", "version"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.json5")));
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
