use anyhow::Context;
use clap::Parser;
use rehearse::cli::{Cli, Commands};
use rehearse::types::config::{Config, CONFIG_FILE};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration first (no logging yet)
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Config::load_or_default().context("failed to load configuration")?,
    };

    // CLI flags take precedence over config
    let log_level = if cli.quiet {
        "error".to_string()
    } else if cli.verbose {
        "debug".to_string()
    } else {
        config.general.log_level.clone()
    };

    let directive = format!("rehearse={}", log_level)
        .parse::<Directive>()
        .or_else(|_| "rehearse=warn".parse::<Directive>())
        .context("invalid log directive")?;
    let filter = EnvFilter::from_default_env().add_directive(directive);

    let json = config.general.log_format == "json";
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();

    tracing::debug!(db = %config.history.db_path.display(), "Configuration loaded");

    match cli.command {
        Commands::Init { path } => {
            rehearse::cli::commands::init(path).await?;
        }
        Commands::Start {
            mode,
            pattern,
            problem,
            duration,
        } => {
            rehearse::cli::commands::start(&mode, pattern.as_deref(), problem, duration, &config)
                .await?;
        }
        Commands::Problems { mode, pattern } => {
            rehearse::cli::commands::problems(mode.as_deref(), pattern.as_deref(), &config).await?;
        }
        Commands::Progress { mode, json } => {
            rehearse::cli::commands::progress(&mode, json, &config).await?;
        }
        Commands::Weakest { mode } => {
            rehearse::cli::commands::weakest(&mode, &config).await?;
        }
        Commands::Bugs => {
            rehearse::cli::commands::bugs(&config).await?;
        }
        Commands::Trend { pattern } => {
            rehearse::cli::commands::trend(&pattern, &config).await?;
        }
        Commands::History { limit } => {
            rehearse::cli::commands::history(limit, &config).await?;
        }
        Commands::Last => {
            rehearse::cli::commands::last(&config).await?;
        }
        Commands::Export { output } => {
            rehearse::cli::commands::export(&output, &config).await?;
        }
        Commands::Verify => {
            rehearse::cli::commands::verify(&config).await?;
        }
        Commands::Config => {
            let path = cli.config.unwrap_or_else(|| CONFIG_FILE.into());
            rehearse::cli::commands::config_cmd(&path).await?;
        }
        Commands::Doctor => {
            rehearse::cli::commands::doctor(&config).await?;
        }
        Commands::Version => {
            rehearse::cli::commands::version();
        }
    }

    Ok(())
}
