//! Model Validation CLI - Command-line access to a model server's validation state
//!
//! CDD Principle: Application Layer - CLI coordinates user interactions with the framework
//! - Translates user commands to framework operations
//! - Handles external concerns like process exit codes and terminal output
//! - Provides clean separation between user interface and validation state

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use model_validation_client::{
    ClientConfig, OutputFormat, ReportFormatter, SubscriptionListener, ValidationFilter,
    ValidationFramework, ValidationResultItem,
};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Model Validation - live validation results from a model server
#[derive(Parser)]
#[command(name = "model-validation")]
#[command(version = "0.1.0")]
#[command(about = "Fetch, filter and watch validation results of a model on a model server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the server REST root
    #[arg(long, global = true)]
    server: Option<String>,

    /// Override the model URI
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch facet constraints of the model
    Constraints {
        /// Only show this classifier id
        #[arg(long)]
        classifier: Option<i32>,

        /// Only show this feature id (requires --classifier)
        #[arg(long, requires = "classifier")]
        feature: Option<i32>,

        /// Read constraints from a snapshot instead of the server
        #[arg(long)]
        from_snapshot: Option<PathBuf>,

        /// Save fetched constraints to a snapshot file
        #[arg(long)]
        save: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormatArg,
    },

    /// Validate the model once and print the visible results
    Validate {
        /// Hide results matching <severity>:<source>
        #[arg(long = "filter", action = clap::ArgAction::Append)]
        filters: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormatArg,

        /// Maximum number of results to print
        #[arg(long)]
        max_results: Option<usize>,
    },

    /// Subscribe to live validation and print results whenever they change
    Watch {
        /// Hide results matching <severity>:<source>
        #[arg(long = "filter", action = clap::ArgAction::Append)]
        filters: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormatArg,
    },

    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config_file: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, ValueEnum, PartialEq)]
enum OutputFormatArg {
    Human,
    Json,
    Github,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Github => OutputFormat::GitHub,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    match run_command(cli).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

async fn run_command(cli: Cli) -> anyhow::Result<i32> {
    if let Commands::ValidateConfig { config_file } = &cli.command {
        return run_validate_config(config_file.as_deref().or(cli.config.as_deref()));
    }

    let config = load_config(&cli)?;
    let use_colors = !cli.no_color;

    match cli.command {
        Commands::Constraints {
            classifier,
            feature,
            from_snapshot,
            save,
            format,
        } => {
            run_constraints(&config, classifier, feature, from_snapshot, save, format, use_colors)
                .await
        }
        Commands::Validate {
            filters,
            format,
            max_results,
        } => run_validate(&config, &filters, format, max_results, use_colors).await,
        Commands::Watch { filters, format } => {
            run_watch(&config, &filters, format, use_colors).await
        }
        Commands::ValidateConfig { .. } => Ok(0),
    }
}

/// Resolve configuration and apply command-line overrides
fn load_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut config = ClientConfig::discover(cli.config.as_deref())?;

    if let Some(server) = &cli.server {
        config.server.base_url = server.clone();
    }
    if let Some(model) = &cli.model {
        config.model_uri = model.clone();
    }

    config.validate().context("Invalid configuration after overrides")?;
    Ok(config)
}

fn parse_filters(specs: &[String]) -> anyhow::Result<Vec<ValidationFilter>> {
    specs
        .iter()
        .map(|spec| spec.parse::<ValidationFilter>().with_context(|| format!("Bad --filter '{spec}'")))
        .collect()
}

async fn run_constraints(
    config: &ClientConfig,
    classifier: Option<i32>,
    feature: Option<i32>,
    from_snapshot: Option<PathBuf>,
    save: Option<PathBuf>,
    format: OutputFormatArg,
    use_colors: bool,
) -> anyhow::Result<i32> {
    let framework = ValidationFramework::from_config(config, |_: &[ValidationResultItem]| {})?;

    let snapshot = from_snapshot.or_else(|| config.constraint_snapshot.as_ref().map(PathBuf::from));
    match snapshot {
        Some(path) if path.exists() => framework
            .load_constraints(&path)
            .with_context(|| format!("Failed to load snapshot {}", path.display()))?,
        _ => framework
            .get_constraint_list()
            .await
            .with_context(|| format!("Failed to fetch constraints for {}", config.model_uri))?,
    }

    if let Some(path) = save {
        framework.save_constraints(&path)?;
        eprintln!("Saved constraints to {}", path.display());
    }

    let selected: Vec<_> = framework
        .constraints()
        .into_iter()
        .filter(|(c, f, _)| classifier.map_or(true, |id| id == *c) && feature.map_or(true, |id| id == *f))
        .collect();

    let formatter = ReportFormatter::new(use_colors, None);
    println!("{}", formatter.format_constraints(&selected, format.into())?);

    if format == OutputFormatArg::Human {
        eprintln!("{}", framework.cache_statistics().format_display());
    }

    Ok(if selected.is_empty() && classifier.is_some() { 1 } else { 0 })
}

async fn run_validate(
    config: &ClientConfig,
    filters: &[String],
    format: OutputFormatArg,
    max_results: Option<usize>,
    use_colors: bool,
) -> anyhow::Result<i32> {
    let framework = ValidationFramework::from_config(config, |_: &[ValidationResultItem]| {})?;
    framework.add_validation_filter(parse_filters(filters)?);

    framework
        .validate()
        .await
        .with_context(|| format!("Failed to validate {}", config.model_uri))?;

    let view = framework.results_view();
    let formatter = ReportFormatter::new(use_colors, max_results);
    print!("{}", formatter.format_results(&view, format.into())?);

    // Exit code 1 when a blocking issue is visible
    Ok(if view.has_errors() { 1 } else { 0 })
}

async fn run_watch(
    config: &ClientConfig,
    filters: &[String],
    format: OutputFormatArg,
    use_colors: bool,
) -> anyhow::Result<i32> {
    if !config.live_validation {
        anyhow::bail!("live_validation is disabled in the configuration");
    }

    // The listener only signals; output happens outside the framework lock
    let (changed_tx, mut changed_rx) = mpsc::unbounded_channel::<()>();
    let framework = Arc::new(ValidationFramework::from_config(
        config,
        move |_: &[ValidationResultItem]| {
            let _ = changed_tx.send(());
        },
    )?);
    framework.add_validation_filter(parse_filters(filters)?);

    let events = framework
        .subscribe()
        .await
        .with_context(|| format!("Failed to subscribe to {}", config.model_uri))?;

    eprintln!("Watching {} (Ctrl+C to stop)", config.model_uri);

    let listener = SubscriptionListener::new(Arc::clone(&framework));
    let formatter = ReportFormatter::new(use_colors, None);
    let subscription = listener.run(events);
    tokio::pin!(subscription);

    loop {
        tokio::select! {
            summary = &mut subscription => {
                eprintln!(
                    "Subscription closed after {} notifications ({} failures)",
                    summary.notifications, summary.failures
                );
                return Ok(if summary.failures > 0 { 1 } else { 0 });
            }
            Some(()) = changed_rx.recv() => {
                let view = framework.results_view();
                print!("{}", formatter.format_results(&view, format.into())?);
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Stopping watch");
                return Ok(0);
            }
        }
    }
}

fn run_validate_config(config_path: Option<&Path>) -> anyhow::Result<i32> {
    let path = config_path.unwrap_or_else(|| Path::new("model_validation.yaml"));

    match ClientConfig::load_from_file(path) {
        Ok(config) => {
            println!("Configuration file is valid: {}", path.display());
            println!("   Server: {}", config.server.base_url);
            println!("   Subscriptions: {}", config.server.subscribe_url());
            println!("   Model: {}", config.model_uri);
            println!("   Initial filters: {}", config.filters.len());
            Ok(0)
        }
        Err(e) => {
            eprintln!("Configuration file is invalid: {}", e);
            Ok(1)
        }
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
