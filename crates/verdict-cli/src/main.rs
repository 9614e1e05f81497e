//! Verdict CLI: evaluate one conversational turn from the command line.
//!
//! Providers are wired from the environment (`OPENAI_API_KEY`,
//! `TAVILY_API_KEY`); the result is printed as pretty JSON on stdout, logs
//! go to stderr.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use verdict_core::{EvaluationRequest, PricingTable, RuleSet};
use verdict_runtime::{Dispatcher, OpenAiProvider, RuntimeConfig, TavilySearch};

#[derive(Parser)]
#[command(name = "verdict", version, about = "Multi-agent conversation evaluation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate a conversation across every quality dimension
    Evaluate {
        /// Request JSON ({"messages": [...], "model": "..."}); "-" reads stdin
        #[arg(short, long)]
        input: PathBuf,

        /// SOP rule set YAML; defaults to the built-in set
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Pricing table YAML; defaults to the built-in table
        #[arg(long)]
        pricing: Option<PathBuf>,

        /// Runtime configuration YAML
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Ask the model-routing unit for a recommendation
    Recommend {
        /// Request JSON; "-" reads stdin
        #[arg(short, long)]
        input: PathBuf,

        /// Runtime configuration YAML
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Parse and validate a rule set file
    ValidateRules {
        /// Rule set YAML
        rules: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("verdict=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Evaluate {
            input,
            rules,
            pricing,
            config,
        } => {
            let request = load_request(&input)?;
            let dispatcher = build_dispatcher(rules.as_deref(), pricing.as_deref(), config.as_deref())?;
            let result = dispatcher.evaluate(&request).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Recommend { input, config } => {
            let request = load_request(&input)?;
            let dispatcher = build_dispatcher(None, None, config.as_deref())?;
            let outcome = dispatcher.recommend(&request).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::ValidateRules { rules } => validate_rules(&rules)?,
    }

    Ok(())
}

fn build_dispatcher(
    rules: Option<&Path>,
    pricing: Option<&Path>,
    config: Option<&Path>,
) -> Result<Dispatcher> {
    let provider = OpenAiProvider::from_env()?;
    let search = TavilySearch::from_env()?;

    let mut builder = Dispatcher::builder()
        .provider(Arc::new(provider))
        .search(Arc::new(search))
        .config(load_config(config)?);

    if let Some(path) = rules {
        let set = RuleSet::from_yaml_file(path)
            .with_context(|| format!("failed to load rule set from {}", path.display()))?;
        tracing::info!(version = %set.version, rules = set.len(), "loaded rule set");
        builder = builder.rules(set);
    }
    if let Some(path) = pricing {
        let table = PricingTable::from_yaml_file(path)
            .with_context(|| format!("failed to load pricing table from {}", path.display()))?;
        tracing::info!(version = %table.version, "loaded pricing table");
        builder = builder.pricing(table);
    }

    Ok(builder.build()?)
}

fn load_request(path: &Path) -> Result<EvaluationRequest> {
    let contents = if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read request from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read request from {}", path.display()))?
    };

    serde_json::from_str(&contents).context("request is not valid JSON")
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    let Some(path) = path else {
        return Ok(RuntimeConfig::default());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config from {}", path.display()))?;
    serde_yaml::from_str(&contents).context("config is not valid YAML")
}

fn validate_rules(path: &Path) -> Result<()> {
    let set = RuleSet::from_yaml_file(path)
        .with_context(|| format!("invalid rule set: {}", path.display()))?;
    println!("rule set {} is valid ({} rules)", set.version, set.len());
    for rule in &set.rules {
        println!("  {} [{}] {}", rule.id, rule.severity.as_str(), rule.name);
    }
    Ok(())
}
