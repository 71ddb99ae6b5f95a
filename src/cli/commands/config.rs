use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::{OutputFormat, get_formatter};
use crate::models::{ChunkingStrategy, Config, LlmModel, VectorDriver};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Write a default configuration file")]
    Init {
        #[arg(long, short = 'f', help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show the effective configuration")]
    Show,
    #[command(about = "Update one configuration value, e.g. pipeline.top_k 5")]
    Set {
        #[arg(help = "Dotted key, e.g. pipeline.model or chunking.chunk_size")]
        key: String,
        #[arg(help = "New value")]
        value: String,
    },
    #[command(about = "Show the configuration file path")]
    Path,
}

pub async fn handle_config(cmd: ConfigCommand, format: OutputFormat, _verbose: bool) -> Result<()> {
    let formatter = get_formatter(format);

    match cmd {
        ConfigCommand::Init { force } => {
            let path = Config::config_path()
                .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;

            if path.exists() && !force {
                anyhow::bail!(
                    "Config already exists at: {}\nUse --force to overwrite.",
                    path.display()
                );
            }

            Config::default()
                .save()
                .context("failed to write config file")?;
            print!(
                "{}",
                formatter.format_message(&format!("Created config at: {}", path.display()))
            );
        }
        ConfigCommand::Show => {
            let config = Config::load()?;
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                print!("{}", toml::to_string_pretty(&config)?);
            }
        }
        ConfigCommand::Set { key, value } => {
            let mut config = Config::load()?;
            apply_set(&mut config, &key, &value)?;
            config
                .validate()
                .context("rejected: the resulting configuration is invalid")?;
            config.save().context("failed to write config file")?;
            print!("{}", formatter.format_message(&format!("Set {key} = {value}")));
        }
        ConfigCommand::Path => {
            let path = Config::config_path()
                .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;
            let marker = if path.exists() { "" } else { " (not created)" };
            println!("{}{}", path.display(), marker);
        }
    }

    Ok(())
}

fn apply_set(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "pipeline.top_k" => config.pipeline.top_k = parse(key, value)?,
        "pipeline.min_score" => config.pipeline.min_score = parse(key, value)?,
        "pipeline.model" => {
            config.pipeline.model = value
                .parse::<LlmModel>()
                .map_err(|e| anyhow::anyhow!("{key}: {e}"))?;
        }
        "pipeline.temperature" => config.pipeline.temperature = parse(key, value)?,
        "pipeline.max_tokens" => config.pipeline.max_tokens = parse(key, value)?,
        "pipeline.system_prompt" => config.pipeline.system_prompt = value.to_string(),
        "chunking.chunk_size" => config.chunking.chunk_size = parse(key, value)?,
        "chunking.chunk_overlap" => config.chunking.chunk_overlap = parse(key, value)?,
        "chunking.strategy" => {
            config.chunking.strategy = value
                .parse::<ChunkingStrategy>()
                .map_err(|e| anyhow::anyhow!("{key}: {e}"))?;
        }
        "vector_store.driver" => {
            config.vector_store.driver = match value {
                "memory" => VectorDriver::Memory,
                "qdrant" => VectorDriver::Qdrant,
                other => anyhow::bail!("{key}: unknown driver: {other}"),
            };
        }
        "vector_store.url" => config.vector_store.url = value.to_string(),
        "vector_store.collection" => config.vector_store.collection = value.to_string(),
        "generation.api_base" => config.generation.api_base = value.to_string(),
        "generation.timeout_secs" => config.generation.timeout_secs = parse(key, value)?,
        other => anyhow::bail!("unknown configuration key: {other}"),
    }
    Ok(())
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{key}: invalid value {value:?}: {e}"))
}
