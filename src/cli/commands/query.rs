use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::cli::output::{OutputFormat, get_formatter};
use crate::models::{Config, LlmModel, QueryRequest};
use crate::services::pipeline::RagPipeline;
use crate::services::{GenerationClient, OpenAiClient};
use crate::utils::{RetryConfig, with_retry};

#[derive(Debug, Args)]
pub struct QueryArgs {
    #[arg(required = true, help = "Question to answer")]
    pub query: String,

    #[arg(long, short = 'k', help = "Number of chunks to retrieve")]
    pub top_k: Option<u32>,

    #[arg(long, help = "Minimum similarity score threshold (0.0-1.0)")]
    pub min_score: Option<f32>,

    #[arg(long, short = 'm', help = "Generation model to use")]
    pub model: Option<LlmModel>,

    #[arg(long, help = "Sampling temperature (0.0-2.0)")]
    pub temperature: Option<f32>,

    #[arg(long, help = "Maximum completion tokens (50-4000)")]
    pub max_tokens: Option<u32>,

    #[arg(
        long,
        short = 'd',
        help = "Restrict retrieval to these datasets (comma-separated ids or names)"
    )]
    pub datasets: Option<String>,
}

pub async fn handle_query(
    args: QueryArgs,
    format: OutputFormat,
    verbose: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let registry = super::open_registry()?;
    let embedder = super::load_embedder(&config)?;
    let store = super::connect_store(&config).await?;
    let llm: Arc<dyn GenerationClient> =
        Arc::new(OpenAiClient::new(&config.generation).context("failed to build LLM client")?);
    let query_log = super::open_query_log()?;

    let mut request = QueryRequest::new(args.query);
    request.top_k = args.top_k;
    request.min_score = args.min_score;
    request.model = args.model;
    request.temperature = args.temperature;
    request.max_tokens = args.max_tokens;

    if let Some(ref spec) = args.datasets {
        let mut ids = Vec::new();
        for name in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let dataset = registry
                .resolve(name)
                .with_context(|| format!("unknown dataset: {name}"))?;
            ids.push(dataset.id);
        }
        request.enabled_datasets = Some(ids);
    }

    let pipeline = RagPipeline::new(
        embedder,
        store,
        registry,
        llm,
        config.pipeline.clone(),
    );

    // Rate-limited runs are retried here with backoff; the pipeline itself
    // never retries a stage.
    let outcome = with_retry(&RetryConfig::default(), || {
        pipeline.query(request.clone(), &cancel)
    })
    .await;

    match outcome {
        Ok(response) => {
            if let Some(gen_details) = response.observability.steps.iter().find_map(|s| match &s.details {
                crate::models::StageDetails::Generation(d) => Some(d),
                _ => None,
            }) {
                query_log.record(
                    response.observability.total_latency_ms,
                    &gen_details.model.to_string(),
                    gen_details.total_tokens,
                    gen_details.cost,
                    true,
                );
            }
            print!("{}", formatter.format_answer(&response, verbose));
            Ok(())
        }
        Err(failure) => {
            query_log.record(
                failure.observability.total_latency_ms,
                &config.pipeline.model.to_string(),
                0,
                0.0,
                false,
            );
            eprint!("{}", formatter.format_error(&failure.error.to_string()));
            if verbose && !failure.observability.steps.is_empty() {
                eprintln!("Completed stages before failure:");
                for step in &failure.observability.steps {
                    eprintln!("  {}: {}ms", step.name, step.latency_ms);
                }
            }
            std::process::exit(1);
        }
    }
}
