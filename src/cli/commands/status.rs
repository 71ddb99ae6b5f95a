use anyhow::Result;

use crate::cli::output::{OutputFormat, StatusInfo, get_formatter};
use crate::models::Config;
use crate::services::LocalEmbedder;

const METRICS_WINDOW_DAYS: u32 = 30;

pub async fn handle_status(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let embedding_available = LocalEmbedder::load(&config.embedding).is_ok();

    let (connected, total_vectors) = match super::connect_store(&config).await {
        Ok(store) => match store.stats().await {
            Ok(stats) => (true, stats.total_vectors),
            Err(_) => (false, 0),
        },
        Err(_) => (false, 0),
    };

    let num_datasets = super::open_registry()
        .and_then(|r| r.list().map_err(Into::into))
        .map(|list| list.len() as u64)
        .unwrap_or(0);

    let metrics = super::open_query_log()
        .ok()
        .map(|log| log.summary(METRICS_WINDOW_DAYS));

    let status = StatusInfo {
        embedding_model: config.embedding.model_name.clone(),
        embedding_available,
        vector_store_driver: config.vector_store.driver.to_string(),
        vector_store_connected: connected,
        collection: config.vector_store.collection.clone(),
        total_vectors,
        num_datasets,
        metrics,
    };

    print!("{}", formatter.format_status(&status));
    Ok(())
}
