use std::fmt::Write as FmtWrite;

use crate::models::{Dataset, QueryResponse, StageDetails};
use crate::services::{IngestReport, QuerySummary};

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

/// Snapshot assembled by the status command.
#[derive(Debug, Clone)]
pub struct StatusInfo {
    pub embedding_model: String,
    pub embedding_available: bool,
    pub vector_store_driver: String,
    pub vector_store_connected: bool,
    pub collection: String,
    pub total_vectors: u64,
    pub num_datasets: u64,
    pub metrics: Option<QuerySummary>,
}

pub trait Formatter {
    fn format_answer(&self, response: &QueryResponse, verbose: bool) -> String;
    fn format_ingest_report(&self, report: &IngestReport) -> String;
    fn format_datasets(&self, datasets: &[Dataset]) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_answer(&self, response: &QueryResponse, verbose: bool) -> String {
        let mut output = String::new();
        writeln!(output, "{}", response.answer).unwrap();

        if verbose {
            let obs = &response.observability;
            writeln!(output).unwrap();
            writeln!(output, "Pipeline Trace ({}ms total)", obs.total_latency_ms).unwrap();
            writeln!(output, "------------------------------").unwrap();
            for step in &obs.steps {
                writeln!(output, "{}: {}ms", step.name, step.latency_ms).unwrap();
                match &step.details {
                    StageDetails::Embedding(d) => {
                        writeln!(output, "  model: {} ({} dims)", d.model, d.dimensions).unwrap();
                    }
                    StageDetails::Retrieval(d) => {
                        writeln!(
                            output,
                            "  chunks: {} (top_k={}, min_score={:.2})",
                            d.chunks_found, d.top_k, d.min_score
                        )
                        .unwrap();
                        for chunk in &d.chunks {
                            writeln!(
                                output,
                                "  [{:.3}] {} #{}",
                                chunk.score, chunk.metadata.dataset_name, chunk.metadata.chunk_index
                            )
                            .unwrap();
                        }
                    }
                    StageDetails::Generation(d) => {
                        writeln!(
                            output,
                            "  model: {}, tokens: {} ({} prompt / {} completion)",
                            d.model, d.total_tokens, d.prompt_tokens, d.completion_tokens
                        )
                        .unwrap();
                        writeln!(output, "  cost: ${:.6}", d.cost).unwrap();
                    }
                }
            }
        }

        output
    }

    fn format_ingest_report(&self, report: &IngestReport) -> String {
        let mut output = String::new();
        writeln!(output, "Ingestion Complete").unwrap();
        writeln!(output, "------------------").unwrap();
        writeln!(output, "Dataset:  {} ({})", report.dataset_name, report.dataset_id).unwrap();
        writeln!(output, "Chunks:   {}", report.num_chunks).unwrap();
        writeln!(output, "Size:     {} chars", report.file_size).unwrap();
        output
    }

    fn format_datasets(&self, datasets: &[Dataset]) -> String {
        if datasets.is_empty() {
            return "No datasets ingested yet.\n".to_string();
        }

        let mut output = String::new();
        writeln!(output, "Datasets").unwrap();
        writeln!(output, "--------").unwrap();
        for ds in datasets {
            let state = if ds.enabled { "enabled" } else { "disabled" };
            writeln!(output, "{} [{}]", ds.name, state).unwrap();
            writeln!(output, "  id:       {}", ds.id).unwrap();
            writeln!(
                output,
                "  chunks:   {} ({} strategy, size {}, overlap {})",
                ds.num_chunks, ds.strategy, ds.chunk_size, ds.chunk_overlap
            )
            .unwrap();
            writeln!(output, "  created:  {}", ds.created_at).unwrap();
        }
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();

        let embed_status = if status.embedding_available {
            "[READY]"
        } else {
            "[UNAVAILABLE]"
        };
        writeln!(output, "Embedding:    {} {}", status.embedding_model, embed_status).unwrap();

        let store_status = if status.vector_store_connected {
            "[CONNECTED]"
        } else {
            "[DISCONNECTED]"
        };
        writeln!(
            output,
            "Vector Store: {} {}",
            status.vector_store_driver, store_status
        )
        .unwrap();
        if status.vector_store_connected {
            writeln!(output, "  Collection: {}", status.collection).unwrap();
            writeln!(output, "  Vectors:    {}", status.total_vectors).unwrap();
            writeln!(output, "  Datasets:   {}", status.num_datasets).unwrap();
        }

        if let Some(ref m) = status.metrics {
            writeln!(output).unwrap();
            writeln!(output, "Queries (last 30 days)").unwrap();
            writeln!(output, "  Total:       {}", m.total_queries).unwrap();
            writeln!(output, "  Avg Latency: {}ms", m.avg_latency_ms).unwrap();
            writeln!(output, "  Total Cost:  ${:.4}", m.total_cost).unwrap();
            if m.error_rate > 0.0 {
                writeln!(output, "  Error Rate:  {:.1}%", m.error_rate).unwrap();
            }
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render(&self, value: &serde_json::Value) -> String {
        if self.pretty {
            serde_json::to_string_pretty(value).unwrap()
        } else {
            serde_json::to_string(value).unwrap()
        }
    }
}

impl Formatter for JsonFormatter {
    fn format_answer(&self, response: &QueryResponse, verbose: bool) -> String {
        let json = if verbose {
            serde_json::to_value(response).unwrap_or_default()
        } else {
            serde_json::json!({"answer": response.answer})
        };
        self.render(&json)
    }

    fn format_ingest_report(&self, report: &IngestReport) -> String {
        self.render(&serde_json::to_value(report).unwrap_or_default())
    }

    fn format_datasets(&self, datasets: &[Dataset]) -> String {
        let json = serde_json::json!({"datasets": datasets});
        self.render(&json)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let metrics = status.metrics.as_ref().map(|m| {
            serde_json::json!({
                "total_queries": m.total_queries,
                "avg_latency_ms": m.avg_latency_ms,
                "total_cost": m.total_cost,
                "error_rate": m.error_rate,
            })
        });

        let json = serde_json::json!({
            "embedding": {
                "model": status.embedding_model,
                "available": status.embedding_available,
            },
            "vector_store": {
                "driver": status.vector_store_driver,
                "connected": status.vector_store_connected,
                "collection": status.collection,
                "total_vectors": status.total_vectors,
                "num_datasets": status.num_datasets,
            },
            "metrics": metrics,
        });
        self.render(&json)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_answer(&self, response: &QueryResponse, verbose: bool) -> String {
        let mut output = String::new();
        writeln!(output, "## Answer\n").unwrap();
        writeln!(output, "{}\n", response.answer).unwrap();

        if verbose {
            let obs = &response.observability;
            writeln!(output, "## Pipeline Trace\n").unwrap();
            writeln!(output, "**Total:** {}ms\n", obs.total_latency_ms).unwrap();
            writeln!(output, "| Stage | Latency |").unwrap();
            writeln!(output, "|-------|---------|").unwrap();
            for step in &obs.steps {
                writeln!(output, "| {} | {}ms |", step.name, step.latency_ms).unwrap();
            }
            writeln!(output).unwrap();
            writeln!(output, "### Prompt\n").unwrap();
            writeln!(output, "```").unwrap();
            writeln!(output, "{}", obs.full_prompt).unwrap();
            writeln!(output, "```").unwrap();
        }

        output
    }

    fn format_ingest_report(&self, report: &IngestReport) -> String {
        let mut output = String::new();
        writeln!(output, "## Ingestion Complete\n").unwrap();
        writeln!(output, "| Field | Value |").unwrap();
        writeln!(output, "|-------|-------|").unwrap();
        writeln!(output, "| Dataset | `{}` |", report.dataset_name).unwrap();
        writeln!(output, "| Id | `{}` |", report.dataset_id).unwrap();
        writeln!(output, "| Chunks | {} |", report.num_chunks).unwrap();
        writeln!(output, "| Size | {} chars |", report.file_size).unwrap();
        output
    }

    fn format_datasets(&self, datasets: &[Dataset]) -> String {
        if datasets.is_empty() {
            return "## Datasets\n\n*No datasets ingested yet.*\n".to_string();
        }

        let mut output = String::new();
        writeln!(output, "## Datasets\n").unwrap();
        writeln!(output, "| Name | Enabled | Chunks | Strategy | Created |").unwrap();
        writeln!(output, "|------|---------|--------|----------|---------|").unwrap();
        for ds in datasets {
            writeln!(
                output,
                "| `{}` | {} | {} | {} | {} |",
                ds.name,
                if ds.enabled { "✅" } else { "❌" },
                ds.num_chunks,
                ds.strategy,
                ds.created_at
            )
            .unwrap();
        }
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "## Status\n").unwrap();

        let embed_status = if status.embedding_available { "✅" } else { "❌" };
        writeln!(
            output,
            "### Embedding ({}) {}\n",
            status.embedding_model, embed_status
        )
        .unwrap();

        let store_status = if status.vector_store_connected {
            "✅"
        } else {
            "❌"
        };
        writeln!(
            output,
            "### Vector Store ({}) {}\n",
            status.vector_store_driver, store_status
        )
        .unwrap();
        writeln!(output, "- **Collection:** {}", status.collection).unwrap();
        writeln!(output, "- **Vectors:** {}", status.total_vectors).unwrap();
        writeln!(output, "- **Datasets:** {}", status.num_datasets).unwrap();

        if let Some(ref m) = status.metrics {
            writeln!(output).unwrap();
            writeln!(output, "### Queries\n").unwrap();
            writeln!(output, "- **Total:** {}", m.total_queries).unwrap();
            writeln!(output, "- **Avg Latency:** {}ms", m.avg_latency_ms).unwrap();
            writeln!(output, "- **Total Cost:** ${:.4}", m.total_cost).unwrap();
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ObservabilityRecord;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_json_answer_without_verbose_hides_trace() {
        let response = QueryResponse {
            answer: "42".to_string(),
            observability: ObservabilityRecord {
                total_latency_ms: 10,
                steps: vec![],
                full_prompt: "p".to_string(),
            },
        };
        let out = JsonFormatter::new(false).format_answer(&response, false);
        assert_eq!(out, r#"{"answer":"42"}"#);

        let verbose = JsonFormatter::new(false).format_answer(&response, true);
        assert!(verbose.contains("total_latency_ms"));
    }
}
