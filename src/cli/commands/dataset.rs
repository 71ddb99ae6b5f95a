use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::{OutputFormat, get_formatter};
use crate::models::Config;

#[derive(Debug, Subcommand)]
pub enum DatasetCommand {
    #[command(about = "List all datasets")]
    List,

    #[command(about = "Include a dataset in retrieval")]
    Enable {
        #[arg(help = "Dataset id or name")]
        dataset: String,
    },

    #[command(about = "Exclude a dataset from retrieval without deleting it")]
    Disable {
        #[arg(help = "Dataset id or name")]
        dataset: String,
    },

    #[command(about = "Rename a dataset")]
    Rename {
        #[arg(help = "Dataset id or name")]
        dataset: String,
        #[arg(help = "New name")]
        new_name: String,
    },

    #[command(about = "Delete a dataset and its indexed chunks")]
    Delete {
        #[arg(help = "Dataset id or name")]
        dataset: String,
        #[arg(long, short = 'y', help = "Skip confirmation")]
        yes: bool,
    },
}

pub async fn handle_dataset(cmd: DatasetCommand, format: OutputFormat, _verbose: bool) -> Result<()> {
    let formatter = get_formatter(format);
    let registry = super::open_registry()?;

    match cmd {
        DatasetCommand::List => {
            let datasets = registry.list()?;
            print!("{}", formatter.format_datasets(&datasets));
        }
        DatasetCommand::Enable { dataset } => {
            let ds = registry.resolve(&dataset)?;
            registry.set_enabled(&ds.id, true)?;
            print!(
                "{}",
                formatter.format_message(&format!("Enabled dataset '{}'", ds.name))
            );
        }
        DatasetCommand::Disable { dataset } => {
            let ds = registry.resolve(&dataset)?;
            registry.set_enabled(&ds.id, false)?;
            print!(
                "{}",
                formatter.format_message(&format!("Disabled dataset '{}'", ds.name))
            );
        }
        DatasetCommand::Rename { dataset, new_name } => {
            let ds = registry.resolve(&dataset)?;
            registry.rename(&ds.id, &new_name)?;
            print!(
                "{}",
                formatter.format_message(&format!("Renamed '{}' to '{}'", ds.name, new_name))
            );
        }
        DatasetCommand::Delete { dataset, yes } => {
            let ds = registry.resolve(&dataset)?;

            if !yes {
                let prompt = format!(
                    "Delete dataset '{}' and its {} chunks? [y/N] ",
                    ds.name, ds.num_chunks
                );
                if !confirm(&prompt)? {
                    print!("{}", formatter.format_message("Aborted."));
                    return Ok(());
                }
            }

            let config = Config::load()?;
            let store = super::connect_store(&config).await?;
            let removed = store.delete_dataset(&ds.id).await?;
            registry.delete(&ds.id)?;
            print!(
                "{}",
                formatter.format_message(&format!(
                    "Deleted dataset '{}' ({} vectors removed)",
                    ds.name, removed
                ))
            );
        }
    }

    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    use std::io::Write;

    print!("{prompt}");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;

    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
