use anyhow::{bail, Context};
use clap::Parser;

mod app;
mod cli;
mod config;
mod db;
mod error;
mod logging;
mod models;
mod pipeline;
mod scrape;

use app::App;
use cli::{Cli, Command};
use config::Config;
use models::BatchSummary;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    // Console logs go to stderr so stdout stays parseable
    let _log_guard = logging::init(&config.logging).context("failed to set up logging")?;

    let app = App::new(config).await.context("failed to open the news database")?;

    match cli.command {
        Command::Run { date, force } => {
            let date = date.unwrap_or_else(|| app.today());
            let result = app.run_date(date, force).await;
            println!("{result}");
            if result.status.needs_retry() {
                bail!("run for {date} ended with status {}", result.status);
            }
        }

        Command::Batch { start, end } => {
            let results = app.run_batch(start, end).await?;
            for result in &results {
                println!("{result}");
            }
            println!("{}", BatchSummary::from_results(&results));
        }

        Command::Schedule => {
            let handle = app.start_scheduler();
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl-C")?;
            tracing::info!("interrupt received, finishing the current run");
            handle.shutdown().await;
        }

        Command::List { date } => {
            let items = app.repository.list_by_date(date).await?;
            if items.is_empty() {
                println!("no items stored for {date}");
            }
            for item in items {
                let marker = if item.has_content() { "" } else { " (no content)" };
                println!("{:>3} {:>7}  {}{}", item.id, item.ordinal.to_string(), item.title, marker);
            }
        }

        Command::Show { id } => match app.repository.get_by_id(id).await? {
            Some(item) => println!("{}", serde_json::to_string_pretty(&item)?),
            None => bail!("item {id} not found"),
        },

        Command::Purge { date } => {
            let deleted = app.repository.delete_date(date).await?;
            println!("deleted {deleted} item(s) for {date}");
        }
    }

    Ok(())
}
