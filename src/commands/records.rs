//! `records` command: enumerate an API resource and print it as JSON lines.

use std::io::{self, Write};
use std::pin::pin;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use intra42::{
    ApiClient, FetchStrategy, Paginator, Record, Session, SessionConfig, WorkerPoolConfig,
};
use tracing::info;

use crate::cli::RecordsArgs;

pub async fn run_records_command(args: &RecordsArgs, config: SessionConfig) -> Result<()> {
    let session = Session::builder()
        .config(config)
        .base_url(args.api_url.as_str())
        .build()
        .context("failed to build API session")?;
    let api = ApiClient::authenticate(session, &args.uid, &args.secret)
        .await
        .context("API authentication failed")?;
    let paginator = Paginator::new(api);

    let mut printed = 0usize;
    if args.stream {
        let mut records = pin!(paginator.stream_pages::<Record>(&args.resource, args.page_size));
        while let Some(record) = records.next().await {
            let record = record.with_context(|| format!("failed to stream {}", args.resource))?;
            print_record(&record)?;
            printed += 1;
        }
    } else {
        let strategy = if args.sequential {
            FetchStrategy::Sequential
        } else {
            match args.workers {
                Some(workers) => FetchStrategy::Parallel(WorkerPoolConfig::new(workers)?),
                None => FetchStrategy::parallel(),
            }
        };
        let records: Vec<Record> = paginator
            .fetch_all(&args.resource, args.page_size, strategy)
            .await
            .with_context(|| format!("failed to fetch {}", args.resource))?;
        for record in &records {
            print_record(record)?;
        }
        printed = records.len();
    }

    info!(resource = %args.resource, records = printed, "records printed");
    Ok(())
}

fn print_record(record: &Record) -> Result<()> {
    let line = serde_json::to_string(record)?;
    writeln!(io::stdout().lock(), "{line}")?;
    Ok(())
}
