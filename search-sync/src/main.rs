use std::fs;
use std::io::{self, Read};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::TryStreamExt;
use tracing::{info, warn};

use search_sync::telemetry::{init_tracing, LogFormat};
use search_sync::{Dependencies, Settings};
use search_sync_pipeline::{CollectingEmitter, JsonLinesEmitter};
use search_sync_shared::{ImportJob, IndexingFailure, SourceLocation, StreamBatch};

#[derive(Parser)]
#[command(name = "search-sync")]
#[command(about = "Keeps the search index in step with the primary record store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one bounded migration invocation from a trigger payload
    Migrate {
        /// Trigger payload, or `@<path>` to read it from a file
        payload: String,

        /// Keep running continuations in-process until the export is done
        #[arg(long)]
        follow: bool,
    },
    /// Apply a change-stream batch
    Stream {
        /// File holding the batch; `-` reads stdin
        #[arg(default_value = "-")]
        input: String,
    },
    /// Create the configured indices or update their refresh interval
    PrepareIndex,
    /// Print the published documents of an export as JSON lines
    Extract {
        /// Export location, `<scheme>://<bucket>/<prefix>`
        location: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let log_format = std::env::var("LOG_FORMAT")
        .unwrap_or_default()
        .parse::<LogFormat>()
        .unwrap_or_default();
    init_tracing(log_format);

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let dependencies = Dependencies::new(settings).await?;

    match cli.command {
        Commands::Migrate { payload, follow } => {
            let job = ImportJob::from_payload(&read_argument(&payload)?)?;
            migrate(&dependencies, job, follow).await
        }
        Commands::Stream { input } => stream(&dependencies, &input).await,
        Commands::PrepareIndex => prepare_index(&dependencies).await,
        Commands::Extract { location } => extract(&dependencies, &location).await,
    }
}

/// Inline text, or the content of the file named after a leading `@`.
fn read_argument(argument: &str) -> Result<String> {
    match argument.strip_prefix('@') {
        Some(path) => fs::read_to_string(path).with_context(|| format!("reading {}", path)),
        None => Ok(argument.to_string()),
    }
}

/// Print the failure list of the migration as one JSON array.
fn print_failures(failures: &[IndexingFailure]) -> Result<()> {
    let messages: Vec<String> = failures.iter().map(ToString::to_string).collect();
    println!("{}", serde_json::to_string(&messages)?);
    Ok(())
}

async fn migrate(dependencies: &Dependencies, job: ImportJob, follow: bool) -> Result<()> {
    dependencies.verify_search_health().await?;

    if !follow {
        let controller = dependencies.migration(&job, Arc::new(JsonLinesEmitter::new(io::stdout())))?;
        let outcome = controller.run(&job).await?;
        return print_failures(&outcome.failures);
    }

    let emitter = Arc::new(CollectingEmitter::new());
    let controller = dependencies.migration(&job, emitter.clone())?;

    let mut current = job;
    let mut failures = Vec::new();
    let mut invocations = 0;
    loop {
        invocations += 1;
        let outcome = controller.run(&current).await?;
        failures.extend(outcome.failures);

        match emitter.take().pop() {
            Some(next) => current = next,
            None => break,
        }
    }

    info!(invocations, failures = failures.len(), "Migration finished");
    print_failures(&failures)
}

async fn stream(dependencies: &Dependencies, input: &str) -> Result<()> {
    let payload = if input == "-" {
        let mut payload = String::new();
        io::stdin()
            .read_to_string(&mut payload)
            .context("reading stdin")?;
        payload
    } else {
        fs::read_to_string(input).with_context(|| format!("reading {}", input))?
    };

    let batch = StreamBatch::from_payload(&payload)?;
    let summary = dependencies.stream_synchronizer().handle_batch(&batch).await?;

    println!("{}", serde_json::to_string(summary.status())?);
    Ok(())
}

async fn prepare_index(dependencies: &Dependencies) -> Result<()> {
    let indices = dependencies.settings().index_names();
    if indices.is_empty() {
        bail!("SEARCH_DOCUMENT_TYPES names no record types");
    }

    for (index, preparation) in dependencies.loader().prepare_indices(&indices).await? {
        println!("{}\t{:?}", index, preparation);
    }
    Ok(())
}

async fn extract(dependencies: &Dependencies, location: &str) -> Result<()> {
    let location: SourceLocation = location.parse()?;
    let extraction = dependencies.extraction(&location.scheme)?;

    let mut documents = extraction.extract(&location);
    let mut count = 0usize;
    while let Some(extracted) = documents.try_next().await? {
        println!("{}", serde_json::to_string(&extracted.document)?);
        count += 1;
    }

    if count == 0 {
        warn!(location = %location, "No published documents found");
    }
    info!(count, "Extraction finished");
    Ok(())
}
