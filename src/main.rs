mod app;
mod config;
mod filters;
mod pbf;
mod pipeline;
mod sinks;
mod utils;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use std::sync::{Arc, Mutex};

use app::{Cli, init_sink, process_pbf, summarize_filters};

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version go to stdout and are not failures
            let _ = err.print();
            std::process::exit(if err.use_stderr() { 1 } else { 0 });
        }
    };

    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("CLI: Failed to initialize thread pool")?;
    }

    if !cli.input.is_file() {
        bail!("CLI: File does not exist: {}", cli.input.display());
    }

    let filters = Arc::new(cli.filter_config()?);
    tracing::info!("Filters: {}", summarize_filters(&filters));

    let runtime = cli.runtime_config();

    let sink = init_sink(&cli.output)?;
    let sink_handle = Arc::new(Mutex::new(sink));

    let start = std::time::Instant::now();
    let summary = process_pbf(&cli.input, filters, &runtime, sink_handle.clone())?;

    // Finalize sink
    {
        let mut sink = sink_handle
            .lock()
            .map_err(|_| anyhow!("Pipeline: Sink mutex poisoned"))?;
        sink.finish().context("Pipeline: Failed to finalize sink")?;
    }

    let elapsed = start.elapsed();
    tracing::info!(
        "Nodes: {}, Ways: {}, Relations: {}",
        summary.nodes,
        summary.ways,
        summary.relations
    );
    tracing::info!(
        "Done! Written {} rows from {} blocks in {:.2}s ({} nodes/s)",
        summary.matches,
        summary.blocks,
        elapsed.as_secs_f64(),
        (summary.nodes as f64 / elapsed.as_secs_f64()) as u64
    );

    Ok(())
}
