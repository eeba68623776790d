use anyhow::{Context, Result, anyhow};
use clap::Parser;
use crossbeam_channel::bounded;
use rayon::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::config::{FilterConfig, RuntimeConfig};
use crate::pbf::{BlobDecode, BlobReader, BlobType, FormatError, HeaderBlock};
use crate::pipeline::{BlockProcessor, NodeFilterProcessor};
use crate::sinks::{NodeRow, RowSink, TextRowSink};
use crate::utils::{ProgressLine, RunCounters, RunSummary};

const USAGE_EXAMPLES: &str = "\
Examples:
  grob england-latest.osm.pbf mexican
  grob central-america-latest.osm.pbf -d 10 12.1166 -68.9333 > willemstad10k.csv

The unit for maximum distance is km.";

#[derive(Parser)]
#[command(author, version, about, long_about = None, after_help = USAGE_EXAMPLES)]
pub struct Cli {
    /// Input PBF file
    pub input: PathBuf,

    /// Case-insensitive text to look for in tag keys and values
    pub pattern: Option<String>,

    /// Only keep nodes closer than MAX_KM to LAT LON
    #[arg(
        short = 'd',
        long = "distance",
        num_args = 3,
        value_names = ["MAX_KM", "LAT", "LON"],
        allow_negative_numbers = true
    )]
    pub distance: Option<Vec<f64>>,

    /// Output file, or - for stdout
    #[arg(short, long, default_value = "-")]
    pub output: PathBuf,

    /// Number of threads (default: all cores)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Show a running block/node count on stderr
    #[arg(long)]
    pub progress: bool,
}

impl Cli {
    pub fn filter_config(&self) -> Result<FilterConfig> {
        FilterConfig::from_args(self.distance.as_deref(), self.pattern.as_deref())
    }

    /// The progress line shares stderr with the log, so verbose runs drop it.
    pub fn runtime_config(&self) -> RuntimeConfig {
        if self.progress && self.verbose {
            tracing::warn!("CLI: --progress is ignored with --verbose");
        }
        RuntimeConfig {
            progress: self.progress && !self.verbose,
            ..RuntimeConfig::default()
        }
    }
}

pub type SinkHandle = Arc<Mutex<Box<dyn RowSink + Send>>>;

pub fn init_sink(output: &Path) -> Result<Box<dyn RowSink + Send>> {
    if output == Path::new("-") {
        tracing::info!("Sink: text -> stdout");
        Ok(Box::new(TextRowSink::stdout()))
    } else {
        tracing::info!("Sink: text -> {:?}", output);
        let sink = TextRowSink::new(output)
            .with_context(|| format!("Sink: Failed to create {:?}", output))?;
        Ok(Box::new(sink))
    }
}

pub fn summarize_filters(filters: &FilterConfig) -> String {
    let distance = if filters.distance_enabled() {
        format!(
            "within {} km of ({}, {})",
            filters.max_distance_km, filters.ref_lat, filters.ref_lon
        )
    } else {
        "any distance".to_string()
    };
    let pattern = if filters.pattern.is_empty() {
        "any tags".to_string()
    } else {
        format!("tags containing '{}'", filters.pattern.as_str())
    };
    format!("{distance}, {pattern}")
}

pub fn log_header(header: &HeaderBlock) {
    if let Some(program) = header.writing_program() {
        tracing::info!("Written by: {}", program);
    }
    if let Some(source) = header.source() {
        tracing::info!("Source: {}", source);
    }
    if let Some(bbox) = header.bbox() {
        tracing::info!(
            "Bounding box: left {:.7}, bottom {:.7}, right {:.7}, top {:.7}",
            bbox.left,
            bbox.bottom,
            bbox.right,
            bbox.top
        );
    }
    if let Some(timestamp) = header.replication_timestamp() {
        tracing::info!("Replication timestamp: {}", timestamp);
    }
    tracing::info!(
        "Required features: {}",
        header.required_features().join(", ")
    );

    let sorted: Vec<&str> = header
        .optional_features()
        .iter()
        .map(|feature| feature.trim())
        .filter(|feature| feature.starts_with("Sort."))
        .collect();
    if !sorted.is_empty() {
        tracing::info!("Detected PBF sort header(s): {}", sorted.join(", "));
    }
}

/// Reads the first segment, which must be a header this decoder supports.
pub fn read_header<R: Read>(reader: &mut BlobReader<R>) -> Result<HeaderBlock> {
    let blob = reader
        .next()
        .ok_or_else(|| FormatError::MissingHeader("end of input".to_string()))?
        .context("Reader: Failed to read header blob")?;

    if blob.blob_type() != BlobType::OsmHeader {
        return Err(FormatError::MissingHeader(blob.type_name().to_string()).into());
    }
    match blob
        .decode()
        .context("Decoder: Failed to decode header blob")?
    {
        BlobDecode::OsmHeader(header) => {
            header
                .validate()
                .context("Decoder: Unsupported PBF file")?;
            tracing::debug!("Header valid, data blocks start at offset {}", reader.offset());
            Ok(header)
        }
        _ => Err(FormatError::MissingHeader(blob.type_name().to_string()).into()),
    }
}

pub fn run_pass<R, P>(
    reader: BlobReader<R>,
    processor: Arc<P>,
    sink: SinkHandle,
    queue_depth: usize,
    progress: Option<ProgressLine>,
) -> Result<u64>
where
    R: Read + Send,
    P: BlockProcessor + 'static,
{
    // Totals ride along with each batch so only the writer touches the progress line.
    let (tx, rx) = bounded::<(Vec<NodeRow>, RunSummary)>(queue_depth);

    let sink_handle = sink.clone();
    let writer = std::thread::spawn(move || -> Result<u64> {
        let mut sink = sink_handle
            .lock()
            .map_err(|_| anyhow!("Pipeline: Sink mutex poisoned"))?;
        let mut row_count = 0u64;
        for (batch, totals) in rx {
            if let Some(progress) = &progress {
                progress.update(&totals);
            }
            for row in batch {
                sink.add_row(row).context("Sink: Failed to write row")?;
                row_count += 1;
            }
        }
        Ok(row_count)
    });

    let decode_result = reader
        .par_bridge()
        .try_for_each(|blob_result| -> Result<()> {
            let blob = blob_result.context("Reader: Failed to read blob")?;
            let offset = blob.offset();
            let block = match blob
                .decode()
                .with_context(|| format!("Decoder: Failed to decode blob at offset {}", offset))?
            {
                BlobDecode::OsmHeader(_) => return Ok(()),
                BlobDecode::OsmData(block) => block,
                BlobDecode::Unknown(unknown) => {
                    tracing::info!("Unknown blob: {}", unknown);
                    return Ok(());
                }
            };

            let (batch, totals) = processor
                .process_block(block)
                .with_context(|| format!("Decoder: Invalid block at offset {}", offset))?;
            tx.send((batch, totals))
                .map_err(|err| anyhow!("Pipeline: Failed to send row batch: {}", err))?;

            Ok(())
        });

    drop(tx);

    // Get writer thread result - it contains the root cause if there was an error
    let writer_join = writer.join();

    // Check writer thread first - it has the real error if the channel disconnected
    let row_count = match writer_join {
        Ok(Ok(result)) => result,
        Ok(Err(writer_err)) => {
            return if decode_result.is_err() {
                Err(writer_err
                    .context("Pipeline: Sink writer thread failed (caused channel disconnect)"))
            } else {
                Err(writer_err)
            };
        }
        Err(panic_payload) => {
            let panic_msg = panic_payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic_payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            return Err(anyhow!(
                "Pipeline: Sink writer thread panicked: {}",
                panic_msg
            ));
        }
    };

    // Only check decode_result if writer succeeded
    decode_result?;

    Ok(row_count)
}

/// Header check, then one parallel pass over the data blocks.
pub fn process_reader<R>(
    mut reader: BlobReader<R>,
    filters: Arc<FilterConfig>,
    runtime: &RuntimeConfig,
    sink: SinkHandle,
) -> Result<RunSummary>
where
    R: Read + Send,
{
    let header = read_header(&mut reader)?;
    log_header(&header);

    let counters = Arc::new(RunCounters::default());
    let processor = Arc::new(NodeFilterProcessor {
        filters,
        counters: counters.clone(),
    });
    let progress = runtime
        .progress
        .then(|| ProgressLine::new("Scanning", 100));

    let written = run_pass(
        reader,
        processor,
        sink,
        runtime.queue_depth,
        progress.clone(),
    )?;

    let summary = counters.summary();
    if let Some(progress) = &progress {
        progress.finish(&summary);
    }
    if written != summary.matches {
        return Err(anyhow!(
            "Pipeline: Wrote {} rows but matched {} nodes",
            written,
            summary.matches
        ));
    }
    Ok(summary)
}

pub fn process_pbf(
    input: &Path,
    filters: Arc<FilterConfig>,
    runtime: &RuntimeConfig,
    sink: SinkHandle,
) -> Result<RunSummary> {
    let reader = BlobReader::from_path(input)
        .with_context(|| format!("Reader: Failed to open {:?}", input))?;
    tracing::info!("Scanning {:?} for nodes...", input);
    process_reader(reader, filters, runtime, sink)
}
