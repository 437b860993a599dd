//! The `galgo ingest` command for ingesting local files.

mod report;
pub mod types;

pub use types::{OutputFormat, VideoHash};

use clap::Args;
use galgo_core::pipeline::{DiscoveredFile, FileDiscovery};
use galgo_core::{
    Config, FailureReason, IngestionOutcome, Ingestor, MemoryStore, OutputWriter, UploadRequest,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use report::{create_progress_bar, RunReport};

/// Files opened per batch call; bounds open handles for large runs.
const CHUNK_SIZE: usize = 64;

/// Arguments for the `ingest` command.
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Files or directories to ingest
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Storage base directory (overrides config)
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// Number of files ingested concurrently (overrides config)
    #[arg(short, long)]
    pub parallel: Option<usize>,

    /// Disable thumbnail generation
    #[arg(long)]
    pub no_thumbnail: bool,

    /// Square thumbnail size in pixels (overrides config)
    #[arg(long)]
    pub thumbnail_size: Option<u32>,

    /// Video identity strategy (overrides config)
    #[arg(long, value_enum)]
    pub video_hash: Option<VideoHash>,

    /// Include hidden files and directories
    #[arg(long)]
    pub hidden: bool,
}

/// Execute the ingest command.
pub async fn execute(args: IngestArgs, mut config: Config) -> anyhow::Result<()> {
    for input in &args.inputs {
        if !input.exists() {
            anyhow::bail!(
                "Input path does not exist: {:?}\n\n  Hint: Check the file path and try again.",
                input
            );
        }
    }

    apply_overrides(&mut config, &args);
    let ingestor = Ingestor::new(&config, Arc::new(MemoryStore::new()))?;

    let files = FileDiscovery::new()
        .include_hidden(args.hidden)
        .discover_all(&args.inputs);
    if files.is_empty() {
        tracing::warn!("No files found at {:?}", args.inputs);
        return Ok(());
    }
    tracing::info!(
        "Found {} file(s) ({:.1} MB) to ingest into {:?}",
        files.len(),
        FileDiscovery::total_size(&files) as f64 / 1_000_000.0,
        ingestor.layout().root()
    );

    let (sink, pretty): (Box<dyn Write>, bool) = match &args.output {
        Some(path) => (Box::new(BufWriter::new(File::create(path)?)), false),
        None => (Box::new(std::io::stdout().lock()), true),
    };
    let mut writer = OutputWriter::new(sink, args.format.into(), pretty);

    let progress = create_progress_bar(files.len() as u64);
    let mut report = RunReport::default();
    let start = std::time::Instant::now();

    for chunk in files.chunks(CHUNK_SIZE) {
        let outcomes = ingest_chunk(&ingestor, chunk).await?;
        for outcome in &outcomes {
            report.record(outcome);
            writer.write(outcome)?;
        }
        progress.inc(chunk.len() as u64);
        let elapsed = start.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            let handled = report.stats().succeeded + report.stats().failed;
            progress.set_message(format!("{:.1} files/sec", handled as f64 / elapsed));
        }
    }

    writer.finish()?;
    if let Some(path) = &args.output {
        tracing::info!("Output written to {:?}", path);
    }

    progress.finish_and_clear();
    report.finish(start.elapsed());
    report.print_summary();

    Ok(())
}

/// Fold CLI flags into the loaded configuration.
fn apply_overrides(config: &mut Config, args: &IngestArgs) {
    if let Some(base_dir) = &args.base_dir {
        config.storage.base_dir = base_dir.clone();
    }
    if let Some(parallel) = args.parallel {
        config.ingest.parallel_workers = parallel.max(1);
    }
    if args.no_thumbnail {
        config.thumbnail.enabled = false;
    }
    if let Some(size) = args.thumbnail_size {
        config.thumbnail.width = size.max(1);
        config.thumbnail.height = size.max(1);
    }
    if let Some(video_hash) = args.video_hash {
        config.hash.video_strategy = video_hash.into();
    }
}

/// Ingest one chunk of files, preserving order.
///
/// A file that cannot be opened becomes a staging rejection in its slot.
async fn ingest_chunk(
    ingestor: &Ingestor,
    files: &[DiscoveredFile],
) -> anyhow::Result<Vec<IngestionOutcome>> {
    let mut slots: Vec<Option<IngestionOutcome>> = Vec::with_capacity(files.len());
    let mut uploads = Vec::new();
    let mut upload_slots = Vec::new();

    for (index, file) in files.iter().enumerate() {
        match UploadRequest::open(&file.path).await {
            Ok(upload) => {
                uploads.push(upload);
                upload_slots.push(index);
                slots.push(None);
            }
            Err(e) => {
                tracing::error!("Failed to open {:?}: {}", file.path, e);
                slots.push(Some(IngestionOutcome::Rejected {
                    file_name: file_name_of(file),
                    reason: FailureReason::Staging(format!(
                        "Cannot open {}: {}",
                        file.path.display(),
                        e
                    )),
                }));
            }
        }
    }

    let outcomes = ingestor.ingest_batch(uploads).await?;
    for (index, outcome) in upload_slots.into_iter().zip(outcomes) {
        slots[index] = Some(outcome);
    }
    Ok(slots.into_iter().flatten().collect())
}

fn file_name_of(file: &DiscoveredFile) -> String {
    file.path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use galgo_core::config::VideoHashStrategy;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: IngestArgs,
    }

    fn parse(argv: &[&str]) -> IngestArgs {
        TestCli::parse_from(std::iter::once("galgo").chain(argv.iter().copied())).args
    }

    fn test_config(base: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.storage.base_dir = base.to_path_buf();
        config.video.ffprobe_path = "/nonexistent/galgo-ffprobe".to_string();
        config.video.ffmpeg_path = "/nonexistent/galgo-ffmpeg".to_string();
        config
    }

    #[test]
    fn test_apply_overrides() {
        let args = parse(&[
            "in",
            "--base-dir",
            "/srv/media",
            "--parallel",
            "8",
            "--thumbnail-size",
            "128",
            "--no-thumbnail",
            "--video-hash",
            "name-timestamp",
        ]);
        let mut config = Config::default();
        apply_overrides(&mut config, &args);

        assert_eq!(config.base_dir(), PathBuf::from("/srv/media"));
        assert_eq!(config.ingest.parallel_workers, 8);
        assert_eq!((config.thumbnail.width, config.thumbnail.height), (128, 128));
        assert!(!config.thumbnail.enabled);
        assert_eq!(config.hash.video_strategy, VideoHashStrategy::NameTimestamp);
    }

    #[test]
    fn test_defaults_leave_config_untouched() {
        let args = parse(&["in"]);
        let mut config = Config::default();
        apply_overrides(&mut config, &args);
        assert_eq!(config.ingest.parallel_workers, 4);
        assert!(config.thumbnail.enabled);
    }

    #[tokio::test]
    async fn test_ingest_chunk_keeps_order_and_reports_unopenable_files() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = dir.path().join("in");
        std::fs::create_dir(&inputs).unwrap();

        let photo = inputs.join("a.png");
        image::DynamicImage::new_rgb8(40, 30)
            .save_with_format(&photo, image::ImageFormat::Png)
            .unwrap();
        let notes = inputs.join("c.txt");
        std::fs::write(&notes, b"plain text").unwrap();

        let files = vec![
            DiscoveredFile {
                path: photo,
                size: 0,
            },
            DiscoveredFile {
                path: inputs.join("b-missing.jpg"),
                size: 0,
            },
            DiscoveredFile {
                path: notes,
                size: 0,
            },
        ];

        let ingestor = Ingestor::new(
            &test_config(&dir.path().join("store")),
            Arc::new(MemoryStore::new()),
        )
        .unwrap();
        let outcomes = ingest_chunk(&ingestor, &files).await.unwrap();

        let names: Vec<&str> = outcomes.iter().map(|o| o.file_name()).collect();
        assert_eq!(names, ["a.png", "b-missing.jpg", "c.txt"]);
        assert!(outcomes[0].is_ingested());
        assert_eq!(outcomes[1].reason().map(|r| r.kind()), Some("staging"));
        assert_eq!(
            outcomes[2].reason().map(|r| r.kind()),
            Some("unsupported_type")
        );
    }
}
