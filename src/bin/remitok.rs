use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use remitok::corpus::{collect_paths, CorpusEncoder, MetadataMap};
use remitok::serialization::{read_corpus, CorpusRecord, CorpusWriter};
use remitok::{BatchSummary, EncoderConfig, IngestConfig, PartPolicy, SkipReason};
use serde_json::{json, Map, Value};

const DEFAULT_OUTPUT: &str = "all_remi.jsonl";

#[derive(Parser, Debug)]
#[command(author, version, about = "MusicXML to REMI corpus toolkit", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encode score files into a JSON-lines REMI corpus
    Encode(EncodeArgs),
    /// Print the token sequence of a single file
    Preview(PreviewArgs),
    /// Inspect an encoded corpus file
    Info(InfoArgs),
}

#[derive(Args, Debug)]
struct EncoderOpts {
    /// Position grid resolution in steps per quarter note
    #[arg(long, value_name = "STEPS", default_value_t = 4)]
    steps_per_quarter: u32,

    /// Encode only the given zero-based part instead of flattening all parts
    #[arg(long, value_name = "INDEX")]
    part: Option<usize>,

    /// Emit Rest tokens for rests
    #[arg(long)]
    include_rests: bool,
}

impl EncoderOpts {
    fn build(&self) -> remitok::Result<EncoderConfig> {
        let policy = match self.part {
            Some(index) => PartPolicy::Select(index),
            None => PartPolicy::Flatten,
        };
        EncoderConfig::builder()
            .steps_per_quarter(self.steps_per_quarter)
            .part_policy(policy)
            .include_rests(self.include_rests)
            .build()
    }
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// Files or directories to ingest
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output path for the JSON-lines corpus
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    #[command(flatten)]
    encoder: EncoderOpts,

    /// Attach a metadata tag to every record (repeat flag)
    #[arg(long = "tag", value_name = "KEY=VALUE")]
    tags: Vec<String>,

    /// JSON map of source paths to sidecar metadata files
    #[arg(long, value_name = "PATH")]
    metadata_map: Option<PathBuf>,

    /// Append to the output corpus instead of truncating it
    #[arg(long)]
    append: bool,

    /// Disable recursive directory traversal
    #[arg(long)]
    no_recursive: bool,

    /// Follow symlinks during traversal
    #[arg(long)]
    follow_symlinks: bool,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Emit the run summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct PreviewArgs {
    /// Score file to encode
    file: PathBuf,

    #[command(flatten)]
    encoder: EncoderOpts,

    /// Emit the full corpus record as JSON instead of token text
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Corpus JSON-lines file to inspect
    corpus: PathBuf,

    /// Emit a machine-readable JSON summary
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Encode(args) => run_encode(args),
        Commands::Preview(args) => run_preview(args),
        Commands::Info(args) => run_info(args),
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    use log::LevelFilter;

    let level = if quiet > 0 {
        match quiet {
            0 => LevelFilter::Info,
            1 => LevelFilter::Warn,
            _ => LevelFilter::Error,
        }
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    let _ = builder.try_init();
}

fn parse_tags(raw: &[String]) -> Result<Map<String, Value>> {
    let mut tags = Map::new();
    for entry in raw {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("tag {entry:?} is not in KEY=VALUE form"))?;
        tags.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(tags)
}

fn run_encode(args: EncodeArgs) -> Result<()> {
    let encoder_cfg = args.encoder.build()?;
    let ingest_cfg = IngestConfig {
        recursive: !args.no_recursive,
        follow_symlinks: args.follow_symlinks,
        ..IngestConfig::default()
    };
    let tags = parse_tags(&args.tags)?;
    let metadata_map = match &args.metadata_map {
        Some(path) => Some(
            MetadataMap::load(path)
                .with_context(|| format!("failed to load metadata map {}", path.display()))?,
        ),
        None => None,
    };

    let paths =
        collect_paths(&args.inputs, &ingest_cfg).context("failed to discover score files")?;
    let progress = if args.no_progress || args.json {
        None
    } else {
        let pb = ProgressBar::new(paths.len() as u64);
        let style = ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=>-");
        pb.set_style(style);
        Some(pb)
    };

    let mut writer = CorpusWriter::create(&args.output, args.append)
        .with_context(|| format!("failed to open {}", args.output.display()))?;
    let mut summary = BatchSummary::new();
    let start = Instant::now();

    let encoder = CorpusEncoder::new(paths, encoder_cfg, tags, metadata_map);
    for (path, result) in encoder {
        if let Some(pb) = &progress {
            pb.set_message(
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
            pb.inc(1);
        }
        match result {
            Ok(sequence) => {
                writer.write_record(&CorpusRecord::from_sequence(&sequence))?;
                summary.record_success();
            }
            Err(err) => match SkipReason::classify(&err) {
                Some(reason) => {
                    warn!("skipping {}: {err}", path.display());
                    summary.record_skip(reason);
                }
                None => return Err(err.into()),
            },
        }
    }
    writer.finish()?;
    summary.elapsed = start.elapsed();
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "✅ encoded {} of {} files into {} ({:.2?})",
            summary.succeeded,
            summary.processed,
            args.output.display(),
            summary.elapsed
        );
        println!(
            "   skipped: {} parse failures, {} empty scores",
            summary.skipped_parse, summary.skipped_empty
        );
    }

    Ok(())
}

fn run_preview(args: PreviewArgs) -> Result<()> {
    let encoder_cfg = args.encoder.build()?;
    let sequence = remitok::encode(&args.file, &encoder_cfg, &Map::new())
        .with_context(|| format!("failed to encode {}", args.file.display()))?;

    if args.json {
        let record = CorpusRecord::from_sequence(&sequence);
        println!("{}", serde_json::to_string(&record)?);
    } else {
        println!("{}", sequence.as_strings().join(" "));
    }
    Ok(())
}

fn run_info(args: InfoArgs) -> Result<()> {
    let records = read_corpus(&args.corpus)
        .with_context(|| format!("failed to read {}", args.corpus.display()))?;

    let mut total_tokens = 0usize;
    let mut bars = 0usize;
    let mut pitches = 0usize;
    let mut vocabulary = BTreeSet::new();
    for record in &records {
        total_tokens += record.tokens.len();
        for token in &record.tokens {
            if token == "Bar" {
                bars += 1;
            } else if token.starts_with("Pitch_") {
                pitches += 1;
            }
            vocabulary.insert(token.as_str());
        }
    }

    let summary = json!({
        "path": args.corpus.display().to_string(),
        "records": records.len(),
        "total_tokens": total_tokens,
        "distinct_tokens": vocabulary.len(),
        "bar_tokens": bars,
        "pitch_tokens": pitches,
    });

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Records        : {}", records.len());
        println!("Total tokens   : {total_tokens}");
        println!("Distinct tokens: {}", vocabulary.len());
        println!("Bar tokens     : {bars}");
        println!("Pitch tokens   : {pitches}");
    }

    Ok(())
}
