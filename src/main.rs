//! CLI entry point for `mboxner`.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use mboxner::books::store::EntityBooks;
use mboxner::books::unique_entities;
use mboxner::config::{self, CategoryMap, Config};
use mboxner::extract::collector;
use mboxner::model::entity::EntityMention;
use mboxner::ner::{self, runner};
use mboxner::parser::mbox::MboxReader;

#[derive(Parser)]
#[command(
    name = "mboxner",
    version,
    about = "Extract named entities from an MBOX archive into categorized entity books"
)]
struct Cli {
    /// Path to the .mbox file
    #[arg(long, value_name = "FILE")]
    mbox: PathBuf,

    /// NER model id (builtin id; real checkpoints plug in behind the backend trait)
    #[arg(long, value_name = "ID")]
    ner_model: Option<String>,

    /// Pairs mapping NER model categories to entity-book directories,
    /// as LABEL=Directory entries or alternating label/directory tokens
    #[arg(long, num_args = 1.., value_name = "KEY=VALUE")]
    cat_dir_map: Vec<String>,

    /// Entity-book root directory; when given, recognized entities are
    /// merged into <DIR>/<Category>/EntityBook files
    #[arg(long, value_name = "DIR")]
    entity_books: Option<PathBuf>,

    /// Path to the output JSON file (printed to stdout when omitted)
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Emit a list of {"message-id", "entities"} records instead of an
    /// id-to-entities mapping
    #[arg(long)]
    records: bool,

    /// Score threshold (predicted entities with scores lower than the
    /// threshold are ignored)
    #[arg(long, value_name = "SCORE")]
    threshold: Option<f64>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    run(&cli, &config)
}

/// Set up tracing with stderr output and a log file in the cache directory.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mboxner.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Full pipeline: load books, collect texts, run NER, filter, write the JSON
/// artifact, merge into the entity books.
fn run(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let start = Instant::now();

    if !cli.mbox.exists() {
        anyhow::bail!("MBOX file not found: {}", cli.mbox.display());
    }

    // Resolve configuration before anything expensive runs
    let map_args = if cli.cat_dir_map.is_empty() {
        &config.ner.cat_dir_map
    } else {
        &cli.cat_dir_map
    };
    let category_map = CategoryMap::parse(map_args)?;

    let model_id = cli
        .ner_model
        .clone()
        .unwrap_or_else(|| config.ner.model.clone());
    let backend = ner::backend_for(&model_id)?;

    let universe = ner::category_universe(backend.label_vocabulary());
    category_map.validate_labels(&universe)?;

    let threshold = cli.threshold.unwrap_or(config.ner.threshold);

    // Books are loaded before inference so a run that cannot be persisted
    // fails before any model work
    let mut books = match &cli.entity_books {
        Some(root) => {
            if !root.is_dir() {
                anyhow::bail!("Entity-book root not found: {}", root.display());
            }
            Some(EntityBooks::load(root, category_map.directories())?)
        }
        None => None,
    };

    let reader = MboxReader::open(&cli.mbox)?;
    let mbox_size = reader.file_size();

    let collected = collector::collect(&reader)?;
    tracing::info!(
        messages = collected.texts.len(),
        "Collected text content from mailbox"
    );

    let pb = ProgressBar::new(collected.texts.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Running NER [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("valid template")
            .progress_chars("#>-"),
    );
    let outcome = runner::run_extraction(
        backend.as_ref(),
        &collected.texts,
        Some(&|current, total| {
            pb.set_length(total);
            pb.set_position(current);
        }),
    );
    pb.finish_and_clear();

    runner::report_skipped(&outcome.skipped, &collected.messages);

    let filtered = runner::filter_by_threshold(outcome.entities, threshold);
    let entity_count: usize = filtered.values().map(Vec::len).sum();

    write_artifact(&filtered, cli.output.as_deref(), cli.records)?;

    let added = match books.as_mut() {
        Some(books) => books.merge_and_save(&unique_entities(&filtered), &category_map)?,
        None => BTreeMap::new(),
    };

    print_summary(
        &cli.mbox,
        mbox_size,
        collected.texts.len(),
        entity_count,
        outcome.skipped.len(),
        &added,
        start.elapsed(),
    );

    Ok(())
}

/// Serialize the filtered entities and write them to the output file, or to
/// stdout when no file is given or the overwrite prompt is declined.
fn write_artifact(
    filtered: &BTreeMap<String, Vec<EntityMention>>,
    output: Option<&Path>,
    records: bool,
) -> anyhow::Result<()> {
    let value = if records {
        serde_json::Value::Array(
            filtered
                .iter()
                .map(|(msg_id, entities)| {
                    serde_json::json!({
                        "message-id": msg_id,
                        "entities": entities,
                    })
                })
                .collect(),
        )
    } else {
        serde_json::to_value(filtered)?
    };
    let rendered = serde_json::to_string_pretty(&value)?;

    match output {
        Some(path) if path.exists() && !confirm_overwrite(path) => {
            println!("{rendered}");
        }
        Some(path) => {
            std::fs::write(path, rendered)?;
            tracing::info!(path = %path.display(), "Wrote entity JSON");
        }
        None => {
            println!("{rendered}");
        }
    }
    Ok(())
}

/// Ask the user whether an existing output file may be overwritten.
fn confirm_overwrite(path: &Path) -> bool {
    print!(
        "Output file {} exists already, overwrite? [y/n] ",
        path.display()
    );
    let _ = std::io::stdout().flush();
    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    answer.trim().eq_ignore_ascii_case("y")
}

/// Print a human-readable run summary.
fn print_summary(
    mbox: &Path,
    mbox_size: u64,
    messages: usize,
    entities: usize,
    skipped: usize,
    added: &BTreeMap<String, usize>,
    elapsed: std::time::Duration,
) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<22} {}", "Mailbox", mbox.display());
    println!("  {:<22} {}", "Mailbox size", format_size(mbox_size, BINARY));
    println!("  {:<22} {}", "Messages with text", messages);
    println!("  {:<22} {}", "Entities kept", entities);
    if skipped > 0 {
        println!("  {:<22} {}", "Messages skipped", skipped);
    }
    for (category, count) in added {
        println!("  {:<22} {}", format!("New in {category}"), count);
    }
    println!("  {:<22} {:.2?}", "Elapsed", elapsed);
    println!();
}
