mod assemble;
mod calendar;
mod decode;
mod parser;
mod pipeline;
mod run;
mod settings;
mod source;
mod store;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;

use crate::assemble::ScheduleRecord;
use crate::parser::Layout;
use crate::pipeline::{Extraction, ExtractionPipeline};
use crate::run::{RunOptions, SourceDocument};
use crate::settings::Settings;
use crate::source::HttpSource;
use crate::store::{RunRow, SqliteStore};

#[derive(Parser)]
#[command(name = "camp_scraper", about = "Health camp schedule extractor for district PDFs")]
struct Cli {
    /// Config file (default: ./healthcamp.{toml,yaml,json} if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct MonthArgs {
    /// Target year (default: config, then current year)
    #[arg(long)]
    year: Option<i32>,
    /// Target month 1-12 (default: config, then current month)
    #[arg(long)]
    month: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every configured schedule, extract records and store them
    Run {
        #[command(flatten)]
        when: MonthArgs,
        /// Max records per document
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Row layout for sources without their own
        #[arg(long, value_enum)]
        layout: Option<Layout>,
        /// Only these districts (repeatable)
        #[arg(short, long)]
        district: Vec<String>,
    },
    /// Extract records from local PDF or text files without storing them
    Extract {
        files: Vec<PathBuf>,
        #[command(flatten)]
        when: MonthArgs,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        #[arg(long, value_enum)]
        layout: Option<Layout>,
        /// Print JSON lines instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show the dates of every weekday in a month
    Calendar {
        #[command(flatten)]
        when: MonthArgs,
        /// Only this weekday (e.g. "Monday")
        #[arg(long)]
        weekday: Option<String>,
        /// With --weekday: which occurrence (1 = first)
        #[arg(long, requires = "weekday")]
        nth: Option<u32>,
    },
    /// List stored records
    Records {
        #[arg(short, long)]
        district: Option<String>,
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Show stored record counts and recent runs
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Run {
            when,
            limit,
            layout,
            district,
        } => {
            apply_overrides(&mut settings, &when, limit, layout);
            run_sources(&settings, &district).await
        }
        Commands::Extract {
            files,
            when,
            limit,
            layout,
            json,
        } => {
            if files.is_empty() {
                println!("No files given.");
                return Ok(());
            }
            apply_overrides(&mut settings, &when, limit, layout);
            extract_files(&settings, &files, json)
        }
        Commands::Calendar { when, weekday, nth } => {
            apply_overrides(&mut settings, &when, None, None);
            let (year, month) = settings.target_month();
            let table = calendar::resolve(year, month)?;
            if let (Some(weekday), Some(nth)) = (&weekday, nth) {
                println!("{}", table.occurrence_date(weekday, nth));
                return Ok(());
            }
            println!("{:04}-{:02}", table.year(), table.month());
            for (name, dates) in table.iter() {
                if weekday
                    .as_deref()
                    .is_some_and(|w| calendar::parse_weekday(w).map(calendar::weekday_name) != Some(name))
                {
                    continue;
                }
                let days: Vec<String> = dates.iter().map(|d| d.format("%d-%m-%Y").to_string()).collect();
                println!("  {:<10} {}", name, days.join("  "));
            }
            Ok(())
        }
        Commands::Records { district, limit } => {
            let store = SqliteStore::open(&settings.db_path)?;
            let rows = store.fetch_records(district.as_deref(), limit)?;
            if rows.is_empty() {
                println!("No records stored. Run 'run' first.");
                return Ok(());
            }
            print_records(rows.iter().map(|(d, r)| (d.as_str(), r)));
            println!("\n{} records", rows.len());
            store.close()
        }
        Commands::Stats => {
            let store = SqliteStore::open(&settings.db_path)?;
            let counts = store.collection_counts()?;
            if counts.is_empty() {
                println!("No records stored.");
            }
            for (collection, n) in &counts {
                println!("{:<32} {:>6}", collection, n);
            }
            let runs = store.recent_runs(5)?;
            if !runs.is_empty() {
                println!("\n--- Recent runs ---");
                for r in &runs {
                    println!(
                        "{}  {:04}-{:02}  docs {} ({} failed)  records {}  skipped {}  store errors {}",
                        r.run_id, r.year, r.month, r.documents, r.failed_documents,
                        r.records, r.skipped, r.store_errors
                    );
                }
            }
            store.close()
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn apply_overrides(
    settings: &mut Settings,
    when: &MonthArgs,
    limit: Option<usize>,
    layout: Option<Layout>,
) {
    if when.year.is_some() {
        settings.year = when.year;
    }
    if when.month.is_some() {
        settings.month = when.month;
    }
    if let Some(n) = limit {
        settings.max_records = n;
    }
    if let Some(l) = layout {
        settings.layout = l;
    }
}

async fn run_sources(settings: &Settings, districts: &[String]) -> anyhow::Result<()> {
    let (year, month) = settings.target_month();
    let table = Arc::new(calendar::resolve(year, month)?);

    let documents: Vec<SourceDocument> = settings
        .sources
        .iter()
        .filter(|s| districts.is_empty() || districts.iter().any(|d| d.eq_ignore_ascii_case(&s.district)))
        .map(|s| SourceDocument {
            district: s.district.clone(),
            url: s.url.clone(),
            layout: settings.layout_for(s),
        })
        .collect();
    if documents.is_empty() {
        println!("No sources configured for {:?}.", districts);
        return Ok(());
    }

    let mut store = SqliteStore::open(&settings.db_path)?;
    let source = Arc::new(HttpSource::new(settings.download_dir.clone()));
    let opts = RunOptions {
        max_records: settings.max_records,
        concurrency: settings.concurrency,
        collection_root: settings.collection_root.clone(),
        subcollection: settings.subcollection.clone(),
    };

    println!(
        "Processing {} documents for {:04}-{:02} (max {} records each)...",
        documents.len(),
        year,
        month,
        opts.max_records
    );
    let stats = run::run_documents(source, &mut store, documents, table, &opts).await?;

    store.save_run(&RunRow {
        run_id: chrono::Local::now().format("run-%Y%m%d-%H%M%S%.3f").to_string(),
        year,
        month,
        documents: stats.documents,
        failed_documents: stats.failed_documents,
        records: stats.records,
        skipped: stats.skipped,
        store_errors: stats.store_errors,
    })?;
    store.close()?;

    println!(
        "Done: {} documents ({} failed), {} records stored, {} lines skipped, {} store errors.",
        stats.documents, stats.failed_documents, stats.records, stats.skipped, stats.store_errors
    );
    Ok(())
}

fn extract_files(settings: &Settings, files: &[PathBuf], json: bool) -> anyhow::Result<()> {
    let (year, month) = settings.target_month();
    let table = calendar::resolve(year, month)?;
    let pipeline = ExtractionPipeline::new(&table, settings.layout, settings.max_records);

    let results: Vec<(String, anyhow::Result<Extraction>)> = files
        .par_iter()
        .map(|path| {
            let name = path.display().to_string();
            let extraction = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", name))
                .and_then(|bytes| decode::decode_pages(bytes).map_err(anyhow::Error::from))
                .map(|pages| pipeline.extract(&pages, &name));
            (name, extraction)
        })
        .collect();

    let mut skipped = 0;
    let mut records = Vec::new();
    for (name, result) in results {
        match result {
            Ok(extraction) => {
                skipped += extraction.skipped;
                records.extend(extraction.records);
            }
            Err(e) => eprintln!("{}: {:#}", name, e),
        }
    }

    if json {
        for r in &records {
            println!("{}", serde_json::to_string(r)?);
        }
    } else {
        print_records(records.iter().map(|r| ("-", r)));
        println!("\n{} records, {} lines skipped", records.len(), skipped);
    }
    Ok(())
}

fn print_records<'a>(rows: impl Iterator<Item = (&'a str, &'a ScheduleRecord)>) {
    println!(
        "{:>3} | {:<10} | {:<26} | {:<18} | {:<20} | {:<20} | {:>6} | {:>6} | {:<16}",
        "#", "District", "Camp Day", "Session", "Site", "Villages", "Km", "Pop", "Staff"
    );
    println!("{}", "-".repeat(148));
    for (i, (district, r)) in rows.enumerate() {
        println!(
            "{:>3} | {:<10} | {:<26} | {:<18} | {:<20} | {:<20} | {:>6.1} | {:>6} | {:<16}",
            i + 1,
            truncate(district, 10),
            truncate(&r.camp_day, 26),
            r.session_time,
            truncate(&r.camp_site, 20),
            truncate(&r.villages, 20),
            r.distance_km,
            r.population,
            truncate(&r.staff, 16),
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

// ── Tests ──
