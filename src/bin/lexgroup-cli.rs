//! Command-line front end for the grouping engine
//!
//! `run` executes the full pipeline over a JSON record file; the `groups`
//! subcommands query an existing output database.

use std::path::PathBuf;
use std::process::ExitCode;

use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use lexgroup::grouping::semantic::HttpSimilarityService;
use lexgroup::provider::{JsonFileProvider, RecordFilter};
use lexgroup::{EngineConfig, GroupStore, RunContext, RunOrchestrator, StatuteGroup};

const USAGE: &str = "lexgroup-cli - contextual grouping and versioning for legal enactments

USAGE:
    lexgroup-cli run --input <records.json> --db <groups.db> [OPTIONS]
    lexgroup-cli groups list --db <groups.db> [--limit <n>]
    lexgroup-cli groups get <id> --db <groups.db>
    lexgroup-cli groups search <query> --db <groups.db>
    lexgroup-cli groups by-year <year> --db <groups.db>
    lexgroup-cli help
    lexgroup-cli version

RUN OPTIONS:
    --input <path>         JSON array of enactment records (required)
    --db <path>            Output SQLite database (required)
    --jurisdiction <name>  Only fetch records for this jurisdiction
    --type <name>          Only fetch records of this instrument type
    --batch-size <n>       Records per grouping batch (default: 40)
    --threshold <f>        Minimum similarity score, 0.0-1.0 (default: 0.5)
    --ai                   Use the external similarity service
    --endpoint <url>       Similarity service endpoint (required with --ai)
    --quiet                Suppress progress output";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str);

    let result = match command {
        Some("run") => cmd_run(&args[1..]),
        Some("groups") => cmd_groups(&args[1..]),
        Some("version") | Some("--version") => {
            println!("lexgroup-cli {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some("help") | Some("--help") | None => {
            println!("{}", USAGE);
            Ok(())
        }
        Some(other) => Err(format!("Unknown command: {}\n\n{}", other, USAGE)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("Error: {}", message);
            ExitCode::FAILURE
        }
    }
}

/// Value of a `--flag value` pair, if present
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn cmd_run(args: &[String]) -> Result<(), String> {
    let input = flag_value(args, "--input").ok_or("run requires --input <records.json>")?;
    let db = flag_value(args, "--db").ok_or("run requires --db <groups.db>")?;

    let mut config = EngineConfig {
        use_ai: has_flag(args, "--ai"),
        service_endpoint: flag_value(args, "--endpoint").map(String::from),
        ..Default::default()
    };
    if let Some(n) = flag_value(args, "--batch-size") {
        config.batch_size = n
            .parse()
            .map_err(|_| format!("invalid --batch-size: {}", n))?;
    }
    if let Some(t) = flag_value(args, "--threshold") {
        config.similarity_threshold = t
            .parse()
            .map_err(|_| format!("invalid --threshold: {}", t))?;
    }

    let filter = match (
        flag_value(args, "--jurisdiction"),
        flag_value(args, "--type"),
    ) {
        (None, None) => None,
        (jurisdiction, instrument_type) => Some(RecordFilter {
            jurisdiction: jurisdiction.map(String::from),
            instrument_type: instrument_type.map(String::from),
        }),
    };

    let quiet = has_flag(args, "--quiet");
    let provider = JsonFileProvider::new(&PathBuf::from(input));
    let store = GroupStore::open(&PathBuf::from(db)).map_err(|e| e.to_string())?;

    let service = config
        .service_endpoint
        .as_deref()
        .filter(|_| config.use_ai)
        .map(|endpoint| HttpSimilarityService::new(endpoint, config.service_timeout_secs));

    let runtime = tokio::runtime::Runtime::new().map_err(|e| e.to_string())?;
    runtime.block_on(async move {
        let mut orchestrator =
            RunOrchestrator::new(config, store, service).map_err(|e| e.to_string())?;

        let (tx, mut rx) = mpsc::channel::<lexgroup::ProgressEvent>(64);
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if !quiet {
                    eprintln!(
                        "[{:>5.1}%] {} - {}",
                        event.progress_percent, event.status, event.message
                    );
                }
            }
        });

        let ctx = RunContext::new(uuid::Uuid::new_v4().to_string(), Some(tx));
        let summary = orchestrator
            .run(&provider, filter.as_ref(), &ctx)
            .await
            .map_err(|e| e.to_string())?;
        let _ = printer.await;

        println!("Run {} {}", summary.run_id, summary.status);
        println!(
            "  records: {} total, {} processed, {} skipped, {} failed",
            summary.total_records,
            summary.processed_records,
            summary.skipped_records,
            summary.failed_records
        );
        println!(
            "  batches: {} total, {} fell back to rules",
            summary.batches_total, summary.fallback_batches
        );
        if summary.failed_partitions > 0 {
            println!("  partitions failed: {}", summary.failed_partitions);
        }
        println!("  groups created: {}", summary.groups_created);
        Ok(())
    })
}

fn cmd_groups(args: &[String]) -> Result<(), String> {
    let subcommand = args.first().map(String::as_str);
    let db = flag_value(args, "--db").ok_or("groups requires --db <groups.db>")?;

    let store = GroupStore::open(&PathBuf::from(db)).map_err(|e| e.to_string())?;
    store.initialize().map_err(|e| e.to_string())?;

    match subcommand {
        Some("list") => {
            let limit = match flag_value(args, "--limit") {
                Some(n) => n.parse().map_err(|_| format!("invalid --limit: {}", n))?,
                None => 50,
            };
            let groups = store.list_groups(limit).map_err(|e| e.to_string())?;
            for group in &groups {
                print_group_line(group);
            }
            println!("{} groups", groups.len());
            Ok(())
        }
        Some("get") => {
            let id = args
                .get(1)
                .filter(|a| !a.starts_with("--"))
                .ok_or("groups get requires a group id")?;
            match store.get_group(id).map_err(|e| e.to_string())? {
                Some(group) => {
                    let json =
                        serde_json::to_string_pretty(&group).map_err(|e| e.to_string())?;
                    println!("{}", json);
                    Ok(())
                }
                None => Err(format!("no group with id {}", id)),
            }
        }
        Some("search") => {
            let query = args
                .get(1)
                .filter(|a| !a.starts_with("--"))
                .ok_or("groups search requires a query")?;
            let groups = store.search_base_name(query, 20).map_err(|e| e.to_string())?;
            for group in &groups {
                print_group_line(group);
            }
            println!("{} matches", groups.len());
            Ok(())
        }
        Some("by-year") => {
            let year: i32 = args
                .get(1)
                .filter(|a| !a.starts_with("--"))
                .ok_or("groups by-year requires a year")?
                .parse()
                .map_err(|_| "invalid year".to_string())?;
            let groups = store.find_by_member_year(year).map_err(|e| e.to_string())?;
            for group in &groups {
                print_group_line(group);
            }
            println!("{} groups", groups.len());
            Ok(())
        }
        _ => Err(format!(
            "groups requires one of: list, get, search, by-year\n\n{}",
            USAGE
        )),
    }
}

fn print_group_line(group: &StatuteGroup) {
    println!(
        "{}  {} [{}/{}] versions={} years={}-{}",
        group.id,
        group.base_name,
        group.jurisdiction,
        group.instrument_type,
        group.metadata.version_count,
        group
            .metadata
            .earliest_year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "?".into()),
        group
            .metadata
            .latest_year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "?".into()),
    );
}
