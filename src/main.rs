// CLI entry point for AuthMatrix
// Replays a captured session's baseline requests under every other role's
// credentials and reports verdicts.

use anyhow::Context;
use authmatrix::replay::{ProgressObserver, ReplayConfig, ReplayEngine, RunState};
use authmatrix::reporting::{self, ExportScope};
use authmatrix::results::{ResultFilter, ResultStore};
use authmatrix::session;
use authmatrix::transport::ReqwestTransport;
use authmatrix::Verdict;
use clap::{Arg, ArgAction, Command};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Prints one line per replayed pair.
struct ConsoleObserver;

impl ProgressObserver for ConsoleObserver {
    fn on_progress(&self, completed: usize, total: usize, method: &str, url: &str) {
        println!("[{}/{}] {} {}", completed, total, method, url);
    }

    fn on_finished(&self, state: &RunState, produced: usize) {
        println!("Run {} with {} results", state, produced);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "authmatrix=warn".into()),
        )
        .init();

    let matches = Command::new("authmatrix")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Differential access-control testing: replay one role's requests as every other role")
        .after_help("EXAMPLES:\n  authmatrix --session capture.json --baseline Admin\n  authmatrix -s capture.json -b Admin --filter-verdict VULNERABLE -o report.json")
        .arg(Arg::new("session")
            .short('s')
            .long("session")
            .required(true)
            .num_args(1)
            .help("Path to a captured session JSON document"))
        .arg(Arg::new("baseline")
            .short('b')
            .long("baseline")
            .num_args(1)
            .help("Baseline role (overrides the one stored in the session)"))
        .arg(Arg::new("output")
            .short('o')
            .long("output")
            .num_args(1)
            .help("Report file path (default: timestamped authmatrix_report_*.json)"))
        .arg(Arg::new("filter_verdict")
            .long("filter-verdict")
            .num_args(1)
            .help("Export only results with this verdict (VULNERABLE, SAFE, SUSPICIOUS, ERROR)"))
        .arg(Arg::new("delay_ms")
            .long("delay-ms")
            .num_args(1)
            .default_value("20")
            .help("Pause between replayed requests, in milliseconds"))
        .arg(Arg::new("timeout_secs")
            .long("timeout-secs")
            .num_args(1)
            .default_value("10")
            .help("Per-request transport timeout, in seconds"))
        .arg(Arg::new("no_store_messages")
            .long("no-store-messages")
            .action(ArgAction::SetTrue)
            .help("Do not retain raw request/response bytes (lower memory)"))
        .get_matches();

    let session_path = matches
        .get_one::<String>("session")
        .expect("session is required");
    let delay_ms: u64 = matches
        .get_one::<String>("delay_ms")
        .expect("has default")
        .parse()
        .context("--delay-ms must be a number")?;
    let timeout_secs: u64 = matches
        .get_one::<String>("timeout_secs")
        .expect("has default")
        .parse()
        .context("--timeout-secs must be a number")?;
    let filter_verdict: Option<Verdict> = matches
        .get_one::<String>("filter_verdict")
        .map(|v| v.parse().map_err(anyhow::Error::msg))
        .transpose()?;

    let roles = session::load_session(Path::new(session_path))?;
    if let Some(baseline) = matches.get_one::<String>("baseline") {
        roles.set_baseline(baseline)?;
    }
    let baseline = roles
        .baseline()
        .context("no baseline role; pass --baseline or store one in the session")?;

    println!("Loaded {} roles from {}", roles.len(), session_path);
    for summary in roles.summaries() {
        let marker = if summary.is_baseline { " [baseline]" } else { "" };
        println!(
            "  {}: {} requests, {} cookies, {} auth headers{}",
            summary.name, summary.requests, summary.cookies, summary.auth_headers, marker
        );
    }

    let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(timeout_secs))?);
    let engine = ReplayEngine::new(transport).with_config(ReplayConfig {
        store_full_messages: !matches.get_flag("no_store_messages"),
        request_delay: Duration::from_millis(delay_ms),
    });
    let results = Arc::new(ResultStore::new());

    let handle = engine.start(&roles, Arc::clone(&results), Arc::new(ConsoleObserver))?;

    let canceller = handle.canceller();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancellation requested, stopping after the current request...");
            canceller.cancel();
        }
    });

    let state = handle.wait().await;

    let counts = results.aggregate_counts();
    println!(
        "\n{}: {} total / {} vulnerable / {} safe / {} suspicious / {} error",
        state, counts.total, counts.vulnerable, counts.safe, counts.suspicious, counts.error
    );

    let filter = filter_verdict.map(|verdict| ResultFilter::any().with_verdict(verdict));
    let document = reporting::export_results(&results, Some(baseline), filter.as_ref());
    let written = match matches.get_one::<String>("output") {
        Some(path) => {
            reporting::write_json_report_to(&document, path)?;
            path.clone()
        }
        None => reporting::write_json_report(&document)?,
    };
    println!(
        "Report written to {} ({} results, {} vulnerabilities, scope: {})",
        written,
        document.total,
        document.vulnerabilities,
        match document.export_type {
            ExportScope::All => "all",
            ExportScope::Filtered => "filtered",
        }
    );

    Ok(())
}
