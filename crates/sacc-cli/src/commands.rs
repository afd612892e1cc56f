use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use colored::Colorize;
use rand::Rng;
use serde_json::json;
use tracing::{info, warn};

use sacc_batch::BatchConfig;
use sacc_chaincode::{Chaincode, ChaincodeConfig, Invocation, Response};
use sacc_server::{SaccServer, ServerConfig};
use sacc_store::InMemoryWorldState;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Invoke(args) => cmd_invoke(args, format),
        Command::Run(args) => cmd_run(args, format),
        Command::Workload(args) => cmd_workload(args, format),
    }
}

fn ledger(threshold: u64) -> (Arc<InMemoryWorldState>, Chaincode) {
    let store = Arc::new(InMemoryWorldState::new());
    let config = ChaincodeConfig {
        batch: BatchConfig::count_only(threshold),
        ..Default::default()
    };
    let cc = Chaincode::with_default_handlers(store.clone(), config);
    (store, cc)
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = &args.bind {
        config.bind_addr = bind
            .parse()
            .with_context(|| format!("invalid bind address {bind}"))?;
    }

    println!(
        "{} sacc server on {} (docType {}, threshold {})",
        "✓".green().bold(),
        config.bind_addr.to_string().bold(),
        config.chaincode.doc_type.cyan(),
        config.chaincode.batch.threshold
    );
    let server = SaccServer::new(config, Arc::new(InMemoryWorldState::new()));
    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime.block_on(server.serve())?;
    Ok(())
}

fn cmd_invoke(args: InvokeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (_, cc) = ledger(BatchConfig::default().threshold);
    let invocation = Invocation::new(args.function, args.args);
    let response = cc.invoke(&invocation);
    print_response(&invocation, &response, format)?;
    if !response.is_ok() {
        anyhow::bail!("{} failed with status {}", invocation.function, response.status);
    }
    Ok(())
}

/// Parse a script: one JSON invocation per line, blank lines and `#`
/// comments skipped. Errors name the 1-based line number.
fn parse_script(text: &str) -> anyhow::Result<Vec<Invocation>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| {
            serde_json::from_str(line.trim())
                .with_context(|| format!("line {}: not a JSON invocation", i + 1))
        })
        .collect()
}

fn cmd_run(args: RunArgs, format: OutputFormat) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.script)
        .with_context(|| format!("reading {}", args.script.display()))?;
    let invocations = parse_script(&text)?;
    let (_, cc) = ledger(args.threshold);

    let mut failures = 0usize;
    for invocation in &invocations {
        let response = cc.invoke(invocation);
        if !response.is_ok() {
            failures += 1;
        }
        print_response(invocation, &response, format)?;
    }

    let report = cc.flush()?;
    if !report.is_complete() {
        for failure in &report.failed {
            warn!(key = %failure.key, error = %failure.error, "buffered delta not committed");
        }
    }
    info!(
        invocations = invocations.len(),
        failures,
        final_flush = report.committed.len(),
        "script complete"
    );
    if format == OutputFormat::Text {
        println!(
            "{} {} invocation(s), {} failed, final flush committed {} key(s)",
            "✓".green().bold(),
            invocations.len(),
            failures,
            report.committed.len()
        );
    }
    Ok(())
}

/// Counters from one workload run.
#[derive(Debug)]
struct WorkloadSummary {
    assets: usize,
    increments: usize,
    flushes: u64,
    batched_writes: u64,
    unbatched_writes: u64,
    elapsed: Duration,
}

fn run_workload(args: &WorkloadArgs) -> anyhow::Result<WorkloadSummary> {
    let increments = args
        .assets
        .checked_mul(args.reps)
        .with_context(|| format!("{} assets x {} reps overflows", args.assets, args.reps))?;
    let (store, cc) = ledger(args.threshold);
    let start = Instant::now();

    for i in 0..args.assets {
        let response = cc.call("init", [format!("asset{i}"), "0".to_string()]);
        if !response.is_ok() {
            anyhow::bail!("creating asset{i}: {:?}", response.message);
        }
    }
    let writes_after_setup = store.put_count();

    let mut rng = rand::thread_rng();
    for n in 0..increments {
        let i = if args.random {
            rng.gen_range(0..args.assets)
        } else {
            n % args.assets
        };
        let response = cc.call("batchRecord", [format!("asset{i}"), "1".to_string()]);
        if !response.is_ok() {
            anyhow::bail!("recording asset{i}: {:?}", response.message);
        }
    }
    cc.flush()?.into_result()?;

    Ok(WorkloadSummary {
        assets: args.assets,
        increments,
        flushes: cc.buffer().flush_count(),
        batched_writes: store.put_count() - writes_after_setup,
        unbatched_writes: increments as u64,
        elapsed: start.elapsed(),
    })
}

fn cmd_workload(args: WorkloadArgs, format: OutputFormat) -> anyhow::Result<()> {
    if args.assets == 0 {
        anyhow::bail!("--assets must be at least 1");
    }
    let summary = run_workload(&args)?;
    match format {
        OutputFormat::Json => {
            let out = json!({
                "assets": summary.assets,
                "increments": summary.increments,
                "flushes": summary.flushes,
                "batched_writes": summary.batched_writes,
                "unbatched_writes": summary.unbatched_writes,
                "elapsed_ms": summary.elapsed.as_millis() as u64,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!(
                "{} {} increments over {} assets in {:?}",
                "✓".green().bold(),
                summary.increments.to_string().bold(),
                summary.assets,
                summary.elapsed
            );
            println!("  Flushes: {}", summary.flushes.to_string().cyan());
            println!(
                "  Store writes: {} (unbatched: {})",
                summary.batched_writes.to_string().green(),
                summary.unbatched_writes.to_string().yellow()
            );
        }
    }
    Ok(())
}

fn print_response(
    invocation: &Invocation,
    response: &Response,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(response)?),
        OutputFormat::Text => {
            if response.is_ok() {
                let payload = response
                    .payload
                    .as_ref()
                    .map(serde_json::to_string_pretty)
                    .transpose()?
                    .unwrap_or_default();
                println!("{} {} {}", "✓".green().bold(), invocation.function.bold(), payload);
            } else {
                println!(
                    "{} {} [{}] {}",
                    "✗".red().bold(),
                    invocation.function.bold(),
                    response.status.to_string().yellow(),
                    response.message.as_deref().unwrap_or_default()
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn workload(assets: usize, reps: usize, random: bool, threshold: u64) -> WorkloadArgs {
        WorkloadArgs {
            assets,
            reps,
            random,
            threshold,
        }
    }

    #[test]
    fn script_skips_comments_and_blanks() {
        let text = "# setup\n{\"function\":\"init\",\"args\":[\"a\",\"1\"]}\n\n  # flush\n{\"function\":\"batchFlush\"}\n";
        let invocations = parse_script(text).unwrap();
        assert_eq!(invocations.len(), 2);
        assert_eq!(invocations[0].args, vec!["a", "1"]);
        assert_eq!(invocations[1].function, "batchFlush");
    }

    #[test]
    fn script_error_names_line() {
        let err = parse_script("{\"function\":\"read\",\"args\":[\"a\"]}\nnot json\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn run_executes_script_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"function\":\"init\",\"args\":[\"a\",\"1\"]}}").unwrap();
        writeln!(file, "{{\"function\":\"batchRecord\",\"args\":[\"a\",\"2\"]}}").unwrap();
        writeln!(file, "{{\"function\":\"read\",\"args\":[\"missing\"]}}").unwrap();
        let args = RunArgs {
            script: file.path().to_path_buf(),
            threshold: 25,
        };
        cmd_run(args, OutputFormat::Json).unwrap();
    }

    #[test]
    fn run_reports_missing_script() {
        let dir = tempfile::tempdir().unwrap();
        let args = RunArgs {
            script: dir.path().join("none.jsonl"),
            threshold: 25,
        };
        assert!(cmd_run(args, OutputFormat::Text).is_err());
    }

    #[test]
    fn sequential_workload_coalesces_writes() {
        let summary = run_workload(&workload(5, 20, false, 5)).unwrap();
        assert_eq!(summary.increments, 100);
        assert_eq!(summary.unbatched_writes, 100);
        // Cycling five keys with a five-key threshold flushes every five
        // increments, one write per key.
        assert_eq!(summary.batched_writes, 100);
        let coalesced = run_workload(&workload(5, 20, false, 25)).unwrap();
        assert_eq!(coalesced.batched_writes, 5);
        assert_eq!(coalesced.flushes, 1);
    }

    #[test]
    fn random_workload_never_writes_more_than_unbatched() {
        let summary = run_workload(&workload(8, 10, true, 4)).unwrap();
        assert!(summary.batched_writes <= summary.unbatched_writes);
        assert!(summary.flushes >= 1);
    }

    #[test]
    fn oversized_workload_is_rejected() {
        let err = run_workload(&workload(usize::MAX, 2, false, 25)).unwrap_err();
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn invoke_failure_is_an_error() {
        let args = InvokeArgs {
            function: "read".into(),
            args: vec!["nothing".into()],
        };
        assert!(cmd_invoke(args, OutputFormat::Text).is_err());
        let args = InvokeArgs {
            function: "init".into(),
            args: vec!["a".into(), "1".into()],
        };
        assert!(cmd_invoke(args, OutputFormat::Json).is_ok());
    }
}
