//! CLI binary for validating datasets and tracing anomalies to pipeline stages.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;

use dqtrace_csv::CsvSource;
use dqtrace_engine::{
    EventEmitter, QualityConfig, QualityRun, RunReport, TraceResult, TracingSink, ValidationMode,
};
use dqtrace_types::LoadError;

#[derive(Parser)]
#[command(name = "dqtrace", version, about = "Dataset quality checks with stage attribution")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to this file (plain text, no colours)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate one or more CSV files and trace any failures
    Check {
        /// CSV files to validate
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Quality configuration (default: built-in age pipeline)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Stop at the first violation instead of collecting all
        #[arg(long)]
        fail_fast: bool,

        /// Stream diagnostic events to this file as JSON lines
        #[arg(long)]
        events: Option<PathBuf>,

        /// Print each report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Trace a CSV file through the configured stages without validating
    Trace {
        /// CSV file to trace
        file: PathBuf,

        /// Quality configuration (default: built-in age pipeline)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write the default quality configuration
    InitConfig {
        /// Output file path
        #[arg(short, long, default_value = "dqtrace.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Check {
            files,
            config,
            fail_fast,
            events,
            json,
        } => {
            let passed = cmd_check(&files, config.as_deref(), fail_fast, events.as_deref(), json).await?;
            if !passed {
                std::process::exit(1);
            }
        }
        Commands::Trace { file, config } => {
            cmd_trace(&file, config.as_deref())?;
        }
        Commands::InitConfig { output } => {
            cmd_init_config(&output)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = if verbose { "debug" } else { "info" };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("cannot create log file {}", path.display()))?;
            builder.with_writer(Mutex::new(file)).with_ansi(false).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<QualityConfig> {
    match path {
        Some(path) => QualityConfig::load(path)
            .with_context(|| format!("cannot load configuration {}", path.display())),
        None => Ok(QualityConfig::default()),
    }
}

async fn cmd_check(
    files: &[PathBuf],
    config_path: Option<&Path>,
    fail_fast: bool,
    events: Option<&Path>,
    json: bool,
) -> anyhow::Result<bool> {
    let config = load_config(config_path)?;
    let mode = if fail_fast {
        ValidationMode::FailFast
    } else {
        config.mode
    };
    let engine = Arc::new(config.build_engine()?);
    let registry = Arc::new(config.build_registry()?);

    let emitter = EventEmitter::new(4096);
    let observer = spawn_observer(&emitter, events)?;

    let mut handles = Vec::with_capacity(files.len());
    for path in files {
        let engine = Arc::clone(&engine);
        let registry = Arc::clone(&registry);
        let emitter = emitter.clone();
        let path = path.clone();
        let handle = tokio::task::spawn_blocking(move || -> Result<RunReport, LoadError> {
            let dataset = CsvSource::default().load_path(&path)?;
            Ok(QualityRun::new(&engine, &registry).run(&dataset, mode, &emitter))
        });
        handles.push(handle);
    }

    let mut all_passed = true;
    for (path, handle) in files.iter().zip(handles) {
        match handle.await? {
            Ok(report) => {
                all_passed &= report.passed();
                if json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    print!("{}", render_report(&report));
                }
            }
            Err(e) => {
                all_passed = false;
                println!("{}: LOAD ERROR: {}", path.display(), e);
            }
        }
    }

    drop(emitter);
    observer.await??;
    Ok(all_passed)
}

/// Render every event as a log record and, if requested, append it to a JSONL file.
fn spawn_observer(
    emitter: &EventEmitter,
    events: Option<&Path>,
) -> anyhow::Result<tokio::task::JoinHandle<anyhow::Result<()>>> {
    let mut rx = emitter.subscribe();
    let mut out = match events {
        Some(path) => Some(std::io::BufWriter::new(
            std::fs::File::create(path)
                .with_context(|| format!("cannot create events file {}", path.display()))?,
        )),
        None => None,
    };

    Ok(tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    TracingSink::render(&event);
                    if let Some(out) = out.as_mut() {
                        serde_json::to_writer(&mut *out, &event)?;
                        out.write_all(b"\n")?;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event observer fell behind; events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        if let Some(mut out) = out {
            out.flush()?;
        }
        Ok::<(), anyhow::Error>(())
    }))
}

fn render_report(report: &RunReport) -> String {
    let validation = &report.validation;
    let mut text = String::new();
    if validation.passed {
        text.push_str(&format!(
            "{}: PASSED ({} rule(s) evaluated)\n",
            validation.dataset, validation.rules_evaluated
        ));
        return text;
    }

    text.push_str(&format!(
        "{}: FAILED ({} violation(s), {} rule(s) evaluated)\n",
        validation.dataset,
        validation.violations.len(),
        validation.rules_evaluated
    ));
    for violation in &validation.violations {
        text.push_str(&format!("  {violation}\n"));
    }
    if let Some(origin) = report.origin() {
        text.push_str(&format!("  Origin: {origin}\n"));
    }
    text
}

fn render_trace(trace: &TraceResult) -> String {
    let mut text = format!("Trace of {}\n", trace.dataset);
    let width = trace
        .examined
        .iter()
        .map(|e| e.stage.len())
        .max()
        .unwrap_or(0);
    for exam in &trace.examined {
        let status = match (&exam.error, exam.matched) {
            (Some(error), _) => format!("errored: {error}"),
            (None, true) => "MATCH".to_string(),
            (None, false) => "no match".to_string(),
        };
        text.push_str(&format!("  {:<width$}  {}\n", exam.stage, status));
    }
    text.push_str(&format!("Origin: {}\n", trace.origin_name()));
    text
}

fn cmd_trace(path: &Path, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let registry = config.build_registry()?;
    let dataset = CsvSource::default().load_path(path)?;
    let trace = registry.trace_with(&dataset, &TracingSink);
    print!("{}", render_trace(&trace));
    Ok(())
}

fn cmd_init_config(output: &Path) -> anyhow::Result<()> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    QualityConfig::default().save(output)?;
    println!("Created default configuration at {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dqtrace_engine::{DiagnosticEvent, NullSink};
    use std::collections::HashMap;

    fn report_for(csv: &str) -> RunReport {
        let config = QualityConfig::default();
        let engine = config.build_engine().unwrap();
        let registry = config.build_registry().unwrap();
        let ds = dqtrace_csv::parse_csv(csv).unwrap();
        QualityRun::new(&engine, &registry).run(&ds, ValidationMode::CollectAll, &NullSink)
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_check_flags() {
        let cli = Cli::parse_from(["dqtrace", "check", "a.csv", "b.csv", "--fail-fast", "--json"]);
        match cli.command {
            Commands::Check {
                files,
                fail_fast,
                json,
                events,
                ..
            } => {
                assert_eq!(files.len(), 2);
                assert!(fail_fast && json);
                assert!(events.is_none());
            }
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn passing_report_is_one_line() {
        let text = render_report(&report_for("age\n25\n"));
        assert_eq!(text, "inline: PASSED (3 rule(s) evaluated)\n");
    }

    #[test]
    fn failing_report_lists_violations_and_origin() {
        let text = render_report(&report_for("age\n25\n-3\n"));
        assert!(text.starts_with("inline: FAILED (1 violation(s), 3 rule(s) evaluated)"));
        assert!(text.contains("[RangeViolation] range:age"));
        assert!(text.ends_with("  Origin: Transformation A\n"));
    }

    #[test]
    fn trace_rendering_marks_the_match() {
        let registry = QualityConfig::default().build_registry().unwrap();
        let ds = dqtrace_csv::parse_csv("age\n2.5\n").unwrap();
        let text = render_trace(&registry.trace(&ds));
        assert!(text.contains("Transformation B  MATCH"));
        assert!(text.ends_with("Origin: Transformation B\n"));
    }

    #[tokio::test]
    async fn check_streams_events_and_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.csv");
        let bad = dir.path().join("bad.csv");
        std::fs::write(&good, "name,age\nann,25\n").unwrap();
        std::fs::write(&bad, "name,age\nbob,-3\n").unwrap();
        let missing = dir.path().join("missing.csv");
        let events_path = dir.path().join("events.jsonl");

        let files = vec![good.clone(), bad.clone(), missing.clone()];
        let passed = cmd_check(&files, None, false, Some(&events_path), false)
            .await
            .unwrap();
        assert!(!passed);

        let text = std::fs::read_to_string(&events_path).unwrap();
        let mut last_by_dataset: HashMap<String, DiagnosticEvent> = HashMap::new();
        for line in text.lines() {
            let event: DiagnosticEvent = serde_json::from_str(line).unwrap();
            let dataset = match &event {
                DiagnosticEvent::RuleEvaluated { dataset, .. }
                | DiagnosticEvent::ViolationRaised { dataset, .. }
                | DiagnosticEvent::StageExamined { dataset, .. } => dataset.clone(),
                DiagnosticEvent::RunSummary { validation, .. } => validation.dataset.clone(),
            };
            last_by_dataset.insert(dataset, event);
        }

        assert_eq!(last_by_dataset.len(), 2);
        assert!(!last_by_dataset.contains_key(&missing.display().to_string()));
        for (path, expect_pass) in [(&good, true), (&bad, false)] {
            match last_by_dataset.get(&path.display().to_string()) {
                Some(DiagnosticEvent::RunSummary { validation, trace }) => {
                    assert_eq!(validation.passed, expect_pass);
                    assert_eq!(trace.is_some(), !expect_pass);
                }
                other => panic!("expected RunSummary last for {}, got {other:?}", path.display()),
            }
        }
    }
}
