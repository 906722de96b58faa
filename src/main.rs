use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;

use revloop::agents::{LlmDebugger, LlmReviewer};
use revloop::cli::{Cli, Command, language_from_path};
use revloop::config::RevloopConfig;
use revloop::observability::{MetricsCollector, Tracer, logging};
use revloop::oracle::CommandOracle;
use revloop::provider::{AnthropicClient, CompletionProvider};
use revloop::retry::RetryingProvider;
use revloop::session::{FileSessionRecorder, validate_session_id};
use revloop::ui::RunProgress;
use revloop::workflow::WorkflowEngine;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut config = RevloopConfig::load()?;
    if let Some(max_attempts) = cli.max_attempts {
        config.max_attempts = max_attempts;
    }
    match &cli.command {
        Command::Refine {
            max_iterations,
            threshold,
            ..
        } => {
            if let Some(n) = max_iterations {
                config.max_iterations = *n;
            }
            if let Some(t) = threshold {
                config.quality_threshold = *t;
            }
        }
        Command::Debug {
            max_iterations: Some(n),
            ..
        } => config.max_debug_iterations = *n,
        _ => {}
    }
    config.validate()?;
    if let Some(session) = cli.command.session() {
        validate_session_id(session)?;
    }
    if config.api_key.is_empty() {
        bail!("no API key: set ANTHROPIC_API_KEY or api_key in revloop.toml");
    }

    let file = cli.command.file();
    let code = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let language = cli
        .command
        .language()
        .or_else(|| language_from_path(file));

    let client = AnthropicClient::new(config.api_key.clone(), config.model.clone())?;
    let provider: Arc<dyn CompletionProvider> =
        Arc::new(RetryingProvider::new(client, config.retry_policy()));
    let tracer = Arc::new(Tracer::new(&config.trace_dir));
    let metrics = Arc::new(MetricsCollector::new());
    let engine = WorkflowEngine::new(
        Arc::new(LlmReviewer::new(provider.clone(), config.temperature, config.max_tokens)),
        Arc::new(LlmDebugger::new(provider, config.temperature, config.max_tokens)),
        tracer.clone(),
        metrics.clone(),
    )
    .with_recorder(Arc::new(FileSessionRecorder::new(&config.session_dir)))
    .with_max_task_retries(config.max_attempts);

    let session = cli.command.session();
    let success = match &cli.command {
        Command::Review { .. } => {
            let progress = RunProgress::start(&format!("Reviewing {}", file.display()));
            let report = engine.run_sequential(&code, language, session).await;
            progress.print_sequential(&report);
            report.success
        }
        Command::Refine { output, .. } => {
            let progress = RunProgress::start(&format!("Refining {}", file.display()));
            let report = engine
                .run_loop(&code, config.loop_options(), language, session)
                .await;
            progress.print_loop(&report);
            emit_code(output.as_deref(), &code, &report.final_code)?;
            report.success
        }
        Command::Debug {
            test_cmd, output, ..
        } => {
            let file_name = file.file_name().unwrap_or(file.as_os_str());
            let scratch = std::env::temp_dir()
                .join(format!("revloop-{}", std::process::id()))
                .join(file_name);
            let oracle = CommandOracle::new(test_cmd.clone(), &scratch);
            let progress = RunProgress::start(&format!("Debugging {}", file.display()));
            let report = engine
                .run_iterative_debug(&code, &oracle, config.max_debug_iterations, language, session)
                .await;
            progress.print_debug(&report);
            if let Some(dir) = scratch.parent() {
                let _ = std::fs::remove_dir_all(dir);
            }
            emit_code(output.as_deref(), &code, &report.final_code)?;
            report.success
        }
    };

    if cli.export_traces {
        let path = tracer.export_traces(None)?;
        let metrics_path =
            path.with_file_name(format!("metrics_{}.json", chrono::Utc::now().timestamp()));
        metrics.export_metrics(&metrics_path)?;
        info!(traces = %path.display(), metrics = %metrics_path.display(), "exported observability data");
        println!("Traces written to {}", path.display());
    }

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

/// Writes `final_code` to `output`, or prints it when it differs from `original`.
fn emit_code(output: Option<&Path>, original: &str, final_code: &str) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, final_code)
            .with_context(|| format!("writing {}", path.display()))?,
        None if final_code != original => println!("\n{final_code}"),
        None => {}
    }
    Ok(())
}
