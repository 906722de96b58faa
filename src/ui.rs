//! Interface de terminal do revloop: spinner durante a execução e resumo
//! colorido ao final, via `indicatif` e `console`.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::agents::Finding;
use crate::workflow::{
    DebugLoopReport, IterationStatus, LoopReport, SequentialReport, StepOutput,
};

/// Indicador de progresso de um workflow no terminal.
///
/// Verde para sucesso, vermelho para falha e amarelo para avisos.
pub struct RunProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl RunProgress {
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }

    fn status_line(&self, success: bool, error: Option<&str>, seconds: f64) {
        if success {
            println!(
                "  {} Workflow completed in {seconds:.1}s",
                self.green.apply_to("✓")
            );
        } else {
            println!(
                "  {} Workflow failed: {}",
                self.red.apply_to("✗"),
                error.unwrap_or("unknown error")
            );
        }
    }

    fn finding_line(&self, finding: &Finding) {
        let severity = finding
            .severity
            .as_ref()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "info".into());
        let style = if finding.is_high_priority() {
            &self.red
        } else {
            &self.yellow
        };
        let line = finding
            .line
            .map(|l| format!(" (line {l})"))
            .unwrap_or_default();
        println!(
            "    {}{} {}",
            style.apply_to(format!("[{severity}]")),
            self.dim.apply_to(line),
            finding.description
        );
    }

    pub fn print_sequential(&self, report: &SequentialReport) {
        self.finish();
        self.status_line(
            report.success,
            report.error.as_deref(),
            report.execution_time_seconds,
        );
        for step in &report.steps {
            println!();
            println!("{}", self.green.apply_to(format!("─── {} ───", step.agent)));
            match &step.output {
                StepOutput::Review(review) => {
                    println!("  {}", review.summary);
                    for finding in &review.findings {
                        self.finding_line(finding);
                    }
                }
                StepOutput::Debug(debug) => {
                    println!("  Root cause: {}", debug.root_cause);
                    if !debug.fix_explanation.is_empty() {
                        println!("  Fix: {}", debug.fix_explanation);
                    }
                }
                StepOutput::Fix { fixed_code, .. } => println!("{fixed_code}"),
            }
        }
    }

    pub fn print_loop(&self, report: &LoopReport) {
        self.finish();
        self.status_line(
            report.success,
            report.error.as_deref(),
            report.execution_time_seconds,
        );
        for it in &report.iterations {
            let style = match it.status {
                IterationStatus::ThresholdMet | IterationStatus::Improved => &self.green,
                IterationStatus::NoImprovement => &self.red,
                IterationStatus::BelowThreshold => &self.yellow,
            };
            println!(
                "  #{} quality {:.3}  issues {}  {}",
                it.iteration,
                it.quality_score,
                it.num_issues,
                style.apply_to(format!("{:?}", it.status))
            );
        }
        println!(
            "  Quality {:.3} → {:.3}",
            report.initial_quality, report.final_quality
        );
    }

    pub fn print_debug(&self, report: &DebugLoopReport) {
        self.finish();
        self.status_line(
            report.success,
            report.error.as_deref(),
            report.execution_time_seconds,
        );
        for attempt in &report.attempts {
            println!(
                "  #{} {}",
                attempt.iteration,
                self.red.apply_to(first_line(&attempt.error_message))
            );
            match (&attempt.report, &attempt.debugger_error) {
                (Some(debug), _) => println!("     Root cause: {}", debug.root_cause),
                (None, Some(err)) => println!("     {}", self.yellow.apply_to(err)),
                (None, None) => {}
            }
        }
        println!(
            "  {} after {} test run(s)",
            self.dim.apply_to(report.outcome.to_string()),
            report.iterations
        );
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
