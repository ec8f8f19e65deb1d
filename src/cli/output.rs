//! CLI output formatting

use crate::{
    core::{RunStatus, StageState},
    execution::{ExecutionEvent, RunResult},
    persistence::RunSummary,
    shell::OutputStream,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Create a progress bar counting finished stages
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a stage state for display
pub fn format_stage_state(state: &StageState) -> String {
    match state {
        StageState::Pending => style("PENDING").dim().to_string(),
        StageState::Running { .. } => style("RUNNING").yellow().to_string(),
        StageState::Succeeded { .. } => style("SUCCEEDED").green().to_string(),
        StageState::Failed { .. } => style("FAILED").red().to_string(),
        StageState::Skipped { .. } => style("SKIPPED").dim().to_string(),
    }
}

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Pending => style("PENDING").dim().to_string(),
        RunStatus::Running => style("RUNNING").yellow().to_string(),
        RunStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Format a stored run for one-line display
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        RunStatus::Succeeded => CHECK,
        RunStatus::Failed => CROSS,
        RunStatus::Running => SPINNER,
        RunStatus::Pending => INFO,
    };

    let failed = summary
        .failed_stage
        .as_ref()
        .map(|s| format!(" at {}", style(s).red()))
        .unwrap_or_default();

    format!(
        "{} {} - {} @ {} - {}{} ({}/{}) - {}",
        status_icon,
        style(short_id(&summary.run_id)).dim(),
        style(&summary.pipeline_name).bold(),
        summary.source_ref,
        format_status(summary.status),
        failed,
        summary.succeeded_stages,
        summary.total_stages,
        style(summary.started_at.format("%Y-%m-%d %H:%M:%S")).dim()
    )
}

/// Per-stage table printed after a run
pub fn format_run_result(result: &RunResult) -> String {
    let mut lines = Vec::new();
    for record in &result.stages {
        let detail = match &record.state {
            StageState::Failed { error, .. } => format!(" - {}", style(error.reason()).dim()),
            StageState::Skipped { reason } => format!(" - {}", style(reason).dim()),
            _ => String::new(),
        };
        lines.push(format!(
            "  {:<24} {}{}",
            record.name,
            format_stage_state(&record.state),
            detail
        ));
        for failure in &record.post_failures {
            lines.push(format!("  {:<24} {} post-action: {}", "", WARN, style(failure).yellow()));
        }
    }
    for (key, value) in &result.outputs {
        lines.push(format!("  {} = {}", style(key).cyan(), value));
    }
    lines.join("\n")
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted {
            run_id,
            pipeline_name,
            source_ref,
            total_stages,
        } => format!(
            "{} Starting {} @ {} ({} stages, run {})",
            ROCKET,
            style(pipeline_name).bold(),
            style(source_ref).cyan(),
            total_stages,
            style(short_id(run_id)).dim()
        ),
        ExecutionEvent::StageStarted { stage, index } => {
            format!("{} [{}] {}", SPINNER, index + 1, style(stage).cyan())
        }
        ExecutionEvent::ActionStarted { command, .. } => {
            format!("    {} {}", style("$").dim(), style(command).dim())
        }
        ExecutionEvent::ActionOutput { stream, line, .. } => match stream {
            OutputStream::Stdout => format!("    {}", line),
            OutputStream::Stderr => format!("    {}", style(line).yellow()),
        },
        ExecutionEvent::StageSucceeded { stage, captured } => match captured {
            Some((key, value)) => format!(
                "{} {} ({} = {})",
                CHECK,
                style(stage).green(),
                style(key).cyan(),
                value
            ),
            None => format!("{} {}", CHECK, style(stage).green()),
        },
        ExecutionEvent::StageFailed { stage, error } => format!(
            "{} {} [{}]: {}",
            CROSS,
            style(stage).red(),
            error.kind_name(),
            style(error.reason()).dim()
        ),
        ExecutionEvent::StageSkipped { stage, reason } => {
            format!("{} {} ({})", SKIP, style(stage).dim(), reason)
        }
        ExecutionEvent::PostActionFailed {
            stage,
            command,
            reason,
        } => format!(
            "{} post-action of {} failed: {} ({})",
            WARN,
            style(stage).yellow(),
            command,
            style(reason).dim()
        ),
        ExecutionEvent::RunCompleted {
            run_id,
            status,
            failed_stage,
        } => {
            let status_str = match (status, failed_stage) {
                (RunStatus::Succeeded, _) => style("succeeded").green().to_string(),
                (_, Some(stage)) => format!("{} at {}", style("failed").red(), style(stage).bold()),
                _ => format_status(*status),
            };
            format!("{} Run {} {}", INFO, style(short_id(run_id)).dim(), status_str)
        }
    }
}

/// Format output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

/// Human-readable duration
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
