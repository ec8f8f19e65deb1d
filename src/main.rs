use anyhow::{Context, Result};
use stagerun::cli::commands::{HistoryCommand, ListCommand, RunCommand, ServeCommand, ValidateCommand};
use stagerun::cli::output::*;
use stagerun::cli::{Cli, Command};
use stagerun::core::config::PipelineConfig;
use stagerun::core::RunConfig;
use stagerun::execution::{CommandNotifier, ExecutionEngine, ExecutionEvent, LogNotifier};
use stagerun::persistence::{
    record_run, InMemoryPersistence, PersistenceBackend, RunStatus, RunSummary, SqliteRunStore,
};
use stagerun::shell::ShellRunner;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd, cli.stream).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::List(cmd) => list_pipelines(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
        Command::Serve(cmd) => serve(cmd).await?,
    }

    Ok(())
}

async fn run_pipeline(cmd: &RunCommand, stream: bool) -> Result<()> {
    // Load pipeline config
    let mut config = PipelineConfig::load(&cmd.file)
        .with_context(|| format!("Failed to load pipeline config {}", cmd.file))?;

    // Apply variable overrides before validating so they can satisfy references
    config.apply_overrides(&cmd.var);
    for (key, value) in &cmd.var {
        println!(
            "{} Variable override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }
    config.validate().context("Invalid pipeline config")?;

    println!("{} Loaded pipeline: {}", INFO, style(&config.name).bold());
    let pipeline = config.to_pipeline();

    let mut builder = RunConfig::builder(&pipeline).keep_workspace(cmd.keep_workspace);
    if let Some(source_ref) = &cmd.source_ref {
        builder = builder.source_ref(source_ref);
    }
    if let Some(root) = &cmd.workspace_root {
        builder = builder.workspace_root(root);
    }
    let run_config = builder.build().context("Failed to prepare run")?;

    // Set up persistence
    let store: Arc<dyn PersistenceBackend> = if cmd.no_history {
        Arc::new(InMemoryPersistence::new())
    } else {
        Arc::new(SqliteRunStore::with_default_path().await?)
    };

    let runner = ShellRunner::default();
    let mut engine = ExecutionEngine::new(runner.clone()).with_notifier(Arc::new(LogNotifier));
    if !pipeline.notifications.is_empty() {
        engine = engine.with_notifier(Arc::new(CommandNotifier::new(
            runner,
            pipeline.notifications.clone(),
        )));
    }

    // Console output: events are printed above the stage progress bar
    let progress = create_progress_bar(pipeline.stages.len());
    let bar = progress.clone();
    engine.add_event_handler(move |event| {
        if matches!(event, ExecutionEvent::ActionOutput { .. }) && !stream {
            return;
        }
        let line = format_execution_event(&event);
        bar.suspend(|| println!("{}", line));

        match &event {
            ExecutionEvent::StageStarted { stage, .. } => bar.set_message(stage.clone()),
            ExecutionEvent::StageSucceeded { .. }
            | ExecutionEvent::StageFailed { .. }
            | ExecutionEvent::StageSkipped { .. } => bar.inc(1),
            ExecutionEvent::RunCompleted { .. } => bar.finish_and_clear(),
            _ => {}
        }
    });

    println!();
    let result = engine.run(&pipeline, &run_config).await;
    progress.finish_and_clear();

    println!("\n{}", format_run_result(&result));

    // Save to history; with --no-history the store only lives for this process
    let summary = record_run(store.as_ref(), &result).await?;
    if !cmd.no_history {
        println!(
            "\n{} Run saved to history (ID: {})",
            INFO,
            style(&summary.run_id.to_string()[..8]).dim()
        );
    }

    // Print final status
    if result.is_success() {
        println!(
            "\n{} {} completed {}",
            CHECK,
            style(&pipeline.name).bold(),
            style("successfully").green()
        );
    } else {
        println!(
            "\n{} {} {} at stage {}",
            CROSS,
            style(&pipeline.name).bold(),
            style("failed").red(),
            style(result.failed_stage.as_deref().unwrap_or("?")).bold()
        );
        if let Some(error) = &result.error {
            println!("  {}", style(error).red());
        }
        std::process::exit(1);
    }

    Ok(())
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => {
            let pipeline = config.to_pipeline();
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Stages: {}", style(pipeline.stages.len()).cyan());
            for stage in &pipeline.stages {
                println!(
                    "    {} {} ({} actions)",
                    style(stage.kind.as_str()).dim(),
                    stage.name,
                    stage.actions.len()
                );
            }
            println!("  Variables: {}", style(pipeline.variables.len()).cyan());

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    }
}

async fn list_pipelines(cmd: &ListCommand) -> Result<()> {
    let store = SqliteRunStore::with_default_path().await?;
    let pipelines = store.list_pipelines().await?;

    if pipelines.is_empty() {
        println!("{} No pipelines found in history", INFO);
        return Ok(());
    }

    let mut json_data = Vec::new();
    if !cmd.json {
        println!("{} Pipelines in history:", INFO);
    }

    for pipeline_name in &pipelines {
        let runs = store.list_runs(pipeline_name).await?;
        let succeeded = runs.iter().filter(|r| r.status == RunStatus::Succeeded).count();
        let failed = runs.iter().filter(|r| r.status == RunStatus::Failed).count();

        if cmd.json {
            json_data.push(serde_json::json!({
                "name": pipeline_name,
                "run_count": runs.len(),
                "succeeded": succeeded,
                "failed": failed,
            }));
        } else if cmd.with_counts {
            println!(
                "  {} ({} runs: {} succeeded, {} failed)",
                style(pipeline_name).bold(),
                style(runs.len()).cyan(),
                style(succeeded).green(),
                style(failed).red()
            );
        } else {
            println!("  {}", style(pipeline_name).bold());
        }
    }

    if cmd.json {
        let data = serde_json::json!({ "pipelines": json_data });
        println!("{}", serde_json::to_string_pretty(&data)?);
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = SqliteRunStore::with_default_path().await?;

    // If a specific run is requested
    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(summary) if cmd.json => println!("{}", serde_json::to_string_pretty(&summary)?),
            Some(summary) => print_run_details(&summary, cmd.verbose)?,
            None => println!("{} Run not found", WARN),
        }
        return Ok(());
    }

    // List runs for one pipeline or all of them
    let mut runs = if let Some(pipeline_name) = &cmd.pipeline {
        store.list_runs(pipeline_name).await?
    } else {
        let mut all_runs = Vec::new();
        for pipeline in store.list_pipelines().await? {
            all_runs.extend(store.list_runs(&pipeline).await?);
        }
        all_runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all_runs
    };
    runs.truncate(cmd.limit);

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, cmd.limit);
    for summary in &runs {
        println!("  {}", format_run_summary(summary));
    }

    Ok(())
}

fn print_run_details(summary: &RunSummary, verbose: bool) -> Result<()> {
    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    println!("  Source ref: {}", summary.source_ref);
    println!("  Status: {}", format_status(summary.status));
    if let Some(stage) = &summary.failed_stage {
        println!(
            "  Failed stage: {} ({})",
            style(stage).red(),
            summary.error_kind.as_deref().unwrap_or("unknown")
        );
    }
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Progress: {} ({}/{})",
        style(format!("{:.0}%", summary.progress() * 100.0)).cyan(),
        summary.succeeded_stages,
        summary.total_stages
    );
    for stage in &summary.stages {
        match &stage.detail {
            Some(detail) => println!("    {:<24} {} - {}", stage.name, stage.state, style(detail).dim()),
            None => println!("    {:<24} {}", stage.name, stage.state),
        }
    }
    for (key, value) in &summary.outputs {
        println!("  {} = {}", style(key).cyan(), value);
    }

    if verbose {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(summary)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}

async fn serve(cmd: &ServeCommand) -> Result<()> {
    let addr = format!("{}:{}", cmd.host, cmd.port);
    println!("{} Serving /hello on {}", ROCKET, style(&addr).bold());
    stagerun::service::serve(&addr).await
}
