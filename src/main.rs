//! tucache CLI entry point

use std::fmt::Write as _;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tucache::cli::Cli;
use tucache::config::CoordinatorConfig;
use tucache::coordinator::{CoordinatorFactory, ParserCoordinator};
use tucache::engine::TreeSitterEngine;
use tucache::events::{JsonLinesSink, ParseEventSink, SinkSet, TracingSink};
use tucache::source::FileSystemSource;
use tucache::task::spawn_parse_file_list;

fn main() -> ExitCode {
    match run() {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn run() -> tucache::Result<String> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => CoordinatorConfig::load(path)?,
        None => CoordinatorConfig::default(),
    };
    init_logging(&cli, &config);

    let locations = cli.locations()?;

    let events: Arc<dyn ParseEventSink> = if cli.events {
        Arc::new(SinkSet::new().with(TracingSink).with(JsonLinesSink::stdout()))
    } else {
        Arc::new(TracingSink)
    };
    let coordinator = Arc::new(CoordinatorFactory::new().create(
        TreeSitterEngine::new(),
        Arc::new(FileSystemSource),
        events,
    )?);

    config.apply(&coordinator);
    coordinator.add_include_paths(&cli.include);
    coordinator.add_project_include_paths(&cli.project_include);
    coordinator.add_project_files(&cli.files);

    let mut output = String::new();
    if !coordinator.enabled() {
        output.push_str("Parsing disabled by configuration\n");
        return Ok(output);
    }

    let start = Instant::now();
    if let Some(task) = spawn_parse_file_list(&coordinator, true) {
        if !task.join() {
            tracing::warn!("Parse task panicked");
        }
    }
    coordinator.wait_idle();
    let elapsed = start.elapsed();

    write_summary(&mut output, &coordinator, elapsed.as_millis());

    for location in &locations {
        let kind = coordinator.statement_kind_at(&location.file, location.line, location.column);
        let _ = writeln!(output, "{} {}", location, kind);
    }

    Ok(output)
}

fn init_logging(cli: &Cli, config: &CoordinatorConfig) {
    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = match format!("tucache={}", level).parse() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => EnvFilter::from_default_env(),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn write_summary(output: &mut String, coordinator: &ParserCoordinator<TreeSitterEngine>, millis: u128) {
    let project = coordinator.project_files();
    let cached = coordinator.cached_files();
    let _ = writeln!(
        output,
        "Parsed {} of {} files in {}ms ({})",
        cached.len(),
        project.len(),
        millis,
        coordinator.serial_id()
    );

    for file in &project {
        match coordinator.unit(file) {
            Some(unit) => {
                let status = if unit.has_errors() { "syntax errors" } else { "ok" };
                let _ = writeln!(
                    output,
                    "  {} [{}] {} includes, {}",
                    file.display(),
                    unit.lang().name(),
                    unit.includes().len(),
                    status
                );
            }
            None => {
                let _ = writeln!(output, "  {} failed", file.display());
            }
        }
    }
}
