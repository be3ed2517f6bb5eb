use bugtracker_flows::{Config, RunReport, Runner};
use clap::Parser;
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "bugtracker-flows")]
#[command(about = "Scripted UI flows against the BugTracker Pro board")]
#[command(version)]
struct Cli {
    /// Config file (defaults are used when omitted)
    config: Option<PathBuf>,

    /// Base URL of the application (overrides config)
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Run in headless mode (overrides config)
    #[arg(long)]
    headless: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Validate config without running
    #[arg(long)]
    check: bool,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> bugtracker_flows::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    let mut config = match cli.config {
        Some(ref path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(base_url) = cli.base_url {
        config = config.with_base_url(base_url)?;
    }

    if cli.check {
        println!("Config valid: {}", config.name);
        println!("  Base URL: {}", config.base_url);
        println!(
            "  Waits: short {}ms, default {}ms, long {}ms (poll {}ms)",
            config.waits.short_ms, config.waits.default_ms, config.waits.long_ms, config.waits.poll_ms
        );
        println!("  Click attempts: {}", config.retry.click_attempts);
        println!("  Overlay: {}", config.overlay.title);
        println!(
            "  Drag: {} {} -> {}",
            config.flows.drag.ticket, config.flows.drag.source_column, config.flows.drag.target_column
        );
        println!(
            "  Edit: {} (status {}, assignee {}, deadline {})",
            config.flows.edit.ticket,
            config.flows.edit.status,
            config.flows.edit.assignee,
            config.flows.edit.deadline
        );
        return Ok(());
    }

    if cli.headless {
        config.browser.headless = true;
    }

    if !cli.json {
        println!("Running: {}", config.name);
    }

    let runner = Runner::new(&config).await?;
    let report = runner.run(&config).await;

    let rendered = render_report(&report, cli.json);
    emit_then_close(&mut std::io::stdout(), &rendered, runner.close()).await?;

    if !report.success() {
        std::process::exit(1);
    }

    Ok(())
}

/// Write the report, then tear the session down. A teardown error is only
/// logged so it cannot hide the results.
async fn emit_then_close<W, F>(out: &mut W, rendered: &str, close: F) -> std::io::Result<()>
where
    W: Write,
    F: Future<Output = bugtracker_flows::Result<()>>,
{
    writeln!(out, "{}", rendered)?;
    out.flush()?;
    if let Err(e) = close.await {
        warn!("Failed to close browser: {}", e);
    }
    Ok(())
}

fn render_report(report: &RunReport, json: bool) -> String {
    if json {
        return serde_json::to_string_pretty(report)
            .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize report: {}\"}}", e));
    }

    let mut lines = vec![String::new()];
    for outcome in &report.outcomes {
        match outcome.record {
            Some(ref record) => lines.push(format!("{}: {}", outcome.flow.label(), record)),
            None => lines.push(format!("{}: failed", outcome.flow.label())),
        }
    }
    for flow in &report.skipped {
        lines.push(format!("{}: skipped", flow.label()));
    }

    lines.push(String::new());
    if report.success() {
        lines.push("✓ Success".into());
    } else {
        lines.push("✗ Failed".into());
        if let Some(error) = report.first_error() {
            lines.push(format!("  Error: {}", error));
        }
    }
    let recoveries: u32 = report.outcomes.iter().map(|o| o.recoveries).sum();
    lines.push(format!("  Duration: {}ms", report.duration_ms));
    if recoveries > 0 {
        lines.push(format!("  Recoveries: {}", recoveries));
    }
    lines.join("\n")
}
