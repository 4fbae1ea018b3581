//! `vdalink` – command line front end of the vdalink protocol core.
//!
//! ```text
//! vdalink replay <scenario.json>   replay a recorded scenario, print outbound messages
//! vdalink init                     write a default ~/.vdalink/config.toml
//! vdalink schema                   print JSON schemas of the outbound messages
//! ```
//!
//! Outbound messages go to stdout as JSON lines; the summary goes to stderr.

mod config;
mod scenario;

use std::process::ExitCode;

use colored::Colorize;
use tracing::warn;
use vdalink_middleware::CommandReport;
use vdalink_types::{InstantActions, Order};

fn main() -> ExitCode {
    // Tracing comes first; the Tokio runtime is only built for `replay`.
    let _guard = vdalink_runtime::init_tracing("vdalink");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        Some("replay") => match args.get(1) {
            Some(path) => run_replay(path),
            None => Err("usage: vdalink replay <scenario.json>".to_string()),
        },
        Some("init") => run_init(),
        Some("schema") => print_schemas(),
        _ => {
            print_usage();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn load_config() -> config::Config {
    match config::load() {
        Ok(Some(cfg)) => cfg,
        Ok(None) => {
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            warn!(error = %e, "config unreadable, using defaults");
            config::Config::default()
        }
    }
}

fn run_replay(path: &str) -> Result<(), String> {
    let cfg = load_config();
    let raw = std::fs::read_to_string(path).map_err(|e| format!("Failed to read {path}: {e}"))?;
    let scenario = scenario::Scenario::from_json(&raw).map_err(|e| e.to_string())?;

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start Tokio runtime: {e}"))?;
    let report = runtime
        .block_on(scenario::replay(scenario, &cfg))
        .map_err(|e| e.to_string())?;

    for message in &report.outbound {
        let line = serde_json::to_string(message).map_err(|e| e.to_string())?;
        println!("{line}");
    }

    eprintln!();
    eprintln!("  {} {}", "Vehicle".bold(), cfg.vehicle_name.cyan());
    eprintln!("  Messages sent      : {}", report.outbound.len());
    eprintln!("  Commands completed : {}", report.completed_commands().to_string().green());
    for entry in &report.reports {
        if let CommandReport::Rejected { order_id, errors, .. } = entry {
            eprintln!(
                "  {} {} ({} error(s))",
                "Rejected".red().bold(),
                order_id,
                errors.len()
            );
        }
    }
    eprintln!(
        "  Position           : {}",
        report.position.as_deref().unwrap_or("<unknown>")
    );
    eprintln!("  Status             : {:?}", report.status);
    if report.pending_requests > 0 || report.tracked_orders > 0 {
        eprintln!(
            "  {} {} request(s) pending, {} order(s) not yet driven",
            "Unfinished:".yellow(),
            report.pending_requests,
            report.tracked_orders
        );
    }
    Ok(())
}

fn run_init() -> Result<(), String> {
    let path = config::config_path();
    if path.exists() {
        return Err(format!("{} already exists", path.display()));
    }
    config::save(&config::Config::default())?;
    eprintln!("  {} Config saved to {}", "✓".green().bold(), path.display());
    Ok(())
}

fn print_schemas() -> Result<(), String> {
    let schemas = [
        ("order", serde_json::to_string_pretty(&schemars::schema_for!(Order))),
        (
            "instantActions",
            serde_json::to_string_pretty(&schemars::schema_for!(InstantActions)),
        ),
    ];
    for (topic, schema) in schemas {
        let schema = schema.map_err(|e| format!("Failed to render {topic} schema: {e}"))?;
        println!("// {topic}");
        println!("{schema}");
    }
    Ok(())
}

fn print_usage() {
    eprintln!("{}", "vdalink – VDA5050 vehicle protocol core".bold().cyan());
    eprintln!();
    eprintln!("  vdalink replay <scenario.json>   replay a recorded scenario");
    eprintln!("  vdalink init                     write a default config to {}", config::config_path().display());
    eprintln!("  vdalink schema                   print outbound JSON schemas");
}
