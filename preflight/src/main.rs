use clap::{Arg, ArgAction, Command};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use preflight::checks::{GpuCheck, MatrixCheck, VerifyxCheck};
use preflight::{run_checks, PreflightCheck};

#[tokio::main]
async fn main() {
    let matches = Command::new("preflight")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Preflight validation checks gating compute nodes into the fleet")
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Enable debug logging and keep native engine output visible")
                .action(ArgAction::SetTrue),
        )
        .get_matches();
    let debug = matches.get_flag("debug");
    setup_logging(debug);

    tracing::debug!("Starting preflight validation checks...");
    let checks: Vec<Box<dyn PreflightCheck + Send + Sync>> = vec![
        Box::new(GpuCheck::new()),
        Box::new(MatrixCheck::new(debug)),
        Box::new(VerifyxCheck::new(debug)),
    ];

    let verdict = run_checks(&checks).await;
    match serde_json::to_string_pretty(&verdict) {
        // Stdout carries exactly one JSON object per run; all logging goes
        // to stderr.
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Failed to serialize verdict: {e}");
            std::process::exit(1);
        }
    }
    std::process::exit(if verdict.passed { 0 } else { 1 });
}

fn setup_logging(debug: bool) {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(level))
        .init();
}
