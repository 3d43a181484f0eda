use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use otel_runtime::trace::{self, KeyValue, LogConfig, TraceConfig, TraceError};
use tracing::{error, info};

/// Emit probe spans through the configured trace pipeline.
#[derive(Debug, Parser)]
#[command(name = "trace-probe", version, about)]
struct Args {
    /// JSON file with a `runtime.trace` section. Environment variables are
    /// applied on top.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Name of the top-level probe spans
    #[arg(long, default_value = "probe")]
    span_name: String,

    /// Number of top-level spans to emit
    #[arg(long, default_value_t = 1)]
    count: u32,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "trace-probe failed");
            eprintln!("trace-probe: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), TraceError> {
    let config = load_config(args.config.as_deref())?;
    let flush_on_exit = config.flush_on_exit;

    trace::init_with_config(&config)?;
    trace::init_logging(&LogConfig::from_env())?;
    info!(state = ?trace::state(), "Tracing configured");

    let tracer = trace::get_tracer("trace-probe");
    for iteration in 0..args.count {
        let mut probe = tracer.start_as_current_span(args.span_name.clone());
        probe.set_attribute(KeyValue::new("probe.iteration", i64::from(iteration)));

        tracer.in_span("probe.child", |child| {
            child.add_event("tick", vec![KeyValue::new("probe.iteration", i64::from(iteration))]);
        });
        info!(iteration, "Probe span emitted");
    }

    // With flush_on_exit the exit hook delivers what is still buffered.
    if !flush_on_exit {
        trace::force_flush()?;
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<TraceConfig, TraceError> {
    let config = match path {
        Some(path) => {
            let raw = fs::read_to_string(path).map_err(|e| {
                TraceError::Config(format!("failed to read {}: {e}", path.display()))
            })?;
            let root: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
                TraceError::Config(format!("{} is not valid JSON: {e}", path.display()))
            })?;
            TraceConfig::from_value(&root)?
        }
        None => TraceConfig::default(),
    };

    config.with_env_overrides()
}
