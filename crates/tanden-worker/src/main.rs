//! Pose overlay worker binary.
//!
//! Usage: `tanden-worker <video.mp4>...`

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tanden_worker::{JobRunner, PoseJobHandler, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing()?;

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    let inputs: Vec<String> = std::env::args().skip(1).collect();
    if inputs.is_empty() {
        anyhow::bail!("usage: tanden-worker <video.mp4>...");
    }

    info!("Starting tanden-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let handler = PoseJobHandler::new(config.pipeline.clone(), config.model.clone());
    let runner = JobRunner::new(handler, config.max_concurrent_jobs);

    let mut handles = Vec::new();
    for input in inputs {
        match runner.submit(&input) {
            Ok(handle) => {
                info!(job_id = %handle.job_id, input = %input, "Job submitted");
                handles.push(handle);
            }
            Err(e) => warn!(input = %input, "Rejected input: {}", e),
        }
    }

    if handles.is_empty() {
        anyhow::bail!("no valid inputs");
    }

    let mut failures = 0usize;
    tokio::select! {
        _ = runner.poll_until_settled(config.poll_interval) => {
            for handle in handles {
                let job_id = handle.job_id.clone();
                match handle.wait().await {
                    Ok(video) => info!(
                        job_id = %job_id,
                        result = %serde_json::to_string(&video).unwrap_or_default(),
                        "Outputs written"
                    ),
                    Err(e) => {
                        failures += 1;
                        error!(job_id = %job_id, "Job failed: {}", e);
                    }
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Received shutdown signal, abandoning running jobs");
        }
    }

    debug!(metrics = %metrics.render(), "Final metrics");
    info!(failures, "Worker shutdown complete");

    if failures > 0 {
        anyhow::bail!("{failures} job(s) failed");
    }
    Ok(())
}

/// Colored output for dev, JSON for production.
fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("tanden=info".parse()?)
        .add_directive("ort=warn".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}
