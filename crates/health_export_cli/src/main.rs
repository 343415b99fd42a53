use health_export_cli::CliError;
use health_export_core::config::Config;
use metrics_exporter_prometheus::PrometheusBuilder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configure logging from `HEALTH_EXPORT_LOG_LEVEL` (or fallback to `RUST_LOG`, default `info`).
    let log_env = health_export_cli::log_filter_from(|k| std::env::var(k).ok());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&log_env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(health_export_cli::DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    tracing::info!(%log_env, "health-export: log filter");

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| CliError::Metrics(e.to_string()))?;

    let config = Config::from_env().map_err(CliError::from)?;
    let outcome = health_export_cli::run_export(&config).await?;

    tracing::info!(
        export_id = %outcome.export_id,
        records = outcome.stats.total_records,
        record_types = outcome.stats.total_record_types,
        written = outcome.report.succeeded(),
        date_range = %outcome.date_range,
        "health-export: done"
    );

    if let Some(path) = &config.metrics_file {
        if let Err(e) = health_export_cli::write_metrics(path, &handle.render()).await {
            tracing::warn!(path = %path.display(), error = %e, "could not write metrics file");
        }
    }

    if !outcome.report.is_complete() {
        tracing::warn!(
            failed = outcome.report.failed().len(),
            "health-export: export incomplete"
        );
    }
    Ok(())
}
