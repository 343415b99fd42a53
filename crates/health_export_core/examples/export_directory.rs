use std::sync::Arc;

use health_export_core::config::Config;
use health_export_core::export::Exporter;
use health_export_core::json_source::JsonDirSource;
use health_export_core::{Aggregator, HistoricalHealthData};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Example: expects HEALTH_EXPORT_SOURCE_DIR in env
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("config error: {}", e);
            return Ok(());
        }
    };
    let window = cfg.window();
    let agg = Aggregator::new(Arc::new(JsonDirSource::new(&cfg.source_dir)))
        .with_max_concurrent_fetches(cfg.max_concurrent_fetches);
    let global = agg.fetch_all(window).await;
    let historical = HistoricalHealthData::from_global(&global);

    println!("{}", historical.date_range_label());
    let report = Exporter::new(&cfg.output_dir)
        .export_all(&global, &historical, window)
        .await;
    println!(
        "wrote {} of {} files to {}",
        report.succeeded(),
        report.results.len(),
        cfg.output_dir.display()
    );
    Ok(())
}
