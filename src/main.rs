use std::error::Error;

use groundwater_hpi::{
    BatchSummary, JsonModelProvider, ModelProvider, Orchestrator, ProviderConfig, Sample,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Optional first argument: directory holding the exported models.
    let config = match std::env::args().nth(1) {
        Some(dir) => ProviderConfig::default().with_models_dir(dir),
        None => ProviderConfig::default(),
    };
    let provider = JsonModelProvider::new(config);
    let orchestrator = Orchestrator::formula_only()
        .with_enhanced(provider.enhanced_registry().await)
        .with_standard(provider.standard_registry().await);

    // Concentrations in ppm: lead, arsenic, cadmium, chromium, copper, iron, zinc.
    let samples = vec![
        Sample::new("GW-NORTH-01", 28.61, 77.21, [0.004, 0.002, 0.001, 0.01, 0.3, 0.2, 0.8]),
        Sample::new("GW-MILL-02", 28.66, 77.23, [0.05, 0.01, 0.003, 0.05, 2.0, 0.3, 3.0]),
        Sample::new("GW-TANNERY-03", 28.70, 77.10, [0.03, 0.03, 0.009, 0.15, 6.0, 0.9, 9.0]),
        Sample::new("GW-WELL-04", 28.52, 77.30, [0.012, 0.0, 0.0, 0.02, 0.1, 0.0, 0.2]),
    ];

    let mut valid = Vec::with_capacity(samples.len());
    for sample in samples {
        match sample.validate() {
            Ok(()) => valid.push(sample),
            Err(err) => tracing::warn!(sample_id = %sample.sample_id, error = %err, "sample rejected"),
        }
    }

    let results = orchestrator.calculate_batch(valid).await;

    println!("sample_id,hpi,hei,cd,ef,safety_level,ml");
    for r in &results {
        let ef = r.ef.map_or_else(|| "n/a".to_string(), |ef| format!("{ef:.3}"));
        println!(
            "{},{:.2},{:.3},{:.3},{},{},{}",
            r.sample_id, r.hpi, r.hei, r.cd, ef, r.safety_level, r.is_ml_analysis
        );
        for rec in &r.recommendations {
            println!("  - {rec}");
        }
    }

    let summary = BatchSummary::from_results(&results);
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
