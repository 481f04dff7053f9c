use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use tracing::info;

use tgs_agent::agent::Agent;
use tgs_agent::config::Settings;
use tgs_agent::logging::init_tracing;
use tgs_agent::service::PredictionService;
use tgs_agent::source::SofascoreSource;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_tracing();

    let settings = Settings::from_env();
    let source = SofascoreSource::new(&settings.upstream_base_url, settings.upstream_timeout)
        .context("failed to build upstream client")?;
    let service = Arc::new(PredictionService::from_settings(&settings, Arc::new(source)));
    info!(
        store = %service.store().dir().display(),
        upstream = %settings.upstream_base_url,
        "prediction service ready"
    );

    let agent = Agent::new(service, settings.agent.clone());
    if std::env::args().skip(1).any(|arg| arg == "--once") {
        let report = agent.run_cycle()?;
        println!(
            "listed={} due={} stored={} failed={}",
            report.listed, report.due, report.stored, report.failed
        );
        return Ok(());
    }

    let shutdown = AtomicBool::new(false);
    agent.run(&shutdown);
    Ok(())
}
