use std::sync::Arc;

use anyhow::{Context, Result, anyhow};

use tgs_agent::config::Settings;
use tgs_agent::logging::init_tracing;
use tgs_agent::service::PredictionService;
use tgs_agent::source::SofascoreSource;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_tracing();

    let event_id = parse_event_id_arg().ok_or_else(|| anyhow!("usage: predict <event-id>"))?;
    let settings = Settings::from_env();
    let source = SofascoreSource::new(&settings.upstream_base_url, settings.upstream_timeout)
        .context("failed to build upstream client")?;
    let service = PredictionService::from_settings(&settings, Arc::new(source));

    match service.trigger(event_id) {
        Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        Err(err) => {
            println!("{}", err.to_json());
            std::process::exit(1);
        }
    }
    Ok(())
}

fn parse_event_id_arg() -> Option<u64> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix("--event=") {
            return raw.trim().parse().ok();
        }
        if arg == "--event"
            && let Some(next) = args.get(idx + 1)
        {
            return next.trim().parse().ok();
        }
    }
    args.first().and_then(|raw| raw.trim().parse().ok())
}
