use anyhow::{Result, anyhow};
use serde_json::json;

use tgs_agent::config::Settings;
use tgs_agent::logging::init_tracing;
use tgs_agent::pred_store::PredictionStore;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_tracing();

    let event_id = std::env::args()
        .nth(1)
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .ok_or_else(|| anyhow!("usage: show_prediction <event-id>"))?;

    // Reads the store only; no upstream client is needed.
    let settings = Settings::from_env();
    let store = PredictionStore::new(settings.store);
    let today = chrono::Local::now().date_naive();
    match store.get_recent(today, event_id) {
        Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        None => {
            println!("{}", json!({ "error": format!("no prediction stored for event {event_id}") }));
            std::process::exit(1);
        }
    }
    Ok(())
}
