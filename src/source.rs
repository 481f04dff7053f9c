use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::warn;

use crate::http_client::http_client;

pub const DEFAULT_BASE_URL: &str = "https://api.sofascore.com/api/v1";

/// Upstream provider of semi-structured match data.
///
/// Implementations may be slow and may fail; every call is an idempotent read.
pub trait MatchDataSource: Send + Sync {
    /// `{ "events": [...] }` across all requested `YYYY-MM-DD` dates.
    fn fetch_scheduled_events(&self, dates: &[String]) -> Result<Value>;

    /// One document per endpoint, in request order. A failed endpoint yields an empty object.
    fn fetch_event_details(&self, event_id: u64, endpoints: &[&str]) -> Result<Vec<Value>>;

    fn fetch_player_profile(&self, player_id: u64) -> Result<Value>;

    /// `{ "events": [...], "hasNextPage": bool }`
    fn fetch_player_matches(&self, player_id: u64, page: u32) -> Result<Value>;

    /// `{ "rankings": [...] }` or `{ "error": "..." }`
    fn fetch_rankings(&self, player_id: u64) -> Result<Value>;

    /// `{ "statistics": [...] }`
    fn fetch_year_statistics(&self, player_id: u64, year: i32) -> Result<Value>;
}

/// Plain JSON client for the public SofaScore tennis endpoints.
pub struct SofascoreSource {
    client: &'static Client,
    base_url: String,
}

impl SofascoreSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get_json(&self, path: &str) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let resp = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .with_context(|| format!("request failed: {url}"))?;
        let status = resp.status();
        let body = resp.text().context("failed reading body")?;
        if !status.is_success() {
            return Err(anyhow::anyhow!("http {status} for {url}"));
        }
        parse_body(&body).with_context(|| format!("invalid json from {url}"))
    }
}

impl MatchDataSource for SofascoreSource {
    fn fetch_scheduled_events(&self, dates: &[String]) -> Result<Value> {
        let mut events = Vec::new();
        let mut last_err = None;
        for date in dates {
            match self.get_json(&format!("sport/tennis/scheduled-events/{date}")) {
                Ok(mut body) => {
                    if let Some(Value::Array(items)) = body.get_mut("events").map(Value::take) {
                        events.extend(items);
                    }
                }
                Err(err) => {
                    warn!(%date, error = %err, "scheduled events fetch failed");
                    last_err = Some(err);
                }
            }
        }
        // Only fail when nothing at all came back.
        if events.is_empty() {
            if let Some(err) = last_err {
                return Err(err);
            }
        }
        Ok(serde_json::json!({ "events": events }))
    }

    fn fetch_event_details(&self, event_id: u64, endpoints: &[&str]) -> Result<Vec<Value>> {
        Ok(endpoints
            .iter()
            .map(|endpoint| {
                self.get_json(&format!("event/{event_id}/{endpoint}"))
                    .unwrap_or_else(|err| {
                        warn!(event_id, endpoint, error = %err, "event detail endpoint failed");
                        Value::Object(Default::default())
                    })
            })
            .collect())
    }

    fn fetch_player_profile(&self, player_id: u64) -> Result<Value> {
        self.get_json(&format!("team/{player_id}"))
    }

    fn fetch_player_matches(&self, player_id: u64, page: u32) -> Result<Value> {
        self.get_json(&format!("team/{player_id}/events/last/{page}"))
    }

    fn fetch_rankings(&self, player_id: u64) -> Result<Value> {
        self.get_json(&format!("team/{player_id}/rankings"))
    }

    fn fetch_year_statistics(&self, player_id: u64, year: i32) -> Result<Value> {
        self.get_json(&format!("team/{player_id}/year-statistics/{year}"))
    }
}

fn parse_body(raw: &str) -> Result<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(trimmed).context("invalid json")
}
