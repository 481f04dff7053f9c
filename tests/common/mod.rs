#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use serde_json::{Value, json};

use tgs_agent::source::MatchDataSource;

pub fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

pub fn fixture_json(name: &str) -> Value {
    serde_json::from_str(&read_fixture(name)).expect("fixture should be valid json")
}

/// In-memory upstream. Missing rankings or statistics answer like a 404;
/// missing match pages answer with an empty page.
#[derive(Default)]
pub struct ScriptedSource {
    scheduled: Option<Value>,
    details: HashMap<(u64, String), Value>,
    profiles: HashMap<u64, Value>,
    match_pages: HashMap<(u64, u32), Value>,
    rankings: HashMap<u64, Value>,
    year_stats: HashMap<(u64, i32), Value>,
    failing_players: HashSet<u64>,
    failing_pages: HashSet<(u64, u32)>,
    fail_details: bool,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scheduled(mut self, body: Value) -> Self {
        self.scheduled = Some(body);
        self
    }

    pub fn with_detail(mut self, event_id: u64, endpoint: &str, body: Value) -> Self {
        self.details.insert((event_id, endpoint.to_string()), body);
        self
    }

    pub fn with_profile(mut self, player_id: u64, body: Value) -> Self {
        self.profiles.insert(player_id, body);
        self
    }

    pub fn with_match_page(mut self, player_id: u64, page: u32, body: Value) -> Self {
        self.match_pages.insert((player_id, page), body);
        self
    }

    pub fn with_rankings(mut self, player_id: u64, body: Value) -> Self {
        self.rankings.insert(player_id, body);
        self
    }

    pub fn with_year_stats(mut self, player_id: u64, year: i32, body: Value) -> Self {
        self.year_stats.insert((player_id, year), body);
        self
    }

    /// Every per-player endpoint for `player_id` errors.
    pub fn failing_player(mut self, player_id: u64) -> Self {
        self.failing_players.insert(player_id);
        self
    }

    pub fn failing_page(mut self, player_id: u64, page: u32) -> Self {
        self.failing_pages.insert((player_id, page));
        self
    }

    pub fn failing_details(mut self) -> Self {
        self.fail_details = true;
        self
    }

    pub fn calls(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_player(&self, player_id: u64) -> Result<()> {
        if self.failing_players.contains(&player_id) {
            return Err(anyhow!("upstream error for player {player_id}"));
        }
        Ok(())
    }
}

impl MatchDataSource for ScriptedSource {
    fn fetch_scheduled_events(&self, dates: &[String]) -> Result<Value> {
        self.record(format!("scheduled:{}", dates.join(",")));
        self.scheduled
            .clone()
            .ok_or_else(|| anyhow!("schedule unavailable"))
    }

    fn fetch_event_details(&self, event_id: u64, endpoints: &[&str]) -> Result<Vec<Value>> {
        self.record(format!("details:{event_id}"));
        if self.fail_details {
            return Err(anyhow!("details unavailable"));
        }
        Ok(endpoints
            .iter()
            .map(|endpoint| {
                self.details
                    .get(&(event_id, endpoint.to_string()))
                    .cloned()
                    .unwrap_or_else(|| json!({}))
            })
            .collect())
    }

    fn fetch_player_profile(&self, player_id: u64) -> Result<Value> {
        self.record(format!("profile:{player_id}"));
        self.check_player(player_id)?;
        self.profiles
            .get(&player_id)
            .cloned()
            .ok_or_else(|| anyhow!("profile {player_id} not found"))
    }

    fn fetch_player_matches(&self, player_id: u64, page: u32) -> Result<Value> {
        self.record(format!("matches:{player_id}:{page}"));
        self.check_player(player_id)?;
        if self.failing_pages.contains(&(player_id, page)) {
            return Err(anyhow!("page {page} failed"));
        }
        Ok(self
            .match_pages
            .get(&(player_id, page))
            .cloned()
            .unwrap_or_else(|| json!({ "events": [], "hasNextPage": false })))
    }

    fn fetch_rankings(&self, player_id: u64) -> Result<Value> {
        self.record(format!("rankings:{player_id}"));
        self.check_player(player_id)?;
        self.rankings
            .get(&player_id)
            .cloned()
            .ok_or_else(|| anyhow!("rankings {player_id} not found"))
    }

    fn fetch_year_statistics(&self, player_id: u64, year: i32) -> Result<Value> {
        self.record(format!("stats:{player_id}:{year}"));
        self.check_player(player_id)?;
        self.year_stats
            .get(&(player_id, year))
            .cloned()
            .ok_or_else(|| anyhow!("statistics {player_id}/{year} not found"))
    }
}
