use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::{Datelike, Local, NaiveDate};
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::PipelineConfig;
use crate::model::{
    EventInfo, MatchContext, MatchEvent, PlayerSnapshot, PreMatchBundle, RankingEntry,
    YearlyStatRecord, parse_events, parse_h2h, parse_odds_board, parse_rankings,
    parse_votes, parse_year_statistics,
};
use crate::source::MatchDataSource;
use crate::ttl_cache::CacheSpaces;

const CONTEXT_ENDPOINTS: &[&str] = &["votes", "odds/1/all", "h2h"];

pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Builds pre-match bundles from the upstream source, reading through the cache spaces.
///
/// Every sub-fetch is isolated: a failure is logged and replaced by an empty
/// value. The only hard failure is an event id that cannot be resolved.
pub struct Aggregator {
    source: Arc<dyn MatchDataSource>,
    caches: CacheSpaces,
    pool: Option<rayon::ThreadPool>,
    config: PipelineConfig,
}

impl Aggregator {
    pub fn new(
        source: Arc<dyn MatchDataSource>,
        config: PipelineConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.fetch_parallelism.max(1))
            .thread_name(|i| format!("tgs-fetch-{i}"))
            .build()
            .ok();
        Self {
            source,
            caches: CacheSpaces::new(config.cache_ttls, clock),
            pool,
            config,
        }
    }

    pub fn caches(&self) -> &CacheSpaces {
        &self.caches
    }

    pub fn scheduled_events(&self, dates: &[String]) -> Result<Vec<MatchEvent>> {
        let body = self.source.fetch_scheduled_events(dates)?;
        Ok(parse_events(&body))
    }

    pub fn aggregate(&self, event_id: u64) -> Option<PreMatchBundle> {
        let now = Local::now();
        self.aggregate_on(event_id, now.date_naive(), now.year())
    }

    pub fn aggregate_on(
        &self,
        event_id: u64,
        today: NaiveDate,
        current_year: i32,
    ) -> Option<PreMatchBundle> {
        let info = self.resolve_event(event_id, today)?;
        Some(self.pre_match_bundle(&info, current_year))
    }

    /// Looks the event up in today's and yesterday's schedules.
    pub fn resolve_event(&self, event_id: u64, today: NaiveDate) -> Option<EventInfo> {
        if let Some(info) = self.caches.event_details.get(&event_id) {
            return Some(info);
        }

        let mut dates = vec![date_key(today)];
        if let Some(yesterday) = today.pred_opt() {
            dates.push(date_key(yesterday));
        }
        let events = match self.scheduled_events(&dates) {
            Ok(events) => events,
            Err(err) => {
                warn!(event_id, error = %err, "scheduled events unavailable while resolving event");
                return None;
            }
        };
        let event = events.into_iter().find(|e| e.id == event_id)?;
        if event.home.id == 0 || event.away.id == 0 {
            return None;
        }

        let mut info = EventInfo {
            event_id,
            home_id: event.home.id,
            away_id: event.away.id,
            home_name: event.home.name,
            away_name: event.away.name,
            ground_type: event.ground_type,
            start_timestamp: event.start_timestamp,
        };
        if info.home_name.trim().is_empty() {
            info.home_name = self.profile_name(info.home_id).unwrap_or_default();
        }
        if info.away_name.trim().is_empty() {
            info.away_name = self.profile_name(info.away_id).unwrap_or_default();
        }

        // Misses are not cached: a freshly listed event should resolve on the next call.
        self.caches.event_details.insert(event_id, info.clone());
        Some(info)
    }

    pub fn pre_match_bundle(&self, info: &EventInfo, current_year: i32) -> PreMatchBundle {
        let key = (info.event_id, info.home_id, info.away_id);
        self.caches
            .pre_match
            .get_or_fetch(key, || self.build_bundle(info, current_year))
    }

    fn build_bundle(&self, info: &EventInfo, current_year: i32) -> PreMatchBundle {
        let started = Instant::now();
        let years: Vec<i32> = (0..self.config.stats_years)
            .map(|back| current_year - back)
            .collect();
        let (home_id, away_id, event_id) = (info.home_id, info.away_id, info.event_id);

        let mut home_rankings = Vec::new();
        let mut away_rankings = Vec::new();
        let mut home_matches = Vec::new();
        let mut away_matches = Vec::new();
        let mut home_stats = Vec::new();
        let mut away_stats = Vec::new();
        let mut context = MatchContext::default();

        self.with_pool(|| {
            rayon::scope(|s| {
                s.spawn(|_| {
                    home_rankings = or_empty(self.player_rankings(home_id), "rankings", home_id)
                });
                s.spawn(|_| {
                    away_rankings = or_empty(self.player_rankings(away_id), "rankings", away_id)
                });
                s.spawn(|_| {
                    home_matches = or_empty(self.player_matches(home_id), "matches", home_id)
                });
                s.spawn(|_| {
                    away_matches = or_empty(self.player_matches(away_id), "matches", away_id)
                });
                s.spawn(|_| home_stats = self.player_yearly_stats(home_id, &years));
                s.spawn(|_| away_stats = self.player_yearly_stats(away_id, &years));
                s.spawn(|_| context = or_empty(self.match_context(event_id), "context", event_id));
            })
        });

        debug!(
            event_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            home_matches = home_matches.len(),
            away_matches = away_matches.len(),
            "pre-match bundle built"
        );

        PreMatchBundle {
            event: info.clone(),
            home: PlayerSnapshot {
                player_id: home_id,
                rankings: home_rankings,
                matches: home_matches,
                yearly_stats: home_stats,
            },
            away: PlayerSnapshot {
                player_id: away_id,
                rankings: away_rankings,
                matches: away_matches,
                yearly_stats: away_stats,
            },
            context,
        }
    }

    pub fn player_rankings(&self, player_id: u64) -> Result<Vec<RankingEntry>> {
        self.caches.rankings.get_or_try_fetch(player_id, || {
            let body = self.source.fetch_rankings(player_id)?;
            parse_rankings(&body).ok_or_else(|| anyhow::anyhow!("rankings unavailable"))
        })
    }

    /// Full history, newest first, one entry per event id.
    pub fn player_matches(&self, player_id: u64) -> Result<Vec<MatchEvent>> {
        self.caches
            .matches
            .get_or_try_fetch(player_id, || self.fetch_match_history(player_id))
    }

    fn fetch_match_history(&self, player_id: u64) -> Result<Vec<MatchEvent>> {
        let max_pages = self.config.max_match_pages;
        let mut seen = HashSet::new();
        let mut all = Vec::new();
        let mut page = 0u32;
        loop {
            let body = match self.source.fetch_player_matches(player_id, page) {
                Ok(body) => body,
                Err(err) if page == 0 => return Err(err),
                Err(err) => {
                    warn!(player_id, page, error = %err, "match history page failed; keeping earlier pages");
                    break;
                }
            };
            let events = parse_events(&body);
            if events.is_empty() {
                break;
            }
            let before = all.len();
            for event in events {
                if seen.insert(event.id) {
                    all.push(event);
                }
            }
            if all.len() == before {
                break;
            }
            let has_next = body
                .get("hasNextPage")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if !has_next {
                break;
            }
            page += 1;
            if max_pages > 0 && page >= max_pages {
                break;
            }
        }
        all.sort_by(|a, b| b.start_timestamp.cmp(&a.start_timestamp));
        Ok(all)
    }

    /// Concatenated in `years` order. A failed year contributes nothing.
    pub fn player_yearly_stats(&self, player_id: u64, years: &[i32]) -> Vec<YearlyStatRecord> {
        let per_year: Vec<Vec<YearlyStatRecord>> = years
            .par_iter()
            .map(|year| {
                let fetched = self.caches.year_stats.get_or_try_fetch((player_id, *year), || {
                    let body = self.source.fetch_year_statistics(player_id, *year)?;
                    parse_year_statistics(&body, *year)
                        .ok_or_else(|| anyhow::anyhow!("statistics missing"))
                });
                or_empty(fetched, "year statistics", player_id)
            })
            .collect();
        per_year.into_iter().flatten().collect()
    }

    pub fn match_context(&self, event_id: u64) -> Result<MatchContext> {
        let docs = self.source.fetch_event_details(event_id, CONTEXT_ENDPOINTS)?;
        Ok(MatchContext {
            votes: docs.first().and_then(parse_votes),
            odds: docs.get(1).and_then(parse_odds_board),
            h2h: docs.get(2).and_then(parse_h2h),
        })
    }

    fn profile_name(&self, player_id: u64) -> Option<String> {
        let body = match self.source.fetch_player_profile(player_id) {
            Ok(body) => body,
            Err(err) => {
                warn!(player_id, error = %err, "player profile fetch failed");
                return None;
            }
        };
        let team = body.get("team").unwrap_or(&body);
        team.get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
    }

    fn with_pool<T>(&self, action: impl FnOnce() -> T + Send) -> T
    where
        T: Send,
    {
        if let Some(pool) = self.pool.as_ref() {
            pool.install(action)
        } else {
            action()
        }
    }
}

fn or_empty<T: Default>(result: Result<T>, what: &str, id: u64) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            warn!(id, what, error = %err, "sub-fetch failed; using empty value");
            T::default()
        }
    }
}
