use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use tracing::{debug, error, info, warn};

use crate::config::AgentConfig;
use crate::model::{EventStatus, MatchEvent};
use crate::pipeline::date_key;
use crate::service::PredictionService;

const SLEEP_SLICE: Duration = Duration::from_millis(500);

/// True when `now` is within `window_secs` of `offset_min` minutes before `start`.
pub fn is_due(start_ts: i64, now_ts: i64, offset_min: i64, window_secs: i64) -> bool {
    let target = start_ts - offset_min * 60;
    (now_ts - target).abs() <= window_secs
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueJob {
    pub event_id: u64,
    pub offset_min: i64,
    pub start_timestamp: i64,
}

/// Upcoming events with an offset target inside the due window. One job per
/// event even if two offsets match.
pub fn due_jobs(
    events: &[MatchEvent],
    now_ts: i64,
    offsets_min: &[i64],
    window_secs: i64,
) -> Vec<DueJob> {
    let mut seen = HashSet::new();
    let mut jobs = Vec::new();
    for event in events {
        if event.id == 0 || event.start_timestamp <= now_ts {
            continue;
        }
        if event.status != EventStatus::Scheduled {
            continue;
        }
        let Some(offset) = offsets_min
            .iter()
            .copied()
            .find(|off| is_due(event.start_timestamp, now_ts, *off, window_secs))
        else {
            continue;
        };
        if seen.insert(event.id) {
            jobs.push(DueJob {
                event_id: event.id,
                offset_min: offset,
                start_timestamp: event.start_timestamp,
            });
        }
    }
    jobs
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub listed: usize,
    pub due: usize,
    pub stored: usize,
    pub failed: usize,
}

/// Polls today's schedule and recomputes predictions at fixed offsets before start.
pub struct Agent {
    service: Arc<PredictionService>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(service: Arc<PredictionService>, config: AgentConfig) -> Self {
        Self { service, config }
    }

    pub fn run_cycle(&self) -> Result<CycleReport> {
        let now = Local::now();
        self.run_cycle_at(now.timestamp(), now.date_naive())
    }

    pub fn run_cycle_at(&self, now_ts: i64, today: NaiveDate) -> Result<CycleReport> {
        let events = self
            .service
            .pipeline()
            .scheduled_events(&[date_key(today)])
            .context("failed to list today's events")?;
        let jobs = due_jobs(
            &events,
            now_ts,
            &self.config.offsets_min,
            self.config.due_window_secs,
        );

        let mut report = CycleReport {
            listed: events.len(),
            due: jobs.len(),
            ..CycleReport::default()
        };
        if jobs.is_empty() {
            debug!(listed = report.listed, "no events due this cycle");
            return Ok(report);
        }

        let (stored, failed) = self.run_jobs(&jobs, today);
        report.stored = stored;
        report.failed = failed;
        info!(
            listed = report.listed,
            due = report.due,
            stored = report.stored,
            failed = report.failed,
            "agent cycle finished"
        );
        Ok(report)
    }

    /// Runs `jobs` on at most `parallelism` plain worker threads pulling from a
    /// shared cursor. Returns (stored, failed).
    fn run_jobs(&self, jobs: &[DueJob], today: NaiveDate) -> (usize, usize) {
        let workers = self.config.parallelism.clamp(1, jobs.len().max(1));
        let next = AtomicUsize::new(0);
        let work = || {
            let (mut stored, mut failed) = (0usize, 0usize);
            while let Some(job) = jobs.get(next.fetch_add(1, Ordering::Relaxed)) {
                if self.run_job(job, today) {
                    stored += 1;
                } else {
                    failed += 1;
                }
            }
            (stored, failed)
        };

        thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .filter_map(|i| {
                    thread::Builder::new()
                        .name(format!("tgs-job-{i}"))
                        .spawn_scoped(s, &work)
                        .map_err(|err| warn!(error = %err, "failed to spawn job worker"))
                        .ok()
                })
                .collect();
            if handles.is_empty() {
                return work();
            }
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|payload| panic::resume_unwind(payload)))
                .fold((0, 0), |(total_stored, total_failed), (stored, failed)| {
                    (total_stored + stored, total_failed + failed)
                })
        })
    }

    fn run_job(&self, job: &DueJob, today: NaiveDate) -> bool {
        match self.service.compute_and_store(job.event_id, today) {
            Ok(result) => {
                info!(
                    event_id = job.event_id,
                    offset_min = job.offset_min,
                    home_win_prob = result.home_win_prob,
                    "scheduled prediction stored"
                );
                true
            }
            Err(err) => {
                warn!(event_id = job.event_id, offset_min = job.offset_min, error = %err, "scheduled prediction failed");
                false
            }
        }
    }

    /// Polls until `shutdown` is set. Cycle errors and panics are logged and
    /// the next cycle runs as usual.
    pub fn run(&self, shutdown: &AtomicBool) {
        info!(
            poll_secs = self.config.poll_interval.as_secs(),
            parallelism = self.config.parallelism,
            offsets = ?self.config.offsets_min,
            "agent started"
        );
        while !shutdown.load(Ordering::Relaxed) {
            match panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle())) {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => error!(error = %format!("{err:#}"), "agent cycle failed"),
                Err(_) => error!("agent cycle panicked"),
            }
            sleep_unless_shutdown(self.config.poll_interval, shutdown);
        }
        info!("agent stopped");
    }
}

fn sleep_unless_shutdown(total: Duration, shutdown: &AtomicBool) {
    let started = Instant::now();
    while !shutdown.load(Ordering::Relaxed) {
        let elapsed = started.elapsed();
        if elapsed >= total {
            return;
        }
        thread::sleep(SLEEP_SLICE.min(total - elapsed));
    }
}
