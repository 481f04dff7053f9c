use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::model::PredictionResult;
use crate::pipeline::date_key;

const LOCK_RETRY: Duration = Duration::from_millis(50);

pub type PredictionMap = BTreeMap<String, PredictionResult>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("prediction store io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize predictions: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("timed out after {waited:?} waiting for lock {path}")]
    LockTimeout { path: PathBuf, waited: Duration },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Date-partitioned prediction files: `<dir>/<YYYY-MM-DD>.json`, each a JSON
/// object keyed by event id.
#[derive(Debug, Clone)]
pub struct PredictionStore {
    config: StoreConfig,
}

impl PredictionStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.config.dir.join(format!("{}.json", date_key(date)))
    }

    pub fn lock_path_for(&self, date: NaiveDate) -> PathBuf {
        self.file_for(date).with_extension("lock")
    }

    /// Never fails: a missing, unreadable or non-object file reads as empty.
    pub fn read(&self, date: NaiveDate) -> PredictionMap {
        read_map(&self.file_for(date))
    }

    pub fn get(&self, date: NaiveDate, event_id: u64) -> Option<PredictionResult> {
        self.read(date).remove(&event_id.to_string())
    }

    /// `today`'s file first, then yesterday's for matches that crossed midnight.
    pub fn get_recent(&self, today: NaiveDate, event_id: u64) -> Option<PredictionResult> {
        self.get(today, event_id).or_else(|| {
            today
                .pred_opt()
                .and_then(|yesterday| self.get(yesterday, event_id))
        })
    }

    pub fn write(&self, date: NaiveDate, map: &PredictionMap) -> Result<(), StoreError> {
        self.ensure_dir()?;
        let _lock = self.lock(date)?;
        atomic_write_json(&self.file_for(date), map)
    }

    /// Read-modify-write of one entry, all under the date lock.
    pub fn upsert(
        &self,
        date: NaiveDate,
        event_id: u64,
        result: &PredictionResult,
    ) -> Result<(), StoreError> {
        self.ensure_dir()?;
        let _lock = self.lock(date)?;
        let path = self.file_for(date);
        let mut map = read_map(&path);
        map.insert(event_id.to_string(), result.clone());
        atomic_write_json(&path, &map)?;
        info!(event_id, date = %date_key(date), entries = map.len(), "prediction stored");
        Ok(())
    }

    fn ensure_dir(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.config.dir).map_err(io_err(&self.config.dir))
    }

    fn lock(&self, date: NaiveDate) -> Result<LockGuard, StoreError> {
        LockGuard::acquire(
            self.lock_path_for(date),
            self.config.lock_timeout,
            self.config.lock_stale_after,
        )
    }
}

fn read_map(path: &Path) -> PredictionMap {
    let Ok(raw) = fs::read_to_string(path) else {
        return PredictionMap::new();
    };
    let Ok(Value::Object(entries)) = serde_json::from_str::<Value>(&raw) else {
        warn!(path = %path.display(), "prediction file is not a JSON object; treating as empty");
        return PredictionMap::new();
    };
    entries
        .into_iter()
        .filter_map(|(key, value)| match serde_json::from_value::<PredictionResult>(value) {
            Ok(result) => Some((key, result)),
            Err(err) => {
                warn!(path = %path.display(), key = %key, error = %err, "skipping malformed prediction");
                None
            }
        })
        .collect()
}

/// Temp file in the same directory, fsync, then rename over the target.
fn atomic_write_json(path: &Path, map: &PredictionMap) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    {
        let file = File::create(&tmp).map_err(io_err(&tmp))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, map)?;
        writer.flush().map_err(io_err(&tmp))?;
        let file = writer.into_inner().map_err(|e| StoreError::Io {
            path: tmp.clone(),
            source: e.into_error(),
        })?;
        file.sync_all().map_err(io_err(&tmp))?;
    }
    fs::rename(&tmp, path).map_err(io_err(path))?;
    sync_parent_dir(path);
    Ok(())
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    if let Some(dir) = path.parent() {
        if let Ok(handle) = File::open(dir) {
            let _ = handle.sync_all();
        }
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}

/// Sentinel lock file holding a per-acquisition token. Created exclusively,
/// removed on drop only while it still holds that token.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    token: String,
}

impl LockGuard {
    /// Retries until `timeout`. A sentinel older than `stale_after` is treated
    /// as left behind by a crashed writer and reaped.
    pub fn acquire(
        path: PathBuf,
        timeout: Duration,
        stale_after: Duration,
    ) -> Result<Self, StoreError> {
        let token = lock_token();
        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    if let Err(err) = file.write_all(token.as_bytes()).and_then(|()| file.sync_all()) {
                        let _ = fs::remove_file(&path);
                        return Err(io_err(&path)(err));
                    }
                    return Ok(Self { path, token });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    if is_stale(&path, stale_after) && reap_stale(&path, &token, stale_after) {
                        continue;
                    }
                    let waited = started.elapsed();
                    if waited >= timeout {
                        return Err(StoreError::LockTimeout { path, waited });
                    }
                    debug!(path = %path.display(), "prediction lock busy; retrying");
                    thread::sleep(LOCK_RETRY);
                }
                Err(err) => return Err(io_err(&path)(err)),
            }
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        match fs::read_to_string(&self.path) {
            Ok(held) if held == self.token => {
                let _ = fs::remove_file(&self.path);
            }
            Ok(_) => warn!(path = %self.path.display(), "prediction lock was taken over; leaving it"),
            Err(_) => {}
        }
    }
}

fn lock_token() -> String {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!(
        "{}-{nanos}-{}",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    )
}

fn is_stale(path: &Path, stale_after: Duration) -> bool {
    lock_age(path).is_some_and(|age| age >= stale_after)
}

/// Removes an abandoned sentinel. Reapers serialize on `<date>.lock.reap` and
/// re-check staleness under it. The sentinel is renamed to a tombstone first;
/// if the tombstone turns out to hold a different token than the one judged
/// stale, it is linked back into place.
fn reap_stale(path: &Path, token: &str, stale_after: Duration) -> bool {
    let reap_path = path.with_extension("lock.reap");
    if OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&reap_path)
        .is_err()
    {
        return false;
    }

    let mut reaped = false;
    if is_stale(path, stale_after) {
        if let Ok(stale_token) = fs::read_to_string(path) {
            let tomb = path.with_extension(format!("lock.stale-{token}"));
            if fs::rename(path, &tomb).is_ok() {
                match fs::read_to_string(&tomb) {
                    Ok(moved) if moved == stale_token => {
                        warn!(path = %path.display(), "removed stale prediction lock");
                        reaped = true;
                    }
                    _ => {
                        if fs::hard_link(&tomb, path).is_err() {
                            warn!(path = %path.display(), "could not restore a live prediction lock");
                        }
                    }
                }
                let _ = fs::remove_file(&tomb);
            }
        }
    }
    let _ = fs::remove_file(&reap_path);
    reaped
}

fn lock_age(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    SystemTime::now().duration_since(modified).ok()
}
