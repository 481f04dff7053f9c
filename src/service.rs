use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDate};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::model::PredictionResult;
use crate::pipeline::Aggregator;
use crate::pred_store::{PredictionStore, StoreError};
use crate::scoring::{self, Weights};
use crate::source::MatchDataSource;

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("match details not found for event {0}")]
    EventNotFound(u64),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PredictionError {
    /// The `{ "error": ... }` shape handed to presentation layers.
    pub fn to_json(&self) -> Value {
        json!({ "error": self.to_string() })
    }
}

/// Process-wide context: the aggregation pipeline with its caches, the
/// weight vector and the prediction store. Built once at startup and shared.
pub struct PredictionService {
    pipeline: Aggregator,
    weights: Weights,
    store: PredictionStore,
}

impl PredictionService {
    pub fn new(pipeline: Aggregator, weights: Weights, store: PredictionStore) -> Self {
        Self {
            pipeline,
            weights,
            store,
        }
    }

    pub fn from_settings(settings: &Settings, source: Arc<dyn MatchDataSource>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self::new(
            Aggregator::new(source, settings.pipeline.clone(), clock),
            settings.weights.clone(),
            PredictionStore::new(settings.store.clone()),
        )
    }

    pub fn pipeline(&self) -> &Aggregator {
        &self.pipeline
    }

    pub fn store(&self) -> &PredictionStore {
        &self.store
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    pub fn compute(&self, event_id: u64) -> Result<PredictionResult, PredictionError> {
        let now = Local::now();
        self.compute_on(event_id, now.date_naive())
    }

    pub fn compute_on(
        &self,
        event_id: u64,
        today: NaiveDate,
    ) -> Result<PredictionResult, PredictionError> {
        let bundle = self
            .pipeline
            .aggregate_on(event_id, today, today.year())
            .ok_or(PredictionError::EventNotFound(event_id))?;
        Ok(scoring::predict(&bundle, &self.weights))
    }

    /// Computes and upserts into `date`'s file. Unresolvable events are not stored.
    pub fn compute_and_store(
        &self,
        event_id: u64,
        date: NaiveDate,
    ) -> Result<PredictionResult, PredictionError> {
        let result = self.compute_on(event_id, date)?;
        self.store.upsert(date, event_id, &result)?;
        Ok(result)
    }

    /// Forces an immediate computation for `event_id` and stores it under today.
    pub fn trigger(&self, event_id: u64) -> Result<PredictionResult, PredictionError> {
        let today = Local::now().date_naive();
        let outcome = self.compute_and_store(event_id, today);
        match &outcome {
            Ok(result) => info!(
                event_id,
                home_win_prob = result.home_win_prob,
                "prediction triggered"
            ),
            Err(err) => warn!(event_id, error = %err, "triggered prediction failed"),
        }
        outcome
    }

    pub fn get_prediction(&self, event_id: u64) -> Option<PredictionResult> {
        self.get_prediction_on(event_id, Local::now().date_naive())
    }

    pub fn get_prediction_on(&self, event_id: u64, today: NaiveDate) -> Option<PredictionResult> {
        self.store.get_recent(today, event_id)
    }
}
