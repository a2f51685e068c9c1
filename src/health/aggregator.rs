//! Per-stream health aggregation and fan-out

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::HealthConfig;
use crate::health::rating::{rate_with, recommended_quality, HealthReport, HealthSample, QualityLevel};
use crate::protocol::StreamId;

/// Latest rating for one stream, as published to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthUpdate {
    pub stream_id: StreamId,
    pub report: HealthReport,
    pub quality: QualityLevel,
    /// Suggested quality change, if any
    pub recommended_quality: Option<QualityLevel>,
    pub observed_at: DateTime<Utc>,
}

/// Keeps the latest rating per stream and publishes every new one
pub struct HealthAggregator {
    thresholds: HealthConfig,
    latest: DashMap<StreamId, HealthUpdate>,
    subscribers: Mutex<Vec<Sender<HealthUpdate>>>,
}

impl HealthAggregator {
    pub fn new(thresholds: HealthConfig) -> Self {
        Self {
            thresholds,
            latest: DashMap::new(),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Rate a new sample, store it and publish it to every subscriber
    pub fn ingest(&self, stream_id: &StreamId, sample: &HealthSample) -> HealthUpdate {
        let report = rate_with(sample, &self.thresholds);
        let quality = sample.quality.level;
        let update = HealthUpdate {
            stream_id: stream_id.clone(),
            report,
            quality,
            recommended_quality: recommended_quality(quality, &report),
            observed_at: Utc::now(),
        };

        let previous = self
            .latest
            .insert(stream_id.clone(), update.clone())
            .map(|old| old.report.rating);
        if previous != Some(report.rating) {
            tracing::info!(
                stream = %stream_id,
                rating = ?report.rating,
                score = report.score,
                stable = report.is_stable,
                "Stream health changed"
            );
        }

        self.publish(&update);
        update
    }

    /// Subscribe to every future update
    pub fn subscribe(&self) -> Receiver<HealthUpdate> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Forget a removed stream
    pub fn remove(&self, stream_id: &StreamId) -> bool {
        self.latest.remove(stream_id).is_some()
    }

    pub fn latest(&self, stream_id: &StreamId) -> Option<HealthUpdate> {
        self.latest.get(stream_id).map(|entry| entry.value().clone())
    }

    pub fn report(&self, stream_id: &StreamId) -> Option<HealthReport> {
        self.latest.get(stream_id).map(|entry| entry.report)
    }

    /// The unhealthiest stream, for a grid-level indicator
    pub fn worst(&self) -> Option<HealthUpdate> {
        self.latest
            .iter()
            .min_by_key(|entry| entry.report.score)
            .map(|entry| entry.value().clone())
    }

    fn publish(&self, update: &HealthUpdate) {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|tx| tx.send(update.clone()).is_ok());
        let pruned = before - subscribers.len();
        if pruned > 0 {
            tracing::debug!(pruned, "Dropped disconnected health subscribers");
        }
    }
}

impl Default for HealthAggregator {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}
