//! Health scoring
//!
//! A stream's health is a pure function of its latest sample: start at 100,
//! subtract a penalty for each bad signal, then bucket the score.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::HealthConfig;

/// Playback quality ladder, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QualityLevel {
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "1080p60")]
    P1080p60,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p60")]
    P720p60,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "160p")]
    P160,
}

impl QualityLevel {
    pub const LADDER: [QualityLevel; 8] = [
        Self::Auto,
        Self::P1080p60,
        Self::P1080,
        Self::P720p60,
        Self::P720,
        Self::P480,
        Self::P360,
        Self::P160,
    ];

    fn rung(self) -> usize {
        Self::LADDER.iter().position(|level| *level == self).unwrap_or(0)
    }

    /// Next lower quality, if any
    pub fn step_down(self) -> Option<Self> {
        Self::LADDER.get(self.rung() + 1).copied()
    }

    /// Next higher quality, if any; the top of the ladder is `Auto`
    pub fn step_up(self) -> Option<Self> {
        self.rung().checked_sub(1).map(|rung| Self::LADDER[rung])
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::P1080p60 => "1080p60",
            Self::P1080 => "1080p",
            Self::P720p60 => "720p60",
            Self::P720 => "720p",
            Self::P480 => "480p",
            Self::P360 => "360p",
            Self::P160 => "160p",
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the player's quality monitor reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualitySnapshot {
    pub level: QualityLevel,
    pub error_count: u32,
    pub consecutive_failures: u32,
    pub is_healthy: bool,
    pub dropped_frames: u32,
    pub latency_ms: u32,
    /// Fraction of the target buffer that is filled, 0..=1
    pub buffer_health: f32,
    pub is_stable: bool,
}

impl Default for QualitySnapshot {
    fn default() -> Self {
        Self {
            level: QualityLevel::Auto,
            error_count: 0,
            consecutive_failures: 0,
            is_healthy: true,
            dropped_frames: 0,
            latency_ms: 0,
            buffer_health: 1.0,
            is_stable: true,
        }
    }
}

/// What the bandwidth probe reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandwidthSnapshot {
    pub bandwidth_mbps: f32,
    pub latency_ms: u32,
    pub jitter_ms: u32,
    pub is_stable: bool,
}

impl Default for BandwidthSnapshot {
    fn default() -> Self {
        Self {
            bandwidth_mbps: 0.0,
            latency_ms: 0,
            jitter_ms: 0,
            is_stable: true,
        }
    }
}

/// One telemetry sample for a stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthSample {
    pub quality: QualitySnapshot,
    pub bandwidth: BandwidthSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthRating {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl HealthRating {
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s >= 90 => Self::Excellent,
            s if s >= 75 => Self::Good,
            s if s >= 60 => Self::Fair,
            s if s >= 40 => Self::Poor,
            _ => Self::Critical,
        }
    }
}

/// Rating of one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub rating: HealthRating,
    pub score: i32,
    /// Both monitors report stable
    pub is_stable: bool,
}

/// Rate a sample with the default thresholds
pub fn rate(sample: &HealthSample) -> HealthReport {
    rate_with(sample, &HealthConfig::default())
}

/// Rate a sample
pub fn rate_with(sample: &HealthSample, thresholds: &HealthConfig) -> HealthReport {
    let score = score(sample, thresholds);
    HealthReport {
        rating: HealthRating::from_score(score),
        score,
        is_stable: sample.quality.is_stable && sample.bandwidth.is_stable,
    }
}

fn score(sample: &HealthSample, thresholds: &HealthConfig) -> i32 {
    let quality = &sample.quality;
    let bandwidth = &sample.bandwidth;

    let penalty = |hit: bool, points: i64| if hit { points } else { 0 };

    let deductions = i64::from(quality.error_count) * 10
        + i64::from(quality.consecutive_failures) * 15
        + penalty(!quality.is_healthy, 20)
        + penalty(quality.dropped_frames > thresholds.max_dropped_frames, 20)
        + penalty(quality.latency_ms > thresholds.max_latency_ms, 15)
        + penalty(quality.buffer_health < thresholds.min_buffer_health, 15)
        + penalty(!bandwidth.is_stable, 10)
        + penalty(bandwidth.latency_ms > thresholds.max_bandwidth_latency_ms, 10)
        + penalty(bandwidth.jitter_ms > thresholds.max_jitter_ms, 10);

    (100 - deductions).max(0) as i32
}

/// Quality change worth suggesting for a report, if any
///
/// Steps down when the stream is struggling and unstable, up when it is
/// excellent and stable.
pub fn recommended_quality(current: QualityLevel, report: &HealthReport) -> Option<QualityLevel> {
    match report.rating {
        HealthRating::Poor | HealthRating::Critical if !report.is_stable => current.step_down(),
        HealthRating::Excellent if report.is_stable => current.step_up(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HealthSample {
        HealthSample::default()
    }

    #[test]
    fn test_clean_sample_is_excellent() {
        let report = rate(&sample());
        assert_eq!(report.score, 100);
        assert_eq!(report.rating, HealthRating::Excellent);
        assert!(report.is_stable);
    }

    #[test]
    fn test_rating_boundaries() {
        let cases = [
            (90, HealthRating::Excellent),
            (89, HealthRating::Good),
            (75, HealthRating::Good),
            (74, HealthRating::Fair),
            (60, HealthRating::Fair),
            (59, HealthRating::Poor),
            (40, HealthRating::Poor),
            (39, HealthRating::Critical),
            (0, HealthRating::Critical),
        ];
        for (score, rating) in cases {
            assert_eq!(HealthRating::from_score(score), rating, "score {score}");
        }
    }

    #[test]
    fn test_scores_at_boundaries() {
        let mut s = sample();
        s.quality.error_count = 1;
        assert_eq!(rate(&s).score, 90);
        assert_eq!(rate(&s).rating, HealthRating::Excellent);

        s.quality.consecutive_failures = 1;
        assert_eq!(rate(&s).score, 75);
        assert_eq!(rate(&s).rating, HealthRating::Good);

        let mut s = sample();
        s.quality.is_healthy = false;
        s.quality.dropped_frames = 6;
        assert_eq!(rate(&s).score, 60);
        assert_eq!(rate(&s).rating, HealthRating::Fair);

        s.quality.error_count = 2;
        assert_eq!(rate(&s).score, 40);
        assert_eq!(rate(&s).rating, HealthRating::Poor);

        s.bandwidth.jitter_ms = 51;
        assert_eq!(rate(&s).score, 30);
        assert_eq!(rate(&s).rating, HealthRating::Critical);
    }

    #[test]
    fn test_thresholds_are_strict() {
        let mut s = sample();
        s.quality.dropped_frames = 5;
        s.quality.latency_ms = 300;
        s.quality.buffer_health = 0.5;
        s.bandwidth.latency_ms = 300;
        s.bandwidth.jitter_ms = 50;
        assert_eq!(rate(&s).score, 100);

        s.quality.latency_ms = 301;
        s.quality.buffer_health = 0.49;
        s.bandwidth.latency_ms = 301;
        assert_eq!(rate(&s).score, 60);
    }

    #[test]
    fn test_score_floors_at_zero() {
        let mut s = sample();
        s.quality.error_count = u32::MAX;
        s.quality.consecutive_failures = 40;
        let report = rate(&s);
        assert_eq!(report.score, 0);
        assert_eq!(report.rating, HealthRating::Critical);
    }

    #[test]
    fn test_stability_needs_both_monitors() {
        let mut s = sample();
        s.quality.is_stable = false;
        assert!(!rate(&s).is_stable);

        let mut s = sample();
        s.bandwidth.is_stable = false;
        let report = rate(&s);
        assert!(!report.is_stable);
        assert_eq!(report.score, 90);
    }

    #[test]
    fn test_custom_thresholds() {
        let strict = HealthConfig {
            max_jitter_ms: 10,
            ..HealthConfig::default()
        };
        let mut s = sample();
        s.bandwidth.jitter_ms = 20;
        assert_eq!(rate(&s).score, 100);
        assert_eq!(rate_with(&s, &strict).score, 90);
    }

    #[test]
    fn test_quality_ladder() {
        assert_eq!(QualityLevel::Auto.step_up(), None);
        assert_eq!(QualityLevel::Auto.step_down(), Some(QualityLevel::P1080p60));
        assert_eq!(QualityLevel::P720.step_down(), Some(QualityLevel::P480));
        assert_eq!(QualityLevel::P720.step_up(), Some(QualityLevel::P720p60));
        assert_eq!(QualityLevel::P160.step_down(), None);
        assert_eq!(
            serde_json::to_string(&QualityLevel::P1080p60).unwrap(),
            r#""1080p60""#
        );
        assert_eq!(QualityLevel::P360.to_string(), "360p");
    }

    #[test]
    fn test_recommendation() {
        let struggling = HealthReport {
            rating: HealthRating::Poor,
            score: 45,
            is_stable: false,
        };
        assert_eq!(
            recommended_quality(QualityLevel::P1080, &struggling),
            Some(QualityLevel::P720p60)
        );

        let poor_but_stable = HealthReport {
            is_stable: true,
            ..struggling
        };
        assert_eq!(recommended_quality(QualityLevel::P1080, &poor_but_stable), None);

        let great = HealthReport {
            rating: HealthRating::Excellent,
            score: 100,
            is_stable: true,
        };
        assert_eq!(recommended_quality(QualityLevel::P480, &great), Some(QualityLevel::P720));
        assert_eq!(recommended_quality(QualityLevel::Auto, &great), None);
    }
}
