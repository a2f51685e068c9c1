//! Stream health rating

pub mod aggregator;
pub mod rating;

pub use aggregator::{HealthAggregator, HealthUpdate};
pub use rating::{
    rate, rate_with, recommended_quality, BandwidthSnapshot, HealthRating, HealthReport,
    HealthSample, QualityLevel, QualitySnapshot,
};
