//! Scoring functions over [`ProviderHealth`] snapshots.

use crate::health::ProviderHealth;

const PRIORITY_WEIGHT: f64 = 100.0;
const RELIABILITY_WEIGHT: f64 = 50.0;
const LATENCY_CREDIT: f64 = 30.0;
const RETRY_PENALTY_CAP: f64 = 20.0;

/// Selection score: priority dominates, then reliability, then speed.
///
/// `priority*100 + success_rate*50 + max(0, 30 - latency/100)` (or `+30` when
/// latency is unknown), minus `min(20, recent_requests/5)` once the request
/// is already under retry pressure.
pub fn selection_score(health: &ProviderHealth, priority: i64, retry_count: u32) -> f64 {
    let mut score = priority as f64 * PRIORITY_WEIGHT;
    score += health.success_rate * RELIABILITY_WEIGHT;

    score += if health.average_latency_ms > 0.0 {
        (LATENCY_CREDIT - health.average_latency_ms / 100.0).max(0.0)
    } else {
        LATENCY_CREDIT
    };

    if retry_count > 0 {
        score -= (health.recent_requests as f64 / 5.0).min(RETRY_PENALTY_CAP);
    }
    score
}

/// Priority-free score used by the diagnostics listing.
pub fn diagnostic_score(health: &ProviderHealth) -> f64 {
    let base = if health.available { 100.0 } else { 0.0 };
    base + health.success_rate * RELIABILITY_WEIGHT
        - (health.average_latency_ms / 50.0).min(RETRY_PENALTY_CAP)
}
