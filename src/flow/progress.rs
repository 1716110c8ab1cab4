//! Simulated progress ticker
//!
//! Progress is advisory telemetry. It advances on a fixed cadence up to the
//! cap and never signals completion on its own.

use super::FlowInner;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

/// Next progress value, saturating at `cap`.
pub fn advance(current: u8, step: u8, cap: u8) -> u8 {
    if current >= cap {
        return cap.max(current);
    }
    current.saturating_add(step).min(cap)
}

/// Runs until the attempt stops being active or the cap is reached.
/// Aborted by the controller on every exit from `analyzing`.
pub(super) async fn run(inner: Arc<FlowInner>, attempt_id: Uuid) {
    let mut interval = tokio::time::interval(inner.config.progress_tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // first tick completes immediately
    interval.tick().await;

    loop {
        interval.tick().await;
        if !inner.tick_progress(attempt_id) {
            break;
        }
    }
}
