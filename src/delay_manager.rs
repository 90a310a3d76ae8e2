use log::debug;
use std::thread;
use std::time::Duration;

/// Recognized range for the inter-request delay, in seconds.
pub const MIN_DELAY_SECS: f64 = 0.5;
pub const MAX_DELAY_SECS: f64 = 5.0;
pub const DEFAULT_DELAY_SECS: f64 = 1.0;

pub fn clamp_delay(secs: f64) -> f64 {
    if !secs.is_finite() {
        return DEFAULT_DELAY_SECS;
    }
    secs.clamp(MIN_DELAY_SECS, MAX_DELAY_SECS)
}

/// The one suspension point of a run. Sleeps for the clamped delay.
pub fn pause_between_requests(secs: f64) {
    let secs = clamp_delay(secs);
    debug!("Waiting {:.1}s before next request...", secs);
    thread::sleep(Duration::from_secs_f64(secs));
}
