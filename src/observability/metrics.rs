//! Metrics collection.
//!
//! # Metrics
//! - `settings_events_emitted_total` (counter): emissions by emitter name
//! - `settings_emit_failures_total` (counter): failed emissions by reason
//! - `settings_writes_total` (counter): persistence passes by backend, outcome
//! - `settings_invalid_data_total` (counter): fixer rejections by backend
//! - `settings_debounce_coalesced_total` (counter): writes folded into a pending save
//!
//! # Design Decisions
//! - Low-overhead updates through the `metrics` facade
//! - Label values are static strings except the emitter name

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::counter;

static ENABLED: AtomicBool = AtomicBool::new(true);

/// Turn counter recording on or off process-wide.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

pub fn record_event_emitted(emitter: &str) {
    if !is_enabled() {
        return;
    }
    counter!("settings_events_emitted_total", "emitter" => emitter.to_string()).increment(1);
}

pub fn record_emit_failure(reason: &'static str) {
    if !is_enabled() {
        return;
    }
    counter!("settings_emit_failures_total", "reason" => reason).increment(1);
}

pub fn record_write(backend: &'static str, ok: bool) {
    if !is_enabled() {
        return;
    }
    let outcome = if ok { "ok" } else { "error" };
    counter!("settings_writes_total", "backend" => backend, "outcome" => outcome).increment(1);
}

pub fn record_invalid_data(backend: &'static str) {
    if !is_enabled() {
        return;
    }
    counter!("settings_invalid_data_total", "backend" => backend).increment(1);
}

pub fn record_debounce_coalesced() {
    if !is_enabled() {
        return;
    }
    counter!("settings_debounce_coalesced_total").increment(1);
}
