use std::net::SocketAddr;

// ── Transition metrics ──────────────────────────────────────────

/// Counter: transitions attempted. Labels: transition, outcome.
pub const TRANSITIONS_TOTAL: &str = "slotledger_transitions_total";

/// Histogram: transition latency in seconds. Labels: transition.
pub const TRANSITION_DURATION_SECONDS: &str = "slotledger_transition_duration_seconds";

/// Counter: confirmations rejected because of an overlapping confirmed booking.
pub const CONFLICTS_TOTAL: &str = "slotledger_conflicts_total";

/// Counter: slots created on confirmation because none could host the booking.
pub const SLOTS_FABRICATED_TOTAL: &str = "slotledger_slots_fabricated_total";

/// Counter: slots flipped back to available on cancel/delete.
pub const SLOTS_RESTORED_TOTAL: &str = "slotledger_slots_restored_total";

/// Counter: compare-and-swap on a slot lost to a concurrent writer.
pub const SLOT_SWAPS_LOST_TOTAL: &str = "slotledger_slot_swaps_lost_total";

/// Counter: stored records skipped because of unparsable times. Labels: record.
pub const MALFORMED_RECORDS_TOTAL: &str = "slotledger_malformed_records_total";

// ── Store metrics ───────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "slotledger_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (records per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "slotledger_wal_flush_batch_size";

/// Counter: WAL compactions performed.
pub const WAL_COMPACTIONS_TOTAL: &str = "slotledger_wal_compactions_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Label for a transition outcome.
pub fn outcome_label<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() { "ok" } else { "error" }
}
