use std::path::PathBuf;
use std::time::Duration;

use crate::model::SlotKind;

/// Engine behaviour knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Create a slot on confirmation when no open slot can host the booking.
    pub fabricate_missing_slots: bool,
    pub fabricated_slot_kind: SlotKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fabricate_missing_slots: true,
            fabricated_slot_kind: SlotKind::InHour,
        }
    }
}

impl EngineConfig {
    /// `SLOTLEDGER_FABRICATE` (`true`/`false`), `SLOTLEDGER_FABRICATED_KIND`
    /// (`inHour`/`outOfHour`/`standard`). Unparsable values keep the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            fabricate_missing_slots: std::env::var("SLOTLEDGER_FABRICATE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.fabricate_missing_slots),
            fabricated_slot_kind: std::env::var("SLOTLEDGER_FABRICATED_KIND")
                .ok()
                .and_then(|s| parse_slot_kind(&s))
                .unwrap_or(defaults.fabricated_slot_kind),
        }
    }
}

pub fn parse_slot_kind(s: &str) -> Option<SlotKind> {
    match s.trim() {
        "inHour" | "in_hour" | "in-hour" => Some(SlotKind::InHour),
        "outOfHour" | "out_of_hour" | "out-of-hour" => Some(SlotKind::OutOfHour),
        "standard" => Some(SlotKind::Standard),
        _ => None,
    }
}

pub const DEFAULT_COMPACT_INTERVAL: Duration = Duration::from_secs(30);

/// Process-level settings for the `slotledger` binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    /// WAL appends before the compactor rewrites the log.
    pub compact_threshold: u64,
    /// How often the background compactor checks the append count.
    pub compact_interval: Duration,
    /// Substring marking a service as quote-exempt.
    pub quote_tag: String,
    pub quote_services: Vec<String>,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let data_dir = std::env::var("SLOTLEDGER_DATA_DIR").unwrap_or_else(|_| "./data".into());
        let metrics_port = std::env::var("SLOTLEDGER_METRICS_PORT")
            .ok()
            .and_then(|s| s.parse().ok());
        let compact_threshold = std::env::var("SLOTLEDGER_COMPACT_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1000);
        let compact_interval = std::env::var("SLOTLEDGER_COMPACT_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|&secs: &u64| secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_COMPACT_INTERVAL);
        let quote_tag = std::env::var("SLOTLEDGER_QUOTE_TAG")
            .unwrap_or_else(|_| "contact for quote".into());
        let quote_services = std::env::var("SLOTLEDGER_QUOTE_SERVICES")
            .map(|s| split_list(&s))
            .unwrap_or_default();

        Self {
            data_dir: PathBuf::from(data_dir),
            metrics_port,
            compact_threshold,
            compact_interval,
            quote_tag,
            quote_services,
            engine: EngineConfig::from_env(),
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("ledger.wal")
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
