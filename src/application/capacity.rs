use crate::domain::ports::ConfigSourceBox;
use std::collections::HashMap;
use tracing::{debug, warn};

pub const DEFAULT_CAPACITY: u32 = 100;

/// Keys recognized as the per-round capacity, checked in this order.
pub const CAPACITY_KEYS: [&str; 4] = [
    "total_numbers",
    "numbers_per_draw",
    "draw_capacity",
    "capacity",
];

/// Resolves how many numbers a round can sell before being sold out.
///
/// Entries from every source are merged first (later sources override earlier
/// ones on duplicate keys, keys compared case-insensitively), then the
/// recognized keys are checked in order for the first positive integer.
/// Configuration absence is not an error: anything missing or unparseable
/// falls back to 100.
pub struct CapacityResolver {
    sources: Vec<ConfigSourceBox>,
}

impl CapacityResolver {
    pub fn new(sources: Vec<ConfigSourceBox>) -> Self {
        Self { sources }
    }

    pub async fn resolve(&self) -> u32 {
        let mut merged: HashMap<String, String> = HashMap::new();
        for source in &self.sources {
            match source.entries().await {
                Ok(entries) => {
                    for (key, value) in entries {
                        merged.insert(key.trim().to_lowercase(), value);
                    }
                }
                Err(e) => warn!(error = %e, "capacity source unavailable; ignoring"),
            }
        }
        for key in CAPACITY_KEYS {
            if let Some(raw) = merged.get(key)
                && let Ok(value) = raw.trim().parse::<u32>()
                && value > 0
            {
                debug!(key, value, "capacity resolved from configuration");
                return value;
            }
        }
        DEFAULT_CAPACITY
    }
}
