//! Per-(container, dimension) cooldown tracking
//!
//! Stores the time each dimension was last changed so the engine can hold
//! off further changes until the cooldown window has passed. A missing
//! entry means "no prior decision", so dropping the tracker on restart is safe.

use crate::models::{ContainerRef, ResourceDimension};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;
use tracing::debug;

/// Last-applied timestamps keyed by container and dimension
#[derive(Debug, Default)]
pub struct CooldownTracker {
    entries: DashMap<(ContainerRef, ResourceDimension), DateTime<Utc>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Record that a change was applied at `at`
    pub fn record(&self, container: &ContainerRef, dimension: ResourceDimension, at: DateTime<Utc>) {
        debug!(container = %container, dimension = %dimension, "Recording cooldown");
        self.entries.insert((container.clone(), dimension), at);
    }

    pub fn last_applied(
        &self,
        container: &ContainerRef,
        dimension: ResourceDimension,
    ) -> Option<DateTime<Utc>> {
        self.entries
            .get(&(container.clone(), dimension))
            .map(|entry| *entry.value())
    }

    /// True if a change was applied less than `window` before `now`
    pub fn is_cooling_down(
        &self,
        container: &ContainerRef,
        dimension: ResourceDimension,
        now: DateTime<Utc>,
        window: Duration,
    ) -> bool {
        match self.last_applied(container, dimension) {
            Some(last) => now < expiry(last, window),
            None => false,
        }
    }

    /// Drop entries whose window has fully elapsed. Returns how many were removed.
    pub fn prune(&self, now: DateTime<Utc>, window: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, last| now < expiry(*last, window));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn expiry(last: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    // Out-of-range windows saturate to a century
    let window =
        chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::weeks(52 * 100));
    last.checked_add_signed(window)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
