//! Client-side event filters applied on top of a change feed read.
//!
//! Filtering never changes what is downloaded; events that do not match are
//! dropped after decoding.

use chrono::{DateTime, Utc};

use crate::event::ChangeFeedEvent;

/// Trait for filtering events during iteration.
pub trait EventFilter {
    /// Returns true if the event matches the filter criteria.
    fn matches(&self, event: &ChangeFeedEvent) -> bool;
}

/// Filter by event type.
#[derive(Debug, Clone)]
pub struct EventTypeFilter {
    /// Event type to match (e.g., "BlobCreated").
    pub event_type: String,
}

impl EventFilter for EventTypeFilter {
    fn matches(&self, event: &ChangeFeedEvent) -> bool {
        event.event_type() == Some(self.event_type.as_str())
    }
}

/// Filter by subject prefix.
#[derive(Debug, Clone)]
pub struct SubjectPrefixFilter {
    /// Prefix the subject must start with.
    pub prefix: String,
}

impl EventFilter for SubjectPrefixFilter {
    fn matches(&self, event: &ChangeFeedEvent) -> bool {
        event
            .subject()
            .map(|s| s.starts_with(&self.prefix))
            .unwrap_or(false)
    }
}

/// Filter by the event's own `eventTime`.
///
/// Events without a parseable `eventTime` never match.
#[derive(Debug, Clone, Default)]
pub struct TimeRangeFilter {
    /// Include events at or after this time.
    pub after: Option<DateTime<Utc>>,
    /// Include events at or before this time.
    pub before: Option<DateTime<Utc>>,
}

impl EventFilter for TimeRangeFilter {
    fn matches(&self, event: &ChangeFeedEvent) -> bool {
        let Some(event_time) = event.event_time() else {
            return false;
        };

        if self.after.is_some_and(|after| event_time < after) {
            return false;
        }
        if self.before.is_some_and(|before| event_time > before) {
            return false;
        }
        true
    }
}

/// Composite filter: all filters must match (AND).
#[derive(Default)]
pub struct AndFilter {
    /// Filters to combine with AND logic.
    pub filters: Vec<Box<dyn EventFilter + Send>>,
}

impl EventFilter for AndFilter {
    fn matches(&self, event: &ChangeFeedEvent) -> bool {
        self.filters.iter().all(|f| f.matches(event))
    }
}

/// Composite filter: any filter must match (OR).
#[derive(Default)]
pub struct OrFilter {
    /// Filters to combine with OR logic.
    pub filters: Vec<Box<dyn EventFilter + Send>>,
}

impl EventFilter for OrFilter {
    fn matches(&self, event: &ChangeFeedEvent) -> bool {
        self.filters.iter().any(|f| f.matches(event))
    }
}
