// Session ID generation for the connection gateway.
//
// IDs are UTC timestamps with nanosecond precision, formatted
// `YYYYMMDDhhmmss.nnnnnnnnn`, so they sort by connection time and are easy to
// read in logs. Timestamp granularity alone does not guarantee uniqueness
// (coarse clocks, two accepts in the same tick, the wall clock stepping
// backwards), so the generator remembers the last nanosecond value it issued
// and never issues a value at or below it. IDs are therefore strictly
// increasing for the lifetime of one generator.
//
// The gateway owns a single generator on its listener thread; no locking.

use chrono::{DateTime, Utc};
use tempo_protocol::ClientId;

#[derive(Debug, Default)]
pub struct IdGenerator {
    last_nanos: Option<i64>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next ID based on the current wall clock.
    pub fn next_id(&mut self) -> ClientId {
        self.next_id_at(Utc::now())
    }

    /// Issue the next ID as if the clock read `now`.
    pub fn next_id_at(&mut self, now: DateTime<Utc>) -> ClientId {
        let clock = now.timestamp_nanos_opt().unwrap_or(i64::MAX);
        let nanos = match self.last_nanos {
            Some(last) if clock <= last => last.saturating_add(1),
            _ => clock,
        };
        self.last_nanos = Some(nanos);
        ClientId(
            DateTime::from_timestamp_nanos(nanos)
                .format("%Y%m%d%H%M%S%.9f")
                .to_string(),
        )
    }
}
