//! Event stamps.

use std::cell::Cell;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

/// Identifies one commit: a per-store sequence number plus the wall-clock
/// time it was assigned.
///
/// Single dispatches get one stamp each; a batch shares one stamp across all
/// the slots it touched. Stamps order by sequence number first, then by time,
/// so equality and ordering agree even for stamps from different stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventStamp {
    pub seq: u64,
    pub at: DateTime<Utc>,
}

impl fmt::Display for EventStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.seq,
            self.at.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }
}

/// Hands out strictly increasing stamps for one store.
#[derive(Debug, Default)]
pub(crate) struct StampClock {
    last: Cell<u64>,
}

impl StampClock {
    pub(crate) fn next(&self) -> EventStamp {
        let seq = self.last.get() + 1;
        self.last.set(seq);
        EventStamp {
            seq,
            at: Utc::now(),
        }
    }
}
