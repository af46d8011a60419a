use crate::domain_model::ClientKey;
use chrono::{DateTime, Utc};

/// Per-client attempt counter as persisted by an `AttemptStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub client_key: ClientKey,
    pub attempts: u32,
    pub last_attempt_at: DateTime<Utc>,
    pub blocked_until: Option<DateTime<Utc>>,
}

impl AttemptRecord {
    pub fn is_blocked_at(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }

    /// Stale records are old enough to forget and carry no active block.
    pub fn is_stale_at(&self, stale_before: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.last_attempt_at < stale_before && !self.is_blocked_at(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(last: DateTime<Utc>, blocked_until: Option<DateTime<Utc>>) -> AttemptRecord {
        AttemptRecord {
            client_key: ClientKey::from("10.0.0.1"),
            attempts: 3,
            last_attempt_at: last,
            blocked_until,
        }
    }

    #[test]
    fn block_ends_at_blocked_until() {
        let now = Utc::now();
        let r = record(now, Some(now + Duration::minutes(15)));
        assert!(r.is_blocked_at(now));
        assert!(r.is_blocked_at(now + Duration::minutes(14)));
        assert!(!r.is_blocked_at(now + Duration::minutes(15)));
    }

    #[test]
    fn blocked_record_is_never_stale() {
        let now = Utc::now();
        let old = now - Duration::days(3);
        assert!(record(old, None).is_stale_at(now - Duration::days(1), now));
        assert!(!record(old, Some(now + Duration::minutes(1))).is_stale_at(now - Duration::days(1), now));
        assert!(!record(now, None).is_stale_at(now - Duration::days(1), now));
    }
}
