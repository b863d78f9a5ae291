use crate::Timestamp;

/// Source of the `timestamp` header and signed timestamp.
///
/// `Fixed` pins every signature to one instant and is meant for tests; the exchange
/// rejects timestamps outside its skew window, so production clients use `System`.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimePolicy {
    #[default]
    System,
    Fixed(Timestamp),
}

impl TimePolicy {
    pub(crate) fn now(self) -> Timestamp {
        match self {
            TimePolicy::System => chrono::Utc::now().timestamp(),
            TimePolicy::Fixed(ts) => ts,
        }
    }
}

#[cfg(test)]
#[expect(clippy::missing_assert_message, reason = "each test name states the expectation")]
mod tests {
    use super::*;

    #[test]
    fn fixed_policy_is_stable() {
        let policy = TimePolicy::Fixed(1_700_000_000);

        assert_eq!(policy.now(), 1_700_000_000);
        assert_eq!(policy.now(), policy.now());
    }

    #[test]
    fn system_policy_tracks_wall_clock() {
        let before = chrono::Utc::now().timestamp();
        let now = TimePolicy::System.now();

        assert!(now >= before);
        assert!(now - before < 5);
    }
}
