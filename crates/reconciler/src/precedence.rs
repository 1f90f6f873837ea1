//! Status precedence: whether an incoming status may replace the stored one.

use ticket_store::MatchmakingStatus;

/// Returns true if `incoming` describes an earlier lifecycle stage than
/// `current` and must be discarded.
///
/// - `Searching` never replaces anything already recorded.
/// - `PotentialMatchCreated` only replaces `Searching` or itself.
/// - Terminal statuses are always accepted, so two terminal events for the
///   same ticket are last-write-wins.
///
/// This is a partial rule, not a total order over statuses.
pub fn is_stale(incoming: MatchmakingStatus, current: Option<MatchmakingStatus>) -> bool {
    let Some(current) = current else {
        return false;
    };

    match incoming {
        MatchmakingStatus::Searching => true,
        MatchmakingStatus::PotentialMatchCreated => !matches!(
            current,
            MatchmakingStatus::PotentialMatchCreated | MatchmakingStatus::Searching
        ),
        _ => false,
    }
}

/// Which staleness rule the reconciler applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrecedencePolicy {
    /// [`is_stale`] as is. Terminal statuses overwrite each other.
    #[default]
    Lenient,
    /// [`is_stale`], plus a stored terminal status is never replaced by a
    /// different status.
    StrictTerminal,
}

impl PrecedencePolicy {
    pub fn is_stale(&self, incoming: MatchmakingStatus, current: Option<MatchmakingStatus>) -> bool {
        if is_stale(incoming, current) {
            return true;
        }

        match self {
            PrecedencePolicy::Lenient => false,
            PrecedencePolicy::StrictTerminal => {
                current.is_some_and(|c| c.is_terminal() && c != incoming)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use MatchmakingStatus::*;

    #[test]
    fn first_event_is_never_stale() {
        for status in MatchmakingStatus::ALL {
            assert!(!is_stale(status, None), "{status}");
        }
    }

    #[test]
    fn searching_is_stale_against_anything_recorded() {
        for current in MatchmakingStatus::ALL {
            assert!(is_stale(Searching, Some(current)), "{current}");
        }
    }

    #[test]
    fn potential_match_only_replaces_early_stages() {
        assert!(!is_stale(PotentialMatchCreated, Some(Searching)));
        assert!(!is_stale(PotentialMatchCreated, Some(PotentialMatchCreated)));
        assert!(is_stale(PotentialMatchCreated, Some(Succeeded)));
        assert!(is_stale(PotentialMatchCreated, Some(Failed)));
        assert!(is_stale(PotentialMatchCreated, Some(TimedOut)));
        assert!(is_stale(PotentialMatchCreated, Some(Cancelled)));
    }

    #[test]
    fn terminal_statuses_are_always_accepted() {
        for incoming in [Succeeded, Failed, TimedOut, Cancelled] {
            for current in MatchmakingStatus::ALL {
                assert!(!is_stale(incoming, Some(current)), "{incoming} over {current}");
            }
        }
    }

    #[test]
    fn lenient_policy_matches_rule() {
        let policy = PrecedencePolicy::default();
        assert!(!policy.is_stale(Failed, Some(Succeeded)));
        assert!(policy.is_stale(Searching, Some(Succeeded)));
    }

    #[test]
    fn strict_policy_freezes_terminal_status() {
        let policy = PrecedencePolicy::StrictTerminal;
        assert!(policy.is_stale(Failed, Some(Succeeded)));
        assert!(policy.is_stale(Cancelled, Some(TimedOut)));
        // Replays of the same terminal event still apply.
        assert!(!policy.is_stale(Succeeded, Some(Succeeded)));
        assert!(!policy.is_stale(Succeeded, Some(PotentialMatchCreated)));
        assert!(!policy.is_stale(Succeeded, None));
    }
}
