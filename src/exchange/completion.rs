//! Completion Detector
//!
//! Pure decision logic for settlement eligibility. No side effects; safe to
//! call repeatedly. The service transitions status to COMPLETED atomically
//! with the settle call, so a second evaluation observes COMPLETED and
//! returns false.

use super::status::ExchangeStatus;

/// Decide whether an exchange is eligible to settle.
///
/// True iff both parties confirmed and the exchange is still live
/// (PENDING or ACCEPTED). Completion straight from PENDING is permitted:
/// the accept step only matters for UI signaling, not for unlocking
/// settlement.
#[inline]
pub fn is_ready(
    status: ExchangeStatus,
    sender_confirmed: bool,
    receiver_confirmed: bool,
) -> bool {
    if status.is_terminal() {
        return false;
    }
    matches!(
        status,
        ExchangeStatus::Pending | ExchangeStatus::Accepted
    ) && sender_confirmed
        && receiver_confirmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_when_both_confirmed_pending() {
        assert!(is_ready(ExchangeStatus::Pending, true, true));
    }

    #[test]
    fn test_ready_when_both_confirmed_accepted() {
        assert!(is_ready(ExchangeStatus::Accepted, true, true));
    }

    #[test]
    fn test_not_ready_with_single_confirmation() {
        assert!(!is_ready(ExchangeStatus::Pending, true, false));
        assert!(!is_ready(ExchangeStatus::Pending, false, true));
        assert!(!is_ready(ExchangeStatus::Accepted, false, false));
    }

    #[test]
    fn test_not_ready_once_completed() {
        // Both flags set, but settlement already happened
        assert!(!is_ready(ExchangeStatus::Completed, true, true));
    }

    #[test]
    fn test_not_ready_when_declined() {
        assert!(!is_ready(ExchangeStatus::Declined, true, true));
    }

    #[test]
    fn test_repeated_calls_are_stable() {
        for _ in 0..3 {
            assert!(is_ready(ExchangeStatus::Accepted, true, true));
            assert!(!is_ready(ExchangeStatus::Completed, true, true));
        }
    }
}
