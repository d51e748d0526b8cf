//! Exchange lifecycle states
//!
//! State IDs are designed for PostgreSQL storage as SMALLINT.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange request lifecycle states
///
/// ```text
/// PENDING → ACCEPTED → COMPLETED
///     ↓         ↓
///     ↓      DECLINED
///     ↓ ↘
///     ↓  COMPLETED   (both parties may confirm before an explicit accept)
///  DECLINED
/// ```
///
/// Terminal states: COMPLETED (20), DECLINED (-10). The status field is the
/// serialization point for exactly-once transitions: the status check and the
/// ledger mutation it guards always commit under the same exchange lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum ExchangeStatus {
    /// Sent by the sender; points held in escrow, awaiting the receiver
    Pending = 0,

    /// Receiver agreed to teach; still awaiting dual confirmation
    Accepted = 10,

    /// Terminal: both parties confirmed, escrow settled, bonus granted
    Completed = 20,

    /// Terminal: receiver declined, escrow refunded to the sender
    Declined = -10,
}

impl ExchangeStatus {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExchangeStatus::Completed | ExchangeStatus::Declined)
    }

    /// Check if the receiver may still decline from this state
    #[inline]
    pub fn can_decline(&self) -> bool {
        matches!(self, ExchangeStatus::Pending | ExchangeStatus::Accepted)
    }

    /// Get the numeric state ID for PostgreSQL storage
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Convert from PostgreSQL state ID
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(ExchangeStatus::Pending),
            10 => Some(ExchangeStatus::Accepted),
            20 => Some(ExchangeStatus::Completed),
            -10 => Some(ExchangeStatus::Declined),
            _ => None,
        }
    }

    /// Get human-readable state name
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeStatus::Pending => "PENDING",
            ExchangeStatus::Accepted => "ACCEPTED",
            ExchangeStatus::Completed => "COMPLETED",
            ExchangeStatus::Declined => "DECLINED",
        }
    }
}

impl fmt::Display for ExchangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i16> for ExchangeStatus {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        ExchangeStatus::from_id(value).ok_or(())
    }
}
