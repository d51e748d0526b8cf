//! Exchange Core Types
//!
//! Type definitions for exchange requests.

use std::fmt;
use std::str::FromStr;

use crate::core_types::{Points, SkillId, UserId};

use super::status::ExchangeStatus;

/// Exchange ID type - ULID-based unique identifier
///
/// Using ULID provides:
/// - Monotonic, sortable IDs
/// - No coordination needed (no machine_id)
/// - 128-bit with good entropy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeId(ulid::Ulid);

impl ExchangeId {
    /// Generate a new unique ExchangeId
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Get the inner ULID value
    pub fn inner(&self) -> ulid::Ulid {
        self.0
    }
}

impl Default for ExchangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExchangeId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

impl serde::Serialize for ExchangeId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

/// Which side of an exchange a user is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    /// The learner who requested the session and funds the escrow
    Sender,
    /// The teacher who accepts or declines
    Receiver,
}

impl Party {
    pub fn as_str(&self) -> &'static str {
        match self {
            Party::Sender => "SENDER",
            Party::Receiver => "RECEIVER",
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Exchange request record
///
/// `price` points are held from the sender's available balance at creation
/// and stay in the sender's held balance until exactly one of refund
/// (decline) or settle (completion). `price` is immutable after creation.
#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    /// Unique exchange ID (ULID, also the mirror's primary key)
    pub id: ExchangeId,
    /// Learner funding the escrow
    pub sender: UserId,
    /// Teacher being requested
    pub receiver: UserId,
    /// Requested catalog skill
    pub skill: SkillId,
    /// Points escrowed for the session, fixed at creation
    pub price: Points,
    /// Current lifecycle state
    pub status: ExchangeStatus,
    pub sender_confirmed: bool,
    pub receiver_confirmed: bool,
    /// Confirmation timestamps (millis); refreshed on repeat confirmation
    pub sender_confirmed_at: Option<i64>,
    pub receiver_confirmed_at: Option<i64>,
    /// Creation timestamp (millis), immutable
    pub created_at: i64,
}

impl ExchangeRequest {
    /// Create a new exchange request in PENDING state
    pub fn new(
        id: ExchangeId,
        sender: UserId,
        receiver: UserId,
        skill: SkillId,
        price: Points,
    ) -> Self {
        Self {
            id,
            sender,
            receiver,
            skill,
            price,
            status: ExchangeStatus::Pending,
            sender_confirmed: false,
            receiver_confirmed: false,
            sender_confirmed_at: None,
            receiver_confirmed_at: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Which side of this exchange the user is on, if any
    pub fn party_of(&self, user: UserId) -> Option<Party> {
        if user == self.sender {
            Some(Party::Sender)
        } else if user == self.receiver {
            Some(Party::Receiver)
        } else {
            None
        }
    }

    /// Record a confirmation for the given party (idempotent; a repeat
    /// confirmation only refreshes the timestamp)
    pub fn record_confirmation(&mut self, party: Party, at_millis: i64) {
        match party {
            Party::Sender => {
                self.sender_confirmed = true;
                self.sender_confirmed_at = Some(at_millis);
            }
            Party::Receiver => {
                self.receiver_confirmed = true;
                self.receiver_confirmed_at = Some(at_millis);
            }
        }
    }
}

impl fmt::Display for ExchangeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Exchange[{}] {} -> {} skill={} price={} status={}",
            self.id, self.sender, self.receiver, self.skill, self.price, self.status
        )
    }
}
