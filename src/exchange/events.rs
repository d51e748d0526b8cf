//! Events - outbound exchange lifecycle signals
//!
//! Status changes are published as typed events for collaborators: the
//! notification layer (emails to both parties) and the durability mirror.
//! Events for one exchange are pushed while its lock is held, so queue
//! order matches commit order for that exchange.

use crossbeam_queue::SegQueue;
use serde::Serialize;
use tracing::debug;

use crate::core_types::{Points, SkillId, UserId};

use super::models::ExchangeId;

/// Exchange lifecycle event
///
/// Balance fields carry the balances AFTER the transition committed, so
/// consumers never have to re-derive ledger state. The per-user
/// `*_balance_version` makes them order-comparable: events for DIFFERENT
/// exchanges touching the same user may reach the queue out of commit
/// order, and a consumer keeps only the highest version per user.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExchangeEvent {
    Created {
        exchange_id: ExchangeId,
        sender: UserId,
        receiver: UserId,
        skill: SkillId,
        price: Points,
        sender_available: u64,
        sender_held: u64,
        sender_balance_version: u64,
        created_at: i64,
    },
    Accepted {
        exchange_id: ExchangeId,
        sender: UserId,
        receiver: UserId,
    },
    Declined {
        exchange_id: ExchangeId,
        sender: UserId,
        receiver: UserId,
        refunded: Points,
        sender_available: u64,
        sender_held: u64,
        sender_balance_version: u64,
    },
    Completed {
        exchange_id: ExchangeId,
        sender: UserId,
        receiver: UserId,
        transferred: Points,
        bonus: Points,
        sender_available: u64,
        sender_held: u64,
        receiver_available: u64,
        receiver_held: u64,
        sender_balance_version: u64,
        receiver_balance_version: u64,
        sender_confirmed_at: Option<i64>,
        receiver_confirmed_at: Option<i64>,
    },
}

impl ExchangeEvent {
    /// The exchange this event belongs to
    pub fn exchange_id(&self) -> ExchangeId {
        match self {
            ExchangeEvent::Created { exchange_id, .. }
            | ExchangeEvent::Accepted { exchange_id, .. }
            | ExchangeEvent::Declined { exchange_id, .. }
            | ExchangeEvent::Completed { exchange_id, .. } => *exchange_id,
        }
    }

    /// Event kind name for logging and dispatch
    pub fn kind(&self) -> &'static str {
        match self {
            ExchangeEvent::Created { .. } => "created",
            ExchangeEvent::Accepted { .. } => "accepted",
            ExchangeEvent::Declined { .. } => "declined",
            ExchangeEvent::Completed { .. } => "completed",
        }
    }
}

/// Lock-free MPMC queue carrying events to collaborators
#[derive(Default)]
pub struct EventQueue {
    inner: SegQueue<ExchangeEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            inner: SegQueue::new(),
        }
    }

    /// Publish an event (called by the service after a transition commits)
    pub fn publish(&self, event: ExchangeEvent) {
        debug!(exchange_id = %event.exchange_id(), kind = event.kind(), "event published");
        self.inner.push(event);
    }

    /// Pop the oldest pending event
    pub fn poll(&self) -> Option<ExchangeEvent> {
        self.inner.pop()
    }

    /// Drain all pending events in publish order
    pub fn drain(&self) -> Vec<ExchangeEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.inner.pop() {
            events.push(event);
        }
        events
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Consumer of exchange events (notification senders, durability mirror)
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    async fn apply(&self, event: &ExchangeEvent) -> anyhow::Result<()>;
}
