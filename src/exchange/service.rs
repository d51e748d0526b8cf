//! Exchange State Machine
//!
//! Coordinates a single exchange's lifecycle and invokes the escrow
//! operations at the correct transitions.
//!
//! # Concurrency
//!
//! The per-exchange mutex is the serialization point for status
//! transitions: the status check, the ledger mutation it guards, and the
//! status write all commit under that one lock, which is what makes
//! decline's refund and confirm's settle at-most-once. Ledger row locks
//! nest strictly inside the exchange lock, never the reverse.

use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::config::EscrowConfig;
use crate::core_types::{Points, SkillId, UserId};
use crate::ledger::{LedgerStore, SettlementPolicy};

use super::completion;
use super::error::ExchangeError;
use super::events::{EventQueue, ExchangeEvent};
use super::models::{ExchangeId, ExchangeRequest};
use super::status::ExchangeStatus;

/// Exchange state machine over the ledger store
pub struct ExchangeService {
    ledger: Arc<LedgerStore>,
    exchanges: DashMap<ExchangeId, Arc<Mutex<ExchangeRequest>>>,
    policy: SettlementPolicy,
    default_price: Points,
    events: Arc<EventQueue>,
}

impl ExchangeService {
    pub fn new(ledger: Arc<LedgerStore>, config: &EscrowConfig, events: Arc<EventQueue>) -> Self {
        Self {
            ledger,
            exchanges: DashMap::new(),
            policy: config.settlement_policy(),
            default_price: config.default_price,
            events,
        }
    }

    /// The ledger backing this service
    pub fn ledger(&self) -> &Arc<LedgerStore> {
        &self.ledger
    }

    /// The outbound event queue
    pub fn events(&self) -> &Arc<EventQueue> {
        &self.events
    }

    // ============================================================
    // TRANSITIONS
    // ============================================================

    /// Create an exchange request, escrowing `price` from the sender.
    ///
    /// The hold runs first; the request is persisted only if the hold
    /// succeeds, so a rejected request leaves no trace.
    pub fn create(
        &self,
        sender: UserId,
        receiver: UserId,
        skill: SkillId,
        price: Points,
    ) -> Result<ExchangeId, ExchangeError> {
        if sender == receiver {
            return Err(ExchangeError::SameUser);
        }
        if price == 0 {
            return Err(ExchangeError::InvalidAmount);
        }
        if self.ledger.balance_of(receiver).is_none() {
            return Err(ExchangeError::AccountNotFound(receiver));
        }

        let id = ExchangeId::new();
        let snapshot = self.ledger.hold(sender, price, Some(id))?;

        let record = ExchangeRequest::new(id, sender, receiver, skill, price);
        let created_at = record.created_at;
        self.exchanges.insert(id, Arc::new(Mutex::new(record)));

        info!(
            exchange_id = %id,
            sender,
            receiver,
            skill,
            price,
            "exchange created, points held"
        );
        self.events.publish(ExchangeEvent::Created {
            exchange_id: id,
            sender,
            receiver,
            skill,
            price,
            sender_available: snapshot.available,
            sender_held: snapshot.held,
            sender_balance_version: snapshot.version,
            created_at,
        });
        Ok(id)
    }

    /// Create an exchange request at the configured default price
    pub fn send_request(
        &self,
        sender: UserId,
        receiver: UserId,
        skill: SkillId,
    ) -> Result<ExchangeId, ExchangeError> {
        self.create(sender, receiver, skill, self.default_price)
    }

    /// Receiver agrees to teach. No ledger effect.
    pub fn accept(&self, id: ExchangeId, actor: UserId) -> Result<(), ExchangeError> {
        let cell = self.exchange(id)?;
        let mut record = lock_exchange(&cell)?;

        if actor != record.receiver {
            return Err(ExchangeError::Forbidden);
        }
        if record.status != ExchangeStatus::Pending {
            return Err(ExchangeError::InvalidState {
                state: record.status,
                action: "accept",
            });
        }

        record.status = ExchangeStatus::Accepted;
        info!(exchange_id = %id, receiver = actor, "exchange accepted");
        self.events.publish(ExchangeEvent::Accepted {
            exchange_id: id,
            sender: record.sender,
            receiver: record.receiver,
        });
        Ok(())
    }

    /// Receiver declines; the escrowed points go back to the sender.
    ///
    /// The status guard and the refund commit under the exchange lock, so
    /// a second decline observes DECLINED and fails without touching the
    /// ledger.
    pub fn decline(&self, id: ExchangeId, actor: UserId) -> Result<(), ExchangeError> {
        let cell = self.exchange(id)?;
        let mut record = lock_exchange(&cell)?;

        if actor != record.receiver {
            return Err(ExchangeError::Forbidden);
        }
        if !record.status.can_decline() {
            return Err(ExchangeError::InvalidState {
                state: record.status,
                action: "decline",
            });
        }

        let snapshot = self
            .ledger
            .refund(record.sender, record.price, Some(record.id))?;
        record.status = ExchangeStatus::Declined;

        info!(
            exchange_id = %id,
            receiver = actor,
            refunded = record.price,
            "exchange declined, escrow refunded"
        );
        self.events.publish(ExchangeEvent::Declined {
            exchange_id: id,
            sender: record.sender,
            receiver: record.receiver,
            refunded: record.price,
            sender_available: snapshot.available,
            sender_held: snapshot.held,
            sender_balance_version: snapshot.version,
        });
        Ok(())
    }

    /// Record a party's confirmation; settle when both sides have
    /// confirmed.
    ///
    /// Returns true iff THIS call completed the exchange. Confirming
    /// twice only refreshes the timestamp: once the status is COMPLETED
    /// the completion detector reports not-ready and no second settlement
    /// can happen.
    pub fn confirm(&self, id: ExchangeId, actor: UserId) -> Result<bool, ExchangeError> {
        let cell = self.exchange(id)?;
        let mut record = lock_exchange(&cell)?;

        let party = record.party_of(actor).ok_or(ExchangeError::Forbidden)?;
        let now = chrono::Utc::now().timestamp_millis();
        record.record_confirmation(party, now);
        debug!(exchange_id = %id, party = %party, "confirmation recorded");

        if !completion::is_ready(
            record.status,
            record.sender_confirmed,
            record.receiver_confirmed,
        ) {
            return Ok(false);
        }

        let outcome = self.ledger.settle(
            record.sender,
            record.receiver,
            record.price,
            &self.policy,
            Some(record.id),
        )?;
        record.status = ExchangeStatus::Completed;

        info!(
            exchange_id = %id,
            sender = record.sender,
            receiver = record.receiver,
            transferred = outcome.transferred,
            bonus = outcome.bonus,
            "exchange completed, escrow settled"
        );
        self.events.publish(ExchangeEvent::Completed {
            exchange_id: id,
            sender: record.sender,
            receiver: record.receiver,
            transferred: outcome.transferred,
            bonus: outcome.bonus,
            sender_available: outcome.sender.available,
            sender_held: outcome.sender.held,
            receiver_available: outcome.receiver.available,
            receiver_held: outcome.receiver.held,
            sender_balance_version: outcome.sender.version,
            receiver_balance_version: outcome.receiver.version,
            sender_confirmed_at: record.sender_confirmed_at,
            receiver_confirmed_at: record.receiver_confirmed_at,
        });
        Ok(true)
    }

    // ============================================================
    // QUERIES
    // ============================================================

    /// Snapshot of one exchange
    pub fn get(&self, id: ExchangeId) -> Result<ExchangeRequest, ExchangeError> {
        let cell = self.exchange(id)?;
        let record = lock_exchange(&cell)?;
        Ok(record.clone())
    }

    /// All exchanges the user is a party to, newest first
    pub fn exchanges_for(&self, user: UserId) -> Vec<ExchangeRequest> {
        let mut items: Vec<ExchangeRequest> = self
            .exchanges
            .iter()
            .filter_map(|entry| {
                let record = entry.value().lock().ok()?;
                record.party_of(user).map(|_| record.clone())
            })
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.inner().cmp(&a.id.inner())));
        items
    }

    /// Incoming requests: pending exchanges where the user is the receiver
    pub fn inbox(&self, user: UserId) -> Vec<ExchangeRequest> {
        let mut items: Vec<ExchangeRequest> = self
            .exchanges
            .iter()
            .filter_map(|entry| {
                let record = entry.value().lock().ok()?;
                (record.receiver == user && record.status == ExchangeStatus::Pending)
                    .then(|| record.clone())
            })
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.inner().cmp(&a.id.inner())));
        items
    }

    fn exchange(&self, id: ExchangeId) -> Result<Arc<Mutex<ExchangeRequest>>, ExchangeError> {
        self.exchanges
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ExchangeError::ExchangeNotFound(id.to_string()))
    }
}

fn lock_exchange(
    cell: &Mutex<ExchangeRequest>,
) -> Result<MutexGuard<'_, ExchangeRequest>, ExchangeError> {
    cell.lock()
        .map_err(|_| ExchangeError::Consistency("exchange lock poisoned".to_string()))
}
