//! LedgerStore - per-user balance store with escrow primitives
//!
//! The authoritative points state for all users. Each account's mutex is the
//! row lock; every escrow operation runs its check-and-mutate while holding
//! the locks of all accounts it touches, so a failed precondition never
//! leaves partial writes.
//!
//! # Lock ordering
//!
//! Multi-account operations (settle) acquire row locks in ascending
//! `UserId` order, system-wide. Callers that wrap ledger operations in an
//! exchange-level lock must take that lock FIRST; ledger row locks nest
//! strictly inside it and never the other way around.

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, warn};

use crate::audit::{AuditEntry, AuditWriter};
use crate::balance::Balance;
use crate::core_types::{Points, UserId};
use crate::exchange::{ExchangeError, ExchangeId};

/// Settlement arithmetic, fixed at service construction.
///
/// The escrowed amount always moves from the sender's hold to the
/// receiver's available balance. With `charge_sender_on_settle` set (the
/// marketplace default), settlement additionally debits the exchange price
/// from the sender's available balance, clamped at zero. Both parties are
/// credited the flat `completion_bonus`.
#[derive(Debug, Clone, Copy)]
pub struct SettlementPolicy {
    pub completion_bonus: Points,
    pub charge_sender_on_settle: bool,
}

impl Default for SettlementPolicy {
    fn default() -> Self {
        Self {
            completion_bonus: 10,
            charge_sender_on_settle: true,
        }
    }
}

/// Read-only view of one account's balances
///
/// `version` is the account's mutation counter at snapshot time. It makes
/// snapshots order-comparable per user: a consumer applying snapshots
/// out of publish order keeps only the highest version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub available: u64,
    pub held: u64,
    pub version: u64,
}

impl BalanceSnapshot {
    fn of(balance: &Balance) -> Self {
        Self {
            available: balance.available(),
            held: balance.held(),
            version: balance.version(),
        }
    }
}

/// Result of a settlement, with balances after commit
#[derive(Debug, Clone, Copy)]
pub struct SettleOutcome {
    /// Points actually moved out of the sender's hold
    pub transferred: Points,
    /// Flat bonus credited to each party
    pub bonus: Points,
    pub sender: BalanceSnapshot,
    pub receiver: BalanceSnapshot,
}

/// Per-user balance store
///
/// `DashMap` gives lock-free account lookup; the `Mutex<Balance>` inside
/// each entry is the row lock held for the duration of a mutation.
pub struct LedgerStore {
    accounts: DashMap<UserId, Arc<Mutex<Balance>>, FxBuildHasher>,
    audit: Option<Mutex<AuditWriter>>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::with_hasher(FxBuildHasher::default()),
            audit: None,
        }
    }

    /// Attach a balance-change audit log
    pub fn with_audit(writer: AuditWriter) -> Self {
        Self {
            accounts: DashMap::with_hasher(FxBuildHasher::default()),
            audit: Some(Mutex::new(writer)),
        }
    }

    /// Create an empty account. Returns false if it already existed.
    pub fn open_account(&self, user: UserId) -> bool {
        let mut created = false;
        self.accounts.entry(user).or_insert_with(|| {
            created = true;
            Arc::new(Mutex::new(Balance::default()))
        });
        created
    }

    /// Credit points to a user's available balance.
    /// This is the ONLY operation that auto-creates the account.
    pub fn deposit(
        &self,
        user: UserId,
        amount: Points,
    ) -> Result<BalanceSnapshot, ExchangeError> {
        let cell = self
            .accounts
            .entry(user)
            .or_insert_with(|| Arc::new(Mutex::new(Balance::default())))
            .value()
            .clone();
        let mut balance = lock_row(&cell)?;
        balance.deposit(amount).map_err(consistency)?;
        self.audit(None, user, "deposit", amount, &balance);
        Ok(BalanceSnapshot::of(&balance))
    }

    /// Current balances for a user, if the account exists
    pub fn balance_of(&self, user: UserId) -> Option<BalanceSnapshot> {
        let cell = self.accounts.get(&user)?.value().clone();
        let balance = cell.lock().ok()?;
        Some(BalanceSnapshot::of(&balance))
    }

    // ============================================================
    // ESCROW OPERATIONS
    // ============================================================

    /// Earmark `amount` points from the sender's available balance.
    ///
    /// Zero amounts trivially succeed without touching the ledger.
    /// Fails with `InsufficientFunds` (no mutation) when the available
    /// balance cannot cover the amount.
    pub fn hold(
        &self,
        sender: UserId,
        amount: Points,
        exchange: Option<ExchangeId>,
    ) -> Result<BalanceSnapshot, ExchangeError> {
        let cell = self.account(sender)?;
        let mut balance = lock_row(&cell)?;

        if amount == 0 {
            return Ok(BalanceSnapshot::of(&balance));
        }
        if balance.available() < amount {
            return Err(ExchangeError::InsufficientFunds);
        }
        balance.hold(amount).map_err(consistency)?;
        self.audit(exchange, sender, "hold", amount, &balance);
        Ok(BalanceSnapshot::of(&balance))
    }

    /// Return `amount` held points to the sender's available balance.
    ///
    /// A shortfall in the held balance means the state machine's
    /// at-most-once guarantee was broken upstream; it aborts the operation
    /// as a consistency violation and is never clamped.
    pub fn refund(
        &self,
        sender: UserId,
        amount: Points,
        exchange: Option<ExchangeId>,
    ) -> Result<BalanceSnapshot, ExchangeError> {
        let cell = self.account(sender)?;
        let mut balance = lock_row(&cell)?;

        if balance.held() < amount {
            error!(
                user_id = sender,
                held = balance.held(),
                amount,
                "refund exceeds held balance"
            );
            return Err(ExchangeError::Consistency(format!(
                "refund of {} exceeds held balance {} for user {}",
                amount,
                balance.held(),
                sender
            )));
        }
        balance.release(amount).map_err(consistency)?;
        self.audit(exchange, sender, "refund", amount, &balance);
        Ok(BalanceSnapshot::of(&balance))
    }

    /// Settle an escrowed amount to the receiver and grant the completion
    /// bonus to both parties.
    ///
    /// Takes both row locks in ascending user-id order. The transfer is
    /// clamped to however much is actually held; the sender-side charge is
    /// clamped at zero. Both clamps are logged when they fire. All four
    /// mutations commit while both locks are held.
    pub fn settle(
        &self,
        sender: UserId,
        receiver: UserId,
        amount: Points,
        policy: &SettlementPolicy,
        exchange: Option<ExchangeId>,
    ) -> Result<SettleOutcome, ExchangeError> {
        let sender_cell = self.account(sender)?;
        let receiver_cell = self.account(receiver)?;

        // Row locks in ascending user-id order, system-wide.
        let (mut snd, mut rcv) = if sender < receiver {
            let s = lock_row(&sender_cell)?;
            let r = lock_row(&receiver_cell)?;
            (s, r)
        } else {
            let r = lock_row(&receiver_cell)?;
            let s = lock_row(&sender_cell)?;
            (s, r)
        };

        let transferred = amount.min(snd.held());
        if transferred < amount {
            warn!(
                exchange_id = %display_or_dash(exchange),
                user_id = sender,
                held = snd.held(),
                amount,
                "settle transfer clamped to held balance"
            );
        }

        let charge = if policy.charge_sender_on_settle {
            let charge = amount.min(snd.available());
            if charge < amount {
                warn!(
                    exchange_id = %display_or_dash(exchange),
                    user_id = sender,
                    available = snd.available(),
                    amount,
                    "settle charge clamped to available balance"
                );
            }
            charge
        } else {
            0
        };

        // Validate every mutation before applying any, so an overflow
        // cannot leave a half-settled pair of accounts.
        snd.available()
            .checked_sub(charge)
            .and_then(|a| a.checked_add(policy.completion_bonus))
            .ok_or_else(|| consistency("settle would overflow sender balance"))?;
        rcv.available()
            .checked_add(transferred)
            .and_then(|a| a.checked_add(policy.completion_bonus))
            .ok_or_else(|| consistency("settle would overflow receiver balance"))?;

        snd.spend_held(transferred).map_err(consistency)?;
        self.audit(exchange, sender, "transfer_out", transferred, &snd);
        rcv.deposit(transferred).map_err(consistency)?;
        self.audit(exchange, receiver, "transfer_in", transferred, &rcv);

        if charge > 0 {
            snd.charge(charge).map_err(consistency)?;
            self.audit(exchange, sender, "charge", charge, &snd);
        }

        snd.deposit(policy.completion_bonus).map_err(consistency)?;
        self.audit(exchange, sender, "bonus", policy.completion_bonus, &snd);
        rcv.deposit(policy.completion_bonus).map_err(consistency)?;
        self.audit(exchange, receiver, "bonus", policy.completion_bonus, &rcv);

        Ok(SettleOutcome {
            transferred,
            bonus: policy.completion_bonus,
            sender: BalanceSnapshot::of(&snd),
            receiver: BalanceSnapshot::of(&rcv),
        })
    }

    fn account(&self, user: UserId) -> Result<Arc<Mutex<Balance>>, ExchangeError> {
        self.accounts
            .get(&user)
            .map(|entry| entry.value().clone())
            .ok_or(ExchangeError::AccountNotFound(user))
    }

    fn audit(
        &self,
        exchange_id: Option<ExchangeId>,
        user_id: UserId,
        op: &'static str,
        amount: Points,
        balance: &Balance,
    ) {
        let Some(writer) = &self.audit else {
            return;
        };
        let entry = AuditEntry {
            exchange_id,
            user_id,
            op,
            amount,
            available_after: balance.available(),
            held_after: balance.held(),
        };
        match writer.lock() {
            Ok(mut writer) => {
                if let Err(e) = writer.write_entry(&entry) {
                    error!(error = %e, user_id, op, "audit write failed");
                }
            }
            Err(_) => error!(user_id, op, "audit writer lock poisoned"),
        }
    }
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_row(cell: &Mutex<Balance>) -> Result<MutexGuard<'_, Balance>, ExchangeError> {
    cell.lock()
        .map_err(|_| consistency("balance row lock poisoned"))
}

fn consistency(msg: &'static str) -> ExchangeError {
    ExchangeError::Consistency(msg.to_string())
}

fn display_or_dash(exchange: Option<ExchangeId>) -> String {
    exchange.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> LedgerStore {
        LedgerStore::new()
    }

    #[test]
    fn test_open_account_is_idempotent() {
        let ledger = store();
        assert!(ledger.open_account(1001));
        assert!(!ledger.open_account(1001));

        let snapshot = ledger.balance_of(1001).unwrap();
        assert_eq!(snapshot.available, 0);
        assert_eq!(snapshot.held, 0);
    }

    #[test]
    fn test_deposit_auto_creates_account() {
        let ledger = store();
        assert!(ledger.balance_of(1001).is_none());

        let snapshot = ledger.deposit(1001, 20).unwrap();
        assert_eq!(snapshot.available, 20);
        assert_eq!(snapshot.held, 0);
        assert_eq!(ledger.balance_of(1001).unwrap().available, 20);
    }

    #[test]
    fn test_hold_moves_available_to_held() {
        let ledger = store();
        ledger.deposit(1001, 20).unwrap();

        let snapshot = ledger.hold(1001, 5, None).unwrap();
        assert_eq!(snapshot.available, 15);
        assert_eq!(snapshot.held, 5);
    }

    #[test]
    fn test_hold_insufficient_funds_no_mutation() {
        let ledger = store();
        ledger.deposit(1001, 3).unwrap();

        let err = ledger.hold(1001, 5, None).unwrap_err();
        assert!(matches!(err, ExchangeError::InsufficientFunds));

        let snapshot = ledger.balance_of(1001).unwrap();
        assert_eq!(snapshot.available, 3);
        assert_eq!(snapshot.held, 0);
    }

    #[test]
    fn test_hold_zero_amount_is_trivial_success() {
        let ledger = store();
        ledger.deposit(1001, 0).unwrap();

        let snapshot = ledger.hold(1001, 0, None).unwrap();
        assert_eq!(snapshot.available, 0);
        assert_eq!(snapshot.held, 0);
    }

    #[test]
    fn test_hold_unknown_account() {
        let ledger = store();
        let err = ledger.hold(404, 5, None).unwrap_err();
        assert!(matches!(err, ExchangeError::AccountNotFound(404)));
    }

    #[test]
    fn test_hold_then_refund_round_trip() {
        let ledger = store();
        ledger.deposit(1001, 20).unwrap();

        ledger.hold(1001, 5, None).unwrap();
        let snapshot = ledger.refund(1001, 5, None).unwrap();
        assert_eq!(snapshot.available, 20);
        assert_eq!(snapshot.held, 0);
    }

    #[test]
    fn test_refund_exceeding_held_is_consistency_violation() {
        let ledger = store();
        ledger.deposit(1001, 20).unwrap();
        ledger.hold(1001, 5, None).unwrap();

        let err = ledger.refund(1001, 6, None).unwrap_err();
        assert!(matches!(err, ExchangeError::Consistency(_)));

        // Untouched by the failed refund
        let snapshot = ledger.balance_of(1001).unwrap();
        assert_eq!(snapshot.available, 15);
        assert_eq!(snapshot.held, 5);
    }

    #[test]
    fn test_settle_reference_scenario() {
        // sender 20/0, receiver 0/0, price 5, bonus 10:
        // after hold sender is 15/5; after settle sender 20/0, receiver 15/0
        let ledger = store();
        ledger.deposit(1001, 20).unwrap();
        ledger.deposit(1002, 0).unwrap();
        ledger.hold(1001, 5, None).unwrap();

        let outcome = ledger
            .settle(1001, 1002, 5, &SettlementPolicy::default(), None)
            .unwrap();

        assert_eq!(outcome.transferred, 5);
        assert_eq!(outcome.bonus, 10);
        assert_eq!((outcome.sender.available, outcome.sender.held), (20, 0));
        assert_eq!((outcome.receiver.available, outcome.receiver.held), (15, 0));
    }

    #[test]
    fn test_settle_without_sender_charge() {
        let ledger = store();
        ledger.deposit(1001, 20).unwrap();
        ledger.deposit(1002, 0).unwrap();
        ledger.hold(1001, 5, None).unwrap();

        let policy = SettlementPolicy {
            completion_bonus: 10,
            charge_sender_on_settle: false,
        };
        let outcome = ledger.settle(1001, 1002, 5, &policy, None).unwrap();

        assert_eq!((outcome.sender.available, outcome.sender.held), (25, 0));
        assert_eq!((outcome.receiver.available, outcome.receiver.held), (15, 0));
    }

    #[test]
    fn test_settle_clamps_transfer_to_held() {
        let ledger = store();
        ledger.deposit(1001, 20).unwrap();
        ledger.deposit(1002, 0).unwrap();
        ledger.hold(1001, 3, None).unwrap();

        let outcome = ledger
            .settle(1001, 1002, 5, &SettlementPolicy::default(), None)
            .unwrap();

        // Only 3 points were actually held; charge still targets the full
        // amount: 17 - 5 + 10 = 22
        assert_eq!(outcome.transferred, 3);
        assert_eq!((outcome.sender.available, outcome.sender.held), (22, 0));
        assert_eq!((outcome.receiver.available, outcome.receiver.held), (13, 0));
    }

    #[test]
    fn test_settle_clamps_charge_at_zero() {
        // Sender spent everything else after the hold: available 0
        let ledger = store();
        ledger.deposit(1001, 5).unwrap();
        ledger.deposit(1002, 0).unwrap();
        ledger.hold(1001, 5, None).unwrap();

        let outcome = ledger
            .settle(1001, 1002, 5, &SettlementPolicy::default(), None)
            .unwrap();

        // Charge clamped to available 0; the bonus still lands
        assert_eq!((outcome.sender.available, outcome.sender.held), (10, 0));
        assert_eq!((outcome.receiver.available, outcome.receiver.held), (15, 0));
    }

    #[test]
    fn test_settle_lock_order_is_by_user_id() {
        // Same pair settled from both id directions completes without
        // deadlock; concurrent coverage lives in the exchange stress tests
        let ledger = store();
        ledger.deposit(1, 20).unwrap();
        ledger.deposit(2, 20).unwrap();

        ledger.hold(2, 5, None).unwrap();
        ledger
            .settle(2, 1, 5, &SettlementPolicy::default(), None)
            .unwrap();

        ledger.hold(1, 5, None).unwrap();
        ledger
            .settle(1, 2, 5, &SettlementPolicy::default(), None)
            .unwrap();
    }

    #[test]
    fn test_balances_never_negative() {
        let ledger = store();
        ledger.deposit(1001, 20).unwrap();
        ledger.deposit(1002, 0).unwrap();
        ledger.hold(1001, 20, None).unwrap();

        // available is 0; settlement must not drive it below zero
        let outcome = ledger
            .settle(1001, 1002, 20, &SettlementPolicy::default(), None)
            .unwrap();
        assert_eq!(outcome.sender.available, 10); // bonus only
        assert_eq!(outcome.sender.held, 0);
    }
}
