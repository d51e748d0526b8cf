/// ENFORCED BALANCE TYPE - Used by the ledger store
///
/// This is the SINGLE source of truth for balance arithmetic.
/// ALL balance mutations MUST go through these methods.
///
/// # Enforcement Strategy:
/// 1. Fields are PRIVATE - no direct access
/// 2. All mutations return Result - errors are explicit
/// 3. Version auto-increments - audit trail
/// 4. checked_add/sub - overflow protection
use serde::{Deserialize, Serialize};

/// Per-user points balance
///
/// # Invariants (ENFORCED by private fields):
/// - `available` and `held` are unsigned - never negative by construction
/// - `available + held` is the user's total; only `spend_held` and `charge`
///   remove points from the account, only `deposit` adds them
/// - No overflow/underflow (checked arithmetic)
/// - `version` increments on every successful mutation
///
/// # Usage:
/// ```ignore
/// let mut balance = Balance::default();
/// balance.deposit(20)?;      // available = 20
/// balance.hold(5)?;          // available = 15, held = 5
/// balance.release(5)?;       // available = 20, held = 0
/// ```
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Balance {
    available: u64, // PRIVATE - spendable points
    held: u64,      // PRIVATE - points escrowed against pending exchanges
    version: u64,   // PRIVATE - incremented on every successful mutation
}

impl Balance {
    // ============================================================
    // READ-ONLY GETTERS (safe to expose)
    // ============================================================

    /// Get available balance (read-only)
    #[inline(always)]
    pub const fn available(&self) -> u64 {
        self.available
    }

    /// Get held balance (read-only)
    #[inline(always)]
    pub const fn held(&self) -> u64 {
        self.held
    }

    /// Get total balance (available + held)
    /// Returns None on overflow (indicates data corruption)
    #[inline(always)]
    pub const fn total(&self) -> Option<u64> {
        self.available.checked_add(self.held)
    }

    /// Get mutation version (read-only)
    #[inline(always)]
    pub const fn version(&self) -> u64 {
        self.version
    }

    // ============================================================
    // VALIDATED MUTATIONS (ENFORCED operations)
    // ============================================================

    /// Credit points to the available balance
    ///
    /// # Errors
    /// - Returns error on overflow
    pub fn deposit(&mut self, amount: u64) -> Result<(), &'static str> {
        self.available = self
            .available
            .checked_add(amount)
            .ok_or("Deposit overflow")?;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }

    /// Debit points from the available balance
    ///
    /// # Errors
    /// - "Insufficient funds" if available < amount
    pub fn charge(&mut self, amount: u64) -> Result<(), &'static str> {
        if self.available < amount {
            return Err("Insufficient funds");
        }
        self.available = self
            .available
            .checked_sub(amount)
            .ok_or("Charge underflow")?;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }

    /// Earmark points against a pending exchange (available -> held)
    ///
    /// # Errors
    /// - "Insufficient funds" if available < amount
    pub fn hold(&mut self, amount: u64) -> Result<(), &'static str> {
        if self.available < amount {
            return Err("Insufficient funds");
        }
        self.available = self
            .available
            .checked_sub(amount)
            .ok_or("Hold available underflow")?;
        self.held = self.held.checked_add(amount).ok_or("Hold held overflow")?;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }

    /// Return earmarked points to the available balance (held -> available)
    ///
    /// # Errors
    /// - "Insufficient held funds" if held < amount
    pub fn release(&mut self, amount: u64) -> Result<(), &'static str> {
        if self.held < amount {
            return Err("Insufficient held funds");
        }
        self.held = self
            .held
            .checked_sub(amount)
            .ok_or("Release held underflow")?;
        self.available = self
            .available
            .checked_add(amount)
            .ok_or("Release available overflow")?;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }

    /// Consume earmarked points (they leave this account entirely)
    /// Used when settlement transfers the escrowed amount to the receiver
    ///
    /// # Errors
    /// - "Insufficient held funds" if held < amount
    pub fn spend_held(&mut self, amount: u64) -> Result<(), &'static str> {
        if self.held < amount {
            return Err("Insufficient held funds");
        }
        self.held = self
            .held
            .checked_sub(amount)
            .ok_or("Spend held underflow")?;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }
}

// ============================================================
// TESTS - Prove enforcement works
// ============================================================
